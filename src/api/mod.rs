use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::Parser;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::core::{
    HousingFundRange, Inputs, InsuranceFundRates, MonthlySeries, StockGrant, StockOptionGrant,
    calculate_salary, comprehensive_income_brackets,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum SeriesParam {
    Scalar(f64),
    Monthly(Vec<f64>),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CalculatePayload {
    salary: Option<f64>,
    special_additional_deduction: Option<f64>,
    year_end_awards: Option<f64>,
    year_end_awards_number: Option<f64>,
    insurance_and_fund_base: Option<f64>,
    starting_salary: Option<f64>,

    pension_rate: Option<f64>,
    medical_rate: Option<f64>,
    unemployment_rate: Option<f64>,
    injury_rate: Option<f64>,
    maternity_rate: Option<f64>,
    housing_fund_rate: Option<f64>,
    supplementary_fund_rate: Option<f64>,

    company_pension_rate: Option<f64>,
    company_medical_rate: Option<f64>,
    company_unemployment_rate: Option<f64>,
    company_injury_rate: Option<f64>,
    company_maternity_rate: Option<f64>,
    company_housing_fund_rate: Option<f64>,
    company_supplementary_fund_rate: Option<f64>,

    signing_bonus: Option<SeriesParam>,
    housing_fund_min: Option<f64>,
    housing_fund_max: Option<f64>,

    stock_option_value: Option<f64>,
    stock_option_separate_tax: Option<bool>,
    stock_option_vesting: Option<SeriesParam>,
    stock_option_buyback_month: Option<u32>,
    option_flat_tax_rate: Option<f64>,

    stock_value: Option<f64>,
}

#[derive(Parser, Debug)]
#[command(
    name = "netpay",
    about = "Cumulative-withholding net salary calculator (monthly tax, year-end awards, stock and option grants)"
)]
struct Cli {
    #[arg(long, default_value_t = 30_000.0)]
    salary: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Monthly special additional deduction, e.g. rent"
    )]
    special_additional_deduction: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Year-end award amount; 0 means derive it from --year-end-awards-number"
    )]
    year_end_awards: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Year-end award expressed as a count of monthly salaries"
    )]
    year_end_awards_number: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Insurance and fund contribution base; defaults to salary when 0"
    )]
    insurance_and_fund_base: f64,
    #[arg(long, default_value_t = 5_000.0, help = "Monthly tax exemption threshold")]
    starting_salary: f64,

    #[arg(long, default_value_t = 8.0, help = "Employee pension rate in percent")]
    pension_rate: f64,
    #[arg(long, default_value_t = 2.0, help = "Employee medical rate in percent")]
    medical_rate: f64,
    #[arg(long, default_value_t = 0.5, help = "Employee unemployment rate in percent")]
    unemployment_rate: f64,
    #[arg(long, default_value_t = 0.0, help = "Employee injury rate in percent")]
    injury_rate: f64,
    #[arg(long, default_value_t = 0.0, help = "Employee maternity rate in percent")]
    maternity_rate: f64,
    #[arg(long, default_value_t = 7.0, help = "Employee housing fund rate in percent")]
    housing_fund_rate: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Employee supplementary fund rate in percent"
    )]
    supplementary_fund_rate: f64,

    #[arg(long, default_value_t = 16.0, help = "Company pension rate in percent")]
    company_pension_rate: f64,
    #[arg(long, default_value_t = 10.0, help = "Company medical rate in percent")]
    company_medical_rate: f64,
    #[arg(long, default_value_t = 0.5, help = "Company unemployment rate in percent")]
    company_unemployment_rate: f64,
    #[arg(long, default_value_t = 0.26, help = "Company injury rate in percent")]
    company_injury_rate: f64,
    #[arg(long, default_value_t = 1.0, help = "Company maternity rate in percent")]
    company_maternity_rate: f64,
    #[arg(
        long,
        default_value_t = -1.0,
        allow_negative_numbers = true,
        help = "Company housing fund rate in percent; -1 inherits the employee rate"
    )]
    company_housing_fund_rate: f64,
    #[arg(
        long,
        default_value_t = -1.0,
        allow_negative_numbers = true,
        help = "Company supplementary fund rate in percent; -1 inherits the employee rate"
    )]
    company_supplementary_fund_rate: f64,

    #[arg(long, help = "Same extra bonus paid in every month")]
    signing_bonus: Option<f64>,
    #[arg(
        long,
        value_delimiter = ',',
        help = "Per-month bonus schedule, comma separated, zero-padded to 12 entries"
    )]
    signing_bonus_schedule: Option<Vec<f64>>,

    #[arg(long, default_value_t = 2_590.0, help = "Housing fund base lower bound")]
    housing_fund_min: f64,
    #[arg(long, default_value_t = 34_188.0, help = "Housing fund base upper bound")]
    housing_fund_max: f64,

    #[arg(long, default_value_t = 0.0, help = "Annual stock option grant value")]
    stock_option_value: f64,
    #[arg(long, help = "Tax the vested option value separately at the flat rate")]
    stock_option_separate_tax: bool,
    #[arg(
        long,
        help = "Total vesting percentage for the year, spread evenly across months"
    )]
    stock_option_vesting: Option<f64>,
    #[arg(
        long,
        value_delimiter = ',',
        help = "Per-month vesting percentages, comma separated, zero-padded to 12 entries"
    )]
    stock_option_vesting_schedule: Option<Vec<f64>>,
    #[arg(long, default_value_t = 12, help = "Option buyback month, 1-12")]
    stock_option_buyback_month: u32,
    #[arg(
        long,
        default_value_t = 20.0,
        help = "Flat separate-taxation rate for options, in percent"
    )]
    option_flat_tax_rate: f64,

    #[arg(long, default_value_t = 0.0, help = "Annual stock grant value")]
    stock_value: f64,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_inputs(cli: Cli) -> Result<Inputs, String> {
    if !cli.salary.is_finite() || cli.salary < 0.0 {
        return Err("--salary must be >= 0".to_string());
    }

    if cli.special_additional_deduction < 0.0 {
        return Err("--special-additional-deduction must be >= 0".to_string());
    }

    if cli.starting_salary < 0.0 {
        return Err("--starting-salary must be >= 0".to_string());
    }

    if cli.year_end_awards_number < 0.0 {
        return Err("--year-end-awards-number must be >= 0".to_string());
    }

    if cli.insurance_and_fund_base < 0.0 {
        return Err("--insurance-and-fund-base must be >= 0".to_string());
    }

    for (name, rate) in [
        ("--pension-rate", cli.pension_rate),
        ("--medical-rate", cli.medical_rate),
        ("--unemployment-rate", cli.unemployment_rate),
        ("--injury-rate", cli.injury_rate),
        ("--maternity-rate", cli.maternity_rate),
        ("--housing-fund-rate", cli.housing_fund_rate),
        ("--supplementary-fund-rate", cli.supplementary_fund_rate),
        ("--company-pension-rate", cli.company_pension_rate),
        ("--company-medical-rate", cli.company_medical_rate),
        ("--company-unemployment-rate", cli.company_unemployment_rate),
        ("--company-injury-rate", cli.company_injury_rate),
        ("--company-maternity-rate", cli.company_maternity_rate),
    ] {
        if !(0.0..=100.0).contains(&rate) {
            return Err(format!("{name} must be between 0 and 100"));
        }
    }

    for (name, rate) in [
        ("--company-housing-fund-rate", cli.company_housing_fund_rate),
        (
            "--company-supplementary-fund-rate",
            cli.company_supplementary_fund_rate,
        ),
    ] {
        if rate >= 0.0 && !(0.0..=100.0).contains(&rate) {
            return Err(format!("{name} must be between 0 and 100, or -1 to inherit"));
        }
    }

    if !(0.0..=100.0).contains(&cli.option_flat_tax_rate) {
        return Err("--option-flat-tax-rate must be between 0 and 100".to_string());
    }

    if cli.housing_fund_min < 0.0 || cli.housing_fund_max < cli.housing_fund_min {
        return Err(
            "--housing-fund-min must be >= 0 and <= --housing-fund-max".to_string(),
        );
    }

    if !(1..=12).contains(&cli.stock_option_buyback_month) {
        return Err("--stock-option-buyback-month must be between 1 and 12".to_string());
    }

    let signing_bonus = match (cli.signing_bonus_schedule, cli.signing_bonus) {
        (Some(schedule), _) => MonthlySeries::Monthly(schedule),
        (None, Some(value)) => MonthlySeries::Scalar(value),
        (None, None) => MonthlySeries::Scalar(0.0),
    };

    let vesting = match (cli.stock_option_vesting_schedule, cli.stock_option_vesting) {
        (Some(schedule), _) => MonthlySeries::Monthly(schedule),
        (None, Some(value)) => MonthlySeries::Scalar(value),
        (None, None) => MonthlySeries::Scalar(0.0),
    };

    let company_fund_rate = |rate: f64| if rate < 0.0 { -1.0 } else { rate / 100.0 };

    Ok(Inputs {
        salary: cli.salary,
        special_additional_deduction: cli.special_additional_deduction,
        year_end_awards: cli.year_end_awards,
        year_end_awards_number: cli.year_end_awards_number,
        insurance_and_fund_base: cli.insurance_and_fund_base,
        starting_salary: cli.starting_salary,
        insurance_and_fund_rate: InsuranceFundRates {
            pension: cli.pension_rate / 100.0,
            medical: cli.medical_rate / 100.0,
            unemployment: cli.unemployment_rate / 100.0,
            injury: cli.injury_rate / 100.0,
            maternity: cli.maternity_rate / 100.0,
            housing_fund: cli.housing_fund_rate / 100.0,
            supplementary_fund: cli.supplementary_fund_rate / 100.0,
        },
        insurance_and_fund_rate_of_company: InsuranceFundRates {
            pension: cli.company_pension_rate / 100.0,
            medical: cli.company_medical_rate / 100.0,
            unemployment: cli.company_unemployment_rate / 100.0,
            injury: cli.company_injury_rate / 100.0,
            maternity: cli.company_maternity_rate / 100.0,
            housing_fund: company_fund_rate(cli.company_housing_fund_rate),
            supplementary_fund: company_fund_rate(cli.company_supplementary_fund_rate),
        },
        signing_bonus,
        housing_fund_range: HousingFundRange {
            min: cli.housing_fund_min,
            max: cli.housing_fund_max,
        },
        stock_option: StockOptionGrant {
            value: cli.stock_option_value,
            separate_tax: cli.stock_option_separate_tax,
            vesting,
            buyback_month: cli.stock_option_buyback_month,
        },
        stock: StockGrant {
            value: cli.stock_value,
        },
        tax_brackets: comprehensive_income_brackets(),
        option_flat_tax_rate: cli.option_flat_tax_rate / 100.0,
    })
}

pub fn run_calc(args: &[String]) -> Result<(), String> {
    let cli = Cli::parse_from(args);
    let inputs = build_inputs(cli)?;
    let result = calculate_salary(&inputs);
    let rendered = serde_json::to_string_pretty(&result)
        .map_err(|e| format!("Failed to encode result: {e}"))?;
    println!("{rendered}");
    Ok(())
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route(
            "/api/calculate",
            get(calculate_get_handler).post(calculate_post_handler),
        )
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    info!("netpay HTTP API listening on http://{addr}");
    info!("Local access: http://127.0.0.1:{port}/api/calculate");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn calculate_get_handler(Query(payload): Query<CalculatePayload>) -> Response {
    calculate_handler_impl(payload).await
}

async fn calculate_post_handler(Json(payload): Json<CalculatePayload>) -> Response {
    calculate_handler_impl(payload).await
}

async fn calculate_handler_impl(payload: CalculatePayload) -> Response {
    let inputs = match inputs_from_payload(payload) {
        Ok(inputs) => inputs,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    debug!(
        "calculating for salary {} with {} bracket levels",
        inputs.salary,
        inputs.tax_brackets.len()
    );
    let result = calculate_salary(&inputs);
    json_response(StatusCode::OK, result)
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn inputs_from_json(json: &str) -> Result<Inputs, String> {
    let payload = serde_json::from_str::<CalculatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    inputs_from_payload(payload)
}

fn inputs_from_payload(payload: CalculatePayload) -> Result<Inputs, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.salary {
        cli.salary = v;
    }
    if let Some(v) = payload.special_additional_deduction {
        cli.special_additional_deduction = v;
    }
    if let Some(v) = payload.year_end_awards {
        cli.year_end_awards = v;
    }
    if let Some(v) = payload.year_end_awards_number {
        cli.year_end_awards_number = v;
    }
    if let Some(v) = payload.insurance_and_fund_base {
        cli.insurance_and_fund_base = v;
    }
    if let Some(v) = payload.starting_salary {
        cli.starting_salary = v;
    }

    if let Some(v) = payload.pension_rate {
        cli.pension_rate = v;
    }
    if let Some(v) = payload.medical_rate {
        cli.medical_rate = v;
    }
    if let Some(v) = payload.unemployment_rate {
        cli.unemployment_rate = v;
    }
    if let Some(v) = payload.injury_rate {
        cli.injury_rate = v;
    }
    if let Some(v) = payload.maternity_rate {
        cli.maternity_rate = v;
    }
    if let Some(v) = payload.housing_fund_rate {
        cli.housing_fund_rate = v;
    }
    if let Some(v) = payload.supplementary_fund_rate {
        cli.supplementary_fund_rate = v;
    }

    if let Some(v) = payload.company_pension_rate {
        cli.company_pension_rate = v;
    }
    if let Some(v) = payload.company_medical_rate {
        cli.company_medical_rate = v;
    }
    if let Some(v) = payload.company_unemployment_rate {
        cli.company_unemployment_rate = v;
    }
    if let Some(v) = payload.company_injury_rate {
        cli.company_injury_rate = v;
    }
    if let Some(v) = payload.company_maternity_rate {
        cli.company_maternity_rate = v;
    }
    if let Some(v) = payload.company_housing_fund_rate {
        cli.company_housing_fund_rate = v;
    }
    if let Some(v) = payload.company_supplementary_fund_rate {
        cli.company_supplementary_fund_rate = v;
    }

    match payload.signing_bonus {
        Some(SeriesParam::Scalar(v)) => cli.signing_bonus = Some(v),
        Some(SeriesParam::Monthly(v)) => cli.signing_bonus_schedule = Some(v),
        None => {}
    }

    if let Some(v) = payload.housing_fund_min {
        cli.housing_fund_min = v;
    }
    if let Some(v) = payload.housing_fund_max {
        cli.housing_fund_max = v;
    }

    if let Some(v) = payload.stock_option_value {
        cli.stock_option_value = v;
    }
    if let Some(v) = payload.stock_option_separate_tax {
        cli.stock_option_separate_tax = v;
    }
    match payload.stock_option_vesting {
        Some(SeriesParam::Scalar(v)) => cli.stock_option_vesting = Some(v),
        Some(SeriesParam::Monthly(v)) => cli.stock_option_vesting_schedule = Some(v),
        None => {}
    }
    if let Some(v) = payload.stock_option_buyback_month {
        cli.stock_option_buyback_month = v;
    }
    if let Some(v) = payload.option_flat_tax_rate {
        cli.option_flat_tax_rate = v;
    }

    if let Some(v) = payload.stock_value {
        cli.stock_value = v;
    }

    build_inputs(cli)
}

fn default_cli_for_api() -> Cli {
    Cli {
        salary: 30_000.0,
        special_additional_deduction: 0.0,
        year_end_awards: 0.0,
        year_end_awards_number: 0.0,
        insurance_and_fund_base: 0.0,
        starting_salary: 5_000.0,
        pension_rate: 8.0,
        medical_rate: 2.0,
        unemployment_rate: 0.5,
        injury_rate: 0.0,
        maternity_rate: 0.0,
        housing_fund_rate: 7.0,
        supplementary_fund_rate: 0.0,
        company_pension_rate: 16.0,
        company_medical_rate: 10.0,
        company_unemployment_rate: 0.5,
        company_injury_rate: 0.26,
        company_maternity_rate: 1.0,
        company_housing_fund_rate: -1.0,
        company_supplementary_fund_rate: -1.0,
        signing_bonus: None,
        signing_bonus_schedule: None,
        housing_fund_min: 2_590.0,
        housing_fund_max: 34_188.0,
        stock_option_value: 0.0,
        stock_option_separate_tax: false,
        stock_option_vesting: None,
        stock_option_vesting_schedule: None,
        stock_option_buyback_month: 12,
        option_flat_tax_rate: 20.0,
        stock_value: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_cli() -> Cli {
        default_cli_for_api()
    }

    #[test]
    fn build_inputs_converts_percent_rates_to_fractions() {
        let inputs = build_inputs(sample_cli()).expect("valid inputs");
        assert_approx(inputs.insurance_and_fund_rate.pension, 0.08);
        assert_approx(inputs.insurance_and_fund_rate.housing_fund, 0.07);
        assert_approx(inputs.insurance_and_fund_rate_of_company.pension, 0.16);
        assert_approx(inputs.option_flat_tax_rate, 0.20);
    }

    #[test]
    fn build_inputs_keeps_the_inherit_sentinel_on_company_fund_lines() {
        let inputs = build_inputs(sample_cli()).expect("valid inputs");
        assert_approx(inputs.insurance_and_fund_rate_of_company.housing_fund, -1.0);
        assert_approx(
            inputs.insurance_and_fund_rate_of_company.supplementary_fund,
            -1.0,
        );
    }

    #[test]
    fn build_inputs_rejects_negative_salary() {
        let mut cli = sample_cli();
        cli.salary = -1.0;

        let err = build_inputs(cli).expect_err("must reject negative salary");
        assert!(err.contains("--salary"));
    }

    #[test]
    fn build_inputs_rejects_out_of_range_rates() {
        let mut cli = sample_cli();
        cli.medical_rate = 140.0;

        let err = build_inputs(cli).expect_err("must reject rate above 100");
        assert!(err.contains("--medical-rate"));
    }

    #[test]
    fn build_inputs_rejects_inverted_housing_fund_range() {
        let mut cli = sample_cli();
        cli.housing_fund_min = 40_000.0;
        cli.housing_fund_max = 34_188.0;

        let err = build_inputs(cli).expect_err("must reject inverted range");
        assert!(err.contains("--housing-fund-min"));
    }

    #[test]
    fn build_inputs_rejects_buyback_month_outside_the_year() {
        let mut cli = sample_cli();
        cli.stock_option_buyback_month = 13;

        let err = build_inputs(cli).expect_err("must reject month 13");
        assert!(err.contains("--stock-option-buyback-month"));
    }

    #[test]
    fn schedule_flags_win_over_scalar_flags() {
        let mut cli = sample_cli();
        cli.signing_bonus = Some(1_000.0);
        cli.signing_bonus_schedule = Some(vec![0.0, 2_000.0]);

        let inputs = build_inputs(cli).expect("valid inputs");
        assert_eq!(
            inputs.signing_bonus,
            MonthlySeries::Monthly(vec![0.0, 2_000.0])
        );
    }

    #[test]
    fn payload_defaults_produce_the_bundled_preset() {
        let inputs = inputs_from_json("{}").expect("valid payload");
        assert_approx(inputs.salary, 30_000.0);
        assert_approx(inputs.starting_salary, 5_000.0);
        assert_approx(inputs.housing_fund_range.min, 2_590.0);
        assert_approx(inputs.housing_fund_range.max, 34_188.0);
        assert_eq!(inputs.tax_brackets.len(), 7);
        assert_eq!(inputs.signing_bonus, MonthlySeries::Scalar(0.0));
    }

    #[test]
    fn payload_accepts_a_scalar_bonus() {
        let inputs =
            inputs_from_json(r#"{"signingBonus": 1500}"#).expect("valid payload");
        assert_eq!(inputs.signing_bonus, MonthlySeries::Scalar(1_500.0));
    }

    #[test]
    fn payload_accepts_a_bonus_schedule() {
        let inputs = inputs_from_json(r#"{"signingBonus": [0, 0, 8000]}"#)
            .expect("valid payload");
        assert_eq!(
            inputs.signing_bonus,
            MonthlySeries::Monthly(vec![0.0, 0.0, 8_000.0])
        );
    }

    #[test]
    fn payload_accepts_a_vesting_schedule() {
        let inputs = inputs_from_json(
            r#"{"stockOptionValue": 120000, "stockOptionVesting": [25, 25, 25, 25], "stockOptionBuybackMonth": 4}"#,
        )
        .expect("valid payload");
        assert_eq!(
            inputs.stock_option.vesting,
            MonthlySeries::Monthly(vec![25.0, 25.0, 25.0, 25.0])
        );
        assert_eq!(inputs.stock_option.buyback_month, 4);
    }

    #[test]
    fn payload_validation_errors_surface_through_the_adapter() {
        let err = inputs_from_json(r#"{"salary": -100}"#)
            .expect_err("must reject negative salary");
        assert!(err.contains("--salary"));
    }

    #[test]
    fn default_payload_round_trips_through_the_engine() {
        let inputs = inputs_from_json("{}").expect("valid payload");
        let result = calculate_salary(&inputs);

        // Preset: 17.5% employee contributions on a base of 30000.
        assert_approx(result.insurance_and_fund.total_fund, 5_250.0);
        // Month 1: 30000 - 5000 - 5250 = 19750 taxable, 3% level.
        assert_approx(result.salary_tax[0], 592.5);
        assert_approx(result.salary_after_tax[0], 24_157.5);
    }
}
