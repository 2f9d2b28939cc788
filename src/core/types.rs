use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaxBracket {
    pub upper_bound: Option<f64>,
    pub rate: f64,
    pub quick_deduction: f64,
}

pub fn comprehensive_income_brackets() -> Vec<TaxBracket> {
    vec![
        TaxBracket {
            upper_bound: Some(36_000.0),
            rate: 0.03,
            quick_deduction: 0.0,
        },
        TaxBracket {
            upper_bound: Some(144_000.0),
            rate: 0.10,
            quick_deduction: 2_520.0,
        },
        TaxBracket {
            upper_bound: Some(300_000.0),
            rate: 0.20,
            quick_deduction: 16_920.0,
        },
        TaxBracket {
            upper_bound: Some(420_000.0),
            rate: 0.25,
            quick_deduction: 31_920.0,
        },
        TaxBracket {
            upper_bound: Some(660_000.0),
            rate: 0.30,
            quick_deduction: 52_920.0,
        },
        TaxBracket {
            upper_bound: Some(960_000.0),
            rate: 0.35,
            quick_deduction: 85_920.0,
        },
        TaxBracket {
            upper_bound: None,
            rate: 0.45,
            quick_deduction: 181_920.0,
        },
    ]
}

#[derive(Debug, Clone, PartialEq)]
pub enum MonthlySeries {
    Scalar(f64),
    Monthly(Vec<f64>),
}

impl Default for MonthlySeries {
    fn default() -> Self {
        MonthlySeries::Scalar(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsuranceFundRates {
    pub pension: f64,
    pub medical: f64,
    pub unemployment: f64,
    pub injury: f64,
    pub maternity: f64,
    pub housing_fund: f64,
    pub supplementary_fund: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HousingFundRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StockOptionGrant {
    pub value: f64,
    pub separate_tax: bool,
    pub vesting: MonthlySeries,
    pub buyback_month: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StockGrant {
    pub value: f64,
}

#[derive(Debug, Clone)]
pub struct Inputs {
    pub salary: f64,
    pub special_additional_deduction: f64,
    pub year_end_awards: f64,
    pub year_end_awards_number: f64,
    pub insurance_and_fund_base: f64,
    pub starting_salary: f64,
    pub insurance_and_fund_rate: InsuranceFundRates,
    pub insurance_and_fund_rate_of_company: InsuranceFundRates,
    pub signing_bonus: MonthlySeries,
    pub housing_fund_range: HousingFundRange,
    pub stock_option: StockOptionGrant,
    pub stock: StockGrant,
    pub tax_brackets: Vec<TaxBracket>,
    pub option_flat_tax_rate: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsuranceFundBreakdown {
    pub pension: f64,
    pub medical: f64,
    pub unemployment: f64,
    pub injury: f64,
    pub maternity: f64,
    pub housing_fund: f64,
    pub supplementary_fund: f64,
    pub total_fund: f64,
    pub total_housing_fund: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationResult {
    pub salary_base: f64,
    pub salary_pre_tax: Vec<f64>,
    pub salary_after_tax: Vec<f64>,
    pub salary_after_tax_avg: f64,
    pub salary_tax: Vec<f64>,
    pub salary_total_tax: f64,
    pub total_salary_after_tax_exclude_awards: f64,
    pub total_salary_pre_tax: f64,
    pub total_salary_after_tax: f64,
    pub insurance_and_fund: InsuranceFundBreakdown,
    pub insurance_and_fund_of_company: InsuranceFundBreakdown,
    pub awards_pre_tax: f64,
    pub awards_tax: f64,
    pub awards_after_tax: f64,
    pub stock_option_pre_tax: f64,
    pub stock_option_tax: f64,
    pub stock_option_after_tax: f64,
    pub stock_pre_tax: f64,
    pub stock_tax: f64,
    pub stock_after_tax: f64,
}
