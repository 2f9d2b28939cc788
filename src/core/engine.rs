use super::types::{
    CalculationResult, HousingFundRange, Inputs, InsuranceFundBreakdown, InsuranceFundRates,
    MonthlySeries, StockGrant, StockOptionGrant, TaxBracket,
};

const MONTHS: usize = 12;

#[derive(Debug, Clone, Copy)]
struct AwardOutcome {
    pre_tax: f64,
    tax: f64,
    after_tax: f64,
}

#[derive(Debug, Clone, Copy)]
struct StockOutcome {
    pre_tax: f64,
    tax: f64,
    after_tax: f64,
}

#[derive(Debug, Clone, Copy)]
struct StockOptionOutcome {
    pre_tax: f64,
    tax: f64,
    after_tax: f64,
    income_to_merge: f64,
}

#[derive(Debug)]
struct WithholdingOutcome {
    after_tax: Vec<f64>,
    tax: Vec<f64>,
    total_after_tax_exclude_awards: f64,
    total_tax: f64,
    total_after_tax: f64,
}

#[derive(Debug, Clone, Copy)]
struct AccumulatorState {
    income: f64,
    tax_paid: f64,
}

pub fn calculate_salary(inputs: &Inputs) -> CalculationResult {
    let mut signing_bonus = fill_repeat(&inputs.signing_bonus);

    let option_outcome = stock_option_tax(&inputs.stock_option, inputs.option_flat_tax_rate);
    if !inputs.stock_option.separate_tax && option_outcome.income_to_merge > 0.0 {
        let buyback_index =
            (inputs.stock_option.buyback_month.saturating_sub(1) as usize).min(MONTHS - 1);
        signing_bonus[buyback_index] += option_outcome.income_to_merge;
    }

    let insurance_base = if inputs.insurance_and_fund_base == 0.0 {
        inputs.salary
    } else {
        inputs.insurance_and_fund_base
    };
    let company_rates = resolve_company_rates(
        &inputs.insurance_and_fund_rate,
        &inputs.insurance_and_fund_rate_of_company,
    );

    let awards = year_end_awards_tax(inputs);

    let insurance_and_fund = insurance_contributions(
        insurance_base,
        &inputs.insurance_and_fund_rate,
        inputs.housing_fund_range,
    );
    let insurance_and_fund_of_company =
        insurance_contributions(insurance_base, &company_rates, inputs.housing_fund_range);

    let withholding = accumulate_withholding(
        inputs,
        &signing_bonus,
        insurance_and_fund.total_fund,
        awards.after_tax,
    );

    let stock_outcome = stock_grant_tax(inputs.stock, &inputs.tax_brackets);

    let separate_option_pre_tax = if inputs.stock_option.separate_tax {
        option_outcome.pre_tax
    } else {
        0.0
    };
    let separate_option_after_tax = if inputs.stock_option.separate_tax {
        option_outcome.after_tax
    } else {
        0.0
    };

    let salary_pre_tax: Vec<f64> = signing_bonus.iter().map(|b| b + inputs.salary).collect();
    let bonus_total: f64 = signing_bonus.iter().sum();

    CalculationResult {
        salary_base: inputs.salary,
        salary_after_tax_avg: average(&withholding.after_tax),
        salary_pre_tax,
        salary_after_tax: withholding.after_tax,
        salary_tax: withholding.tax,
        salary_total_tax: withholding.total_tax,
        total_salary_after_tax_exclude_awards: withholding.total_after_tax_exclude_awards,
        total_salary_pre_tax: awards.pre_tax
            + inputs.salary * MONTHS as f64
            + bonus_total
            + separate_option_pre_tax
            + stock_outcome.pre_tax,
        total_salary_after_tax: withholding.total_after_tax
            + separate_option_after_tax
            + stock_outcome.after_tax,
        insurance_and_fund,
        insurance_and_fund_of_company,
        awards_pre_tax: awards.pre_tax,
        awards_tax: awards.tax,
        awards_after_tax: awards.after_tax,
        stock_option_pre_tax: option_outcome.pre_tax,
        stock_option_tax: option_outcome.tax,
        stock_option_after_tax: option_outcome.after_tax,
        stock_pre_tax: stock_outcome.pre_tax,
        stock_tax: stock_outcome.tax,
        stock_after_tax: stock_outcome.after_tax,
    }
}

pub fn resolve_bracket(brackets: &[TaxBracket], taxable: f64) -> Option<&TaxBracket> {
    brackets
        .iter()
        .find(|level| match level.upper_bound {
            Some(bound) => taxable <= bound,
            None => true,
        })
        .or_else(|| brackets.last())
}

// Bonus policy: a scalar is the same bonus paid in every month.
pub fn fill_repeat(series: &MonthlySeries) -> Vec<f64> {
    match series {
        MonthlySeries::Scalar(value) => vec![*value; MONTHS],
        MonthlySeries::Monthly(values) => {
            let mut filled = values.clone();
            filled.resize(MONTHS, 0.0);
            filled
        }
    }
}

// Vesting policy: a scalar is a yearly total, spread evenly across the year.
pub fn fill_spread(series: &MonthlySeries) -> Vec<f64> {
    match series {
        MonthlySeries::Scalar(value) => vec![*value / MONTHS as f64; MONTHS],
        MonthlySeries::Monthly(values) => {
            let mut filled = values.clone();
            filled.resize(MONTHS, 0.0);
            filled
        }
    }
}

fn resolve_company_rates(
    employee: &InsuranceFundRates,
    company: &InsuranceFundRates,
) -> InsuranceFundRates {
    let mut resolved = *company;
    if resolved.housing_fund < 0.0 {
        resolved.housing_fund = employee.housing_fund;
    }
    if resolved.supplementary_fund < 0.0 {
        resolved.supplementary_fund = employee.supplementary_fund;
    }
    resolved
}

fn insurance_contributions(
    base: f64,
    rates: &InsuranceFundRates,
    range: HousingFundRange,
) -> InsuranceFundBreakdown {
    // Only the fund lines are computed on the capped base.
    let fund_base = base.max(range.min).min(range.max);

    let pension = base * rates.pension;
    let medical = base * rates.medical;
    let unemployment = base * rates.unemployment;
    let injury = base * rates.injury;
    let maternity = base * rates.maternity;
    let housing_fund = fund_base * rates.housing_fund;
    let supplementary_fund = fund_base * rates.supplementary_fund;

    InsuranceFundBreakdown {
        pension,
        medical,
        unemployment,
        injury,
        maternity,
        housing_fund,
        supplementary_fund,
        total_fund: pension
            + medical
            + unemployment
            + injury
            + maternity
            + housing_fund
            + supplementary_fund,
        total_housing_fund: housing_fund,
    }
}

fn year_end_awards_tax(inputs: &Inputs) -> AwardOutcome {
    let awards = if inputs.year_end_awards != 0.0 {
        inputs.year_end_awards
    } else {
        inputs.year_end_awards_number * inputs.salary
    };

    if awards <= 0.0 {
        return AwardOutcome {
            pre_tax: 0.0,
            tax: 0.0,
            after_tax: 0.0,
        };
    }

    // The award is taxed in one lump, but the level is looked up on the
    // monthly-equivalent amount.
    let tax = match resolve_bracket(&inputs.tax_brackets, awards / MONTHS as f64) {
        Some(bracket) => (awards * bracket.rate - bracket.quick_deduction).max(0.0),
        None => 0.0,
    };

    AwardOutcome {
        pre_tax: awards,
        tax,
        after_tax: awards - tax,
    }
}

fn stock_grant_tax(stock: StockGrant, brackets: &[TaxBracket]) -> StockOutcome {
    if stock.value <= 0.0 {
        return StockOutcome {
            pre_tax: 0.0,
            tax: 0.0,
            after_tax: 0.0,
        };
    }

    // Full-amount lookup: the grant is not averaged over the year.
    let tax = match resolve_bracket(brackets, stock.value) {
        Some(bracket) => (stock.value * bracket.rate - bracket.quick_deduction).max(0.0),
        None => 0.0,
    };

    StockOutcome {
        pre_tax: stock.value,
        tax,
        after_tax: stock.value - tax,
    }
}

fn stock_option_tax(option: &StockOptionGrant, flat_rate: f64) -> StockOptionOutcome {
    let vesting = fill_spread(&option.vesting);

    let vested_months = (option.buyback_month as usize).min(MONTHS);
    let vested_percentage: f64 = vesting[..vested_months].iter().sum::<f64>().min(100.0);

    let pre_tax = option.value * vested_percentage / 100.0;

    let mut tax = 0.0;
    let mut income_to_merge = 0.0;
    if option.separate_tax {
        tax = (pre_tax * flat_rate).max(0.0);
    } else {
        // Taxed through the cumulative engine instead, at the buyback month.
        income_to_merge = pre_tax;
    }

    StockOptionOutcome {
        pre_tax,
        tax,
        after_tax: pre_tax - tax,
        income_to_merge,
    }
}

fn monthly_withholding_tax(brackets: &[TaxBracket], taxable: f64, already_withheld: f64) -> f64 {
    if taxable <= 0.0 {
        return 0.0;
    }
    match resolve_bracket(brackets, taxable) {
        Some(bracket) => taxable * bracket.rate - bracket.quick_deduction - already_withheld,
        None => 0.0,
    }
}

fn accumulate_withholding(
    inputs: &Inputs,
    signing_bonus: &[f64],
    employee_total_fund: f64,
    awards_after_tax: f64,
) -> WithholdingOutcome {
    let mut after_tax = Vec::with_capacity(MONTHS);
    let mut tax = Vec::with_capacity(MONTHS);

    let mut state = AccumulatorState {
        income: 0.0,
        tax_paid: 0.0,
    };

    for month in 1..=MONTHS {
        let bonus = signing_bonus.get(month - 1).copied().unwrap_or(0.0);
        state.income += inputs.salary + bonus;

        let cumulative_deductions = inputs.starting_salary * month as f64;
        let cumulative_fund_deduction = employee_total_fund * month as f64;
        let cumulative_special_deduction = inputs.special_additional_deduction * month as f64;
        let taxable = state.income
            - cumulative_deductions
            - cumulative_fund_deduction
            - cumulative_special_deduction;

        // Each month withholds the increment over what has already been paid,
        // so the year-to-date total always equals the liability on the
        // year-to-date taxable income.
        let month_tax = monthly_withholding_tax(&inputs.tax_brackets, taxable, state.tax_paid);

        after_tax.push(inputs.salary + bonus - employee_total_fund - month_tax);
        tax.push(month_tax);
        state.tax_paid += month_tax;
    }

    let total_after_tax_exclude_awards: f64 = after_tax.iter().sum();
    let total_tax: f64 = tax.iter().sum();

    WithholdingOutcome {
        after_tax,
        tax,
        total_after_tax_exclude_awards,
        total_tax,
        total_after_tax: total_after_tax_exclude_awards + awards_after_tax,
    }
}

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
