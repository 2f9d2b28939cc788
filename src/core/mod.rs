mod engine;
mod types;

pub use engine::{calculate_salary, fill_repeat, fill_spread, resolve_bracket};
pub use types::{
    CalculationResult, HousingFundRange, Inputs, InsuranceFundBreakdown, InsuranceFundRates,
    MonthlySeries, StockGrant, StockOptionGrant, TaxBracket, comprehensive_income_brackets,
};
