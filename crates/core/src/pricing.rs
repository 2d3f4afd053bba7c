use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Flat 10% tax applied on top of the trip subtotal.
pub const TAX_RATE: Decimal = Decimal::from_parts(10, 0, 0, false, 2);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: Decimal,
    pub taxes: Decimal,
    pub final_total: Decimal,
}

impl Totals {
    pub fn display(&self) -> DisplayTotals {
        DisplayTotals {
            subtotal: display_amount(self.subtotal),
            taxes: display_amount(self.taxes),
            final_total: display_amount(self.final_total),
        }
    }
}

/// Two-decimal strings for presentation only. Never parse these back into
/// [`Totals`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DisplayTotals {
    pub subtotal: String,
    pub taxes: String,
    pub final_total: String,
}

pub fn compute_totals<I>(prices: I) -> Totals
where
    I: IntoIterator<Item = Decimal>,
{
    let subtotal = prices.into_iter().fold(Decimal::ZERO, saturating_add);
    let taxes = subtotal.checked_mul(TAX_RATE).unwrap_or(Decimal::MAX);
    Totals { subtotal, taxes, final_total: saturating_add(subtotal, taxes) }
}

fn saturating_add(left: Decimal, right: Decimal) -> Decimal {
    left.checked_add(right).unwrap_or(Decimal::MAX)
}

pub fn display_amount(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{rounded:.2}")
}
