use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Session-local identifier of a trip row. Assigned from a counter that only
/// grows, so a removed id is never handed out again within the same form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TripId(pub u64);

impl fmt::Display for TripId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trip-{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripEntry {
    pub id: TripId,
    pub name: String,
    pub price: Decimal,
    pub description: String,
}

impl TripEntry {
    pub fn blank(id: TripId) -> Self {
        Self { id, name: String::new(), price: Decimal::ZERO, description: String::new() }
    }

    /// Rows with a blank name or a non-positive price stay in the live total
    /// but are left out of a submitted quotation.
    pub fn is_submittable(&self) -> bool {
        !self.name.trim().is_empty() && self.price > Decimal::ZERO
    }

    pub fn effective_description(&self) -> String {
        if self.description.trim().is_empty() {
            description_template(self.name.trim())
        } else {
            self.description.clone()
        }
    }
}

/// Largest price a single trip row accepts. Anything above counts as zero.
pub const MAX_PRICE: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

pub fn description_template(name: &str) -> String {
    format!("Professional travel package for {name}")
}

/// Lenient price parsing for raw form input: anything that is not a
/// decimal in `0..=MAX_PRICE` counts as zero.
pub fn parse_price(raw: &str) -> Decimal {
    Decimal::from_str(raw.trim()).map(bounded_price).unwrap_or(Decimal::ZERO)
}

pub fn bounded_price(value: Decimal) -> Decimal {
    if value < Decimal::ZERO || value > MAX_PRICE {
        Decimal::ZERO
    } else {
        value
    }
}
