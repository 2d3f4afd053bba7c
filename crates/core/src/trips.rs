//! Trip Collection Store.
//!
//! Ordered list of trip rows being edited for a quotation. This is the source
//! of truth for the form; rendering and totals are projections of it.

use rust_decimal::Decimal;

use crate::domain::record::TripLine;
use crate::domain::trip::{bounded_price, description_template, parse_price, TripEntry, TripId};
use crate::errors::DomainError;
use crate::pricing::{compute_totals, Totals};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TripCollection {
    last_id: u64,
    entries: Vec<TripEntry>,
}

impl TripCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a blank row and returns its id. No upper bound is enforced.
    pub fn add_trip(&mut self) -> TripId {
        self.last_id += 1;
        let id = TripId(self.last_id);
        self.entries.push(TripEntry::blank(id));
        id
    }

    /// Removes the row if present. Returns whether anything was removed;
    /// unknown ids are a no-op.
    pub fn remove_trip(&mut self, id: TripId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        before != self.entries.len()
    }

    /// Sets the row name. A blank description is filled from the name the
    /// first time the name is edited; a description the user typed is kept.
    pub fn set_name(&mut self, id: TripId, name: impl Into<String>) -> Result<(), DomainError> {
        let entry = self.entry_mut(id)?;
        entry.name = name.into();
        if entry.description.is_empty() && !entry.name.trim().is_empty() {
            entry.description = description_template(entry.name.trim());
        }
        Ok(())
    }

    pub fn set_price(&mut self, id: TripId, price: Decimal) -> Result<(), DomainError> {
        self.entry_mut(id)?.price = bounded_price(price);
        Ok(())
    }

    /// Raw form input; unparseable text counts as zero.
    pub fn set_price_input(&mut self, id: TripId, raw: &str) -> Result<(), DomainError> {
        self.set_price(id, parse_price(raw))
    }

    pub fn set_description(
        &mut self,
        id: TripId,
        description: impl Into<String>,
    ) -> Result<(), DomainError> {
        self.entry_mut(id)?.description = description.into();
        Ok(())
    }

    pub fn get(&self, id: TripId) -> Option<&TripEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn entries(&self) -> &[TripEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True once any row has been added since the last reset, even if it was
    /// removed again.
    pub fn has_added_any(&self) -> bool {
        self.last_id > 0
    }

    /// Live totals over every present row, valid or not.
    pub fn totals(&self) -> Totals {
        compute_totals(self.entries.iter().map(|entry| entry.price))
    }

    /// Rows that make it into a submitted quotation, with blank descriptions
    /// replaced by the template.
    pub fn submittable_lines(&self) -> Vec<TripLine> {
        self.entries
            .iter()
            .filter(|entry| entry.is_submittable())
            .map(|entry| TripLine {
                name: entry.name.trim().to_owned(),
                price: entry.price,
                description: entry.effective_description(),
            })
            .collect()
    }

    fn entry_mut(&mut self, id: TripId) -> Result<&mut TripEntry, DomainError> {
        self.entries
            .iter_mut()
            .find(|entry| entry.id == id)
            .ok_or(DomainError::UnknownTrip(id))
    }
}
