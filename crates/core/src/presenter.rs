//! Result Presenter: view-state projection, result rendering and the copy
//! action with its transient confirmation.

use std::fmt::Write as _;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;

use crate::domain::record::{PersistedRecord, RecordId, ResourceKind};
use crate::flows::SubmissionState;
use crate::links::absolute_link;
use crate::pricing::{display_amount, Totals};
use crate::trips::TripCollection;

pub const COPY_LABEL: &str = "Copy URL";
pub const COPIED_LABEL: &str = "Copied!";

/// Exactly one of these is visible at any time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewState {
    Form,
    Loading,
    Result,
}

impl From<SubmissionState> for ViewState {
    fn from(state: SubmissionState) -> Self {
        match state {
            SubmissionState::Idle => Self::Form,
            SubmissionState::Loading => Self::Loading,
            SubmissionState::Result => Self::Result,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResultView {
    pub kind: ResourceKind,
    pub record_id: RecordId,
    pub relative_url: String,
    pub absolute_url: String,
}

impl ResultView {
    /// `None` until the record carries its attached url.
    pub fn from_record(origin: &str, record: &PersistedRecord) -> Option<Self> {
        let relative_url = record.url.clone()?;
        Some(Self {
            kind: record.kind,
            record_id: record.id.clone(),
            absolute_url: absolute_link(origin, &relative_url),
            relative_url,
        })
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("clipboard unavailable: {0}")]
pub struct ClipboardError(pub String);

pub trait Clipboard {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied { confirm_until: Instant },
    /// Clipboard refused; the text asks the user to copy by hand.
    ManualCopy { prompt: String },
}

pub fn manual_copy_prompt(url: &str) -> String {
    format!("Could not copy URL. Please copy manually: {url}")
}

/// Copy button with a confirmation label that lapses after `window`.
#[derive(Clone, Debug)]
pub struct CopyButton {
    window: Duration,
    confirmed_until: Option<Instant>,
}

impl Default for CopyButton {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

impl CopyButton {
    pub fn new(window: Duration) -> Self {
        Self { window, confirmed_until: None }
    }

    pub fn press<C>(&mut self, clipboard: &mut C, url: &str, now: Instant) -> CopyOutcome
    where
        C: Clipboard + ?Sized,
    {
        match clipboard.write_text(url) {
            Ok(()) => {
                let confirm_until = now + self.window;
                self.confirmed_until = Some(confirm_until);
                CopyOutcome::Copied { confirm_until }
            }
            Err(error) => {
                tracing::warn!(
                    event_name = "presenter.copy_failed",
                    error = %error,
                    "could not copy url"
                );
                self.confirmed_until = None;
                CopyOutcome::ManualCopy { prompt: manual_copy_prompt(url) }
            }
        }
    }

    pub fn label(&self, now: Instant) -> &'static str {
        match self.confirmed_until {
            Some(until) if now < until => COPIED_LABEL,
            _ => COPY_LABEL,
        }
    }

    pub fn reset(&mut self) {
        self.confirmed_until = None;
    }
}

/// Pure text projection of the form: never read back into the model.
pub fn render_form(
    output_type: Option<ResourceKind>,
    target_company: &str,
    trips: &TripCollection,
) -> String {
    let mut out = String::new();
    let output = output_type.map(|kind| kind.as_str()).unwrap_or("(not selected)");
    let _ = writeln!(out, "Output type: {output}");
    let _ = writeln!(out, "Target company: {target_company}");

    if output_type == Some(ResourceKind::Quotation) {
        for entry in trips.entries() {
            let name = if entry.name.is_empty() { "(unnamed)" } else { entry.name.as_str() };
            let _ = writeln!(
                out,
                "  [{}] {name} {} {}",
                entry.id.0,
                display_amount(entry.price),
                entry.description
            );
        }
        out.push_str(&render_totals(&trips.totals()));
    }
    out
}

pub fn render_totals(totals: &Totals) -> String {
    let display = totals.display();
    format!(
        "Subtotal: {}\nTaxes (10%): {}\nTotal: {}\n",
        display.subtotal, display.taxes, display.final_total
    )
}
