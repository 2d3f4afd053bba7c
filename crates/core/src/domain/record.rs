use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ValidationError;

/// The two kinds of collateral the backend stores. Each maps onto one
/// `/tables/<collection>` resource and one landing page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    CompanyProfile,
    Quotation,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CompanyProfile => "company-profile",
            Self::Quotation => "quotation",
        }
    }

    pub fn collection(&self) -> &'static str {
        match self {
            Self::CompanyProfile => "company_profiles",
            Self::Quotation => "quotations",
        }
    }

    pub fn page(&self) -> &'static str {
        match self {
            Self::CompanyProfile => "company-profile.html",
            Self::Quotation => "quotation.html",
        }
    }

    pub fn id_param(&self) -> &'static str {
        match self {
            Self::CompanyProfile => "id",
            Self::Quotation => "quote",
        }
    }

    /// Field the second persistence phase patches onto the record.
    pub fn url_field(&self) -> &'static str {
        match self {
            Self::CompanyProfile => "profile_url",
            Self::Quotation => "quotation_url",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "company-profile" | "profile" => Ok(Self::CompanyProfile),
            "quotation" | "quote" => Ok(Self::Quotation),
            _ => Err(ValidationError::MissingOutputType),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    #[default]
    Active,
}

/// Server-assigned record identifier. The backend may hand out numbers or
/// strings; both are kept in their textual form.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(raw) if !raw.trim().is_empty() => Some(Self(raw.trim().to_owned())),
            Value::Number(number) => Some(Self(number.to_string())),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripLine {
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotationDraft {
    pub target_company: String,
    pub trips: Vec<TripLine>,
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub final_total: Decimal,
    pub created_at: DateTime<Utc>,
    pub status: RecordStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyProfileDraft {
    pub target_company: String,
    pub created_at: DateTime<Utc>,
    pub status: RecordStatus,
}

/// A record that exists only in memory until the create call succeeds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Draft {
    CompanyProfile(CompanyProfileDraft),
    Quotation(QuotationDraft),
}

impl Draft {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::CompanyProfile(_) => ResourceKind::CompanyProfile,
            Self::Quotation(_) => ResourceKind::Quotation,
        }
    }

    pub fn target_company(&self) -> &str {
        match self {
            Self::CompanyProfile(draft) => &draft.target_company,
            Self::Quotation(draft) => &draft.target_company,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SagaStatus {
    /// Record exists server-side; its url has not been attached yet.
    Created,
    Linked,
    /// Create succeeded, every patch attempt failed.
    Partial,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedRecord {
    pub kind: ResourceKind,
    pub id: RecordId,
    pub target_company: String,
    /// Set only once the patch phase has succeeded.
    pub url: Option<String>,
    pub status: SagaStatus,
}

/// A created record whose url never made it onto the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialRecord {
    pub kind: ResourceKind,
    pub id: RecordId,
    pub target_company: String,
    pub pending_url: String,
    pub reason: String,
}

impl PartialRecord {
    pub fn as_persisted(&self) -> PersistedRecord {
        PersistedRecord {
            kind: self.kind,
            id: self.id.clone(),
            target_company: self.target_company.clone(),
            url: None,
            status: SagaStatus::Partial,
        }
    }
}
