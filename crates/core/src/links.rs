//! Shareable links for persisted collateral.
//!
//! Relative form: `<page>.html?company=<encoded company>&<id param>=<id>`.
//! Values are encoded like a browser's `encodeURIComponent`.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use thiserror::Error;
use url::form_urlencoded;

use crate::domain::record::{RecordId, ResourceKind};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedLink {
    pub kind: ResourceKind,
    pub target_company: String,
    pub id: RecordId,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("unknown landing page `{0}`")]
    UnknownPage(String),
    #[error("link has no query string")]
    MissingQuery,
    #[error("link is missing the `{0}` parameter")]
    MissingParam(&'static str),
}

const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub fn relative_link(kind: ResourceKind, target_company: &str, id: &RecordId) -> String {
    format!(
        "{}?company={}&{}={}",
        kind.page(),
        utf8_percent_encode(target_company, URI_COMPONENT),
        kind.id_param(),
        utf8_percent_encode(id.as_str(), URI_COMPONENT),
    )
}

pub fn absolute_link(origin: &str, relative: &str) -> String {
    format!("{}/{}", origin.trim_end_matches('/'), relative.trim_start_matches('/'))
}

pub fn parse_link(link: &str) -> Result<ParsedLink, LinkError> {
    let (path, query) = link.split_once('?').ok_or(LinkError::MissingQuery)?;
    let page = path.rsplit('/').next().unwrap_or(path);
    let kind = [ResourceKind::CompanyProfile, ResourceKind::Quotation]
        .into_iter()
        .find(|kind| kind.page() == page)
        .ok_or_else(|| LinkError::UnknownPage(page.to_owned()))?;

    let mut target_company = None;
    let mut id = None;
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        if key == "company" {
            target_company = Some(value.into_owned());
        } else if key == kind.id_param() {
            id = Some(RecordId(value.into_owned()));
        }
    }

    Ok(ParsedLink {
        kind,
        target_company: target_company.ok_or(LinkError::MissingParam("company"))?,
        id: id.ok_or(LinkError::MissingParam(kind.id_param()))?,
    })
}
