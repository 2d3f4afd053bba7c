//! HTTP adapter for the `/tables/<collection>` record backend.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::{json, Value};
use tracing::{debug, warn};
use url::Url;

use collateral_core::{Draft, PersistenceError, RecordId, RecordStore, ResourceKind};

#[derive(Clone, Debug)]
pub struct HttpRecordStore {
    client: Client,
    base_url: String,
}

impl HttpRecordStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self, kind: ResourceKind) -> String {
        format!("{}/tables/{}", self.base_url, kind.collection())
    }

    /// The id is pushed as one path segment, so `/`, `?` and `#` in it are escaped.
    fn record_url(&self, kind: ResourceKind, id: &RecordId) -> Result<Url, PersistenceError> {
        let invalid = |message: String| PersistenceError::Transport { operation: "patch", message };
        let mut url = Url::parse(&self.collection_url(kind))
            .map_err(|error| invalid(format!("invalid backend url: {error}")))?;
        url.path_segments_mut()
            .map_err(|()| invalid(format!("backend url `{}` cannot take a path", self.base_url)))?
            .push(id.as_str());
        Ok(url)
    }
}

fn transport(operation: &'static str) -> impl FnOnce(reqwest::Error) -> PersistenceError {
    move |error| PersistenceError::Transport { operation, message: error.to_string() }
}

fn require_success(
    operation: &'static str,
    response: Response,
) -> Result<Response, PersistenceError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(PersistenceError::Status { operation, status: status.as_u16() })
    }
}

#[async_trait]
impl RecordStore for HttpRecordStore {
    async fn create(&self, draft: &Draft) -> Result<RecordId, PersistenceError> {
        let url = self.collection_url(draft.kind());
        debug!(event_name = "client.create", resource = draft.kind().collection(), %url);

        let response =
            self.client.post(&url).json(draft).send().await.map_err(transport("create"))?;
        let response = require_success("create", response).map_err(|error| {
            warn!(
                event_name = "client.create_rejected",
                resource = draft.kind().collection(),
                error = %error,
                "backend rejected create"
            );
            error
        })?;

        let body: Value = response.json().await.map_err(|error| {
            PersistenceError::MalformedResponse(format!("create body is not json: {error}"))
        })?;
        body.get("id").and_then(RecordId::from_json).ok_or_else(|| {
            PersistenceError::MalformedResponse("create response carries no usable id".to_owned())
        })
    }

    async fn attach_url(
        &self,
        kind: ResourceKind,
        id: &RecordId,
        url: &str,
    ) -> Result<(), PersistenceError> {
        let endpoint = self.record_url(kind, id)?;
        debug!(
            event_name = "client.patch",
            resource = kind.collection(),
            record_id = %id,
            url = %endpoint
        );

        let mut body = serde_json::Map::new();
        body.insert(kind.url_field().to_owned(), json!(url));

        let response = self
            .client
            .patch(endpoint)
            .json(&Value::Object(body))
            .send()
            .await
            .map_err(transport("patch"))?;
        require_success("patch", response)?;
        Ok(())
    }
}
