use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::PublishError;
use crate::size::SlotSizeMap;

use super::EditableDraft;

pub const UPSERT_SLOT_INSTANCE_MUTATION: &str = "
  mutation UpsertSlotInstance($input: SlotInstanceInput!) {
    upsertSlotInstance(input: $input) {
      editableId
      slotKey
      variant
      sizes
      propsJSON
      updatedAt
    }
  }
";

/// Payload of a single publish.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertRequest {
    pub editable_id: String,
    pub slot_key: Option<String>,
    pub variant: Option<String>,
    pub sizes: Option<SlotSizeMap>,
    #[serde(rename = "propsJSON")]
    pub props_json: Option<Value>,
}

impl UpsertRequest {
    /// `None` when the draft has no editable id to publish under.
    pub fn from_draft(draft: &EditableDraft) -> Option<Self> {
        let draft = draft.sanitized();
        Some(Self {
            editable_id: draft.editable_id?,
            slot_key: draft.slot_key,
            variant: draft.variant,
            sizes: draft.sizes,
            props_json: draft.props_json,
        })
    }
}

/// Canonical fields the remote store echoes back. Anything missing keeps
/// the local value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpsertResponse {
    pub editable_id: Option<String>,
    pub slot_key: Option<String>,
    pub variant: Option<String>,
    pub sizes: Option<SlotSizeMap>,
    #[serde(rename = "propsJSON")]
    pub props_json: Option<Value>,
    pub updated_at: Option<String>,
}

/// Remote canonical store for slot instances.
#[async_trait]
pub trait SlotPublisher: Send + Sync {
    async fn upsert(&self, request: UpsertRequest) -> Result<UpsertResponse, PublishError>;
}

#[derive(Debug, Clone, Default)]
pub struct GraphqlPublisherConfig {
    pub endpoint: String,
    /// Extra request headers, e.g. authorization.
    pub headers: Vec<(String, String)>,
}

/// Publishes through the `upsertSlotInstance` GraphQL mutation.
pub struct GraphqlPublisher {
    client: reqwest::Client,
    config: GraphqlPublisherConfig,
}

impl GraphqlPublisher {
    pub fn new(config: GraphqlPublisherConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(client: reqwest::Client, config: GraphqlPublisherConfig) -> Self {
        Self { client, config }
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }
}

pub fn upsert_request_body(request: &UpsertRequest) -> Value {
    json!({
        "query": UPSERT_SLOT_INSTANCE_MUTATION,
        "variables": { "input": request },
    })
}

#[derive(Deserialize)]
struct GraphqlEnvelope {
    #[serde(default)]
    data: Option<UpsertData>,
    #[serde(default)]
    errors: Vec<GraphqlErrorMessage>,
}

#[derive(Deserialize)]
struct UpsertData {
    #[serde(rename = "upsertSlotInstance", default)]
    upsert_slot_instance: Option<UpsertResponse>,
}

#[derive(Deserialize)]
struct GraphqlErrorMessage {
    #[serde(default)]
    message: Option<String>,
}

/// Interpret a GraphQL response body; the first `errors` entry wins.
pub fn parse_upsert_response(body: Value) -> Result<UpsertResponse, PublishError> {
    let envelope: GraphqlEnvelope =
        serde_json::from_value(body).map_err(|err| PublishError::Decode(err.to_string()))?;
    if let Some(first) = envelope.errors.into_iter().next() {
        return Err(PublishError::Remote(
            first
                .message
                .unwrap_or_else(|| "Failed to publish slot draft".to_string()),
        ));
    }
    Ok(envelope
        .data
        .and_then(|data| data.upsert_slot_instance)
        .unwrap_or_default())
}

#[async_trait]
impl SlotPublisher for GraphqlPublisher {
    async fn upsert(&self, request: UpsertRequest) -> Result<UpsertResponse, PublishError> {
        let mut builder = self
            .client
            .post(&self.config.endpoint)
            .header(CONTENT_TYPE, "application/json");
        for (name, value) in &self.config.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .json(&upsert_request_body(&request))
            .send()
            .await
            .map_err(|err| PublishError::Transport(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(PublishError::Status {
                status: status.as_u16(),
            });
        }
        let body: Value = response
            .json()
            .await
            .map_err(|err| PublishError::Decode(err.to_string()))?;
        parse_upsert_response(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_carries_the_mutation_and_input() {
        let draft = EditableDraft {
            editable_id: Some("card-1".into()),
            slot_key: Some("catalog.card".into()),
            props_json: Some(json!({"title": "Hi"})),
            ..EditableDraft::default()
        };
        let request = UpsertRequest::from_draft(&draft).unwrap();
        let body = upsert_request_body(&request);
        assert!(body["query"].as_str().unwrap().contains("upsertSlotInstance"));
        assert_eq!(body["variables"]["input"]["editableId"], "card-1");
        assert_eq!(body["variables"]["input"]["variant"], Value::Null);
        assert_eq!(body["variables"]["input"]["propsJSON"]["title"], "Hi");

        assert!(UpsertRequest::from_draft(&EditableDraft::default()).is_none());
    }

    #[test]
    fn graphql_errors_surface_as_remote_failures() {
        let body = json!({"errors": [{"message": "forbidden"}], "data": null});
        assert_eq!(
            parse_upsert_response(body),
            Err(PublishError::Remote("forbidden".into()))
        );
    }

    #[test]
    fn canonical_fields_are_returned() {
        let body = json!({"data": {"upsertSlotInstance": {
            "editableId": "card-1",
            "updatedAt": "2024-03-03T10:00:00.000Z"
        }}});
        let response = parse_upsert_response(body).unwrap();
        assert_eq!(response.updated_at.as_deref(), Some("2024-03-03T10:00:00.000Z"));
        assert_eq!(parse_upsert_response(json!({})).unwrap(), UpsertResponse::default());
        assert!(matches!(
            parse_upsert_response(json!({"errors": "nope"})),
            Err(PublishError::Decode(_))
        ));
    }
}
