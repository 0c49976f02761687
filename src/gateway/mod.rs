//! Storage gateway
//!
//! The only component that performs network I/O against the persistence
//! tier. Every operation issues one outbound call carrying the
//! service-to-service credential, logs failures with the operation's
//! context, and converts them to a negative result instead of raising past
//! its boundary. Retry policy, if any, belongs to callers.

use async_trait::async_trait;
use log::{debug, error, warn};
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;

use crate::config::CoordinatorConfig;
use crate::core::{
    ActorIdentity, AuthenticatedUser, CoordError, DocumentPayload, Result, SnapshotReason,
};

/// Header carrying the service-to-service credential.
const INTERNAL_KEY_HEADER: &str = "X-Internal-API-Key";

/// Result of a conditional save against the storage tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Storage accepted the write at the expected version.
    Saved,
    /// Storage rejected the optimistic-concurrency token.
    VersionConflict,
    /// Transport failure or any other non-success response.
    Failed,
}

/// Storage seam for the persistence tier.
///
/// This trait allows writing coordinator logic that is agnostic to the
/// underlying transport. `HttpDocumentStore` is the production
/// implementation; tests swap in an in-memory fake.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Validate a session-open request against the authorization service.
    async fn validate_access(&self, document_id: &str, token: &str) -> Result<AuthenticatedUser>;

    /// Fetch persisted content, threads and version for a document.
    ///
    /// Returns `None` on any transport or envelope failure; callers treat a
    /// missing payload as an empty document.
    async fn load(&self, document_id: &str) -> Option<DocumentPayload>;

    /// Persist the document state, guarded by the expected version.
    async fn save(
        &self,
        document_id: &str,
        content: &Value,
        threads: &[Value],
        expected_version: u64,
    ) -> SaveOutcome;

    /// Request an additive point-in-time snapshot. Never overwrites the
    /// live document.
    async fn snapshot(
        &self,
        document_id: &str,
        reason: SnapshotReason,
        actor: &ActorIdentity,
    ) -> bool;
}

#[derive(Serialize)]
struct SaveRequest<'a> {
    content: &'a Value,
    threads: &'a [Value],
    #[serde(rename = "expectedVersion")]
    expected_version: u64,
}

#[derive(Serialize)]
struct SnapshotRequest<'a> {
    reason: &'a str,
    #[serde(rename = "createdBy")]
    created_by: i64,
    #[serde(rename = "createdByName")]
    created_by_name: &'a str,
    #[serde(rename = "createdByAvatar")]
    created_by_avatar: &'a str,
}

/// Unwrap a `{status, data}` response envelope, accepting a flat record
/// transparently.
///
/// A `status` field other than `1` is a failure. When `data` is present it
/// wins; otherwise the whole payload is treated as the record.
fn unwrap_envelope(body: Value) -> Option<Value> {
    match body.get("status").and_then(Value::as_i64) {
        Some(1) | None => {}
        Some(status) => {
            warn!("Storage envelope reported status {}", status);
            return None;
        }
    }

    let data = body.get("data").filter(|data| !data.is_null()).cloned();
    Some(data.unwrap_or(body))
}

/// HTTP implementation of [`DocumentStore`].
pub struct HttpDocumentStore {
    client: reqwest::Client,
    gateway_base_url: String,
    document_service_url: String,
    internal_api_key: String,
    document_service_api_key: String,
}

impl HttpDocumentStore {
    pub fn new(config: &CoordinatorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| CoordError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            gateway_base_url: config.gateway_base_url.clone(),
            document_service_url: config.document_service_url.clone(),
            internal_api_key: config.internal_api_key.clone(),
            document_service_api_key: config.document_service_api_key.clone(),
        })
    }

    fn access_url(&self, document_id: &str) -> String {
        format!(
            "{}/api/pm/internal/files/{}/access",
            self.gateway_base_url, document_id
        )
    }

    fn document_url(&self, document_id: &str) -> String {
        format!(
            "{}/api/internal/documents/{}",
            self.document_service_url, document_id
        )
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn validate_access(&self, document_id: &str, token: &str) -> Result<AuthenticatedUser> {
        let response = self
            .client
            .get(self.access_url(document_id))
            .bearer_auth(token)
            .header(INTERNAL_KEY_HEADER, &self.internal_api_key)
            .send()
            .await
            .map_err(|e| {
                error!("Access validation failed for '{}': {}", document_id, e);
                CoordError::AccessDenied(format!("authorization service unreachable: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            error!(
                "Access validation failed for '{}': HTTP {}",
                document_id, status
            );
            return Err(CoordError::AccessDenied(format!(
                "authorization service returned HTTP {}",
                status
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            error!("Access validation failed for '{}': {}", document_id, e);
            CoordError::AccessDenied(format!("malformed authorization response: {}", e))
        })?;

        let record = unwrap_envelope(body).ok_or_else(|| {
            CoordError::AccessDenied("authorization envelope reported failure".to_string())
        })?;

        AuthenticatedUser::from_record(&record).ok_or_else(|| {
            error!(
                "Access validation failed for '{}': record lacks userId",
                document_id
            );
            CoordError::AccessDenied("invalid user data".to_string())
        })
    }

    async fn load(&self, document_id: &str) -> Option<DocumentPayload> {
        let response = match self
            .client
            .get(self.document_url(document_id))
            .header(INTERNAL_KEY_HEADER, &self.document_service_api_key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("Load document failed for '{}': {}", document_id, e);
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            error!("Load document failed for '{}': HTTP {}", document_id, status);
            return None;
        }

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                error!("Load document failed for '{}': {}", document_id, e);
                return None;
            }
        };

        let record = unwrap_envelope(body)?;
        match serde_json::from_value(record) {
            Ok(payload) => Some(payload),
            Err(e) => {
                error!("Load document failed for '{}': {}", document_id, e);
                None
            }
        }
    }

    async fn save(
        &self,
        document_id: &str,
        content: &Value,
        threads: &[Value],
        expected_version: u64,
    ) -> SaveOutcome {
        let body = SaveRequest {
            content,
            threads,
            expected_version,
        };

        match self
            .client
            .put(self.document_url(document_id))
            .header(INTERNAL_KEY_HEADER, &self.document_service_api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(response) if response.status() == StatusCode::CONFLICT => {
                warn!(
                    "Save rejected for '{}': version {} is stale",
                    document_id, expected_version
                );
                SaveOutcome::VersionConflict
            }
            Ok(response) if response.status().is_success() => {
                debug!("Saved '{}' at expected v{}", document_id, expected_version);
                SaveOutcome::Saved
            }
            Ok(response) => {
                error!(
                    "Save document failed for '{}': HTTP {}",
                    document_id,
                    response.status()
                );
                SaveOutcome::Failed
            }
            Err(e) => {
                error!("Save document failed for '{}': {}", document_id, e);
                SaveOutcome::Failed
            }
        }
    }

    async fn snapshot(
        &self,
        document_id: &str,
        reason: SnapshotReason,
        actor: &ActorIdentity,
    ) -> bool {
        let body = SnapshotRequest {
            reason: reason.as_str(),
            created_by: actor.id,
            created_by_name: &actor.name,
            created_by_avatar: &actor.avatar,
        };

        match self
            .client
            .post(format!("{}/snapshot", self.document_url(document_id)))
            .header(INTERNAL_KEY_HEADER, &self.document_service_api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                error!(
                    "Create snapshot ({}) failed for '{}': HTTP {}",
                    reason,
                    document_id,
                    response.status()
                );
                false
            }
            Err(e) => {
                error!(
                    "Create snapshot ({}) failed for '{}': {}",
                    reason, document_id, e
                );
                false
            }
        }
    }
}
