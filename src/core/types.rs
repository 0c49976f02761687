use serde::Deserialize;
use serde_json::Value;

/// Identity record returned by the access gate.
///
/// A session is only admitted when the authorization service hands back a
/// record carrying `userId`; the remaining fields fall back to anonymous
/// defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub user_name: String,
    pub user_avatar: String,
    pub can_edit: bool,
}

impl AuthenticatedUser {
    /// Build an identity from an unwrapped authorization record.
    ///
    /// Returns `None` when `userId` is absent — partial identity never
    /// admits a session.
    pub fn from_record(record: &Value) -> Option<Self> {
        let user_id = record.get("userId").and_then(Value::as_i64)?;

        Some(Self {
            user_id,
            user_name: record
                .get("userName")
                .and_then(Value::as_str)
                .unwrap_or("Anonymous")
                .to_string(),
            user_avatar: record
                .get("userAvatar")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
            can_edit: record
                .get("canEdit")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    }
}

/// Snapshot attribution sent to the persistence tier.
///
/// Falls back to the `0`/"Anonymous" system identity when a hook fires
/// without an authenticated context.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorIdentity {
    pub id: i64,
    pub name: String,
    pub avatar: String,
}

impl ActorIdentity {
    /// The system identity used when no user context is available.
    pub fn system() -> Self {
        Self {
            id: 0,
            name: "Anonymous".to_string(),
            avatar: String::new(),
        }
    }

    pub fn from_user(user: &AuthenticatedUser) -> Self {
        Self {
            id: user.user_id,
            name: user.user_name.clone(),
            avatar: user.user_avatar.clone(),
        }
    }
}

/// Persisted document state as fetched from storage.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentPayload {
    #[serde(default)]
    pub content: Option<Value>,

    /// Raw thread list; kept as a loose value because the backend is not
    /// guaranteed to send a sequence.
    #[serde(default)]
    pub threads: Option<Value>,

    #[serde(default)]
    pub version: Option<u64>,
}

/// A comment thread attached to the document.
///
/// Opaque to the coordinator beyond its identifier; the body is normalized
/// so the primary id field is always populated.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadEntry {
    pub id: String,
    pub body: Value,
}

impl ThreadEntry {
    /// Resolve a thread's identifier from the primary field (`threadId`),
    /// falling back to the secondary (`id`).
    ///
    /// Returns `None` for entries with no usable identifier; callers drop
    /// (and report) those. The returned body always carries `threadId`
    /// equal to the resolved identifier, so the same logical thread keeps
    /// one identifier across reloads.
    pub fn from_value(raw: &Value) -> Option<Self> {
        let id = raw
            .get("threadId")
            .and_then(Value::as_str)
            .or_else(|| raw.get("id").and_then(Value::as_str))?
            .to_string();

        let mut body = raw.clone();
        if let Some(object) = body.as_object_mut() {
            object.insert("threadId".to_string(), Value::String(id.clone()));
        }

        Some(Self { id, body })
    }
}

/// Why a snapshot was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotReason {
    /// The time-based policy fired after a successful autosave.
    Auto30Min,
    /// The last connection left the document.
    SessionEnd,
}

impl SnapshotReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotReason::Auto30Min => "AUTO_30MIN",
            SnapshotReason::SessionEnd => "SESSION_END",
        }
    }
}

impl std::fmt::Display for SnapshotReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
