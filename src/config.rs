use std::time::Duration;

/// Default debounce window between a change notification and its save.
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(5000);

/// Default elapsed-time threshold for the automatic snapshot policy.
pub const DEFAULT_SNAPSHOT_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Default idle age after which an abandoned session is swept.
pub const DEFAULT_SESSION_MAX_IDLE: Duration = Duration::from_secs(3600);

/// Coordinator configuration
///
/// Carries the endpoints and credentials of the authorization gateway and
/// the document-storage service, plus the persistence policy knobs.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Base URL of the authorization gateway
    pub gateway_base_url: String,

    /// Base URL of the document-storage service
    pub document_service_url: String,

    /// Service-to-service credential for the authorization gateway
    pub internal_api_key: String,

    /// Service-to-service credential for the document-storage service
    pub document_service_api_key: String,

    /// Listen port for the hosting collaboration engine
    pub listen_port: u16,

    /// Quiet period after the last change notification before a save fires
    pub debounce_window: Duration,

    /// Elapsed time after which a successful autosave also snapshots
    pub snapshot_interval: Duration,

    /// Timeout applied to every outbound storage call
    pub request_timeout: Duration,

    /// Idle age after which a session with no connections is swept
    pub session_max_idle: Duration,
}

impl CoordinatorConfig {
    /// Create a new configuration with default policy values
    pub fn new(
        gateway_base_url: &str,
        document_service_url: &str,
        internal_api_key: &str,
        document_service_api_key: &str,
    ) -> Self {
        Self {
            gateway_base_url: gateway_base_url.trim_end_matches('/').to_string(),
            document_service_url: document_service_url.trim_end_matches('/').to_string(),
            internal_api_key: internal_api_key.to_string(),
            document_service_api_key: document_service_api_key.to_string(),
            listen_port: 1234,
            debounce_window: DEFAULT_DEBOUNCE_WINDOW,
            snapshot_interval: DEFAULT_SNAPSHOT_INTERVAL,
            request_timeout: Duration::from_secs(10),
            session_max_idle: DEFAULT_SESSION_MAX_IDLE,
        }
    }

    /// Set the listen port
    pub fn listen_port(mut self, port: u16) -> Self {
        self.listen_port = port;
        self
    }

    /// Set the debounce window
    pub fn debounce_window(mut self, window: Duration) -> Self {
        self.debounce_window = window;
        self
    }

    /// Set the snapshot interval
    pub fn snapshot_interval(mut self, interval: Duration) -> Self {
        self.snapshot_interval = interval;
        self
    }

    /// Set the outbound request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the idle age for the stale-session sweep
    pub fn session_max_idle(mut self, max_idle: Duration) -> Self {
        self.session_max_idle = max_idle;
        self
    }

    /// Load the configuration from the environment
    ///
    /// Required: `API_GATEWAY_URL`, `DOCUMENT_SERVICE_URL`,
    /// `INTERNAL_API_KEY`, `DOCUMENT_SERVICE_API_KEY`.
    /// Optional: `PORT` (default 1234).
    pub fn from_env() -> Result<Self, String> {
        let gateway_base_url = require_env("API_GATEWAY_URL")?;
        let document_service_url = require_env("DOCUMENT_SERVICE_URL")?;
        let internal_api_key = require_env("INTERNAL_API_KEY")?;
        let document_service_api_key = require_env("DOCUMENT_SERVICE_API_KEY")?;

        let mut config = Self::new(
            &gateway_base_url,
            &document_service_url,
            &internal_api_key,
            &document_service_api_key,
        );

        if let Ok(port) = std::env::var("PORT") {
            config.listen_port = port
                .parse()
                .map_err(|_| format!("PORT must be a number, got '{}'", port))?;
        }

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.gateway_base_url.is_empty() {
            return Err("gateway base URL cannot be empty".to_string());
        }

        if self.document_service_url.is_empty() {
            return Err("document service URL cannot be empty".to_string());
        }

        if self.internal_api_key.is_empty() || self.document_service_api_key.is_empty() {
            return Err("service credentials cannot be empty".to_string());
        }

        if self.debounce_window.is_zero() {
            return Err("debounce window must be > 0".to_string());
        }

        if self.snapshot_interval.is_zero() {
            return Err("snapshot interval must be > 0".to_string());
        }

        Ok(())
    }
}

fn require_env(name: &str) -> Result<String, String> {
    std::env::var(name).map_err(|_| format!("{} is not set", name))
}
