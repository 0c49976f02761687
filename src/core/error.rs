use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoordError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Hydration failed: {0}")]
    Hydration(String),

    #[error("Save failed: {0}")]
    Save(String),

    #[error("Version conflict: storage rejected expected version {expected}")]
    VersionConflict { expected: u64 },

    #[error("Snapshot failed: {0}")]
    Snapshot(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, CoordError>;
