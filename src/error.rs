//! Error types for the readiness core.
//!
//! Fatal pipeline failures abort a `load()` run and surface through
//! [`LoadError`]. Individual asset failures are [`AssetError`]s that the
//! best-effort steps downgrade to warnings.

/// Failure of a single asset fetch or probe.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AssetError {
    #[error("failed to load {path}: {reason}")]
    LoadFailed { path: String, reason: String },
}

/// Failure of the host handshake.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum HostError {
    #[error("host channel unavailable: {0}")]
    Unavailable(String),

    #[error("host did not answer within {0}ms")]
    Timeout(u32),

    #[error("malformed host message: {0}")]
    Malformed(String),
}

/// Static level data that fails validation.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("level catalog is empty")]
    Empty,

    #[error("level #{0} has an empty id")]
    MissingId(usize),

    #[error("level '{0}' has an empty name")]
    MissingName(String),

    #[error("level id '{0}' is used more than once")]
    DuplicateId(String),
}

/// A step sequence that cannot be turned into a pipeline.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    #[error("loading plan has no steps")]
    NoSteps,

    #[error("step '{0}' has a zero weight")]
    ZeroWeight(String),
}

/// Outcome of a `load()` call that did not reach completion.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    #[error("handshake failed: {0}")]
    Handshake(#[from] HostError),

    #[error("catalog invalid: {0}")]
    Catalog(#[from] CatalogError),

    #[error("a load is already in progress")]
    AlreadyLoading,
}

impl LoadError {
    /// Text shown to the player, as opposed to the `Display` form which is
    /// meant for logs and the host page.
    pub fn user_message(&self) -> &'static str {
        match self {
            LoadError::Handshake(_) => "Could not connect to the game host. Please reload.",
            LoadError::Catalog(_) => "The level data is damaged. Please reload.",
            LoadError::AlreadyLoading => "Loading is already underway.",
        }
    }
}
