/// Core error type for startup and adapter plumbing.
///
/// Claim failures never surface here: validation and store errors end up in
/// a `ClaimOutcome` instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failures talking to the alias store. Neither variant is retried.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading the current owner failed (transport, unexpected status, decode).
    #[error("owner lookup failed: {0}")]
    Transient(String),

    /// Writing the claim failed (transport or a status other than 200).
    #[error("claim write failed: {0}")]
    Claim(String),
}
