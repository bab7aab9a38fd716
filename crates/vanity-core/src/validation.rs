//! Format rules for the two user-supplied tokens of a claim.
//!
//! Validation runs before any network call; a failure here is the only
//! outcome that is reported without acknowledging the command first.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::{Alias, PublicUserId};

pub const ALIAS_MAX_LEN: usize = 32;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Provided user id is not a valid public user id.")]
    InvalidUserId,

    #[error(
        "Provided vanity is not in a valid format. Use letters and numbers only up to 32 characters."
    )]
    InvalidAlias,
}

impl ValidationError {
    /// Message to surface to the caller verbatim.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

fn public_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9a-f]+$").expect("valid regex"))
}

fn alias_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9a-zA-Z]{1,32}$").expect("valid regex"))
}

/// Validate both tokens. The public id is checked first.
pub fn validate(public_id: &str, alias: &str) -> Result<(PublicUserId, Alias), ValidationError> {
    let public_id = validate_public_id(public_id)?;
    let alias = validate_alias(alias)?;
    Ok((public_id, alias))
}

pub fn validate_public_id(raw: &str) -> Result<PublicUserId, ValidationError> {
    if !public_id_re().is_match(raw) {
        return Err(ValidationError::InvalidUserId);
    }
    Ok(PublicUserId::new_unchecked(raw.to_string()))
}

/// Lowercases, then requires ASCII alphanumerics only.
pub fn validate_alias(raw: &str) -> Result<Alias, ValidationError> {
    let lowered = raw.to_lowercase();
    if !alias_re().is_match(&lowered) {
        return Err(ValidationError::InvalidAlias);
    }
    Ok(Alias::new_unchecked(lowered))
}
