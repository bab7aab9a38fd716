use std::{fmt, str::FromStr};

use crate::validation::{self, ValidationError};

/// Numeric chat-platform account id of whoever controls an alias.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(pub u64);

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OwnerId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(OwnerId)
    }
}

/// Lowercase hex identifier from the upstream identity system.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PublicUserId(String);

impl PublicUserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn new_unchecked(s: String) -> Self {
        Self(s)
    }
}

impl TryFrom<&str> for PublicUserId {
    type Error = ValidationError;

    fn try_from(s: &str) -> std::result::Result<Self, Self::Error> {
        validation::validate_public_id(s)
    }
}

impl fmt::Display for PublicUserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lowercased alphanumeric store key, 1..=32 characters.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Alias(String);

impl Alias {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn new_unchecked(s: String) -> Self {
        Self(s)
    }
}

impl TryFrom<&str> for Alias {
    type Error = ValidationError;

    fn try_from(s: &str) -> std::result::Result<Self, Self::Error> {
        validation::validate_alias(s)
    }
}

impl fmt::Display for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One validated claim attempt. Built per command and dropped afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimRequest {
    pub public_id: PublicUserId,
    pub alias: Alias,
    pub requester: OwnerId,
}

impl ClaimRequest {
    pub fn parse(
        public_id: &str,
        alias: &str,
        requester: OwnerId,
    ) -> std::result::Result<Self, ValidationError> {
        let (public_id, alias) = validation::validate(public_id, alias)?;
        Ok(Self {
            public_id,
            alias,
            requester,
        })
    }
}

/// Chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a sent message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_id_parses_decimal_text() {
        assert_eq!("123456789".parse::<OwnerId>().unwrap(), OwnerId(123456789));
        assert_eq!(" 999 ".parse::<OwnerId>().unwrap(), OwnerId(999));
        assert!("abc".parse::<OwnerId>().is_err());
        assert!("-1".parse::<OwnerId>().is_err());
        assert_eq!(OwnerId(42).to_string(), "42");
    }

    #[test]
    fn claim_request_lowercases_alias() {
        let req = ClaimRequest::parse("deadbeef", "AbC123", OwnerId(7)).unwrap();
        assert_eq!(req.alias.as_str(), "abc123");
        assert_eq!(req.public_id.as_str(), "deadbeef");
        assert_eq!(req.requester, OwnerId(7));
    }
}
