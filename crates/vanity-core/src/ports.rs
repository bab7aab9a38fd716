//! Hexagonal ports. The KV store and the messenger are implemented in adapter
//! crates; tests use in-memory fakes.

use async_trait::async_trait;

use crate::{
    claim::ClaimOutcome,
    domain::{Alias, OwnerId, PublicUserId},
    errors::StoreError,
    Result,
};

/// Remote key-value store holding alias records.
///
/// Implementations must not cache: ownership can change between commands.
#[async_trait]
pub trait AliasStore: Send + Sync {
    /// Current owner of `alias`, or `None` if unclaimed.
    async fn resolve_owner(&self, alias: &Alias) -> std::result::Result<Option<OwnerId>, StoreError>;

    /// Overwrite the record's value and ownership metadata in one write.
    async fn write_claim(
        &self,
        alias: &Alias,
        public_id: &PublicUserId,
        owner: OwnerId,
    ) -> std::result::Result<(), StoreError>;
}

/// Outbound responses for a single command invocation.
#[async_trait]
pub trait ClaimResponder: Send + Sync {
    /// Deferred acknowledgment sent once input is valid.
    async fn acknowledge(&self) -> Result<()>;

    /// The single follow-up for this invocation.
    async fn reply(&self, outcome: &ClaimOutcome) -> Result<()>;
}
