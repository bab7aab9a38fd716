//! Vanity claim reconciliation: validate, resolve the current owner, write.
//!
//! Two concurrent claims for the same alias by different requesters can both
//! pass the ownership check before either writes; the last write wins. The
//! KV store offers no conditional write, so this is accepted.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::{
    domain::{Alias, ClaimRequest, OwnerId, PublicUserId},
    ports::{AliasStore, ClaimResponder},
    validation::ValidationError,
};

pub const DEFAULT_LOOKUP_BASE_URL: &str = "https://sb.ltn.fi/userid/";

/// Which network step a failed claim stopped at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailedStage {
    Resolve,
    Write,
}

/// Terminal state of one claim attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClaimOutcome {
    Rejected(ValidationError),
    Conflict {
        alias: Alias,
        owner: OwnerId,
    },
    Claimed {
        alias: Alias,
        public_id: PublicUserId,
        lookup_url: String,
    },
    Failed {
        alias: Alias,
        stage: FailedStage,
    },
}

pub struct ClaimHandler {
    store: Arc<dyn AliasStore>,
    lookup_base_url: String,
}

impl ClaimHandler {
    pub fn new(store: Arc<dyn AliasStore>, lookup_base_url: impl Into<String>) -> Self {
        Self {
            store,
            lookup_base_url: lookup_base_url.into(),
        }
    }

    pub fn lookup_url(&self, public_id: &PublicUserId) -> String {
        format!("{}{}", self.lookup_base_url, public_id)
    }

    /// Run one claim end to end and deliver its follow-up through `responder`.
    ///
    /// Responder failures are logged; they never change the outcome.
    pub async fn handle(
        &self,
        public_id: &str,
        alias: &str,
        requester: OwnerId,
        responder: &dyn ClaimResponder,
    ) -> ClaimOutcome {
        let req = match ClaimRequest::parse(public_id, alias, requester) {
            Ok(req) => req,
            Err(e) => {
                info!(requester = %requester, reason = %e, "vanity claim rejected");
                let outcome = ClaimOutcome::Rejected(e);
                deliver(responder, &outcome).await;
                return outcome;
            }
        };

        if let Err(e) = responder.acknowledge().await {
            warn!(alias = %req.alias, error = %e, "failed to acknowledge vanity claim");
        }

        let outcome = self.reconcile(&req).await;
        deliver(responder, &outcome).await;
        outcome
    }

    /// Resolve then conditionally write. Assumes `req` is already validated.
    pub async fn reconcile(&self, req: &ClaimRequest) -> ClaimOutcome {
        match self.store.resolve_owner(&req.alias).await {
            Ok(Some(owner)) if owner != req.requester => {
                info!(alias = %req.alias, requester = %req.requester, owner = %owner, "vanity already taken");
                return ClaimOutcome::Conflict {
                    alias: req.alias.clone(),
                    owner,
                };
            }
            Ok(_) => {}
            Err(e) => {
                error!(alias = %req.alias, error = %e, "vanity owner lookup failed");
                return ClaimOutcome::Failed {
                    alias: req.alias.clone(),
                    stage: FailedStage::Resolve,
                };
            }
        }

        if let Err(e) = self
            .store
            .write_claim(&req.alias, &req.public_id, req.requester)
            .await
        {
            warn!(alias = %req.alias, error = %e, "vanity claim write failed");
            return ClaimOutcome::Failed {
                alias: req.alias.clone(),
                stage: FailedStage::Write,
            };
        }

        info!(alias = %req.alias, requester = %req.requester, public_id = %req.public_id, "vanity claimed");
        ClaimOutcome::Claimed {
            alias: req.alias.clone(),
            public_id: req.public_id.clone(),
            lookup_url: self.lookup_url(&req.public_id),
        }
    }
}

async fn deliver(responder: &dyn ClaimResponder, outcome: &ClaimOutcome) {
    if let Err(e) = responder.reply(outcome).await {
        warn!(error = %e, "failed to deliver vanity claim follow-up");
    }
}
