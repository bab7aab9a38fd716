//! Claim outcome → Telegram HTML text.

use crate::{
    claim::ClaimOutcome,
    domain::OwnerId,
};

pub const ACK_TEXT: &str = "Checking vanity…";

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Inline mention of a Telegram account by numeric id.
pub fn mention(owner: OwnerId) -> String {
    format!(r#"<a href="tg://user?id={owner}">{owner}</a>"#)
}

pub fn render_outcome(outcome: &ClaimOutcome) -> String {
    match outcome {
        ClaimOutcome::Rejected(e) => escape_html(&e.user_message()),
        ClaimOutcome::Conflict { owner, .. } => {
            format!("This vanity is already taken by {}.", mention(*owner))
        }
        ClaimOutcome::Claimed {
            alias,
            public_id,
            lookup_url,
        } => format!(
            r#"Vanity <code>{}</code> associated with user id <a href="{}"><code>{}</code></a> has been successfully added."#,
            escape_html(alias.as_str()),
            escape_html(lookup_url),
            escape_html(public_id.as_str()),
        ),
        ClaimOutcome::Failed { alias, .. } => format!(
            "Could not save vanity <code>{}</code> right now. Please try again later.",
            escape_html(alias.as_str())
        ),
    }
}
