use std::sync::Arc;

use teloxide::{prelude::*, types::ParseMode};
use tracing::{debug, info, warn};

use vanity_core::domain::{ChatId, MessageId, OwnerId};

use crate::{router::AppState, TelegramResponder};

const USAGE: &str = "Usage: <code>/vanity &lt;public user id&gt; &lt;vanity&gt;</code>\n\n\
The public user id is your lowercase hex id. The vanity may contain letters and numbers only, up to 32 characters.";

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

/// Split `/vanity` args into `(public id, alias)`.
///
/// Everything after the first token is the alias, so a malformed alias with
/// spaces reaches validation instead of being silently truncated.
fn parse_claim_args(args: &str) -> Option<(String, String)> {
    let mut parts = args.trim().splitn(2, char::is_whitespace);
    let public_id = parts.next().unwrap_or("").trim();
    let alias = parts.next().unwrap_or("").trim();
    if public_id.is_empty() || alias.is_empty() {
        return None;
    }
    Some((public_id.to_string(), alias.to_string()))
}

pub async fn handle_command(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let (cmd, args) = parse_command(msg.text().unwrap_or(""));

    match cmd.as_str() {
        "vanity" => handle_vanity(bot, msg, state, &args).await,
        "start" | "help" => {
            if let Err(e) = bot
                .send_message(msg.chat.id, USAGE)
                .parse_mode(ParseMode::Html)
                .await
            {
                warn!(error = %e, "failed to send usage");
            }
            Ok(())
        }
        other => {
            debug!(command = %other, "ignoring unknown command");
            Ok(())
        }
    }
}

async fn handle_vanity(
    bot: Bot,
    msg: Message,
    state: Arc<AppState>,
    args: &str,
) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let requester = OwnerId(user.id.0);

    let Some((public_id, alias)) = parse_claim_args(args) else {
        if let Err(e) = bot
            .send_message(msg.chat.id, format!("Missing parameters.\n\n{USAGE}"))
            .parse_mode(ParseMode::Html)
            .reply_to_message_id(msg.id)
            .await
        {
            warn!(error = %e, "failed to send missing-parameter reply");
        }
        return Ok(());
    };

    info!(requester = %requester, alias = %alias, "vanity claim received");

    let responder = TelegramResponder::new(
        state.messenger.clone(),
        ChatId(msg.chat.id.0),
        MessageId(msg.id.0),
    );
    state
        .claims
        .handle(&public_id, &alias, requester, &responder)
        .await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_command_with_bot_suffix() {
        assert_eq!(
            parse_command("/Vanity@vip_bot deadbeef abc"),
            ("vanity".to_string(), "deadbeef abc".to_string())
        );
        assert_eq!(parse_command("/help"), ("help".to_string(), String::new()));
    }

    #[test]
    fn claim_args_require_both_parameters() {
        assert_eq!(parse_claim_args(""), None);
        assert_eq!(parse_claim_args("deadbeef"), None);
        assert_eq!(parse_claim_args("  deadbeef   "), None);
        assert_eq!(
            parse_claim_args("deadbeef abc123"),
            Some(("deadbeef".to_string(), "abc123".to_string()))
        );
    }

    #[test]
    fn alias_keeps_inner_whitespace_for_validation() {
        assert_eq!(
            parse_claim_args("deadbeef Bad Alias!"),
            Some(("deadbeef".to_string(), "Bad Alias!".to_string()))
        );
    }
}
