use std::sync::Arc;

use tracing::info;

use vanity_core::{claim::ClaimHandler, config::Config};
use vanity_kv::{CloudflareKv, KvConfig};

#[tokio::main]
async fn main() -> Result<(), vanity_core::Error> {
    vanity_core::logging::init("vanity-bot")?;

    let cfg = Arc::new(Config::load()?);
    info!(
        namespace = %cfg.kv_namespace_id,
        lookup_base_url = %cfg.lookup_base_url,
        "configuration loaded"
    );

    let store = Arc::new(CloudflareKv::new(KvConfig::from(cfg.as_ref()))?);
    let claims = Arc::new(ClaimHandler::new(store, cfg.lookup_base_url.clone()));

    vanity_telegram::router::run_polling(cfg, claims)
        .await
        .map_err(|e| vanity_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
