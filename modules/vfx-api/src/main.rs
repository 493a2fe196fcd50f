use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vfx_api::leads::{LeadStore, SupabaseLeadStore};
use vfx_api::{router, AppState};
use vfx_common::Config;
use webhook_client::{ReqwestTransport, WebhookDispatcher};

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("vfx=info".parse()?)
        .add_directive("webhook_client=info".parse()?)
        .add_directive("ga4_client=info".parse()?)
        .add_directive("meta_capi_client=info".parse()?);
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f == "json") {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = Config::from_env()?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    let leads: Option<Arc<dyn LeadStore>> =
        match (&config.supabase_url, &config.supabase_service_role_key) {
            (Some(url), Some(key)) => {
                Some(Arc::new(SupabaseLeadStore::new(url, key)) as Arc<dyn LeadStore>)
            }
            _ => {
                warn!("Supabase not configured, /api/leads will answer 500");
                None
            }
        };

    let webhooks = Arc::new(WebhookDispatcher::new(Arc::new(ReqwestTransport::new(
        http.clone(),
    ))));

    let addr = format!("{}:{}", config.api_host, config.api_port);
    let state = Arc::new(AppState {
        config,
        http,
        webhooks,
        leads,
    });

    let app = router(state);

    info!("VFX relay API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
