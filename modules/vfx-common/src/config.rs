use std::env;

use crate::error::RelayError;

pub const DEFAULT_META_API_VERSION: &str = "v19.0";
pub const DEFAULT_GA4_BASE_URL: &str = "https://www.google-analytics.com";
pub const DEFAULT_META_GRAPH_BASE_URL: &str = "https://graph.facebook.com";

/// Application configuration loaded from environment variables.
///
/// Secrets are optional at load time: an endpoint whose secret is missing
/// answers 500 with a descriptive body instead of keeping the whole server
/// from starting.
#[derive(Debug, Clone)]
pub struct Config {
    // Web server
    pub api_host: String,
    pub api_port: u16,
    pub allowed_origins: Vec<String>,

    // Leads table
    pub supabase_url: Option<String>,
    pub supabase_service_role_key: Option<String>,

    // Meta
    pub facebook_pixel_id: Option<String>,
    pub meta_api_access_token: Option<String>,
    pub meta_test_event_code: Option<String>,
    pub meta_api_version: String,
    pub meta_graph_base_url: String,

    // GA4
    pub ga4_measurement_id: Option<String>,
    pub ga4_api_secret: Option<String>,
    pub ga4_base_url: String,

    // CRM
    pub crm_webhook_url: Option<String>,
}

impl Config {
    /// Load configuration from the process environment, reading `.env` first
    /// when one is present.
    pub fn from_env() -> Result<Self, RelayError> {
        dotenvy::dotenv().ok();

        let api_port = env::var("API_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| RelayError::Config("API_PORT must be a number".to_string()))?;

        let config = Self {
            api_host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            api_port,
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            supabase_url: optional_env("SUPABASE_URL")
                .or_else(|| optional_env("NEXT_PUBLIC_SUPABASE_URL")),
            supabase_service_role_key: optional_env("SUPABASE_SERVICE_ROLE_KEY"),
            facebook_pixel_id: optional_env("FACEBOOK_PIXEL_ID"),
            meta_api_access_token: optional_env("META_API_ACCESS_TOKEN"),
            meta_test_event_code: optional_env("META_TEST_EVENT_CODE"),
            meta_api_version: optional_env("META_API_VERSION")
                .unwrap_or_else(|| DEFAULT_META_API_VERSION.to_string()),
            meta_graph_base_url: optional_env("META_GRAPH_BASE_URL")
                .unwrap_or_else(|| DEFAULT_META_GRAPH_BASE_URL.to_string()),
            ga4_measurement_id: optional_env("NEXT_PUBLIC_GA4_MEASUREMENT_ID"),
            ga4_api_secret: optional_env("GA4_API_SECRET"),
            ga4_base_url: optional_env("GA4_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GA4_BASE_URL.to_string()),
            crm_webhook_url: optional_env("CRM_WEBHOOK_URL"),
        };

        config.log_keys();
        Ok(config)
    }

    /// Config with every secret unset. Used by tests and local tooling.
    pub fn empty() -> Self {
        Self {
            api_host: "127.0.0.1".to_string(),
            api_port: 3000,
            allowed_origins: Vec::new(),
            supabase_url: None,
            supabase_service_role_key: None,
            facebook_pixel_id: None,
            meta_api_access_token: None,
            meta_test_event_code: None,
            meta_api_version: DEFAULT_META_API_VERSION.to_string(),
            meta_graph_base_url: DEFAULT_META_GRAPH_BASE_URL.to_string(),
            ga4_measurement_id: None,
            ga4_api_secret: None,
            ga4_base_url: DEFAULT_GA4_BASE_URL.to_string(),
            crm_webhook_url: None,
        }
    }

    /// Return a configured value or the configuration error naming it.
    pub fn require<'a>(value: &'a Option<String>, key: &str) -> Result<&'a str, RelayError> {
        value
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| RelayError::missing_config(key))
    }

    fn log_keys(&self) {
        fn preview_opt(val: &Option<String>) -> String {
            match val {
                Some(v) if !v.is_empty() => {
                    let n = v.chars().take(5).map(char::len_utf8).sum::<usize>();
                    format!("{}...({} chars)", &v[..n], v.len())
                }
                _ => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  SUPABASE_URL: {}", preview_opt(&self.supabase_url));
        tracing::info!(
            "  SUPABASE_SERVICE_ROLE_KEY: {}",
            preview_opt(&self.supabase_service_role_key)
        );
        tracing::info!("  FACEBOOK_PIXEL_ID: {}", preview_opt(&self.facebook_pixel_id));
        tracing::info!(
            "  META_API_ACCESS_TOKEN: {}",
            preview_opt(&self.meta_api_access_token)
        );
        tracing::info!(
            "  NEXT_PUBLIC_GA4_MEASUREMENT_ID: {}",
            preview_opt(&self.ga4_measurement_id)
        );
        tracing::info!("  GA4_API_SECRET: {}", preview_opt(&self.ga4_api_secret));
        tracing::info!("  CRM_WEBHOOK_URL: {}", preview_opt(&self.crm_webhook_url));
    }
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
