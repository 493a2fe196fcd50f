use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use vfx_common::scoring::ScoreLogDetails;

const LEADS_TABLE: &str = "leads";

#[derive(Debug, Error)]
pub enum LeadStoreError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Lead rejected (status {status}): {body}")]
    Rejected { status: u16, body: String },
}

impl From<reqwest::Error> for LeadStoreError {
    fn from(err: reqwest::Error) -> Self {
        LeadStoreError::Network(err.to_string())
    }
}

/// A scored lead as persisted in the `leads` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadRecord {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub company: Option<String>,
    pub segment: String,
    pub monthly_revenue: String,
    pub sales_team_size: String,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,
    pub external_id: Option<String>,
    pub score: u32,
    pub is_qualified: bool,
    pub score_reason: String,
    pub score_details: ScoreLogDetails,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn insert(&self, lead: &LeadRecord) -> Result<(), LeadStoreError>;
}

/// Inserts rows through Supabase's PostgREST endpoint.
pub struct SupabaseLeadStore {
    client: reqwest::Client,
    base_url: String,
    service_role_key: String,
}

impl SupabaseLeadStore {
    pub fn new(base_url: &str, service_role_key: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_role_key: service_role_key.to_string(),
        }
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{LEADS_TABLE}", self.base_url)
    }
}

#[async_trait]
impl LeadStore for SupabaseLeadStore {
    async fn insert(&self, lead: &LeadRecord) -> Result<(), LeadStoreError> {
        let resp = self
            .client
            .post(self.table_url())
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
            .header("Prefer", "return=minimal")
            .json(lead)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LeadStoreError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// In-process store for tests and local runs without Supabase.
#[derive(Default)]
pub struct MemoryLeadStore {
    leads: Mutex<Vec<LeadRecord>>,
}

impl MemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn leads(&self) -> Vec<LeadRecord> {
        self.leads.lock().unwrap().clone()
    }
}

#[async_trait]
impl LeadStore for MemoryLeadStore {
    async fn insert(&self, lead: &LeadRecord) -> Result<(), LeadStoreError> {
        self.leads.lock().unwrap().push(lead.clone());
        Ok(())
    }
}
