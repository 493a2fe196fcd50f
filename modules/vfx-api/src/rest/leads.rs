use std::sync::Arc;

use axum::{extract::State, response::Json, Extension};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use vfx_common::{score_lead, RelayError};

use super::non_empty;
use crate::cookies::Visitor;
use crate::error::ApiResult;
use crate::leads::LeadRecord;
use crate::AppState;

/// Body of `POST /api/leads`, as the qualification form submits it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadRequest {
    name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    company: Option<String>,
    segment: Option<String>,
    monthly_revenue: Option<String>,
    sales_team_size: Option<String>,
    utm_source: Option<String>,
    utm_medium: Option<String>,
    utm_campaign: Option<String>,
    utm_term: Option<String>,
    utm_content: Option<String>,
    external_id: Option<String>,
}

fn required(value: Option<String>, field: &str) -> Result<String, RelayError> {
    non_empty(value).ok_or_else(|| RelayError::validation(format!("{field} is required")))
}

pub async fn api_leads(
    State(state): State<Arc<AppState>>,
    Extension(visitor): Extension<Visitor>,
    Json(body): Json<LeadRequest>,
) -> ApiResult<Json<Value>> {
    let store = state
        .leads
        .clone()
        .ok_or_else(|| RelayError::missing_config("SUPABASE_URL"))?;

    let name = required(body.name, "name")?;
    let email = required(body.email, "email")?;
    if !email.contains('@') {
        return Err(RelayError::validation("email is invalid").into());
    }
    let phone = required(body.phone, "phone")?;
    let segment = required(body.segment, "segment")?;
    let monthly_revenue = required(body.monthly_revenue, "monthlyRevenue")?;
    let sales_team_size = required(body.sales_team_size, "salesTeamSize")?;

    let result = score_lead(&segment, &monthly_revenue, &sales_team_size);

    let lead = LeadRecord {
        id: Uuid::new_v4(),
        name,
        email,
        phone,
        company: non_empty(body.company),
        segment,
        monthly_revenue,
        sales_team_size,
        utm_source: non_empty(body.utm_source),
        utm_medium: non_empty(body.utm_medium),
        utm_campaign: non_empty(body.utm_campaign),
        utm_term: non_empty(body.utm_term),
        utm_content: non_empty(body.utm_content),
        external_id: non_empty(body.external_id).or(Some(visitor.external_id)),
        score: result.score,
        is_qualified: result.is_qualified,
        score_reason: result.reason.clone(),
        score_details: result.log_details.clone(),
        created_at: chrono::Utc::now(),
    };

    store
        .insert(&lead)
        .await
        .map_err(|e| RelayError::Delivery(format!("Failed to save lead: {e}")))?;

    info!(
        lead_id = %lead.id,
        segment = %lead.segment,
        score = lead.score,
        qualified = lead.is_qualified,
        adjustments = ?result.log_details.adjustments,
        "Lead stored"
    );

    if let Some(url) = state.config.crm_webhook_url.clone() {
        forward_to_crm(&state, url, &lead);
    }

    Ok(Json(json!({
        "success": true,
        "score": result.score,
        "isQualified": result.is_qualified,
    })))
}

/// Fire-and-forget CRM notification. The lead is already stored, so a
/// failure here is only logged.
fn forward_to_crm(state: &Arc<AppState>, url: String, lead: &LeadRecord) {
    let payload = match serde_json::to_value(lead) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "Could not serialize lead for CRM webhook");
            return;
        }
    };
    let webhooks = state.webhooks.clone();
    let lead_id = lead.id;
    tokio::spawn(async move {
        if let Err(e) = webhooks.dispatch(&url, payload).await {
            warn!(%lead_id, error = %e, "CRM webhook failed");
        }
    });
}
