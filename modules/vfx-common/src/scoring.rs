use serde::{Deserialize, Serialize};

/// Segments that are never a fit, whatever their revenue or team size.
pub const DISQUALIFIED_SEGMENTS: &[&str] = &["ecommerce", "infoproduto", "afiliado", "outro"];

/// Segments that stay qualified but are pinned to the minimum score.
pub const REDUCED_SCORE_SEGMENTS: &[&str] = &["varejo", "servicos-locais"];

/// Segments that are pinned to the maximum score.
pub const PREMIUM_SEGMENTS: &[&str] = &["industria", "distribuidora"];

/// Revenue band that disqualifies outright.
pub const DISQUALIFYING_REVENUE: &str = "ate-10k";

pub const REDUCED_SCORE: u32 = 1;
pub const PREMIUM_SCORE: u32 = 100;

const REVENUE_POINTS: &[(&str, u32)] = &[
    ("11k-50k", 5),
    ("51k-100k", 30),
    ("101k-400k", 40),
    ("401k-1m", 80),
    ("1m+", 100),
];

const TEAM_SIZE_POINTS: &[(&str, u32)] = &[
    ("somente-dono", 1),
    ("1-3", 5),
    ("4-10", 15),
    ("11-20", 50),
    ("20+", 100),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreLogDetails {
    pub segment: String,
    pub monthly_revenue: String,
    pub sales_team_size: String,
    /// One entry per rule that touched the score, in application order.
    pub adjustments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadScoreResult {
    pub score: u32,
    pub is_qualified: bool,
    pub reason: String,
    pub log_details: ScoreLogDetails,
}

fn lookup(table: &[(&str, u32)], key: &str) -> Option<u32> {
    table.iter().find(|(k, _)| *k == key).map(|(_, p)| *p)
}

/// Score a lead from its categorical form answers.
///
/// Rules run in a fixed order and later rules override earlier ones: the
/// reduced and premium segment overrides replace whatever the tier tables
/// accumulated.
pub fn score_lead(segment: &str, monthly_revenue: &str, sales_team_size: &str) -> LeadScoreResult {
    let segment = segment.trim();
    let monthly_revenue = monthly_revenue.trim();
    let sales_team_size = sales_team_size.trim();

    let mut details = ScoreLogDetails {
        segment: segment.to_string(),
        monthly_revenue: monthly_revenue.to_string(),
        sales_team_size: sales_team_size.to_string(),
        adjustments: Vec::new(),
    };

    if DISQUALIFIED_SEGMENTS.contains(&segment) {
        details
            .adjustments
            .push(format!("segment '{segment}' is disqualified: score = 0"));
        return finish(0, format!("Disqualified segment: {segment}"), details);
    }

    if monthly_revenue == DISQUALIFYING_REVENUE {
        details
            .adjustments
            .push(format!("revenue '{monthly_revenue}' is below minimum: score = 0"));
        return finish(
            0,
            format!("Monthly revenue below minimum: {monthly_revenue}"),
            details,
        );
    }

    let mut score = 0;

    match lookup(REVENUE_POINTS, monthly_revenue) {
        Some(points) => {
            score += points;
            details
                .adjustments
                .push(format!("revenue '{monthly_revenue}': +{points} (total {score})"));
        }
        None => details
            .adjustments
            .push(format!("revenue '{monthly_revenue}' not recognized: +0")),
    }

    match lookup(TEAM_SIZE_POINTS, sales_team_size) {
        Some(points) => {
            score += points;
            details
                .adjustments
                .push(format!("team size '{sales_team_size}': +{points} (total {score})"));
        }
        None => details
            .adjustments
            .push(format!("team size '{sales_team_size}' not recognized: +0")),
    }

    let mut reason = format!("Tier score: revenue {monthly_revenue}, team {sales_team_size}");

    if REDUCED_SCORE_SEGMENTS.contains(&segment) {
        details.adjustments.push(format!(
            "segment '{segment}' has reduced score: {score} -> {REDUCED_SCORE}"
        ));
        score = REDUCED_SCORE;
        reason = format!("Reduced-score segment: {segment}");
    }

    if PREMIUM_SEGMENTS.contains(&segment) {
        details.adjustments.push(format!(
            "segment '{segment}' is premium: {score} -> {PREMIUM_SCORE}"
        ));
        score = PREMIUM_SCORE;
        reason = format!("Premium segment: {segment}");
    }

    finish(score, reason, details)
}

fn finish(score: u32, reason: String, log_details: ScoreLogDetails) -> LeadScoreResult {
    tracing::debug!(
        score,
        segment = %log_details.segment,
        adjustments = ?log_details.adjustments,
        "Lead scored"
    );
    LeadScoreResult {
        score,
        is_qualified: score > 0,
        reason,
        log_details,
    }
}
