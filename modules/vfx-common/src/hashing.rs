//! PII normalization and hashing for server-side conversion events.
//!
//! Meta and Google match users on SHA-256 digests of normalized identifiers.
//! Every function here degrades to an empty string instead of failing: a
//! missing hash lowers match quality but must never block the event.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Country calling code prepended to national phone numbers.
pub const DEFAULT_COUNTRY_CODE: &str = "55";

static NON_DIGIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\D").unwrap());
static SHA256_HEX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9a-f]{64}$").unwrap());

/// SHA-256 hex digest of the trimmed, lower-cased input.
/// Empty input hashes to an empty string. Values that already look like a
/// SHA-256 hex digest are passed through so prehashed client data is not
/// double-hashed.
pub fn hash_data(value: &str) -> String {
    let normalized = value.trim().to_lowercase();
    if normalized.is_empty() {
        return String::new();
    }
    if is_sha256_hex(&normalized) {
        return normalized;
    }
    hex::encode(Sha256::digest(normalized.as_bytes()))
}

pub fn is_sha256_hex(value: &str) -> bool {
    SHA256_HEX_RE.is_match(value)
}

/// Reduce a phone number to digits and make sure it carries a country code.
///
/// Numbers written with a leading `+` already carry their country code.
/// National numbers (10 or 11 digits: area code plus 8 or 9 digit subscriber)
/// get the default country code. Returns `None` when no digits remain.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let international = raw.trim_start().starts_with('+');
    let digits = NON_DIGIT_RE.replace_all(raw, "");
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return None;
    }

    if !international && (10..=11).contains(&digits.len()) {
        return Some(format!("{DEFAULT_COUNTRY_CODE}{digits}"));
    }
    Some(digits.to_string())
}

pub fn hash_phone(raw: &str) -> String {
    normalize_phone(raw)
        .map(|p| hash_data(&p))
        .unwrap_or_default()
}

/// Split a full name on the first space into `(first, last)`.
/// Single-word names yield an empty last name.
pub fn split_name(full_name: &str) -> (String, String) {
    let trimmed = full_name.trim();
    match trimmed.split_once(' ') {
        Some((first, rest)) => (first.to_string(), rest.trim().to_string()),
        None => (trimmed.to_string(), String::new()),
    }
}

/// Plain identifiers collected from a form or a client payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserIdentity {
    #[serde(default, alias = "em")]
    pub email: Option<String>,
    #[serde(default, alias = "ph")]
    pub phone: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "fn")]
    pub first_name: Option<String>,
    #[serde(default, alias = "ln")]
    pub last_name: Option<String>,
    #[serde(default, alias = "ct")]
    pub city: Option<String>,
    #[serde(default, alias = "st")]
    pub state: Option<String>,
    #[serde(default, alias = "zp")]
    pub zip: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub external_id: Option<String>,
}

/// Hashed identifiers in Meta's `user_data` field naming.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HashedUserData {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub em: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ph: String,
    #[serde(rename = "fn", default, skip_serializing_if = "String::is_empty")]
    pub first_name: String,
    #[serde(rename = "ln", default, skip_serializing_if = "String::is_empty")]
    pub last_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ct: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub st: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub zp: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub country: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub external_id: String,
}

/// Hash every identifier present in `identity`.
///
/// Explicit first/last names win over a split of the full name.
pub fn hash_user_data(identity: &UserIdentity) -> HashedUserData {
    let hash_opt = |v: &Option<String>| v.as_deref().map(hash_data).unwrap_or_default();

    let (split_first, split_last) = identity
        .name
        .as_deref()
        .map(split_name)
        .unwrap_or_default();
    let first = identity.first_name.clone().unwrap_or(split_first);
    let last = identity.last_name.clone().unwrap_or(split_last);

    HashedUserData {
        em: hash_opt(&identity.email),
        ph: identity.phone.as_deref().map(hash_phone).unwrap_or_default(),
        first_name: hash_data(&first),
        last_name: hash_data(&last),
        ct: hash_data(&strip_spaces(identity.city.as_deref())),
        st: hash_opt(&identity.state),
        zp: hash_data(&strip_spaces(identity.zip.as_deref())),
        country: hash_opt(&identity.country),
        external_id: hash_opt(&identity.external_id),
    }
}

fn strip_spaces(value: Option<&str>) -> String {
    value
        .map(|v| v.chars().filter(|c| !c.is_whitespace()).collect())
        .unwrap_or_default()
}
