use axum::{
    extract::Request,
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

pub const EXTERNAL_ID_COOKIE: &str = "_vfx_extid";
pub const META_DATA_COOKIE: &str = "__meta_data";
pub const FBP_COOKIE: &str = "_fbp";
pub const FBC_COOKIE: &str = "_fbc";

const EXTERNAL_ID_MAX_AGE_SECS: i64 = 365 * 24 * 3600;
const META_DATA_MAX_AGE_SECS: i64 = 3600;

const COUNTRY_HEADER: &str = "x-vercel-ip-country";
const REGION_HEADER: &str = "x-vercel-ip-country-region";
const CITY_HEADER: &str = "x-vercel-ip-city";

/// Identifiers for the current visitor, available to handlers as an
/// `Extension<Visitor>`.
#[derive(Debug, Clone, Default)]
pub struct Visitor {
    pub external_id: String,
    pub fbp: Option<String>,
    pub fbc: Option<String>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Attach a [`Visitor`] to every request and set the `_vfx_extid` and
/// `__meta_data` cookies when the browser does not carry them yet.
pub async fn visitor_cookies(mut req: Request, next: Next) -> Response {
    let headers = req.headers();
    let cookie_header = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let existing_id = parse_cookie(cookie_header, EXTERNAL_ID_COOKIE)
        .filter(|v| !v.is_empty())
        .map(String::from);
    let has_meta_data = parse_cookie(cookie_header, META_DATA_COOKIE).is_some();

    let visitor = Visitor {
        external_id: existing_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        fbp: parse_cookie(cookie_header, FBP_COOKIE).map(String::from),
        fbc: parse_cookie(cookie_header, FBC_COOKIE).map(String::from),
        client_ip: client_ip(headers),
        user_agent: header_str(headers, header::USER_AGENT.as_str()),
    };

    let meta_data = (!has_meta_data).then(|| meta_data_snapshot(headers, &visitor));

    req.extensions_mut().insert(visitor.clone());
    let mut resp = next.run(req).await;

    if existing_id.is_none() {
        append_cookie(
            &mut resp,
            &cookie(EXTERNAL_ID_COOKIE, &visitor.external_id, EXTERNAL_ID_MAX_AGE_SECS),
        );
    }
    if let Some(snapshot) = meta_data {
        append_cookie(
            &mut resp,
            &cookie(META_DATA_COOKIE, &snapshot, META_DATA_MAX_AGE_SECS),
        );
    }
    resp
}

/// JSON snapshot of the request context Meta matches on, URL-encoded for
/// use as a cookie value.
fn meta_data_snapshot(headers: &HeaderMap, visitor: &Visitor) -> String {
    let snapshot = json!({
        "ip": visitor.client_ip,
        "userAgent": visitor.user_agent,
        "country": header_str(headers, COUNTRY_HEADER),
        "region": header_str(headers, REGION_HEADER),
        "city": header_str(headers, CITY_HEADER),
        "fbp": visitor.fbp,
        "fbc": visitor.fbc,
    });
    url::form_urlencoded::byte_serialize(snapshot.to_string().as_bytes()).collect()
}

/// Build a Set-Cookie header value.
/// In release builds, adds `Secure` flag to prevent transmission over HTTP.
fn cookie(name: &str, value: &str, max_age: i64) -> String {
    let secure = if cfg!(debug_assertions) { "" } else { "; Secure" };
    format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}{secure}")
}

fn append_cookie(resp: &mut Response, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(v) => {
            resp.headers_mut().append(header::SET_COOKIE, v);
        }
        Err(e) => warn!(error = %e, "Skipping unencodable cookie"),
    }
}

/// First hop of `X-Forwarded-For`, else `X-Real-IP`.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    header_str(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
        .filter(|ip| !ip.is_empty())
        .or_else(|| header_str(headers, "x-real-ip"))
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Parse a specific cookie from the Cookie header string.
pub fn parse_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|part| {
        part.trim()
            .strip_prefix(name)
            .and_then(|rest| rest.strip_prefix('='))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cookie_finds_exact_name() {
        let header = "_fbp=fb.1.123.456; _vfx_extid=abc; _fbc=fb.1.9.click";
        assert_eq!(parse_cookie(header, "_vfx_extid"), Some("abc"));
        assert_eq!(parse_cookie(header, "_fbc"), Some("fb.1.9.click"));
        assert_eq!(parse_cookie(header, "_fb"), None);
        assert_eq!(parse_cookie("", "_fbp"), None);
    }

    #[test]
    fn client_ip_prefers_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.7"));

        headers.remove("x-forwarded-for");
        assert_eq!(client_ip(&headers).as_deref(), Some("10.0.0.2"));
    }

    #[test]
    fn cookie_is_http_only() {
        let value = cookie(EXTERNAL_ID_COOKIE, "abc", EXTERNAL_ID_MAX_AGE_SECS);
        assert!(value.starts_with("_vfx_extid=abc; Path=/; HttpOnly"));
        assert!(value.contains("Max-Age=31536000"));
    }

    #[test]
    fn meta_snapshot_is_cookie_safe() {
        let mut headers = HeaderMap::new();
        headers.insert(COUNTRY_HEADER, HeaderValue::from_static("BR"));
        let visitor = Visitor {
            client_ip: Some("203.0.113.7".into()),
            fbp: Some("fb.1.2.3".into()),
            ..Default::default()
        };
        let encoded = meta_data_snapshot(&headers, &visitor);
        assert!(HeaderValue::from_str(&encoded).is_ok());
        assert!(!encoded.contains(';'));
        assert!(!encoded.contains(','));
    }
}
