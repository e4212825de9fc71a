// Set-Cookie rewrite for OAuth callback responses
//
// The SPA and the API live on different subdomains, so cookies issued by the
// callback must carry the shared parent Domain and SameSite=None. Browsers drop
// SameSite=None cookies without Secure, so Secure is added when missing.

use axum::http::{header, HeaderMap, HeaderValue};
use regex::Regex;
use std::sync::OnceLock;

fn domain_attr() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)Domain=[^;]*").expect("static regex is valid"))
}

fn same_site_attr() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)SameSite=[^;]*").expect("static regex is valid"))
}

fn secure_attr() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(^|;)\s*Secure\s*(;|$)").expect("static regex is valid"))
}

/// Rewrite a single Set-Cookie value
pub fn rewrite_cookie(cookie: &str, domain: &str) -> String {
    let domain_value = format!("Domain={}", domain);
    let mut rewritten = if domain_attr().is_match(cookie) {
        domain_attr()
            .replace_all(cookie, domain_value.as_str())
            .into_owned()
    } else {
        format!("{}; {}", cookie, domain_value)
    };

    rewritten = if same_site_attr().is_match(&rewritten) {
        same_site_attr()
            .replace_all(&rewritten, "SameSite=None")
            .into_owned()
    } else {
        format!("{}; SameSite=None", rewritten)
    };

    if !secure_attr().is_match(&rewritten) {
        rewritten.push_str("; Secure");
    }
    rewritten
}

/// Rewrite every Set-Cookie header in place; returns how many were rewritten.
/// Values that cannot be rewritten are kept unchanged.
pub fn rewrite_set_cookie_headers(headers: &mut HeaderMap, domain: &str) -> usize {
    let originals: Vec<HeaderValue> = headers
        .get_all(header::SET_COOKIE)
        .iter()
        .cloned()
        .collect();
    headers.remove(header::SET_COOKIE);

    let mut count = 0;
    for original in originals {
        let Ok(cookie) = original.to_str() else {
            tracing::warn!("Keeping non-ASCII Set-Cookie value without rewrite");
            headers.append(header::SET_COOKIE, original);
            continue;
        };
        match HeaderValue::from_str(&rewrite_cookie(cookie, domain)) {
            Ok(value) => {
                headers.append(header::SET_COOKIE, value);
                count += 1;
            }
            Err(e) => {
                tracing::warn!("Keeping Set-Cookie value that cannot be rewritten: {}", e);
                headers.append(header::SET_COOKIE, original);
            }
        }
    }
    count
}
