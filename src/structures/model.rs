use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::errors::UptimersError;

/// Reserved between the site key and the timestamp in status log keys.
pub const SEPARATOR: char = '|';

/// Recorded when a probe never got an HTTP response back. Outside the range
/// of real status codes, so it never collides with what a server sends.
pub const PROBE_FAILURE_CODE: u16 = 0;

/// Registry entry for one watched URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    #[serde(with = "time::serde::rfc3339")]
    pub first_check: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_check: OffsetDateTime,
}

impl Site {
    pub fn new(now: OffsetDateTime) -> Self {
        Self {
            first_check: now,
            last_check: now,
        }
    }
}

/// One probe result from the status log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusRecord {
    #[serde(with = "time::serde::rfc3339")]
    pub time: OffsetDateTime,
    pub code: u16,
}

/// Read-time view of a site, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteStatus {
    pub key: String,
    pub status: u16,
    pub status_text: String,
    pub uptime: String,
    #[serde(with = "time::serde::rfc3339")]
    pub first_check: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_check: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteDetail {
    #[serde(flatten)]
    pub status: SiteStatus,
    pub history: Vec<StatusRecord>,
}

/// Site keys are absolute http(s) URLs that never contain the log separator.
pub fn validate_site_key(key: &str) -> Result<(), UptimersError> {
    if key.contains(SEPARATOR) {
        return Err(UptimersError::Validation(format!(
            "site key must not contain '{}': {}",
            SEPARATOR, key
        )));
    }
    let url = reqwest::Url::parse(key)
        .map_err(|e| UptimersError::Validation(format!("invalid url {}: {}", key, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(UptimersError::Validation(format!(
            "unsupported scheme {} in {}",
            scheme, key
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn accepts_http_and_https() {
        assert!(validate_site_key("http://example.com").is_ok());
        assert!(validate_site_key("https://example.com/health?x=1").is_ok());
    }

    #[test]
    fn rejects_separator_and_bad_urls() {
        for key in ["", "example.com", "ftp://example.com", "http://a|b"] {
            assert!(
                matches!(validate_site_key(key), Err(UptimersError::Validation(_))),
                "{key} should be rejected"
            );
        }
    }

    #[test]
    fn site_status_uses_api_field_names() {
        let at = datetime!(2024-05-01 10:00:00 UTC);
        let status = SiteStatus {
            key: "http://x".to_string(),
            status: 200,
            status_text: "OK".to_string(),
            uptime: "0s".to_string(),
            first_check: at,
            last_check: at,
        };
        let json = serde_json::to_value(SiteDetail {
            status,
            history: vec![StatusRecord { time: at, code: 200 }],
        })
        .unwrap();

        assert_eq!(json["key"], "http://x");
        assert_eq!(json["statusText"], "OK");
        assert_eq!(json["firstCheck"], "2024-05-01T10:00:00Z");
        assert_eq!(json["lastCheck"], "2024-05-01T10:00:00Z");
        assert_eq!(json["history"][0]["code"], 200);
        assert_eq!(json["history"][0]["time"], "2024-05-01T10:00:00Z");
    }

    #[test]
    fn site_round_trips_through_json() {
        let site = Site::new(datetime!(2024-05-01 10:00:00.5 UTC));
        let bytes = serde_json::to_vec(&site).unwrap();
        let back: Site = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(site, back);
    }
}
