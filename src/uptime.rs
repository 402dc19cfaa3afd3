//! Availability derived from a site's status history.

use reqwest::StatusCode;
use time::Duration;

use crate::{
    store::Store,
    structures::{
        errors::UptimersError,
        model::{Site, SiteDetail, SiteStatus, StatusRecord, PROBE_FAILURE_CODE},
    },
};

/// Real responses below this count as the site being up.
const FIRST_FAILURE_CODE: u16 = 400;

fn is_up(code: u16) -> bool {
    code != PROBE_FAILURE_CODE && code < FIRST_FAILURE_CODE
}

/// `(status, status text, uptime)` for an ascending history. An empty
/// history reads `(0, "", "0s")`; a site whose latest probe got no response
/// reads `(0, "Unreachable", "0s")`.
///
/// Uptime is the span of the success run that ends at the latest record,
/// so it reads `0s` when the latest probe failed, when there is a single
/// record, or when there is no history at all.
pub fn compute_site_status(history: &[StatusRecord]) -> (u16, String, String) {
    let Some(latest) = history.last() else {
        return (0, String::new(), format_duration(Duration::ZERO));
    };

    let mut run_start: Option<&StatusRecord> = None;
    for record in history {
        if is_up(record.code) {
            run_start.get_or_insert(record);
        } else {
            run_start = None;
        }
    }

    let uptime = match run_start {
        Some(start) => latest.time - start.time,
        None => Duration::ZERO,
    };
    (
        latest.code,
        status_text(latest.code).to_string(),
        format_duration(uptime),
    )
}

pub fn status_text(code: u16) -> &'static str {
    if code == PROBE_FAILURE_CODE {
        return "Unreachable";
    }
    StatusCode::from_u16(code)
        .ok()
        .and_then(|status| status.canonical_reason())
        .unwrap_or("")
}

/// Whole-second rendering in the `2h3m1s` style. Negative spans clamp to `0s`.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.whole_seconds().max(0);
    let (hours, minutes, seconds) = (total / 3600, total / 60 % 60, total % 60);
    match (hours, minutes) {
        (0, 0) => format!("{}s", seconds),
        (0, _) => format!("{}m{}s", minutes, seconds),
        _ => format!("{}h{}m{}s", hours, minutes, seconds),
    }
}

pub fn site_status(key: String, site: &Site, history: &[StatusRecord]) -> SiteStatus {
    let (status, status_text, uptime) = compute_site_status(history);
    SiteStatus {
        key,
        status,
        status_text,
        uptime,
        first_check: site.first_check,
        last_check: site.last_check,
    }
}

pub fn list_site_statuses(store: &Store) -> Result<Vec<SiteStatus>, UptimersError> {
    Ok(store
        .sites_with_history()?
        .into_iter()
        .map(|(key, site, history)| site_status(key, &site, &history))
        .collect())
}

pub fn get_site_detail(store: &Store, key: &str) -> Result<SiteDetail, UptimersError> {
    let (site, history) = store
        .site_with_history(key)?
        .ok_or_else(|| UptimersError::NotFound(key.to_string()))?;
    Ok(SiteDetail {
        status: site_status(key.to_string(), &site, &history),
        history,
    })
}
