use redb::{ReadableTable, Table};
use time::{
    format_description::BorrowedFormatItem, macros::format_description, Duration, OffsetDateTime,
    PrimitiveDateTime, UtcOffset,
};

use super::{Store, STATUS};
use crate::structures::{
    errors::UptimersError,
    model::{StatusRecord, SEPARATOR},
};

/// Fixed-width UTC timestamp, so byte order matches time order.
const TIMESTAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:9]Z");

/// The next character after the separator, bounding a site's key range.
const SEPARATOR_END: char = '}';

fn status_key(site: &str, at: OffsetDateTime) -> Result<String, UptimersError> {
    let stamp = at.to_offset(UtcOffset::UTC).format(TIMESTAMP)?;
    Ok(format!("{}{}{}", site, SEPARATOR, stamp))
}

fn parse_stamp(stamp: &str) -> Result<OffsetDateTime, UptimersError> {
    Ok(PrimitiveDateTime::parse(stamp, TIMESTAMP)?.assume_utc())
}

/// Half-open key range holding exactly `site`'s entries.
fn bounds(site: &str) -> (String, String) {
    (
        format!("{}{}", site, SEPARATOR),
        format!("{}{}", site, SEPARATOR_END),
    )
}

// Production writes go through `Store::record_probe` and reads through the
// snapshot queries, both built on the table helpers below.
#[cfg(test)]
impl Store {
    /// Append one probe result for a registered site. When `at` is not after
    /// the latest entry for `site` it is moved to 1ns past it; the stored time
    /// is returned.
    pub fn append_status(
        &self,
        site: &str,
        at: OffsetDateTime,
        code: u16,
    ) -> Result<OffsetDateTime, UptimersError> {
        use super::{sites, SITES};

        let txn = self.db.begin_write()?;
        let stored = {
            let registry = txn.open_table(SITES)?;
            if sites::get_in(&registry, site)?.is_none() {
                return Err(UptimersError::NotFound(site.to_string()));
            }
            let mut log = txn.open_table(STATUS)?;
            append_in(&mut log, site, at, code)?
        };
        txn.commit()?;
        Ok(stored)
    }

    /// `site`'s history in ascending time order, empty if never probed.
    pub fn scan_status(&self, site: &str) -> Result<Vec<StatusRecord>, UptimersError> {
        use redb::ReadableDatabase;

        let txn = self.db.begin_read()?;
        let log = txn.open_table(STATUS)?;
        scan_in(&log, site)
    }
}

pub(super) fn scan_in<T: ReadableTable<&'static str, u16>>(
    log: &T,
    site: &str,
) -> Result<Vec<StatusRecord>, UptimersError> {
    let (start, end) = bounds(site);
    let mut history = Vec::new();
    for entry in log.range(start.as_str()..end.as_str())? {
        let (key, code) = entry?;
        let time = parse_stamp(&key.value()[start.len()..])?;
        history.push(StatusRecord {
            time,
            code: code.value(),
        });
    }
    Ok(history)
}

fn latest_in<T: ReadableTable<&'static str, u16>>(
    log: &T,
    site: &str,
) -> Result<Option<OffsetDateTime>, UptimersError> {
    let (start, end) = bounds(site);
    let last = log.range(start.as_str()..end.as_str())?.next_back();
    match last {
        Some(entry) => {
            let (key, _) = entry?;
            Ok(Some(parse_stamp(&key.value()[start.len()..])?))
        }
        None => Ok(None),
    }
}

pub(super) fn append_in(
    log: &mut Table<'_, &'static str, u16>,
    site: &str,
    at: OffsetDateTime,
    code: u16,
) -> Result<OffsetDateTime, UptimersError> {
    let at = match latest_in(&*log, site)? {
        Some(latest) if at <= latest => latest + Duration::nanoseconds(1),
        _ => at.to_offset(UtcOffset::UTC),
    };
    let key = status_key(site, at)?;
    log.insert(key.as_str(), code)?;
    Ok(at)
}
