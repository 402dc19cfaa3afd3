//! Embedded redb store holding the site registry and the status log.
//!
//! The two live in separate tables and are written independently, except
//! for [`Store::record_probe`] which commits a status entry together with
//! the matching `lastCheck` update.

mod sites;
mod status;

use std::{path::Path, sync::Arc};

use log::debug;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use crate::structures::{
    errors::UptimersError,
    model::{Site, StatusRecord},
};

/// Site URL to JSON-encoded [`Site`].
const SITES: TableDefinition<&str, &[u8]> = TableDefinition::new("Sites");

/// `<site URL>|<UTC timestamp>` to HTTP status code.
const STATUS: TableDefinition<&str, u16> = TableDefinition::new("Status");

/// Handle to the database, cheap to clone and shared by the routes and the watchdog.
#[derive(Clone)]
pub struct Store {
    db: Arc<Database>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, UptimersError> {
        let db = Database::create(path.as_ref())?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("opened store at {}", path.as_ref().display());
        Ok(store)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, UptimersError> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder().create_with_backend(backend)?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        Ok(store)
    }

    fn ensure_tables(&self) -> Result<(), UptimersError> {
        let txn = self.db.begin_write()?;
        txn.open_table(SITES)?;
        txn.open_table(STATUS)?;
        txn.commit()?;
        Ok(())
    }

    /// Every registered site with its full history, read from one snapshot.
    pub fn sites_with_history(
        &self,
    ) -> Result<Vec<(String, Site, Vec<StatusRecord>)>, UptimersError> {
        let txn = self.db.begin_read()?;
        let registry = txn.open_table(SITES)?;
        let statuses = txn.open_table(STATUS)?;

        let mut out = Vec::new();
        for entry in registry.iter()? {
            let (key, value) = entry?;
            let key = key.value().to_string();
            let site = decode_site(value.value())?;
            let history = status::scan_in(&statuses, &key)?;
            out.push((key, site, history));
        }
        Ok(out)
    }

    /// One site and its history from a single snapshot, `None` if unregistered.
    pub fn site_with_history(
        &self,
        key: &str,
    ) -> Result<Option<(Site, Vec<StatusRecord>)>, UptimersError> {
        let txn = self.db.begin_read()?;
        let registry = txn.open_table(SITES)?;
        let Some(site) = sites::get_in(&registry, key)? else {
            return Ok(None);
        };
        let statuses = txn.open_table(STATUS)?;
        let history = status::scan_in(&statuses, key)?;
        Ok(Some((site, history)))
    }

    /// Append a probe result and bump `lastCheck` in one transaction.
    ///
    /// Fails with `NotFound` instead of writing a status entry for a site
    /// that is not in the registry. Returns the timestamp actually stored.
    pub fn record_probe(
        &self,
        key: &str,
        at: time::OffsetDateTime,
        code: u16,
    ) -> Result<time::OffsetDateTime, UptimersError> {
        let txn = self.db.begin_write()?;
        let stored = {
            let mut registry = txn.open_table(SITES)?;
            if sites::get_in(&registry, key)?.is_none() {
                return Err(UptimersError::NotFound(key.to_string()));
            }
            let mut log = txn.open_table(STATUS)?;
            let stored = status::append_in(&mut log, key, at, code)?;
            sites::touch_in(&mut registry, key, stored)?;
            stored
        };
        txn.commit()?;
        debug!("recorded {} for {} at {}", code, key, stored);
        Ok(stored)
    }
}

fn decode_site(bytes: &[u8]) -> Result<Site, UptimersError> {
    Ok(serde_json::from_slice(bytes)?)
}
