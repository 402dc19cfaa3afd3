use log::info;
use redb::{ReadableDatabase, ReadableTable, Table};
use time::OffsetDateTime;

use super::{decode_site, Store, SITES};
use crate::structures::{
    errors::UptimersError,
    model::{validate_site_key, Site},
};

impl Store {
    /// Add `key` to the registry. Returns `false` when it was already there,
    /// in which case the stored record is left untouched.
    pub fn register_site(&self, key: &str) -> Result<bool, UptimersError> {
        self.register_site_at(key, OffsetDateTime::now_utc())
    }

    pub(crate) fn register_site_at(
        &self,
        key: &str,
        now: OffsetDateTime,
    ) -> Result<bool, UptimersError> {
        validate_site_key(key)?;
        let txn = self.db.begin_write()?;
        let created = {
            let mut registry = txn.open_table(SITES)?;
            if get_in(&registry, key)?.is_some() {
                false
            } else {
                let value = serde_json::to_vec(&Site::new(now))?;
                registry.insert(key, value.as_slice())?;
                true
            }
        };
        txn.commit()?;
        if created {
            info!("Added {}", key);
        }
        Ok(created)
    }

    #[cfg(test)]
    pub fn get_site(&self, key: &str) -> Result<Option<Site>, UptimersError> {
        let txn = self.db.begin_read()?;
        let registry = txn.open_table(SITES)?;
        get_in(&registry, key)
    }

    /// All sites in key byte order.
    pub fn list_sites(&self) -> Result<Vec<(String, Site)>, UptimersError> {
        let txn = self.db.begin_read()?;
        let registry = txn.open_table(SITES)?;
        let mut sites = Vec::new();
        for entry in registry.iter()? {
            let (key, value) = entry?;
            sites.push((key.value().to_string(), decode_site(value.value())?));
        }
        Ok(sites)
    }

    /// Only `Store::record_probe` touches sites outside of tests, inside its
    /// own transaction.
    #[cfg(test)]
    pub fn touch_last_check(&self, key: &str, at: OffsetDateTime) -> Result<(), UptimersError> {
        let txn = self.db.begin_write()?;
        {
            let mut registry = txn.open_table(SITES)?;
            touch_in(&mut registry, key, at)?;
        }
        txn.commit()?;
        Ok(())
    }
}

pub(super) fn get_in<T: ReadableTable<&'static str, &'static [u8]>>(
    registry: &T,
    key: &str,
) -> Result<Option<Site>, UptimersError> {
    match registry.get(key)? {
        Some(value) => Ok(Some(decode_site(value.value())?)),
        None => Ok(None),
    }
}

pub(super) fn touch_in(
    registry: &mut Table<'_, &'static str, &'static [u8]>,
    key: &str,
    at: OffsetDateTime,
) -> Result<(), UptimersError> {
    let mut site =
        get_in(&*registry, key)?.ok_or_else(|| UptimersError::NotFound(key.to_string()))?;
    site.last_check = at;
    let value = serde_json::to_vec(&site)?;
    registry.insert(key, value.as_slice())?;
    Ok(())
}
