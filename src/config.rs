use std::{fs::File, io::BufReader, path::Path, time::Duration};

use serde::Deserialize;

use crate::{structures::errors::UptimersError, watchdog::WatchdogSettings};

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// registered on startup, already known sites are left alone
    pub sites: Vec<String>,
    pub interval_secs: u64,
    pub timeout_secs: u64,
    /// most probes in flight at once
    pub concurrency: usize,
    /// store code 0 when a site gives no HTTP response at all
    pub record_network_failures: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sites: Vec::new(),
            interval_secs: 60,
            timeout_secs: 10,
            concurrency: 64,
            record_network_failures: true,
        }
    }
}

impl Config {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, UptimersError> {
        let config: Config = serde_yaml::from_reader(BufReader::new(File::open(path)?))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), UptimersError> {
        if self.interval_secs == 0 {
            return Err(UptimersError::Config("interval_secs must be above 0".into()));
        }
        if self.timeout_secs == 0 {
            return Err(UptimersError::Config("timeout_secs must be above 0".into()));
        }
        if self.concurrency == 0 {
            return Err(UptimersError::Config("concurrency must be above 0".into()));
        }
        Ok(())
    }

    pub fn watchdog(&self) -> WatchdogSettings {
        WatchdogSettings {
            interval: Duration::from_secs(self.interval_secs),
            timeout: Duration::from_secs(self.timeout_secs),
            concurrency: self.concurrency,
            record_network_failures: self.record_network_failures,
        }
    }
}
