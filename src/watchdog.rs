//! Periodic prober writing one status entry per registered site per tick.

use std::time::Duration;

use futures::{stream, StreamExt};
use log::{debug, error, info, warn};
use reqwest::Client;
use time::OffsetDateTime;
use tokio::{
    task::spawn_blocking,
    time::{interval, MissedTickBehavior},
};

use crate::{store::Store, structures::model::PROBE_FAILURE_CODE};

#[derive(Debug, Clone)]
pub struct WatchdogSettings {
    pub interval: Duration,
    /// per probe, covering connect and response headers
    pub timeout: Duration,
    pub concurrency: usize,
    pub record_network_failures: bool,
}

/// Tally of one polling cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub probed: usize,
    /// status entries written, sentinel entries included
    pub recorded: usize,
    /// probes that got no HTTP response
    pub unreachable: usize,
    /// probes whose result could not be stored
    pub failed: usize,
}

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Recorded { reachable: bool },
    Skipped,
    Failed,
}

#[derive(Debug)]
pub struct Watchdog {
    store: Store,
    client: Client,
    settings: WatchdogSettings,
}

impl Watchdog {
    pub fn new(store: Store, client: Client, settings: WatchdogSettings) -> Self {
        Self {
            store,
            client,
            settings,
        }
    }

    /// Poll forever. A cycle always finishes before the next one starts;
    /// ticks missed by a slow cycle are not made up.
    pub async fn run(self) {
        info!(
            "Watchdog polling every {:?} with a {:?} probe timeout",
            self.settings.interval, self.settings.timeout
        );
        let mut ticker = interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let report = self.poll_once().await;
            info!(
                "Polled {} sites: {} recorded, {} unreachable, {} failed",
                report.probed, report.recorded, report.unreachable, report.failed
            );
        }
    }

    /// Probe every site currently in the registry once.
    pub async fn poll_once(&self) -> CycleReport {
        let store = self.store.clone();
        let sites = match spawn_blocking(move || store.list_sites()).await {
            Ok(Ok(sites)) => sites,
            Ok(Err(e)) => {
                error!("Failed to read sites: {}", e);
                return CycleReport::default();
            }
            Err(e) => {
                error!("Site listing task failed: {}", e);
                return CycleReport::default();
            }
        };

        stream::iter(sites)
            .map(|(key, _)| self.check_site(key))
            .buffer_unordered(self.settings.concurrency)
            .fold(CycleReport::default(), |mut report, outcome| async move {
                report.probed += 1;
                match outcome {
                    Outcome::Recorded { reachable } => {
                        report.recorded += 1;
                        if !reachable {
                            report.unreachable += 1;
                        }
                    }
                    Outcome::Skipped => report.unreachable += 1,
                    Outcome::Failed => report.failed += 1,
                }
                report
            })
            .await
    }

    async fn check_site(&self, key: String) -> Outcome {
        let (code, reachable) = match self
            .client
            .get(&key)
            .timeout(self.settings.timeout)
            .send()
            .await
        {
            Ok(response) => {
                let status = response.status();
                debug!("Connected to {}: {}", key, status);
                (status.as_u16(), true)
            }
            Err(e) => {
                warn!("Failed to connect to {}: {}", key, e);
                if !self.settings.record_network_failures {
                    return Outcome::Skipped;
                }
                (PROBE_FAILURE_CODE, false)
            }
        };

        let store = self.store.clone();
        let now = OffsetDateTime::now_utc();
        let written = spawn_blocking(move || {
            let result = store.record_probe(&key, now, code);
            (key, result)
        })
        .await;
        match written {
            Ok((_, Ok(_))) => Outcome::Recorded { reachable },
            Ok((key, Err(e))) => {
                error!("Failed to record status {} for {}: {}", code, key, e);
                Outcome::Failed
            }
            Err(e) => {
                error!("Status write task failed: {}", e);
                Outcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    /// Answers every request with `code` and an empty body.
    async fn answering_site(code: u16) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let _ = socket.read(&mut buf).await;
                    let response = format!(
                        "HTTP/1.1 {} Status\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                        code
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                });
            }
        });
        format!("http://{}/", addr)
    }

    /// Accepts connections and never answers.
    async fn silent_site() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        format!("http://{}/", addr)
    }

    fn watchdog(store: &Store, timeout: Duration, record_network_failures: bool) -> Watchdog {
        let client = Client::builder().no_proxy().build().unwrap();
        Watchdog::new(
            store.clone(),
            client,
            WatchdogSettings {
                interval: Duration::from_millis(100),
                timeout,
                concurrency: 8,
                record_network_failures,
            },
        )
    }

    #[tokio::test]
    async fn records_http_codes_including_errors() {
        let store = Store::open_in_memory().unwrap();
        let ok = answering_site(200).await;
        let broken = answering_site(503).await;
        store.register_site(&ok).unwrap();
        store.register_site(&broken).unwrap();

        let report = watchdog(&store, Duration::from_secs(5), true)
            .poll_once()
            .await;

        assert_eq!(
            report,
            CycleReport {
                probed: 2,
                recorded: 2,
                unreachable: 0,
                failed: 0
            }
        );
        assert_eq!(store.scan_status(&ok).unwrap()[0].code, 200);
        assert_eq!(store.scan_status(&broken).unwrap()[0].code, 503);
        let site = store.get_site(&ok).unwrap().unwrap();
        assert_eq!(site.last_check, store.scan_status(&ok).unwrap()[0].time);
    }

    #[tokio::test]
    async fn silent_site_does_not_hold_up_the_others() {
        let store = Store::open_in_memory().unwrap();
        let silent = silent_site().await;
        let ok = answering_site(200).await;
        store.register_site(&silent).unwrap();
        store.register_site(&ok).unwrap();

        let started = OffsetDateTime::now_utc();
        let clock = Instant::now();
        let report = watchdog(&store, Duration::from_secs(2), true)
            .poll_once()
            .await;

        assert_eq!(report.probed, 2);
        assert_eq!(report.recorded, 2);
        assert_eq!(report.unreachable, 1);
        assert!(clock.elapsed() < Duration::from_secs(10));

        let answered = store.scan_status(&ok).unwrap();
        assert_eq!(answered.len(), 1);
        assert!(answered[0].time - started < time::Duration::seconds(1));

        let silent_history = store.scan_status(&silent).unwrap();
        assert_eq!(silent_history.len(), 1);
        assert_eq!(silent_history[0].code, PROBE_FAILURE_CODE);
    }

    #[tokio::test]
    async fn network_failures_can_be_left_unrecorded() {
        let store = Store::open_in_memory().unwrap();
        let silent = silent_site().await;
        store.register_site(&silent).unwrap();
        let before = store.get_site(&silent).unwrap().unwrap();

        let report = watchdog(&store, Duration::from_millis(200), false)
            .poll_once()
            .await;

        assert_eq!(report.recorded, 0);
        assert_eq!(report.unreachable, 1);
        assert!(store.scan_status(&silent).unwrap().is_empty());
        assert_eq!(store.get_site(&silent).unwrap().unwrap(), before);
    }

    #[tokio::test]
    async fn empty_registry_is_a_quiet_cycle() {
        let store = Store::open_in_memory().unwrap();
        let report = watchdog(&store, Duration::from_secs(1), true)
            .poll_once()
            .await;
        assert_eq!(report, CycleReport::default());
    }

    #[tokio::test]
    async fn run_keeps_polling_on_the_interval() {
        let store = Store::open_in_memory().unwrap();
        let ok = answering_site(204).await;
        store.register_site(&ok).unwrap();

        let handle = tokio::spawn(watchdog(&store, Duration::from_secs(1), true).run());
        tokio::time::sleep(Duration::from_millis(450)).await;
        handle.abort();

        let history = store.scan_status(&ok).unwrap();
        assert!(history.len() >= 2, "only {} probes", history.len());
        assert!(history.windows(2).all(|w| w[0].time < w[1].time));
        assert!(history.iter().all(|r| r.code == 204));
    }
}
