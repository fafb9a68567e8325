//! The long-lived daemon process.
//!
//! Two independent cooperating loops, sharing nothing in-process beyond the
//! durable stores:
//! - **config watch**: polls the config file's mtime, re-validates after a
//!   settle delay, and re-installs the trigger set on success
//! - **main loop**: removes triggers while globally disabled, fires deferred
//!   jobs as they come due, and periodically purges stale records
//!
//! Correctness does not depend on the relative scheduling of the two loops,
//! only on eventual polling.

use std::time::SystemTime;

use chrono::{Duration, Utc};
use tracing::{debug, error, info, warn};

use crate::engine::AlarmEngine;
use crate::error::CoreError;
use crate::gateway::{DialogGateway, SystemActionExecutor};
use crate::installer::TriggerInstaller;
use crate::storage::{Config, Database};
use crate::triggers;

/// Config file poll interval.
pub const CONFIG_POLL: std::time::Duration = std::time::Duration::from_secs(5);
/// Deferred job poll interval.
pub const JOB_POLL: std::time::Duration = std::time::Duration::from_secs(30);
/// Wait after an observed config change before re-reading, so a half-written
/// file is not picked up.
const SETTLE_DELAY: std::time::Duration = std::time::Duration::from_secs(2);
/// Main-loop ticks between purges of completed jobs and stale counters.
const PURGE_EVERY_TICKS: u64 = 120;
/// Records older than this are purged; snooze counters effectively reset
/// daily through this cutoff.
const STALE_AFTER_HOURS: i64 = 24;

/// The daemon: owns trigger installation and the deferred job scan for the
/// lifetime of the process.
pub struct Daemon<I> {
    installer: I,
}

impl<I: TriggerInstaller> Daemon<I> {
    pub fn new(installer: I) -> Self {
        Self { installer }
    }

    /// Run until a fatal error. Intended to be supervised and restarted.
    pub async fn run(&self) -> Result<(), CoreError> {
        // Ensure both durable stores exist before anything can fire.
        Database::open()?;
        let config = Config::load()?;

        if config.enabled {
            self.installer.replace_all(&triggers::compile(&config))?;
        } else {
            self.installer.remove_all()?;
        }
        info!(alarms = config.alarms.len(), enabled = config.enabled, "daemon started");

        tokio::try_join!(self.config_watch(config.clone()), self.main_loop(config))?;
        Ok(())
    }

    /// Poll the config source; on change, re-validate and re-install.
    ///
    /// An invalid file keeps the previously installed schedule (no partial
    /// apply). A failed install is retried on the next cycle.
    async fn config_watch(&self, initial: Config) -> Result<(), CoreError> {
        let mut installed = initial;
        let mut last_mtime = Config::modified();
        let mut pending: Option<Config> = None;
        let mut ticker = tokio::time::interval(CONFIG_POLL);
        loop {
            ticker.tick().await;

            if let Some(changed) = mtime_changed(&mut last_mtime) {
                debug!(?changed, "config change observed");
                tokio::time::sleep(SETTLE_DELAY).await;
                match Config::load() {
                    Ok(config) => {
                        info!("configuration reloaded");
                        pending = Some(config);
                    }
                    Err(e) => {
                        warn!(error = %e, "invalid configuration, keeping last known good");
                    }
                }
            }

            if let Some(config) = pending.take() {
                let result = if config.enabled {
                    self.installer.replace_all(&triggers::compile(&config))
                } else {
                    self.installer.remove_all()
                };
                match result {
                    Ok(()) => {
                        debug!(alarms = config.alarms.len(), "schedule installed");
                        installed = config;
                    }
                    Err(e) => {
                        warn!(
                            error = %e,
                            alarms = installed.alarms.len(),
                            "trigger install failed, keeping previous schedule"
                        );
                        pending = Some(config);
                    }
                }
            }
        }
    }

    /// Scan for due deferred jobs and fire them; purge old records hourly.
    async fn main_loop(&self, initial: Config) -> Result<(), CoreError> {
        let db = Database::open()?;
        let mut last_good = initial;
        let mut ticks: u64 = 0;
        let mut ticker = tokio::time::interval(JOB_POLL);
        loop {
            ticker.tick().await;
            ticks += 1;

            if let Ok(config) = Config::load() {
                last_good = config;
            }

            if !last_good.enabled {
                if let Err(e) = self.installer.remove_all() {
                    warn!(error = %e, "failed to remove triggers while disabled");
                }
            } else {
                self.fire_due_jobs(&db, &last_good).await?;
            }

            if ticks % PURGE_EVERY_TICKS == 0 {
                let cutoff = Utc::now() - Duration::hours(STALE_AFTER_HOURS);
                match db.purge_completed(cutoff) {
                    Ok(n) if n > 0 => debug!(purged = n, "dropped completed jobs"),
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "job purge failed"),
                }
                match db.purge_stale_counts(cutoff) {
                    Ok(n) if n > 0 => debug!(purged = n, "dropped stale snooze counters"),
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "counter purge failed"),
                }
            }
        }
    }

    async fn fire_due_jobs(&self, db: &Database, config: &Config) -> Result<(), CoreError> {
        let due = db.due_jobs(Utc::now())?;
        for job in due {
            // Claiming moves the job to completed; a job that loses the
            // claim here was already fired elsewhere.
            if !db.claim_job(&job.id)? {
                continue;
            }
            info!(alarm = %job.alarm, due = %job.due_at, count = job.snooze_count, "deferred job due");

            let alarm = job.alarm.clone();
            let config = config.clone();
            let result = tokio::task::spawn_blocking(move || {
                let gateway = DialogGateway::new(config.notifications.warning_secs);
                let engine =
                    AlarmEngine::new(Database::open()?, config, gateway, SystemActionExecutor);
                engine.execute(&job.alarm, job.action, true)
            })
            .await;

            match result {
                Ok(Ok(outcome)) => debug!(alarm = %alarm, ?outcome, "deferred job resolved"),
                Ok(Err(e)) => error!(alarm = %alarm, error = %e, "deferred job failed"),
                Err(e) => error!(alarm = %alarm, error = %e, "deferred job panicked"),
            }
        }
        Ok(())
    }
}

/// Compare-and-swap on the config file's mtime; returns the new mtime when
/// it differs from the remembered one.
fn mtime_changed(last: &mut Option<SystemTime>) -> Option<SystemTime> {
    let current = Config::modified();
    if current != *last {
        *last = current;
        current
    } else {
        None
    }
}
