use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use color_eyre::{Result, eyre::WrapErr};
use cron::Schedule;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;

use crate::collectors::{Collector, CollectorRegistry};
use crate::config::SchedulerConfig;
use crate::repository::{SyncRunRepository, SyncRunRow};
use crate::services::{LockManager, MAX_STALE_AGE, SyncOrchestrator};
use crate::types::{ServiceType, SyncStatus, TriggerType};

/// Result of an on-demand trigger, as reported to the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Started,
    AlreadyRunning,
    UnknownCollector,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JobInfo {
    pub name: String,
    pub next_run: Option<DateTime<Utc>>,
    pub prev_run: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CollectorStatus {
    pub collector: String,
    pub is_running: bool,
    pub next_run: Option<DateTime<Utc>>,
    pub last_run: Option<SyncRunRow>,
}

struct JobState {
    schedule: Schedule,
    prev_run: Option<DateTime<Utc>>,
}

/// Cron-driven and on-demand invocation of the orchestrator: one background
/// loop per registered collector, each sleeping until its next fire time.
/// A tick never blocks on a running sync; the lock manager drops it.
pub struct SyncScheduler {
    registry: Arc<CollectorRegistry>,
    orchestrator: Arc<SyncOrchestrator>,
    locks: Arc<LockManager>,
    runs: SyncRunRepository,
    config: SchedulerConfig,
    jobs: RwLock<HashMap<String, JobState>>,
}

impl SyncScheduler {
    pub fn new(
        registry: Arc<CollectorRegistry>,
        orchestrator: Arc<SyncOrchestrator>,
        locks: Arc<LockManager>,
        runs: SyncRunRepository,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            registry,
            orchestrator,
            locks,
            runs,
            config,
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Recover stale locks, register the cron loops, and block until
    /// `shutdown` fires.
    pub async fn start(self: Arc<Self>, shutdown: CancellationToken) -> Result<()> {
        self.locks.recover_stale(MAX_STALE_AGE).await?;

        if !self.config.enabled {
            info!("Scheduler disabled, no cron entries registered");
            shutdown.cancelled().await;
            return Ok(());
        }

        for collector in self.registry.all() {
            let expression = match collector.service_type() {
                ServiceType::DnsRecords => &self.config.dns_cron,
                ServiceType::Domains => &self.config.domains_cron,
            };
            let schedule = parse_cron(expression).wrap_err_with(|| {
                format!(
                    "Invalid cron expression {expression:?} for {}",
                    collector.name()
                )
            })?;

            info!(
                "Scheduled {} with cron {expression:?}, next run {:?}",
                collector.name(),
                schedule.upcoming(Utc).next()
            );
            self.jobs.write().unwrap().insert(
                collector.name().to_string(),
                JobState {
                    schedule: schedule.clone(),
                    prev_run: None,
                },
            );

            tokio::spawn(self.clone().run_cron_loop(
                collector.clone(),
                schedule,
                shutdown.clone(),
            ));
        }

        shutdown.cancelled().await;
        info!("Scheduler stopping");
        Ok(())
    }

    async fn run_cron_loop(
        self: Arc<Self>,
        collector: Arc<dyn Collector>,
        schedule: Schedule,
        shutdown: CancellationToken,
    ) {
        loop {
            let Some(next) = schedule.upcoming(Utc).next() else {
                warn!(
                    "Cron schedule for {} has no future fire times, loop exiting",
                    collector.name()
                );
                return;
            };
            let delay = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.cancelled() => {
                    debug!("Cron loop for {} stopped", collector.name());
                    return;
                }
            }

            if let Some(job) = self.jobs.write().unwrap().get_mut(collector.name()) {
                job.prev_run = Some(Utc::now());
            }

            let orchestrator = self.orchestrator.clone();
            let collector = collector.clone();
            tokio::spawn(async move {
                if let Err(e) = orchestrator.run(collector, TriggerType::Scheduled).await {
                    error!("Scheduled sync failed to run: {e:#}");
                }
            });
        }
    }

    /// Trigger one collector by name. The lock is acquired here, in the
    /// caller's path, so concurrent triggers split deterministically into
    /// one `Started` and the rest `AlreadyRunning`.
    pub async fn trigger_sync(&self, name: &str) -> Result<TriggerOutcome> {
        let Some(collector) = self.registry.get(name) else {
            return Ok(TriggerOutcome::UnknownCollector);
        };

        let Some(lock) = self
            .locks
            .try_acquire(name, collector.service_type(), TriggerType::Manual)
            .await?
        else {
            return Ok(TriggerOutcome::AlreadyRunning);
        };

        let orchestrator = self.orchestrator.clone();
        tokio::spawn(async move {
            if let Err(e) = orchestrator
                .run_locked(lock, collector, TriggerType::Manual)
                .await
            {
                error!("Manual sync failed to run: {e:#}");
            }
        });

        Ok(TriggerOutcome::Started)
    }

    /// Spawn one manual sync per registered collector. Collectors already
    /// running no-op inside the orchestrator.
    pub fn trigger_sync_all(&self) -> usize {
        let mut spawned = 0;
        for collector in self.registry.all() {
            let orchestrator = self.orchestrator.clone();
            let collector = collector.clone();
            tokio::spawn(async move {
                if let Err(e) = orchestrator.run(collector, TriggerType::Manual).await {
                    error!("Manual sync failed to run: {e:#}");
                }
            });
            spawned += 1;
        }
        spawned
    }

    pub fn next_run(&self, name: &str) -> Option<DateTime<Utc>> {
        self.jobs
            .read()
            .unwrap()
            .get(name)
            .and_then(|job| job.schedule.upcoming(Utc).next())
    }

    pub fn jobs_snapshot(&self) -> Vec<JobInfo> {
        let jobs = self.jobs.read().unwrap();
        let mut snapshot: Vec<JobInfo> = jobs
            .iter()
            .map(|(name, job)| JobInfo {
                name: name.clone(),
                next_run: job.schedule.upcoming(Utc).next(),
                prev_run: job.prev_run,
            })
            .collect();
        snapshot.sort_by(|a, b| a.name.cmp(&b.name));
        snapshot
    }

    /// The latest run per collector, for `GET /sync/status`.
    pub async fn status_all(&self) -> Result<Vec<SyncRunRow>> {
        self.runs.latest_per_collector().await
    }

    /// Detailed status for one collector, or `None` if unknown.
    pub async fn collector_status(&self, name: &str) -> Result<Option<CollectorStatus>> {
        if self.registry.get(name).is_none() {
            return Ok(None);
        }

        let last_run = self.runs.latest_for(name).await?;
        let is_running = self.locks.is_held_locally(name)
            || matches!(&last_run, Some(run) if run.status == SyncStatus::Running);

        Ok(Some(CollectorStatus {
            collector: name.to_string(),
            is_running,
            next_run: self.next_run(name),
            last_run,
        }))
    }
}

/// The cron parser wants a seconds field and does not share crontab's
/// numeric day-of-week convention (where 0 and 7 both mean Sunday).
/// Classic 5-field expressions get zero seconds prepended and their
/// numeric weekdays rewritten as names, which parse unambiguously.
fn parse_cron(expression: &str) -> Result<Schedule> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    let normalized = if fields.len() == 5 {
        format!(
            "0 {} {} {} {} {}",
            fields[0],
            fields[1],
            fields[2],
            fields[3],
            normalize_dow(fields[4])
        )
    } else {
        expression.trim().to_string()
    };
    Ok(Schedule::from_str(&normalized)?)
}

fn normalize_dow(field: &str) -> String {
    const NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

    field
        .split(',')
        .map(|part| {
            part.split('-')
                .map(|sub| {
                    let (value, step) = match sub.split_once('/') {
                        Some((value, step)) => (value, Some(step)),
                        None => (sub, None),
                    };
                    let mapped = match value.parse::<usize>() {
                        Ok(n) if n <= 7 => NAMES[n % 7].to_string(),
                        _ => value.to_string(),
                    };
                    match step {
                        Some(step) => format!("{mapped}/{step}"),
                        None => mapped,
                    }
                })
                .collect::<Vec<_>>()
                .join("-")
        })
        .collect::<Vec<_>>()
        .join(",")
}
