//! Per-job interval scheduler.
//!
//! Each job gets its own tokio task and timer. A per-job cycle lock keeps a
//! slow cycle from overlapping the next tick; skipped ticks are dropped,
//! never queued. Cycle failures are logged and the timer keeps going.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::config::JobConfig;
use crate::engine::TradingEngine;
use crate::error::EngineError;
use crate::models::{Job, JobId};

struct JobHandle {
    config: JobConfig,
    status: Arc<Mutex<Job>>,
    paused: Arc<AtomicBool>,
    stop: watch::Sender<bool>,
    cycle_lock: Arc<tokio::sync::Mutex<()>>,
    task: tokio::task::JoinHandle<()>,
}

/// Owns every running job. Cheap to clone handles out of; the engine is
/// shared across all jobs.
pub struct JobScheduler {
    engine: Arc<TradingEngine>,
    jobs: Mutex<HashMap<JobId, JobHandle>>,
}

impl JobScheduler {
    pub fn new(engine: Arc<TradingEngine>) -> Self {
        Self {
            engine,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Job id for a (user, ticker) pair. One job per pair.
    pub fn job_id(config: &JobConfig) -> JobId {
        format!("{}:{}", config.user_id, config.ticker)
    }

    /// Validate and start a job. Returns an error if the config is bad or
    /// the job is already running.
    pub fn start_job(&self, config: JobConfig) -> Result<JobId, EngineError> {
        config.validate()?;
        let job_id = Self::job_id(&config);

        let mut jobs = self.jobs.lock().expect("scheduler lock poisoned");
        if jobs.contains_key(&job_id) {
            return Err(EngineError::Config(format!(
                "job {job_id} is already running"
            )));
        }

        let status = Arc::new(Mutex::new(Job::new(
            job_id.clone(),
            config.user_id.clone(),
            config.ticker.clone(),
            config.strategy.clone(),
            config.sleep_time,
        )));
        let paused = Arc::new(AtomicBool::new(false));
        let (stop_tx, stop_rx) = watch::channel(false);
        let cycle_lock = Arc::new(tokio::sync::Mutex::new(()));

        let task = tokio::spawn(run_job_loop(
            Arc::clone(&self.engine),
            config.clone(),
            Arc::clone(&status),
            Arc::clone(&paused),
            stop_rx,
            Arc::clone(&cycle_lock),
        ));

        info!(job_id = %job_id, "job started");
        jobs.insert(
            job_id.clone(),
            JobHandle {
                config,
                status,
                paused,
                stop: stop_tx,
                cycle_lock,
                task,
            },
        );
        Ok(job_id)
    }

    /// Signal a job to stop and drop it from the table. The in-flight cycle,
    /// if any, finishes first.
    pub fn stop_job(&self, job_id: &str) -> bool {
        let handle = {
            let mut jobs = self.jobs.lock().expect("scheduler lock poisoned");
            jobs.remove(job_id)
        };
        match handle {
            Some(handle) => {
                let _ = handle.stop.send(true);
                if let Ok(mut job) = handle.status.lock() {
                    job.running = false;
                }
                info!(job_id, "job stopped");
                true
            }
            None => false,
        }
    }

    pub fn pause_job(&self, job_id: &str) -> bool {
        self.with_handle(job_id, |handle| {
            handle.paused.store(true, Ordering::SeqCst);
            info!(job_id, "job paused");
        })
    }

    pub fn resume_job(&self, job_id: &str) -> bool {
        self.with_handle(job_id, |handle| {
            handle.paused.store(false, Ordering::SeqCst);
            info!(job_id, "job resumed");
        })
    }

    pub fn job_status(&self, job_id: &str) -> Option<Job> {
        let jobs = self.jobs.lock().expect("scheduler lock poisoned");
        jobs.get(job_id)
            .and_then(|handle| handle.status.lock().ok().map(|job| job.clone()))
    }

    /// Run one cycle for a job immediately, outside its timer. Coalesced
    /// with the timer through the same per-job lock: if a cycle is already
    /// in flight this is a no-op.
    pub async fn run_job_now(&self, job_id: &str) -> bool {
        let parts = {
            let jobs = self.jobs.lock().expect("scheduler lock poisoned");
            jobs.get(job_id).map(|handle| {
                (
                    handle.config.clone(),
                    Arc::clone(&handle.status),
                    Arc::clone(&handle.cycle_lock),
                )
            })
        };
        match parts {
            Some((config, status, cycle_lock)) => {
                run_cycle_once(&self.engine, &config, &status, &cycle_lock).await;
                true
            }
            None => false,
        }
    }

    /// Snapshot of every job's status.
    pub fn jobs(&self) -> Vec<Job> {
        let jobs = self.jobs.lock().expect("scheduler lock poisoned");
        jobs.values()
            .filter_map(|handle| handle.status.lock().ok().map(|job| job.clone()))
            .collect()
    }

    /// Stop everything and wait for the tasks to wind down.
    pub async fn shutdown(&self) {
        let handles: Vec<JobHandle> = {
            let mut jobs = self.jobs.lock().expect("scheduler lock poisoned");
            jobs.drain().map(|(_, handle)| handle).collect()
        };
        for handle in &handles {
            let _ = handle.stop.send(true);
        }
        for handle in handles {
            if let Err(err) = handle.task.await {
                error!(error = %err, "job task panicked");
            }
        }
        info!("scheduler shut down");
    }

    fn with_handle(&self, job_id: &str, f: impl FnOnce(&JobHandle)) -> bool {
        let jobs = self.jobs.lock().expect("scheduler lock poisoned");
        match jobs.get(job_id) {
            Some(handle) => {
                f(handle);
                true
            }
            None => false,
        }
    }
}

async fn run_job_loop(
    engine: Arc<TradingEngine>,
    config: JobConfig,
    status: Arc<Mutex<Job>>,
    paused: Arc<AtomicBool>,
    mut stop: watch::Receiver<bool>,
    cycle_lock: Arc<tokio::sync::Mutex<()>>,
) {
    let mut timer = tokio::time::interval(Duration::from_secs(config.sleep_time));
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = stop.changed() => {
                if *stop.borrow() {
                    break;
                }
            }
            _ = timer.tick() => {
                if paused.load(Ordering::SeqCst) {
                    continue;
                }
                run_cycle_once(&engine, &config, &status, &cycle_lock).await;
            }
        }
    }
}

/// One guarded cycle. If the previous cycle is still running the tick is
/// dropped; timers never stack work.
async fn run_cycle_once(
    engine: &TradingEngine,
    config: &JobConfig,
    status: &Mutex<Job>,
    cycle_lock: &tokio::sync::Mutex<()>,
) {
    let _guard = match cycle_lock.try_lock() {
        Ok(guard) => guard,
        Err(_) => {
            warn!(ticker = %config.ticker, "previous cycle still running, tick dropped");
            return;
        }
    };

    match engine.run_cycle(config).await {
        Ok(outcome) => {
            info!(ticker = %config.ticker, outcome = ?outcome, "cycle finished");
        }
        Err(err) => {
            error!(
                ticker = %config.ticker,
                kind = err.kind(),
                error = %err,
                "cycle failed"
            );
        }
    }

    if let Ok(mut job) = status.lock() {
        job.run_count += 1;
        job.last_run = Some(Utc::now());
    }
}
