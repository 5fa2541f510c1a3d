//! The daemon loop.
//!
//! [`Scheduler::run`] waits out the startup delay, runs one sync pass, then
//! ticks every [`TICK`] until its cancellation token fires. Each tick runs at
//! most one job; a due diagnostic wins over a due sync.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Local};
use tokio_util::sync::CancellationToken;

use crate::diagnostic::DiagnosticReport;
use crate::error::SyncResult;
use crate::reconcile::PassReport;
use crate::schedule::{CronSchedule, SyncCadence};

/// Polling resolution.
pub const TICK: Duration = Duration::from_secs(60);

/// A heartbeat is logged every this many ticks.
pub const HEARTBEAT_TICKS: u64 = 60;

/// The work the scheduler triggers.
#[async_trait]
pub trait Jobs: Send + Sync {
    async fn sync(&self) -> SyncResult<PassReport>;

    async fn diagnose(&self) -> SyncResult<DiagnosticReport>;
}

/// Source of wall-clock time for due checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Local time of the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub sync_schedule: CronSchedule,
    pub diagnostic_schedule: CronSchedule,
    /// When positive, sync every N hours instead of on `sync_schedule`.
    pub interval_hours: u32,
    pub startup_delay: Duration,
}

/// State carried between ticks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleState {
    pub last_successful_sync: Option<DateTime<FixedOffset>>,
}

/// What a tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    Idle,
    Sync,
    Diagnostic,
}

pub struct Scheduler<J, C = SystemClock> {
    jobs: J,
    clock: C,
    config: ScheduleConfig,
    cadence: SyncCadence,
    cancel: CancellationToken,
    state: ScheduleState,
    ticks: u64,
    heartbeats: u64,
}

impl<J: Jobs> Scheduler<J, SystemClock> {
    pub fn new(config: ScheduleConfig, jobs: J, cancel: CancellationToken) -> Self {
        Self::with_clock(config, jobs, SystemClock, cancel)
    }
}

impl<J: Jobs, C: Clock> Scheduler<J, C> {
    pub fn with_clock(config: ScheduleConfig, jobs: J, clock: C, cancel: CancellationToken) -> Self {
        let cadence = SyncCadence::new(config.sync_schedule.clone(), config.interval_hours);
        Scheduler {
            jobs,
            clock,
            config,
            cadence,
            cancel,
            state: ScheduleState::default(),
            ticks: 0,
            heartbeats: 0,
        }
    }

    pub fn state(&self) -> &ScheduleState {
        &self.state
    }

    pub fn jobs(&self) -> &J {
        &self.jobs
    }

    /// Ticks evaluated so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn heartbeats(&self) -> u64 {
        self.heartbeats
    }

    /// Run until cancelled.
    pub async fn run(&mut self) {
        self.log_startup();

        if !self.config.startup_delay.is_zero() {
            tracing::info!(delay_secs = self.config.startup_delay.as_secs(), "waiting before initial sync");
            if !self.sleep(self.config.startup_delay).await {
                tracing::info!("shutdown requested during startup delay");
                return;
            }
        }

        tracing::info!("running initial sync");
        self.run_sync().await;

        while !self.cancel.is_cancelled() {
            self.tick().await;
            if !self.sleep(TICK).await {
                break;
            }
        }

        tracing::info!(ticks = self.ticks, "scheduler stopped");
    }

    /// Evaluate the schedules once and run the job that is due, if any.
    pub async fn tick(&mut self) -> TickAction {
        self.ticks += 1;
        let now = self.clock.now();
        let window = tick_window();

        let action = if self.config.diagnostic_schedule.is_due(&now, window) {
            TickAction::Diagnostic
        } else if self
            .cadence
            .is_due(&now, self.state.last_successful_sync.as_ref(), window)
        {
            TickAction::Sync
        } else {
            TickAction::Idle
        };

        match action {
            TickAction::Diagnostic => self.run_diagnostic().await,
            TickAction::Sync => self.run_sync().await,
            TickAction::Idle => {}
        }

        if self.ticks % HEARTBEAT_TICKS == 0 {
            self.log_heartbeat();
        }

        action
    }

    async fn run_sync(&mut self) {
        match self.jobs.sync().await {
            Ok(report) => {
                self.state.last_successful_sync = Some(self.clock.now());
                tracing::info!(%report, "scheduled sync succeeded");
            }
            Err(e) => tracing::error!(%e, "scheduled sync failed"),
        }
    }

    async fn run_diagnostic(&mut self) {
        match self.jobs.diagnose().await {
            Ok(report) => tracing::info!(%report, "scheduled diagnostic succeeded"),
            Err(e) => tracing::error!(%e, "scheduled diagnostic failed"),
        }
    }

    /// Sleep for `duration`; false if cancelled first.
    async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    fn log_startup(&self) {
        let now = self.clock.now();
        tracing::info!(
            sync_schedule = %self.config.sync_schedule,
            diagnostic_schedule = %self.config.diagnostic_schedule,
            cadence = %self.cadence,
            "scheduler starting"
        );
        if self.config.interval_hours > 0 {
            tracing::info!(hours = self.config.interval_hours, "interval sync overrides the sync schedule");
        }
        self.log_next_runs(&now);
    }

    fn log_heartbeat(&mut self) {
        self.heartbeats += 1;
        let now = self.clock.now();
        tracing::info!(ticks = self.ticks, "scheduler alive");
        self.log_next_runs(&now);
    }

    fn log_next_runs(&self, now: &DateTime<FixedOffset>) {
        let next_sync = self
            .cadence
            .next_due(now, self.state.last_successful_sync.as_ref())
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());
        let next_diagnostic = self
            .config
            .diagnostic_schedule
            .next_after(now)
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());
        tracing::info!(%next_sync, %next_diagnostic, "next scheduled runs");
    }
}

fn tick_window() -> chrono::Duration {
    chrono::Duration::seconds(TICK.as_secs() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::error::SyncError;

    struct FixedClock(Mutex<DateTime<FixedOffset>>);

    impl FixedClock {
        fn at(rfc3339: &str) -> Self {
            FixedClock(Mutex::new(DateTime::parse_from_rfc3339(rfc3339).unwrap()))
        }

        fn set(&self, rfc3339: &str) {
            *self.0.lock().unwrap() = DateTime::parse_from_rfc3339(rfc3339).unwrap();
        }
    }

    impl Clock for &FixedClock {
        fn now(&self) -> DateTime<FixedOffset> {
            *self.0.lock().unwrap()
        }
    }

    #[derive(Default)]
    struct CountingJobs {
        syncs: AtomicUsize,
        diagnostics: AtomicUsize,
        fail_sync: bool,
    }

    #[async_trait]
    impl Jobs for CountingJobs {
        async fn sync(&self) -> SyncResult<PassReport> {
            self.syncs.fetch_add(1, Ordering::SeqCst);
            if self.fail_sync {
                return Err(SyncError::Connection("down".into()));
            }
            Ok(PassReport::default())
        }

        async fn diagnose(&self) -> SyncResult<DiagnosticReport> {
            self.diagnostics.fetch_add(1, Ordering::SeqCst);
            Ok(DiagnosticReport::default())
        }
    }

    fn config(sync: &str, diagnostic: &str, interval_hours: u32) -> ScheduleConfig {
        ScheduleConfig {
            sync_schedule: CronSchedule::parse(sync).unwrap(),
            diagnostic_schedule: CronSchedule::parse(diagnostic).unwrap(),
            interval_hours,
            startup_delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_diagnostic_wins_when_both_due() {
        let clock = FixedClock::at("2025-06-15T07:00:10+00:00");
        let mut scheduler = Scheduler::with_clock(
            config("0 7 * * *", "0 7 * * 0", 0),
            CountingJobs::default(),
            &clock,
            CancellationToken::new(),
        );

        assert_eq!(scheduler.tick().await, TickAction::Diagnostic);
        assert_eq!(scheduler.jobs().syncs.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.jobs().diagnostics.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_idle_between_fire_times() {
        let clock = FixedClock::at("2025-06-11T12:00:00+00:00");
        let mut scheduler = Scheduler::with_clock(
            config("0 6 * * *", "0 7 * * 0", 0),
            CountingJobs::default(),
            &clock,
            CancellationToken::new(),
        );

        assert_eq!(scheduler.tick().await, TickAction::Idle);
        clock.set("2025-06-12T06:00:20+00:00");
        assert_eq!(scheduler.tick().await, TickAction::Sync);
        assert!(scheduler.state().last_successful_sync.is_some());
    }

    #[tokio::test]
    async fn test_heartbeat_every_sixty_ticks() {
        let clock = FixedClock::at("2025-06-11T12:00:00+00:00");
        let mut scheduler = Scheduler::with_clock(
            config("0 6 * * *", "0 7 * * 0", 0),
            CountingJobs::default(),
            &clock,
            CancellationToken::new(),
        );

        for _ in 0..59 {
            scheduler.tick().await;
        }
        assert_eq!(scheduler.heartbeats(), 0);

        scheduler.tick().await;
        assert_eq!(scheduler.heartbeats(), 1);

        for _ in 0..61 {
            scheduler.tick().await;
        }
        assert_eq!(scheduler.ticks(), 121);
        assert_eq!(scheduler.heartbeats(), 2);
    }

    #[tokio::test]
    async fn test_failed_sync_does_not_record_success() {
        let clock = FixedClock::at("2025-06-11T12:00:00+00:00");
        let jobs = CountingJobs {
            fail_sync: true,
            ..Default::default()
        };
        let mut scheduler = Scheduler::with_clock(config("0 6 * * *", "0 7 * * 0", 4), jobs, &clock, CancellationToken::new());

        assert_eq!(scheduler.tick().await, TickAction::Sync);
        assert_eq!(scheduler.state().last_successful_sync, None);
        // Still due on the next tick, since nothing succeeded.
        assert_eq!(scheduler.tick().await, TickAction::Sync);
        assert_eq!(scheduler.jobs().syncs.load(Ordering::SeqCst), 2);
    }
}
