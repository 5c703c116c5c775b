//! # Supervisor: owns the worker fleet, replaces crashed workers, drives shutdown.
//!
//! The [`Supervisor`] composes the [`Registry`], the [`RestartPolicy`] and the
//! [`ShutdownCoordinator`]. Process creation is delegated to a [`Launcher`] and
//! termination signals arrive on a channel, so both can be replaced by fakes.
//!
//! ## Control loop
//! ```text
//! run(signals)
//!   start_fleet(): launch N workers (each Starting)
//!     └─ launch failure ─► kill the ones already spawned ─► Err(Spawn)
//!
//!   loop (one task, no locks):
//!     phase Complete            ─► emit ShutdownComplete, return report
//!     registry empty, Idle,
//!       no pending replacement  ─► emit FleetDrained, return report
//!
//!     select! (biased)
//!       notice Ready(id)        ─► Starting → Running, crash streak reset
//!       notice Exited(id, st)   ─► remove record ─► coordinator.observe_exit
//!                                   └─► RestartPolicy::decide(st, mode)
//!                                         ├─ Restart      ─► spawn now or after backoff
//!                                         └─ DoNotRestart ─► RestartSkipped
//!       signal                  ─► coordinator.begin: SIGTERM to every worker
//!                                   (second signal ─► ShutdownSignalIgnored)
//!       deadline                ─► coordinator.expire: SIGKILL what is left
//!       backoff timer           ─► spawn replacement (unless shutting down)
//! ```
//!
//! ## Rules
//! - The shutdown phase is read in the same loop iteration as the restart
//!   decision, so no replacement is ever spawned once a session has begun.
//! - Delayed replacements still pending when a session begins are dropped.
//! - After forced kills the loop waits a short window for the exit notices so
//!   every exit is still reported.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{Instant, sleep, sleep_until};

use crate::config::Config;
use crate::core::launcher::{Launcher, Notice, Notifier};
use crate::core::registry::{Registry, WorkerExit, WorkerId, WorkerRecord};
use crate::core::shutdown::{Completion, Phase, ShutdownCoordinator};
use crate::core::signals::TermSignal;
use crate::error::SupervisorError;
use crate::events::{Event, EventKind};
use crate::policies::{RestartDecision, RestartPolicy, SkipReason, SupervisorMode};
use crate::subscribers::SubscriberSet;

/// How long to wait for exit notices after workers were killed.
const REAP_WINDOW: Duration = Duration::from_millis(500);

/// Summary of one supervisor lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupervisorReport {
    /// Worker processes created, replacements included.
    pub spawned: usize,
    /// Replacements spawned after abnormal exits.
    pub restarts: usize,
    /// Worker exits observed.
    pub exits: usize,
    /// Workers killed because the grace period elapsed.
    pub forced_kills: usize,
    /// How the shutdown session ended; `None` when the fleet drained on its own.
    pub completion: Option<Completion>,
}

/// Supervises a fixed-size fleet of worker processes.
///
/// Built with [`SupervisorBuilder`](crate::SupervisorBuilder) and consumed by
/// [`Supervisor::run`].
pub struct Supervisor {
    cfg: Config,
    launcher: Arc<dyn Launcher>,
    subs: SubscriberSet,
    registry: Registry,
    shutdown: ShutdownCoordinator,
    restart: RestartPolicy,
    notifier: Notifier,
    notices: mpsc::UnboundedReceiver<Notice>,
    respawns: JoinSet<WorkerId>,
    streak: u32,
    report: SupervisorReport,
}

impl Supervisor {
    pub(crate) fn new(cfg: Config, launcher: Arc<dyn Launcher>, subs: SubscriberSet) -> Self {
        let (tx, notices) = mpsc::unbounded_channel();
        Self {
            restart: cfg.restart_policy(),
            shutdown: ShutdownCoordinator::new(cfg.shutdown_grace),
            cfg,
            launcher,
            subs,
            registry: Registry::new(),
            notifier: Notifier::new(tx),
            notices,
            respawns: JoinSet::new(),
            streak: 0,
            report: SupervisorReport::default(),
        }
    }

    /// Starts the fleet and supervises it until shutdown completes or no
    /// worker is left.
    ///
    /// Returns `Err` only if the initial fleet could not be spawned. Pending
    /// events are delivered to every subscriber before this returns.
    pub async fn run(
        mut self,
        mut signals: mpsc::Receiver<TermSignal>,
    ) -> Result<SupervisorReport, SupervisorError> {
        let outcome = self.drive(&mut signals).await;
        let Supervisor { subs, .. } = self;
        subs.shutdown().await;
        outcome
    }

    async fn drive(
        &mut self,
        signals: &mut mpsc::Receiver<TermSignal>,
    ) -> Result<SupervisorReport, SupervisorError> {
        self.start_fleet().await?;

        loop {
            if let Phase::Complete { via, forced } = *self.shutdown.phase() {
                return Ok(self.complete(via, forced).await);
            }
            if self.is_fleet_drained() {
                self.emit(Event::new(EventKind::FleetDrained));
                return Ok(self.report.clone());
            }

            let deadline = self.shutdown.deadline();
            tokio::select! {
                biased;
                Some(notice) = self.notices.recv() => self.on_notice(notice),
                Some(sig) = signals.recv() => self.on_signal(sig),
                () = wait_until(deadline) => self.on_deadline(),
                Some(joined) = self.respawns.join_next(), if !self.respawns.is_empty() => {
                    // Aborted timers (dropped by a shutdown) come back as errors.
                    if let Ok(exited) = joined {
                        self.on_respawn_due(exited);
                    }
                }
            }
        }
    }

    async fn start_fleet(&mut self) -> Result<(), SupervisorError> {
        for _ in 0..self.cfg.workers {
            if let Err(e) = self.spawn_worker() {
                self.abort_fleet();
                self.reap(REAP_WINDOW).await;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Kills every registered worker at once; used when startup fails.
    fn abort_fleet(&mut self) {
        if self.shutdown.begin(Instant::now(), self.registry.ids()).is_some() {
            self.on_deadline();
        }
    }

    fn spawn_worker(&mut self) -> Result<WorkerId, SupervisorError> {
        let id = self.registry.allocate_id();
        let handle = match self.launcher.launch(id, self.notifier.clone()) {
            Ok(handle) => handle,
            Err(source) => {
                self.emit(
                    Event::new(EventKind::WorkerSpawnFailed)
                        .with_worker(id)
                        .with_reason(source.to_string()),
                );
                return Err(SupervisorError::Spawn {
                    worker: id.get(),
                    source,
                });
            }
        };

        let record = WorkerRecord::starting(id, handle);
        let pid = record.pid;
        self.registry.insert(record);
        self.report.spawned += 1;
        self.emit(
            Event::new(EventKind::WorkerSpawned)
                .with_worker(id)
                .with_pid(pid),
        );
        Ok(id)
    }

    fn on_notice(&mut self, notice: Notice) {
        match notice {
            Notice::Ready(id) => {
                if self.registry.mark_running(id) {
                    self.streak = 0;
                    let pid = self.registry.get(id).and_then(|r| r.pid);
                    self.emit(Event::new(EventKind::WorkerReady).with_worker(id).with_pid(pid));
                }
            }
            Notice::Exited(id, exit) => self.on_exit(id, exit),
        }
    }

    fn on_exit(&mut self, id: WorkerId, exit: WorkerExit) {
        // Unknown identity: this exit was already processed.
        let Some(record) = self.registry.take_exited(id, exit) else {
            return;
        };
        self.report.exits += 1;
        self.shutdown.observe_exit(id);

        let mode = self.mode();
        let mut ev = Event::new(EventKind::WorkerExited)
            .with_worker(id)
            .with_pid(record.pid)
            .with_exit(&exit)
            .with_uptime(record.uptime());
        if mode == SupervisorMode::ShuttingDown {
            ev = ev.with_reason("expected");
        }
        self.emit(ev);

        match self.restart.decide(&exit, mode) {
            RestartDecision::Restart => self.schedule_replacement(id),
            RestartDecision::DoNotRestart(reason) => self.emit(
                Event::new(EventKind::RestartSkipped)
                    .with_worker(id)
                    .with_reason(reason.as_str()),
            ),
        }
    }

    fn schedule_replacement(&mut self, exited: WorkerId) {
        self.streak = self.streak.saturating_add(1);
        let delay = self.cfg.restart_backoff.next(self.streak - 1);
        self.emit(
            Event::new(EventKind::RestartScheduled)
                .with_worker(exited)
                .with_delay(delay)
                .with_attempt(self.streak),
        );

        if delay.is_zero() {
            self.spawn_replacement();
        } else {
            self.respawns.spawn(async move {
                sleep(delay).await;
                exited
            });
        }
    }

    fn on_respawn_due(&mut self, exited: WorkerId) {
        if self.shutdown.in_shutdown() {
            self.emit(
                Event::new(EventKind::RestartSkipped)
                    .with_worker(exited)
                    .with_reason(SkipReason::ShuttingDown.as_str()),
            );
            return;
        }
        self.spawn_replacement();
    }

    fn spawn_replacement(&mut self) {
        // A failed replacement leaves the slot empty; the failure is already an event.
        if self.spawn_worker().is_ok() {
            self.report.restarts += 1;
        }
    }

    fn on_signal(&mut self, sig: TermSignal) {
        let Some(targets) = self.shutdown.begin(Instant::now(), self.registry.ids()) else {
            self.emit(Event::new(EventKind::ShutdownSignalIgnored).with_reason(sig.as_str()));
            return;
        };

        self.emit(
            Event::new(EventKind::ShutdownRequested)
                .with_reason(sig.as_str())
                .with_delay(self.shutdown.grace())
                .with_attempt(saturating_u32(targets.len())),
        );

        let dropped = self.respawns.len();
        if dropped > 0 {
            self.respawns.abort_all();
            self.emit(
                Event::new(EventKind::RestartSkipped)
                    .with_attempt(saturating_u32(dropped))
                    .with_reason(SkipReason::ShuttingDown.as_str()),
            );
        }

        for id in targets {
            self.registry.mark_shutting_down(id);
            let Some(record) = self.registry.get(id) else {
                continue;
            };
            let mut ev = Event::new(EventKind::ShutdownRequestSent)
                .with_worker(id)
                .with_pid(record.pid);
            if let Err(e) = record.handle.request_shutdown() {
                ev = ev.with_reason(e.to_string());
            }
            self.emit(ev);
        }
    }

    fn on_deadline(&mut self) {
        let stuck = self.shutdown.expire();
        for id in &stuck {
            let Some(record) = self.registry.get(*id) else {
                continue;
            };
            let mut ev = Event::new(EventKind::WorkerForceKilled)
                .with_worker(*id)
                .with_pid(record.pid);
            if let Err(e) = record.handle.force_kill() {
                ev = ev.with_reason(e.to_string());
            }
            self.emit(ev);
        }
        self.report.forced_kills += stuck.len();
    }

    async fn complete(&mut self, via: Completion, forced: usize) -> SupervisorReport {
        if via == Completion::Deadline {
            self.reap(REAP_WINDOW).await;
        }
        self.report.completion = Some(via);
        self.emit(
            Event::new(EventKind::ShutdownComplete)
                .with_attempt(saturating_u32(forced))
                .with_reason(via.as_str()),
        );
        self.report.clone()
    }

    /// Processes notices until the registry is empty or `window` elapses.
    async fn reap(&mut self, window: Duration) {
        let until = Instant::now() + window;
        while !self.registry.is_empty() {
            tokio::select! {
                Some(notice) = self.notices.recv() => self.on_notice(notice),
                () = sleep_until(until) => {
                    tracing::warn!(remaining = self.registry.len(), "killed workers not reaped in time");
                    break;
                }
            }
        }
    }

    fn is_fleet_drained(&self) -> bool {
        !self.shutdown.in_shutdown() && self.registry.is_empty() && self.respawns.is_empty()
    }

    fn mode(&self) -> SupervisorMode {
        if self.shutdown.in_shutdown() {
            SupervisorMode::ShuttingDown
        } else {
            SupervisorMode::Serving
        }
    }

    fn emit(&self, ev: Event) {
        self.subs.emit(ev);
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn saturating_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};
    use std::io;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use tokio::task::JoinHandle;
    use tokio::time::timeout;

    use super::*;
    use crate::core::builder::SupervisorBuilder;
    use crate::core::launcher::WorkerHandle;
    use crate::policies::{BackoffPolicy, JitterPolicy};
    use crate::subscribers::Subscribe;

    const SIGKILL: i32 = 9;
    const GRACE: Duration = Duration::from_millis(5000);

    struct FakeWorker {
        id: WorkerId,
        stubborn: bool,
        exited: AtomicBool,
        notifier: Notifier,
    }

    impl FakeWorker {
        fn exit(&self, exit: WorkerExit) {
            if !self.exited.swap(true, Ordering::SeqCst) {
                self.notifier.exited(self.id, exit);
            }
        }

        fn is_live(&self) -> bool {
            !self.exited.load(Ordering::SeqCst)
        }
    }

    struct FakeHandle(Arc<FakeWorker>);

    impl WorkerHandle for FakeHandle {
        fn pid(&self) -> Option<u32> {
            Some(10_000 + self.0.id.get() as u32)
        }

        fn request_shutdown(&self) -> io::Result<()> {
            if !self.0.stubborn {
                self.0.exit(WorkerExit::code(0));
            }
            Ok(())
        }

        fn force_kill(&self) -> io::Result<()> {
            self.0.exit(WorkerExit::signal(SIGKILL));
            Ok(())
        }
    }

    /// In-memory launcher: workers report ready at once unless `silent`,
    /// exit 0 on a shutdown request unless `stubborn`.
    #[derive(Default)]
    struct FakeLauncher {
        workers: Mutex<BTreeMap<WorkerId, Arc<FakeWorker>>>,
        stubborn: BTreeSet<u64>,
        silent: BTreeSet<u64>,
        failing: BTreeSet<u64>,
    }

    impl FakeLauncher {
        fn new() -> Self {
            Self::default()
        }

        fn stubborn(mut self, ids: &[u64]) -> Self {
            self.stubborn.extend(ids);
            self
        }

        fn silent(mut self, ids: &[u64]) -> Self {
            self.silent.extend(ids);
            self
        }

        fn failing(mut self, ids: &[u64]) -> Self {
            self.failing.extend(ids);
            self
        }

        fn launches(&self) -> usize {
            self.workers.lock().unwrap().len()
        }

        fn live(&self) -> usize {
            self.workers.lock().unwrap().values().filter(|w| w.is_live()).count()
        }

        fn crash(&self, id: u64, exit: WorkerExit) {
            let worker = self.workers.lock().unwrap()[&WorkerId::new(id)].clone();
            worker.exit(exit);
        }
    }

    impl Launcher for FakeLauncher {
        fn launch(&self, id: WorkerId, notifier: Notifier) -> io::Result<Box<dyn WorkerHandle>> {
            if self.failing.contains(&id.get()) {
                return Err(io::Error::new(io::ErrorKind::NotFound, "no such binary"));
            }
            let worker = Arc::new(FakeWorker {
                id,
                stubborn: self.stubborn.contains(&id.get()),
                exited: AtomicBool::new(false),
                notifier: notifier.clone(),
            });
            if !self.silent.contains(&id.get()) {
                notifier.ready(id);
            }
            self.workers.lock().unwrap().insert(id, worker.clone());
            Ok(Box::new(FakeHandle(worker)))
        }
    }

    struct Recorder {
        log: Mutex<Vec<Event>>,
        tx: mpsc::UnboundedSender<Event>,
    }

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, e: &Event) {
            self.log.lock().unwrap().push(e.clone());
            let _ = self.tx.send(e.clone());
        }
    }

    struct Harness {
        launcher: Arc<FakeLauncher>,
        recorder: Arc<Recorder>,
        events: mpsc::UnboundedReceiver<Event>,
        signals: mpsc::Sender<TermSignal>,
        run: JoinHandle<Result<SupervisorReport, SupervisorError>>,
    }

    impl Harness {
        fn start(cfg: Config, launcher: FakeLauncher) -> Self {
            let launcher = Arc::new(launcher);
            let (tx, events) = mpsc::unbounded_channel();
            let recorder = Arc::new(Recorder {
                log: Mutex::new(Vec::new()),
                tx,
            });
            let sup = SupervisorBuilder::new(cfg, launcher.clone())
                .with_subscribers(vec![recorder.clone() as Arc<dyn Subscribe>])
                .build()
                .expect("valid config");
            let (signals, rx) = mpsc::channel(8);
            let run = tokio::spawn(sup.run(rx));
            Self {
                launcher,
                recorder,
                events,
                signals,
                run,
            }
        }

        async fn wait_for(&mut self, kind: EventKind) -> Event {
            loop {
                let ev = timeout(Duration::from_secs(60), self.events.recv())
                    .await
                    .expect("event in time")
                    .expect("recorder open");
                if ev.kind == kind {
                    return ev;
                }
            }
        }

        async fn wait_ready(&mut self, n: usize) {
            for _ in 0..n {
                self.wait_for(EventKind::WorkerReady).await;
            }
        }

        async fn signal(&self, sig: TermSignal) {
            self.signals.send(sig).await.expect("supervisor listening");
        }

        async fn finish(self) -> (Result<SupervisorReport, SupervisorError>, Vec<Event>) {
            let outcome = self.run.await.expect("supervisor task panicked");
            let log = self.recorder.log.lock().unwrap().clone();
            (outcome, log)
        }
    }

    fn config(workers: usize) -> Config {
        Config {
            workers,
            enable_restart: true,
            shutdown_grace: GRACE,
            restart_backoff: BackoffPolicy::immediate(),
        }
    }

    fn paced(workers: usize, first: Duration) -> Config {
        Config {
            restart_backoff: BackoffPolicy {
                first,
                max: Duration::from_secs(60),
                factor: 2.0,
                jitter: JitterPolicy::None,
            },
            ..config(workers)
        }
    }

    fn count(log: &[Event], kind: EventKind) -> usize {
        log.iter().filter(|e| e.kind == kind).count()
    }

    #[tokio::test(start_paused = true)]
    async fn crashed_worker_is_replaced_then_fleet_drains_on_sigint() {
        let mut h = Harness::start(config(4), FakeLauncher::new());
        h.wait_ready(4).await;
        assert_eq!(h.launcher.live(), 4);

        h.launcher.crash(2, WorkerExit::signal(SIGKILL));
        let spawned = h.wait_for(EventKind::WorkerSpawned).await;
        assert_eq!(spawned.worker, Some(5));
        assert_eq!(h.launcher.launches(), 5);
        assert_eq!(h.launcher.live(), 4);

        let launcher = h.launcher.clone();
        h.signal(TermSignal::Interrupt).await;
        let (outcome, log) = h.finish().await;
        let report = outcome.expect("orderly shutdown");

        assert_eq!(report.spawned, 5);
        assert_eq!(report.restarts, 1);
        assert_eq!(report.exits, 5);
        assert_eq!(report.forced_kills, 0);
        assert_eq!(report.completion, Some(Completion::Drained));
        assert_eq!(count(&log, EventKind::ShutdownRequested), 1);
        assert_eq!(count(&log, EventKind::ShutdownRequestSent), 4);
        assert_eq!(count(&log, EventKind::RestartScheduled), 1);
        assert_eq!(launcher.live(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_worker_is_killed_at_the_deadline() {
        let mut h = Harness::start(config(4), FakeLauncher::new().stubborn(&[3]));
        h.wait_ready(4).await;

        let launcher = h.launcher.clone();
        let started = Instant::now();
        h.signal(TermSignal::Terminate).await;
        let (outcome, log) = h.finish().await;
        let report = outcome.expect("forced kills still succeed");

        assert_eq!(report.forced_kills, 1);
        assert_eq!(report.restarts, 0);
        assert_eq!(report.completion, Some(Completion::Deadline));
        let killed: Vec<_> = log
            .iter()
            .filter(|e| e.kind == EventKind::WorkerForceKilled)
            .map(|e| e.worker)
            .collect();
        assert_eq!(killed, vec![Some(3)]);

        let elapsed = started.elapsed();
        assert!(elapsed >= GRACE, "returned before the deadline: {elapsed:?}");
        assert!(elapsed < GRACE + Duration::from_secs(1), "returned late: {elapsed:?}");
        assert_eq!(launcher.live(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn second_signal_is_ignored() {
        let mut h = Harness::start(config(2), FakeLauncher::new().stubborn(&[1, 2]));
        h.signal(TermSignal::Interrupt).await;
        h.signal(TermSignal::Terminate).await;

        let ignored = h.wait_for(EventKind::ShutdownSignalIgnored).await;
        assert_eq!(ignored.reason.as_deref(), Some("SIGTERM"));

        let (outcome, log) = h.finish().await;
        let report = outcome.expect("orderly shutdown");
        assert_eq!(report.forced_kills, 2);
        assert_eq!(count(&log, EventKind::ShutdownRequested), 1);
        assert_eq!(count(&log, EventKind::ShutdownRequestSent), 2);
        assert_eq!(count(&log, EventKind::ShutdownComplete), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn clean_exit_is_not_replaced() {
        let mut h = Harness::start(config(2), FakeLauncher::new());
        h.wait_ready(2).await;

        sleep(Duration::from_secs(2)).await;
        h.launcher.crash(1, WorkerExit::code(0));
        let exited = h.wait_for(EventKind::WorkerExited).await;
        assert_eq!(exited.worker, Some(1));
        assert!(exited.uptime_ms >= Some(2000));
        let skipped = h.wait_for(EventKind::RestartSkipped).await;
        assert_eq!(skipped.worker, Some(1));
        assert_eq!(skipped.reason.as_deref(), Some("clean_exit"));
        assert_eq!(h.launcher.launches(), 2);
        assert_eq!(h.launcher.live(), 1);

        h.signal(TermSignal::Interrupt).await;
        let (outcome, _) = h.finish().await;
        let report = outcome.expect("orderly shutdown");
        assert_eq!(report.restarts, 0);
        assert_eq!(report.exits, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_restart_leaves_slot_empty() {
        let cfg = Config {
            enable_restart: false,
            ..config(2)
        };
        let mut h = Harness::start(cfg, FakeLauncher::new());
        h.wait_ready(2).await;

        h.launcher.crash(1, WorkerExit::code(1));
        let skipped = h.wait_for(EventKind::RestartSkipped).await;
        assert_eq!(skipped.reason.as_deref(), Some("restart_disabled"));
        assert_eq!(h.launcher.launches(), 2);

        h.signal(TermSignal::Quit).await;
        let (outcome, _) = h.finish().await;
        assert_eq!(outcome.expect("orderly shutdown").restarts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn abnormal_exit_during_shutdown_is_not_replaced() {
        let mut h = Harness::start(config(2), FakeLauncher::new().stubborn(&[1, 2]));
        h.wait_ready(2).await;
        h.signal(TermSignal::Interrupt).await;
        h.wait_for(EventKind::ShutdownRequested).await;

        h.launcher.crash(1, WorkerExit::code(1));
        let exited = h.wait_for(EventKind::WorkerExited).await;
        assert_eq!(exited.worker, Some(1));
        assert_eq!(exited.exit_code, Some(1));
        assert_eq!(exited.reason.as_deref(), Some("expected"));
        let skipped = h.wait_for(EventKind::RestartSkipped).await;
        assert_eq!(skipped.reason.as_deref(), Some("shutting_down"));

        let launcher = h.launcher.clone();
        let (outcome, _) = h.finish().await;
        let report = outcome.expect("orderly shutdown");
        assert_eq!(report.restarts, 0);
        assert_eq!(report.forced_kills, 1);
        assert_eq!(launcher.launches(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn returns_when_every_worker_exits_cleanly() {
        let mut h = Harness::start(config(2), FakeLauncher::new());
        h.wait_ready(2).await;
        h.launcher.crash(1, WorkerExit::code(0));
        h.launcher.crash(2, WorkerExit::code(0));

        let (outcome, log) = h.finish().await;
        let report = outcome.expect("drained fleet is a success");
        assert_eq!(report.completion, None);
        assert_eq!(report.exits, 2);
        assert_eq!(count(&log, EventKind::FleetDrained), 1);
        assert_eq!(count(&log, EventKind::ShutdownComplete), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn startup_spawn_failure_kills_spawned_workers() {
        let h = Harness::start(config(4), FakeLauncher::new().failing(&[3]));
        let launcher = h.launcher.clone();

        let (outcome, log) = h.finish().await;
        match outcome {
            Err(SupervisorError::Spawn { worker, .. }) => assert_eq!(worker, 3),
            other => panic!("expected spawn error, got {other:?}"),
        }
        assert_eq!(launcher.launches(), 2);
        assert_eq!(launcher.live(), 0);
        assert_eq!(count(&log, EventKind::WorkerSpawnFailed), 1);
        assert_eq!(count(&log, EventKind::WorkerForceKilled), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_replacement_leaves_slot_empty() {
        let mut h = Harness::start(config(1), FakeLauncher::new().failing(&[2]));
        h.wait_ready(1).await;
        h.launcher.crash(1, WorkerExit::code(1));

        let (outcome, log) = h.finish().await;
        let report = outcome.expect("replacement failure is not fatal");
        assert_eq!(report.restarts, 0);
        let failed: Vec<_> = log
            .iter()
            .filter(|e| e.kind == EventKind::WorkerSpawnFailed)
            .map(|e| e.worker)
            .collect();
        assert_eq!(failed, vec![Some(2)]);
        assert_eq!(count(&log, EventKind::FleetDrained), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_grows_with_the_crash_streak_and_resets_on_ready() {
        let first = Duration::from_secs(1);
        let mut h = Harness::start(paced(1, first), FakeLauncher::new().silent(&[2]));
        h.wait_ready(1).await;

        let crashed_at = Instant::now();
        h.launcher.crash(1, WorkerExit::code(1));
        let scheduled = h.wait_for(EventKind::RestartScheduled).await;
        assert_eq!(scheduled.delay_ms, Some(1000));
        assert_eq!(scheduled.attempt, Some(1));
        assert_eq!(h.launcher.launches(), 1);

        let spawned = h.wait_for(EventKind::WorkerSpawned).await;
        assert_eq!(spawned.worker, Some(2));
        assert!(crashed_at.elapsed() >= first);

        // Worker 2 never reports ready: the streak keeps growing.
        h.launcher.crash(2, WorkerExit::signal(SIGKILL));
        let scheduled = h.wait_for(EventKind::RestartScheduled).await;
        assert_eq!(scheduled.delay_ms, Some(2000));
        assert_eq!(scheduled.attempt, Some(2));

        // Worker 3 reports ready, so its crash starts a new streak.
        h.wait_for(EventKind::WorkerReady).await;
        h.launcher.crash(3, WorkerExit::code(1));
        let scheduled = h.wait_for(EventKind::RestartScheduled).await;
        assert_eq!(scheduled.delay_ms, Some(1000));
        assert_eq!(scheduled.attempt, Some(1));

        h.wait_for(EventKind::WorkerSpawned).await;
        h.signal(TermSignal::Interrupt).await;
        let (outcome, _) = h.finish().await;
        assert_eq!(outcome.expect("orderly shutdown").restarts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn pending_replacement_is_dropped_on_shutdown() {
        let mut h = Harness::start(paced(2, Duration::from_secs(10)), FakeLauncher::new());
        h.wait_ready(2).await;

        h.launcher.crash(1, WorkerExit::code(1));
        h.wait_for(EventKind::RestartScheduled).await;
        h.signal(TermSignal::Interrupt).await;

        let launcher = h.launcher.clone();
        let (outcome, log) = h.finish().await;
        let report = outcome.expect("orderly shutdown");
        assert_eq!(report.restarts, 0);
        assert_eq!(report.completion, Some(Completion::Drained));
        assert_eq!(launcher.launches(), 2);
        assert!(log.iter().any(|e| e.kind == EventKind::RestartSkipped
            && e.attempt == Some(1)
            && e.reason.as_deref() == Some("shutting_down")));
    }
}
