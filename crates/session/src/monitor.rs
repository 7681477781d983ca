//! Detection monitor: timer-driven pipeline around a `Session`

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use alerting::{AlertPolicy, Toast};
use dms::{Classification, IndicatorSource, Thresholds};
use serde::{Deserialize, Serialize};
use storage::{DetectionRecord, DetectionStatus, DetectionStore};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::feed::FrameFeed;
use crate::session::{Session, SessionSnapshot};
use crate::stats::SessionStats;
use crate::SessionError;

/// Timer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Detection tick period (milliseconds)
    pub detection_interval_ms: u64,
    /// Elapsed-time tick period (milliseconds)
    pub elapsed_interval_ms: u64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            detection_interval_ms: 3000,
            elapsed_interval_ms: 1000,
        }
    }
}

/// Shared by the monitor and its timer tasks
struct Pipeline {
    /// Single lock over state machine and statistics
    session: Mutex<Session>,
    source: Arc<dyn IndicatorSource>,
    policy: AlertPolicy,
    /// Present only for authenticated users
    store: Option<Arc<dyn DetectionStore>>,
}

impl Pipeline {
    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a classification produced under `generation`
    fn apply(&self, generation: u64, classification: &Classification) {
        let mut session = self.session();
        let Some(outcome) = session.apply(generation, classification) else {
            debug!("Late classification discarded");
            return;
        };

        metrics::counter!("dms_ticks_total").increment(1);
        let transition = outcome.transition;
        if transition.changed() {
            metrics::counter!("dms_state_entries_total", "state" => transition.current.as_str())
                .increment(1);
        }

        // Alerts go out under the session lock so none fire after stop
        self.policy.handle(&transition);
        drop(session);

        debug!(
            "Tick: ear={:.3} mar={:.3} -> {}",
            outcome.features.ear, outcome.features.mar, transition.current
        );

        if let Some(store) = &self.store {
            match DetectionStatus::try_from(transition.current) {
                Ok(status) => {
                    let store = Arc::clone(store);
                    let record = DetectionRecord::new(status, outcome.at);
                    tokio::spawn(async move {
                        if let Err(e) = store.save_detection(record).await {
                            metrics::counter!("dms_persist_failures_total").increment(1);
                            warn!("Error saving detection: {}", e);
                        }
                    });
                }
                Err(e) => debug!("Not persisting tick: {}", e),
            }
        }
    }
}

/// Timer tasks of a running session
struct Running {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

/// Runs detection and elapsed-time timers for one session at a time.
///
/// Detection ticks run one after another inside a single task, so two ticks
/// never touch the session concurrently; ticks missed while a slow
/// classification is in flight are skipped. The elapsed-time timer is a
/// separate task and keeps counting while a classification is pending.
pub struct DetectionMonitor {
    pipeline: Arc<Pipeline>,
    feed: FrameFeed,
    settings: MonitorSettings,
    running: Mutex<Option<Running>>,
}

impl DetectionMonitor {
    pub fn new(
        session: Session,
        source: Arc<dyn IndicatorSource>,
        policy: AlertPolicy,
        feed: FrameFeed,
        settings: MonitorSettings,
    ) -> Self {
        info!(
            "Creating detection monitor: source={}, detection every {}ms",
            source.name(),
            settings.detection_interval_ms
        );
        Self {
            pipeline: Arc::new(Pipeline {
                session: Mutex::new(session),
                source,
                policy,
                store: None,
            }),
            feed,
            settings,
            running: Mutex::new(None),
        }
    }

    /// Persist per-tick detections to `store`
    pub fn with_store(mut self, store: Arc<dyn DetectionStore>) -> Self {
        match Arc::get_mut(&mut self.pipeline) {
            Some(pipeline) => pipeline.store = Some(store),
            None => warn!("Detection store ignored: monitor already running"),
        }
        self
    }

    pub fn feed(&self) -> &FrameFeed {
        &self.feed
    }

    /// Whether the latest frame carries input the configured source can classify
    pub fn input_ready(&self) -> bool {
        self.feed
            .latest()
            .map_or(false, |observation| self.pipeline.source.accepts(&observation))
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.pipeline.session().snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.pipeline.session().is_active()
    }

    /// Settings changed: new thresholds apply from the next tick
    pub fn update_thresholds(&self, thresholds: Thresholds) {
        self.pipeline.session().set_thresholds(thresholds);
    }

    /// Start a session and its timers. Must be called inside a tokio runtime.
    pub fn start(&self) -> Result<SessionSnapshot, SessionError> {
        if !self.input_ready() {
            warn!("Start refused: no usable frame for {}", self.pipeline.source.name());
            self.pipeline.policy.notice(Toast::input_not_ready());
            return Err(SessionError::InputUnavailable(
                "landmark source has not produced a frame".into(),
            ));
        }

        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        let generation = self.pipeline.session().start()?;

        let token = CancellationToken::new();
        let tasks = vec![
            tokio::spawn(run_detection(
                Arc::clone(&self.pipeline),
                self.feed.clone(),
                generation,
                token.clone(),
                Duration::from_millis(self.settings.detection_interval_ms),
            )),
            tokio::spawn(run_clock(
                Arc::clone(&self.pipeline),
                generation,
                token.clone(),
                Duration::from_millis(self.settings.elapsed_interval_ms),
            )),
        ];
        *running = Some(Running { token, tasks });

        self.pipeline.policy.notice(Toast::detection_started());
        Ok(self.snapshot())
    }

    /// Stop the session, cancel both timers, return the final statistics
    pub fn stop(&self) -> Result<SessionStats, SessionError> {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(r) = running.take() {
            r.token.cancel();
            for task in &r.tasks {
                task.abort();
            }
        }

        let stats = self.pipeline.session().stop()?;
        self.pipeline.policy.notice(Toast::detection_stopped());
        Ok(stats)
    }
}

impl Drop for DetectionMonitor {
    fn drop(&mut self) {
        if let Ok(mut running) = self.running.lock() {
            if let Some(r) = running.take() {
                r.token.cancel();
            }
        }
    }
}

async fn run_detection(
    pipeline: Arc<Pipeline>,
    feed: FrameFeed,
    generation: u64,
    token: CancellationToken,
    period: Duration,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(observation) = feed.latest() else {
            metrics::counter!("dms_tick_failures_total").increment(1);
            warn!("Tick skipped: no frame available");
            continue;
        };

        let thresholds = pipeline.session().thresholds();
        let result = tokio::select! {
            _ = token.cancelled() => break,
            r = pipeline.source.classify(&observation, &thresholds) => r,
        };

        match result {
            Ok(classification) => pipeline.apply(generation, &classification),
            Err(e) => {
                // State is left as it was
                metrics::counter!("dms_tick_failures_total").increment(1);
                warn!("Tick skipped: {}", e);
            }
        }
    }
    debug!("Detection timer stopped (generation {})", generation);
}

async fn run_clock(
    pipeline: Arc<Pipeline>,
    generation: u64,
    token: CancellationToken,
    period: Duration,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                if !pipeline.session().on_second_elapsed(generation) {
                    break;
                }
            }
        }
    }
    debug!("Elapsed-time timer stopped (generation {})", generation);
}

#[cfg(test)]
mod tests {
    use super::*;
    use alerting::{AlertConfig, AlertError, AudioPlayer, Notifier};
    use async_trait::async_trait;
    use dms::{classify, AlertnessState, DmsError, LocalGeometric, Observation};
    use feature_engine::{FeatureSet, HeadAngle, LandmarkFrame, LandmarkIndices};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use storage::{Repository, StorageError};

    #[derive(Default)]
    struct Sink {
        toasts: Mutex<Vec<Toast>>,
        sounds: AtomicUsize,
    }

    impl Notifier for Sink {
        fn notify(&self, toast: &Toast) {
            self.toasts.lock().unwrap().push(toast.clone());
        }
    }

    impl AudioPlayer for Sink {
        fn play_alert(&self) -> Result<(), AlertError> {
            self.sounds.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Replays EAR values, one per call; errors once exhausted
    struct Scripted {
        ears: Mutex<VecDeque<Option<f64>>>,
        delay: Duration,
    }

    impl Scripted {
        fn new(ears: &[Option<f64>]) -> Self {
            Self {
                ears: Mutex::new(ears.iter().copied().collect()),
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl IndicatorSource for Scripted {
        async fn classify(
            &self,
            _observation: &Observation,
            thresholds: &Thresholds,
        ) -> Result<Classification, DmsError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let next = self.ears.lock().unwrap().pop_front().flatten();
            let ear = next.ok_or_else(|| DmsError::Remote("scripted failure".into()))?;
            let features = FeatureSet {
                ear,
                mar: 0.3,
                head_angle: HeadAngle::unavailable(),
            };
            Ok(Classification {
                features,
                indicators: classify(&features, thresholds),
            })
        }

        fn accepts(&self, observation: &Observation) -> bool {
            observation.landmarks.is_some()
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    struct FailingStore;

    #[async_trait]
    impl DetectionStore for FailingStore {
        async fn save_detection(&self, _record: DetectionRecord) -> Result<(), StorageError> {
            Err(StorageError::Http("backend down".into()))
        }
    }

    fn monitor(source: Arc<dyn IndicatorSource>) -> (DetectionMonitor, Arc<Sink>) {
        let sink = Arc::new(Sink::default());
        let policy = AlertPolicy::new(AlertConfig::default(), sink.clone(), sink.clone());
        let feed = FrameFeed::new();
        let monitor = DetectionMonitor::new(
            Session::default(),
            source,
            policy,
            feed,
            MonitorSettings::default(),
        );
        (monitor, sink)
    }

    fn ready(monitor: &DetectionMonitor) {
        let frame = LandmarkFrame::synthetic(&LandmarkIndices::default(), 0.3, 0.3, 0.0);
        monitor.feed().publish(Observation::from_landmarks(frame));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_refused_without_frame() {
        let (monitor, sink) = monitor(Arc::new(LocalGeometric::default()));
        assert!(matches!(monitor.start(), Err(SessionError::InputUnavailable(_))));
        assert_eq!(monitor.snapshot().status, AlertnessState::Inactive);
        assert_eq!(sink.toasts.lock().unwrap()[0], Toast::input_not_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_refused_for_frame_the_source_cannot_use() {
        let (monitor, sink) = monitor(Arc::new(LocalGeometric::default()));
        monitor.feed().publish(Observation::from_image("aGVsbG8=".into()));
        assert!(monitor.feed().is_ready());
        assert!(!monitor.input_ready());

        assert!(matches!(monitor.start(), Err(SessionError::InputUnavailable(_))));
        assert!(!monitor.is_running());
        assert_eq!(monitor.snapshot().status, AlertnessState::Inactive);
        assert_eq!(sink.toasts.lock().unwrap().as_slice(), &[Toast::input_not_ready()]);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(monitor.snapshot().stats.elapsed_seconds, 0);

        ready(&monitor);
        assert!(monitor.input_ready());
        assert_eq!(monitor.start().unwrap().status, AlertnessState::Awake);
        monitor.stop().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_drive_state_and_stats() {
        let source = Scripted::new(&[Some(0.30), Some(0.18), Some(0.19), Some(0.30), Some(0.18)]);
        let (monitor, sink) = monitor(Arc::new(source));
        ready(&monitor);

        let snap = monitor.start().unwrap();
        assert_eq!(snap.status, AlertnessState::Awake);

        // Five detection ticks at 3s, 6s, ... 15s
        tokio::time::sleep(Duration::from_millis(15_500)).await;

        let snap = monitor.snapshot();
        assert_eq!(snap.status, AlertnessState::Sleeping);
        assert_eq!(snap.stats.sleep_event_count, 2);
        assert_eq!(snap.stats.elapsed_seconds, 15);
        assert_eq!(sink.sounds.load(Ordering::SeqCst), 2);

        let stats = monitor.stop().unwrap();
        assert_eq!(stats.sleep_event_count, 2);
        assert_eq!(monitor.snapshot().status, AlertnessState::Inactive);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_tick_keeps_state() {
        let source = Scripted::new(&[Some(0.18), None, Some(0.18)]);
        let (monitor, _) = monitor(Arc::new(source));
        ready(&monitor);
        monitor.start().unwrap();

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(monitor.snapshot().status, AlertnessState::Sleeping);

        // Second tick fails: still sleeping, loop keeps going
        tokio::time::sleep(Duration::from_millis(3_000)).await;
        assert_eq!(monitor.snapshot().status, AlertnessState::Sleeping);

        tokio::time::sleep(Duration::from_millis(3_000)).await;
        let snap = monitor.snapshot();
        assert_eq!(snap.status, AlertnessState::Sleeping);
        assert_eq!(snap.stats.sleep_event_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_before_first_tick() {
        let (monitor, _) = monitor(Arc::new(Scripted::new(&[Some(0.1)])));
        ready(&monitor);
        monitor.start().unwrap();

        let stats = monitor.stop().unwrap();
        assert_eq!(stats, SessionStats::default());

        tokio::time::sleep(Duration::from_secs(10)).await;
        let snap = monitor.snapshot();
        assert_eq!(snap.status, AlertnessState::Inactive);
        assert_eq!(snap.stats, SessionStats::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_result_discarded_after_stop() {
        let mut source = Scripted::new(&[Some(0.1)]);
        source.delay = Duration::from_secs(5);
        let (monitor, sink) = monitor(Arc::new(source));
        ready(&monitor);
        monitor.start().unwrap();

        // First tick at 3s; classification resolves at 8s
        tokio::time::sleep(Duration::from_secs(4)).await;
        monitor.stop().unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;

        let snap = monitor.snapshot();
        assert_eq!(snap.status, AlertnessState::Inactive);
        assert_eq!(snap.stats.sleep_event_count, 0);
        assert_eq!(sink.sounds.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_runs_during_slow_classification() {
        let mut source = Scripted::new(&[Some(0.3)]);
        source.delay = Duration::from_secs(20);
        let (monitor, _) = monitor(Arc::new(source));
        ready(&monitor);
        monitor.start().unwrap();

        tokio::time::sleep(Duration::from_millis(10_500)).await;
        assert_eq!(monitor.snapshot().stats.elapsed_seconds, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_records_persisted_per_tick() {
        let repo = Arc::new(Repository::new());
        let source = Scripted::new(&[Some(0.3), Some(0.3), Some(0.1)]);
        let (monitor, _) = monitor(Arc::new(source));
        let monitor = monitor.with_store(repo.clone());
        ready(&monitor);
        monitor.start().unwrap();

        tokio::time::sleep(Duration::from_millis(9_500)).await;
        assert_eq!(repo.count(), 3);
        assert_eq!(repo.count_status(DetectionStatus::Awake), 2);
        assert_eq!(repo.count_status(DetectionStatus::Sleeping), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistence_failure_is_not_fatal() {
        let source = Scripted::new(&[Some(0.1), Some(0.3)]);
        let (monitor, _) = monitor(Arc::new(source));
        let monitor = monitor.with_store(Arc::new(FailingStore));
        ready(&monitor);
        monitor.start().unwrap();

        tokio::time::sleep(Duration::from_millis(6_500)).await;
        let snap = monitor.snapshot();
        assert_eq!(snap.status, AlertnessState::Awake);
        assert_eq!(snap.stats.sleep_event_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_stop() {
        let source = Scripted::new(&[Some(0.1), Some(0.1)]);
        let (monitor, sink) = monitor(Arc::new(source));
        ready(&monitor);

        monitor.start().unwrap();
        assert!(matches!(monitor.start(), Err(SessionError::AlreadyRunning)));
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        monitor.stop().unwrap();

        monitor.start().unwrap();
        let snap = monitor.snapshot();
        assert_eq!(snap.status, AlertnessState::Awake);
        assert_eq!(snap.stats, SessionStats::default());

        let titles: Vec<_> = sink
            .toasts
            .lock()
            .unwrap()
            .iter()
            .map(|t| t.title.clone())
            .collect();
        assert_eq!(
            titles,
            vec!["Detection Started", "Alert!", "Detection Stopped", "Detection Started"]
        );
    }
}
