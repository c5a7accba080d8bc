//! Refresh Scheduler
//!
//! Runs the fetch → bucketize → render pipeline for every panel on a fixed
//! period. Panels run as independent tasks: one failing or panicking panel
//! never holds back its siblings, and ticks are allowed to overlap.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::{JoinHandle, JoinSet};

use super::panel::PanelSpec;
use crate::pipeline::{bucketize, render, ChartSurface, SeriesOrder};
use crate::sources::{Body, ReadingSource};
use crate::websocket::{ConnectionHub, WsEvent};

/// Scheduler settings
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Time between ticks
    pub period: Duration,
    /// Skip a panel whose previous run has not finished yet
    pub skip_if_in_flight: bool,
    /// Order handed to the renderer
    pub series_order: SeriesOrder,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(60),
            skip_if_in_flight: false,
            series_order: SeriesOrder::Chronological,
        }
    }
}

/// Result of one panel run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PanelOutcome {
    Rendered { points: usize },
    Failed { error: String },
    Skipped { reason: String },
}

/// Outcome of one panel within a tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelReport {
    pub panel: String,
    pub outcome: PanelOutcome,
}

/// Every panel outcome of a tick
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickSummary {
    pub reports: Vec<PanelReport>,
}

impl TickSummary {
    pub fn rendered(&self) -> usize {
        self.count(|o| matches!(o, PanelOutcome::Rendered { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, PanelOutcome::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, PanelOutcome::Skipped { .. }))
    }

    pub fn outcome(&self, panel: &str) -> Option<&PanelOutcome> {
        self.reports.iter().find(|r| r.panel == panel).map(|r| &r.outcome)
    }

    fn count(&self, pred: impl Fn(&PanelOutcome) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Current status of a panel
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PanelStatus {
    pub last_run: Option<DateTime<Utc>>,
    pub last_outcome: Option<PanelOutcome>,
    pub consecutive_failures: u32,
    pub runs: u64,
    pub in_flight: usize,
}

type InFlight = Arc<Mutex<HashMap<String, usize>>>;

/// Marks a panel as running until dropped
struct InFlightGuard {
    panel: String,
    in_flight: InFlight,
}

impl InFlightGuard {
    /// Claim a slot; `None` when `exclusive` and the panel is already running
    fn acquire(in_flight: &InFlight, panel: &str, exclusive: bool) -> Option<Self> {
        let mut counts = lock(in_flight);
        let count = counts.entry(panel.to_string()).or_insert(0);
        if exclusive && *count > 0 {
            return None;
        }
        *count += 1;

        Some(Self {
            panel: panel.to_string(),
            in_flight: Arc::clone(in_flight),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut counts = lock(&self.in_flight);
        if let Some(count) = counts.get_mut(&self.panel) {
            *count = count.saturating_sub(1);
        }
    }
}

fn lock(in_flight: &InFlight) -> std::sync::MutexGuard<'_, HashMap<String, usize>> {
    match in_flight.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Periodically re-renders every panel
pub struct RefreshScheduler {
    panels: Vec<PanelSpec>,
    sources: HashMap<Body, Arc<dyn ReadingSource>>,
    surface: Arc<dyn ChartSurface>,
    status: Arc<RwLock<HashMap<String, PanelStatus>>>,
    in_flight: InFlight,
    running: Arc<RwLock<bool>>,
    hub: Option<Arc<ConnectionHub>>,
    config: SchedulerConfig,
}

impl RefreshScheduler {
    /// Scheduler over the default nine panels, with no sources yet
    ///
    /// A zero period is raised to one second.
    pub fn new(surface: Arc<dyn ChartSurface>, mut config: SchedulerConfig) -> Self {
        config.period = config.period.max(Duration::from_secs(1));
        Self {
            panels: PanelSpec::defaults(),
            sources: HashMap::new(),
            surface,
            status: Arc::new(RwLock::new(HashMap::new())),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            running: Arc::new(RwLock::new(false)),
            hub: None,
            config,
        }
    }

    /// Replace the panel set
    pub fn with_panels(mut self, panels: Vec<PanelSpec>) -> Self {
        self.panels = panels;
        self
    }

    /// Register the source for its body, replacing any previous one
    pub fn with_source(mut self, source: Arc<dyn ReadingSource>) -> Self {
        self.sources.insert(source.body(), source);
        self
    }

    /// Publish tick summaries on the `system` topic
    pub fn with_hub(mut self, hub: Arc<ConnectionHub>) -> Self {
        self.hub = Some(hub);
        self
    }

    pub fn panels(&self) -> &[PanelSpec] {
        &self.panels
    }

    pub fn panel(&self, id: &str) -> Option<&PanelSpec> {
        self.panels.iter().find(|p| p.id == id)
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Status of a single panel
    pub async fn panel_status(&self, id: &str) -> Option<PanelStatus> {
        self.panel(id)?;
        let mut status = self.status.read().await.get(id).cloned().unwrap_or_default();
        status.in_flight = lock(&self.in_flight).get(id).copied().unwrap_or(0);
        Some(status)
    }

    /// Status of every panel, in panel order
    pub async fn get_status(&self) -> Vec<(PanelSpec, PanelStatus)> {
        let status = self.status.read().await;
        let in_flight = lock(&self.in_flight);

        self.panels
            .iter()
            .map(|panel| {
                let mut s = status.get(&panel.id).cloned().unwrap_or_default();
                s.in_flight = in_flight.get(&panel.id).copied().unwrap_or(0);
                (panel.clone(), s)
            })
            .collect()
    }

    /// Start every panel once without waiting for completion
    ///
    /// Runs are detached from the returned set: dropping it only discards
    /// the reports, while each run still finishes, records its status and
    /// holds its in-flight slot until then.
    pub fn dispatch_tick(&self) -> JoinSet<PanelReport> {
        let mut tasks = JoinSet::new();

        for panel in &self.panels {
            let id = panel.id.clone();

            let Some(source) = self.sources.get(&panel.body).cloned() else {
                let outcome = PanelOutcome::Failed {
                    error: format!("no source registered for {}", panel.body),
                };
                tracing::warn!(panel = %id, body = %panel.body, "No source registered");
                tasks.spawn(self.finish(id, outcome));
                continue;
            };

            let Some(guard) =
                InFlightGuard::acquire(&self.in_flight, &id, self.config.skip_if_in_flight)
            else {
                tracing::debug!(panel = %id, "Previous run still in flight, skipping");
                let outcome = PanelOutcome::Skipped {
                    reason: "previous run still in flight".to_string(),
                };
                tasks.spawn(self.finish(id, outcome));
                continue;
            };

            let run = run_panel(
                panel.clone(),
                source,
                Arc::clone(&self.surface),
                self.config.series_order,
            );
            let status = Arc::clone(&self.status);
            let panel_id = id.clone();

            // Holds the in-flight slot and records status even if the set is dropped
            let supervised = tokio::spawn(async move {
                let _guard = guard;
                // Separate task so a panic surfaces as a JoinError we can report
                let outcome = match tokio::spawn(run).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        tracing::error!(panel = %panel_id, error = %e, "Panel task aborted");
                        PanelOutcome::Failed {
                            error: format!("panel task aborted: {}", e),
                        }
                    }
                };
                record(&status, &panel_id, &outcome).await;
                outcome
            });

            tasks.spawn(async move {
                let outcome = supervised.await.unwrap_or_else(|e| PanelOutcome::Failed {
                    error: format!("panel task aborted: {}", e),
                });
                PanelReport { panel: id, outcome }
            });
        }

        tasks
    }

    /// Run one tick and wait for every panel
    pub async fn run_tick(&self) -> TickSummary {
        let summary = Self::collect(self.dispatch_tick()).await;
        self.announce(&summary);
        summary
    }

    /// Drain a dispatched tick into a summary
    pub async fn collect(mut tasks: JoinSet<PanelReport>) -> TickSummary {
        let mut summary = TickSummary::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => summary.reports.push(report),
                Err(e) => tracing::error!(error = %e, "Tick task failed"),
            }
        }
        summary
    }

    fn announce(&self, summary: &TickSummary) {
        tracing::info!(
            rendered = summary.rendered(),
            failed = summary.failed(),
            skipped = summary.skipped(),
            "Refresh tick complete"
        );

        if let Some(hub) = &self.hub {
            hub.publish(WsEvent::tick_completed(
                summary.rendered(),
                summary.failed(),
                summary.skipped(),
            ));
        }
    }

    /// Future that records an outcome decided without running the pipeline
    fn finish(
        &self,
        panel: String,
        outcome: PanelOutcome,
    ) -> impl std::future::Future<Output = PanelReport> + Send + 'static {
        let status = Arc::clone(&self.status);
        async move {
            record(&status, &panel, &outcome).await;
            PanelReport { panel, outcome }
        }
    }

    /// Start the scheduler background task
    ///
    /// The first tick fires immediately. Each tick is detached, so a slow
    /// tick never delays the next one.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        let scheduler = self;

        tokio::spawn(async move {
            *scheduler.running.write().await = true;
            tracing::info!(
                panels = scheduler.panels.len(),
                period_secs = scheduler.config.period.as_secs(),
                "Refresh scheduler started"
            );

            let mut interval = tokio::time::interval(scheduler.config.period);

            loop {
                interval.tick().await;

                if !*scheduler.running.read().await {
                    break;
                }

                let tasks = scheduler.dispatch_tick();
                let this = Arc::clone(&scheduler);
                tokio::spawn(async move {
                    let summary = Self::collect(tasks).await;
                    this.announce(&summary);
                });
            }

            tracing::info!("Refresh scheduler stopped");
        })
    }

    /// Stop the scheduler after its current wait
    pub async fn stop(&self) {
        *self.running.write().await = false;
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}

/// One full pipeline pass for a panel
async fn run_panel(
    panel: PanelSpec,
    source: Arc<dyn ReadingSource>,
    surface: Arc<dyn ChartSurface>,
    order: SeriesOrder,
) -> PanelOutcome {
    let window = panel.window();
    let Some(interval) = window.bucket_interval() else {
        return PanelOutcome::Failed {
            error: "bucket interval must be greater than zero".to_string(),
        };
    };

    let readings = match source.fetch(window).await {
        Ok(readings) => readings,
        Err(e) => {
            tracing::error!(
                panel = %panel.id,
                source = source.name(),
                error = %e,
                "Failed to fetch readings"
            );
            return PanelOutcome::Failed {
                error: e.to_string(),
            };
        }
    };

    let series = bucketize(&readings, interval).ordered(order);
    let points = series.len();
    render(&series, &panel.id, &panel.title(), surface.as_ref()).await;

    PanelOutcome::Rendered { points }
}

async fn record(status: &RwLock<HashMap<String, PanelStatus>>, panel: &str, outcome: &PanelOutcome) {
    let mut status = status.write().await;
    let entry = status.entry(panel.to_string()).or_default();

    entry.last_run = Some(Utc::now());
    entry.runs += 1;
    match outcome {
        PanelOutcome::Failed { .. } => entry.consecutive_failures += 1,
        PanelOutcome::Rendered { .. } => entry.consecutive_failures = 0,
        PanelOutcome::Skipped { .. } => {}
    }
    entry.last_outcome = Some(outcome.clone());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::SurfaceBoard;
    use crate::pipeline::Reading;
    use crate::sources::{SourceError, SyntheticSource, Window};
    use async_trait::async_trait;
    use tokio::sync::Semaphore;

    /// Earth source that fails for one lookback and succeeds otherwise
    struct FlakyEarth {
        failing_lookback: Option<u32>,
        readings: Vec<Reading>,
    }

    #[async_trait]
    impl ReadingSource for FlakyEarth {
        fn name(&self) -> &str {
            "flaky"
        }

        fn body(&self) -> Body {
            Body::Earth
        }

        async fn fetch(&self, window: Window) -> Result<Vec<Reading>, SourceError> {
            if Some(window.lookback_minutes) == self.failing_lookback {
                return Err(SourceError::Network("connection refused".to_string()));
            }
            Ok(self.readings.clone())
        }
    }

    /// Mars source that panics
    struct Panicking;

    #[async_trait]
    impl ReadingSource for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        fn body(&self) -> Body {
            Body::Mars
        }

        async fn fetch(&self, _window: Window) -> Result<Vec<Reading>, SourceError> {
            panic!("boom");
        }
    }

    /// Moon source that blocks until a permit is released
    struct Gated {
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl ReadingSource for Gated {
        fn name(&self) -> &str {
            "gated"
        }

        fn body(&self) -> Body {
            Body::Moon
        }

        async fn fetch(&self, _window: Window) -> Result<Vec<Reading>, SourceError> {
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| SourceError::Network(e.to_string()))?;
            Ok(Vec::new())
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn scheduler(board: &Arc<SurfaceBoard>, earth: FlakyEarth) -> RefreshScheduler {
        RefreshScheduler::new(board.clone(), SchedulerConfig::default())
            .with_source(Arc::new(earth))
            .with_source(Arc::new(SyntheticSource::mars().with_seed(1)))
            .with_source(Arc::new(SyntheticSource::moon().with_seed(2)))
    }

    #[tokio::test]
    async fn test_one_failure_does_not_block_siblings() {
        let board = Arc::new(SurfaceBoard::new());
        let earth = FlakyEarth {
            failing_lookback: Some(300),
            readings: vec![Reading::new(at(0), 2.0)],
        };
        let scheduler = scheduler(&board, earth);

        let summary = scheduler.run_tick().await;

        assert_eq!(summary.reports.len(), 9);
        assert_eq!(summary.rendered(), 8);
        assert_eq!(summary.failed(), 1);
        assert!(matches!(
            summary.outcome("earth-1min"),
            Some(PanelOutcome::Failed { .. })
        ));

        assert_eq!(board.len().await, 8);
        assert!(board.get("earth-1min").await.is_none());
        assert!(board.get("earth-10min").await.is_some());
    }

    #[tokio::test]
    async fn test_panic_in_one_source_is_contained() {
        let board = Arc::new(SurfaceBoard::new());
        let scheduler = RefreshScheduler::new(board.clone(), SchedulerConfig::default())
            .with_source(Arc::new(FlakyEarth {
                failing_lookback: None,
                readings: Vec::new(),
            }))
            .with_source(Arc::new(Panicking))
            .with_source(Arc::new(SyntheticSource::moon()));

        let summary = scheduler.run_tick().await;

        assert_eq!(summary.rendered(), 6);
        assert_eq!(summary.failed(), 3);
        assert!(board.get("mars-1hour").await.is_none());
        assert!(board.get("moon-1hour").await.is_some());
    }

    #[tokio::test]
    async fn test_missing_source_is_reported() {
        let board = Arc::new(SurfaceBoard::new());
        let scheduler = RefreshScheduler::new(board.clone(), SchedulerConfig::default())
            .with_source(Arc::new(SyntheticSource::mars()));

        let summary = scheduler.run_tick().await;

        assert_eq!(summary.rendered(), 3);
        assert_eq!(summary.failed(), 6);
    }

    #[tokio::test]
    async fn test_status_tracks_failures() {
        let board = Arc::new(SurfaceBoard::new());
        let earth = FlakyEarth {
            failing_lookback: Some(2880),
            readings: Vec::new(),
        };
        let scheduler = scheduler(&board, earth);

        scheduler.run_tick().await;
        scheduler.run_tick().await;

        let failing = scheduler.panel_status("earth-1hour").await.unwrap();
        assert_eq!(failing.runs, 2);
        assert_eq!(failing.consecutive_failures, 2);
        assert_eq!(failing.in_flight, 0);

        let healthy = scheduler.panel_status("mars-1min").await.unwrap();
        assert_eq!(healthy.consecutive_failures, 0);
        assert_eq!(healthy.last_outcome, Some(PanelOutcome::Rendered { points: 60 }));

        assert!(scheduler.panel_status("pluto-1min").await.is_none());
        assert_eq!(scheduler.get_status().await.len(), 9);
    }

    #[tokio::test]
    async fn test_chronological_order_reaches_renderer() {
        let board = Arc::new(SurfaceBoard::new());
        let earth = FlakyEarth {
            failing_lookback: None,
            readings: vec![Reading::new(at(7200), 1.0), Reading::new(at(0), 2.0)],
        };
        let scheduler = scheduler(&board, earth)
            .with_panels(vec![PanelSpec::new("earth-test", Body::Earth, 300, 5)]);

        scheduler.run_tick().await;

        let panel = board.get("earth-test").await.unwrap();
        assert_eq!(panel.figure.data[0].x, vec![at(0), at(7200)]);
        assert_eq!(panel.figure.layout.yaxis.range, Some([0.0, 3.0]));
    }

    #[tokio::test]
    async fn test_first_seen_order_when_configured() {
        let board = Arc::new(SurfaceBoard::new());
        let config = SchedulerConfig {
            series_order: SeriesOrder::FirstSeen,
            ..Default::default()
        };
        let scheduler = RefreshScheduler::new(board.clone(), config)
            .with_panels(vec![PanelSpec::new("earth-test", Body::Earth, 300, 5)])
            .with_source(Arc::new(FlakyEarth {
                failing_lookback: None,
                readings: vec![Reading::new(at(7200), 1.0), Reading::new(at(0), 2.0)],
            }));

        scheduler.run_tick().await;

        let panel = board.get("earth-test").await.unwrap();
        assert_eq!(panel.figure.data[0].x, vec![at(7200), at(0)]);
    }

    #[tokio::test]
    async fn test_in_flight_guard_skips_overlapping_run() {
        let gate = Arc::new(Semaphore::new(0));
        let board = Arc::new(SurfaceBoard::new());
        let config = SchedulerConfig {
            skip_if_in_flight: true,
            ..Default::default()
        };
        let scheduler = RefreshScheduler::new(board.clone(), config)
            .with_panels(vec![PanelSpec::new("moon-1min", Body::Moon, 300, 5)])
            .with_source(Arc::new(Gated { gate: Arc::clone(&gate) }));

        let first = scheduler.dispatch_tick();
        let second = RefreshScheduler::collect(scheduler.dispatch_tick()).await;
        assert_eq!(second.skipped(), 1);
        assert_eq!(scheduler.panel_status("moon-1min").await.unwrap().in_flight, 1);

        gate.add_permits(1);
        let first = RefreshScheduler::collect(first).await;
        assert_eq!(first.rendered(), 1);
        assert_eq!(scheduler.panel_status("moon-1min").await.unwrap().in_flight, 0);
    }

    #[tokio::test]
    async fn test_dropped_tick_keeps_run_in_flight() {
        let gate = Arc::new(Semaphore::new(0));
        let board = Arc::new(SurfaceBoard::new());
        let config = SchedulerConfig {
            skip_if_in_flight: true,
            ..Default::default()
        };
        let scheduler = RefreshScheduler::new(board.clone(), config)
            .with_panels(vec![PanelSpec::new("moon-1min", Body::Moon, 300, 5)])
            .with_source(Arc::new(Gated { gate: Arc::clone(&gate) }));

        drop(scheduler.dispatch_tick());
        tokio::task::yield_now().await;
        assert_eq!(scheduler.panel_status("moon-1min").await.unwrap().in_flight, 1);

        let second = RefreshScheduler::collect(scheduler.dispatch_tick()).await;
        assert_eq!(second.skipped(), 1);

        gate.add_permits(1);
        let status = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let status = scheduler.panel_status("moon-1min").await.unwrap();
                if status.in_flight == 0 && status.runs == 2 {
                    break status;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(status.last_outcome, Some(PanelOutcome::Rendered { points: 0 }));
        assert!(board.get("moon-1min").await.is_some());
    }

    #[tokio::test]
    async fn test_zero_period_is_clamped() {
        let config = SchedulerConfig {
            period: Duration::ZERO,
            ..Default::default()
        };
        let scheduler = RefreshScheduler::new(Arc::new(SurfaceBoard::new()), config);
        assert_eq!(scheduler.config().period, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_overlapping_runs_allowed_by_default() {
        let gate = Arc::new(Semaphore::new(0));
        let board = Arc::new(SurfaceBoard::new());
        let scheduler = RefreshScheduler::new(board.clone(), SchedulerConfig::default())
            .with_panels(vec![PanelSpec::new("moon-1min", Body::Moon, 300, 5)])
            .with_source(Arc::new(Gated { gate: Arc::clone(&gate) }));

        let first = scheduler.dispatch_tick();
        let second = scheduler.dispatch_tick();
        assert_eq!(scheduler.panel_status("moon-1min").await.unwrap().in_flight, 2);

        gate.add_permits(2);

        assert_eq!(RefreshScheduler::collect(first).await.rendered(), 1);
        assert_eq!(RefreshScheduler::collect(second).await.rendered(), 1);
    }

    #[tokio::test]
    async fn test_start_runs_first_tick_immediately() {
        let board = Arc::new(SurfaceBoard::new());
        let config = SchedulerConfig {
            period: Duration::from_secs(3600),
            ..Default::default()
        };
        let scheduler = Arc::new(
            RefreshScheduler::new(board.clone(), config)
                .with_source(Arc::new(SyntheticSource::mars()))
                .with_source(Arc::new(SyntheticSource::moon()))
                .with_source(Arc::new(FlakyEarth {
                    failing_lookback: None,
                    readings: Vec::new(),
                })),
        );

        let handle = Arc::clone(&scheduler).start();

        tokio::time::timeout(Duration::from_secs(5), async {
            while board.len().await < 9 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        assert!(scheduler.is_running().await);
        scheduler.stop().await;
        handle.abort();
    }
}
