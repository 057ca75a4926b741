//! Journey tracking state machine.
//!
//! [`JourneyTracker`] owns the journey state and every background task of the
//! current session. Tasks never touch state; they post session-tagged events
//! into a channel that [`JourneyTracker::next_update`] drains and applies one
//! at a time. Stopping a journey bumps the session counter, so anything still
//! in flight from the old session is discarded on arrival.
//!
//! All mutation goes through `&mut self`, which also means a route fetch can
//! never overlap another one.

use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::config::TrackingConfig;
use crate::error::{Result, TrackingError};
use crate::geo_utils::interpolate;
use crate::position::PositionError;
use crate::progress::{compute_progress_with, ProgressSample, ProgressThresholds};
use crate::providers::{Geocoder, PermissionState, PositionSource, RouteProvider};
use crate::reroute::{RerouteOutcome, RerouteThrottle};
use crate::route::Route;
use crate::simulation::{spawn_place_lookup, spawn_position_watch, spawn_simulation, SessionTask};
use crate::GpsPoint;

/// Snapshot of the current journey.
///
/// The default value is the idle state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JourneyState {
    pub origin: Option<GpsPoint>,
    pub destination: Option<GpsPoint>,
    pub current_position: Option<GpsPoint>,
    pub route: Option<Route>,
    /// Percent complete, 0 to 100
    pub progress: f64,
    pub total_distance_m: Option<f64>,
    pub remaining_distance_km: Option<f64>,
    pub distance_from_route_m: Option<f64>,
    pub is_tracking: bool,
    pub is_off_route: bool,
    /// Once set, stays set until the journey stops
    pub has_reached_destination: bool,
    /// User-facing message for the last failure worth showing
    pub error: Option<String>,
    pub origin_name: Option<String>,
    pub destination_name: Option<String>,
}

/// Where positions currently come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrackingMode {
    /// Device position watch
    #[default]
    Live,
    /// Injected or simulated positions; live emissions are ignored
    Simulated,
}

/// Origin of a processed position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PositionKind {
    Live,
    /// Step `step` of `total` in a simulated run
    Simulated { step: u32, total: u32 },
    /// Injected through [`JourneyTracker::set_mock_position`]
    Manual,
}

/// Result of processing one position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionUpdate {
    pub position: GpsPoint,
    pub kind: PositionKind,
    pub sample: ProgressSample,
    /// Set when the position was off-route and a re-route was attempted
    pub reroute: Option<RerouteOutcome>,
    /// True only for the update that first reached the destination
    pub arrived: bool,
}

/// Point a quick-set control jumps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuickSetTarget {
    Origin,
    Halfway,
    Destination,
}

/// Something that changed the journey.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum JourneyUpdate {
    Position(PositionUpdate),
    /// A live watch emission failed
    PositionFailed {
        error: PositionError,
        consecutive_failures: u32,
        /// Whether the failure was written to [`JourneyState::error`]
        surfaced: bool,
    },
    /// A live position arrived while in simulated mode and was ignored
    LiveSuppressed,
    PlacesResolved {
        origin: Option<String>,
        destination: Option<String>,
    },
}

/// Messages posted by session tasks.
#[derive(Debug)]
pub(crate) enum TrackerEvent {
    Live {
        session: u64,
        result: std::result::Result<GpsPoint, PositionError>,
    },
    Simulated {
        session: u64,
        run: u64,
        step: u32,
        total: u32,
        position: GpsPoint,
    },
    PlaceNames {
        session: u64,
        origin: Option<String>,
        destination: Option<String>,
    },
}

#[derive(Debug)]
struct ActiveSimulation {
    run: u64,
    task: SessionTask,
}

/// Tracks progress of one journey at a time.
///
/// Must be used from within a tokio runtime: starting a journey spawns the
/// position watch and the place-name lookup.
///
/// # Example
/// ```ignore
/// use std::sync::Arc;
/// use route_progress::synthetic::{ScriptedPositionSource, ScriptedRouteProvider};
/// use route_progress::{GpsPoint, JourneyTracker, TrackingConfig};
///
/// let routes = Arc::new(ScriptedRouteProvider::straight_line());
/// let positions = Arc::new(ScriptedPositionSource::at(GpsPoint::new(0.0, 0.0)));
///
/// let mut tracker = JourneyTracker::new(routes, TrackingConfig::default())?
///     .with_position_source(positions);
///
/// tracker.start_journey(GpsPoint::new(0.0, 1.0)).await?;
/// let update = tracker.set_mock_position(0.0, 0.5).await?;
/// assert!((update.sample.progress_percent - 50.0).abs() < 0.01);
/// ```
pub struct JourneyTracker {
    config: TrackingConfig,
    routes: Arc<dyn RouteProvider>,
    positions: Option<Arc<dyn PositionSource>>,
    geocoder: Option<Arc<dyn Geocoder>>,
    state: JourneyState,
    mode: TrackingMode,
    session: u64,
    simulation_runs: u64,
    watch: Option<SessionTask>,
    simulation: Option<ActiveSimulation>,
    place_lookup: Option<SessionTask>,
    throttle: RerouteThrottle,
    consecutive_failures: u32,
    events_tx: UnboundedSender<TrackerEvent>,
    events_rx: UnboundedReceiver<TrackerEvent>,
}

impl JourneyTracker {
    /// Create an idle tracker. Without a position source, starting a journey
    /// fails with [`TrackingError::GeolocationUnsupported`].
    pub fn new(routes: Arc<dyn RouteProvider>, config: TrackingConfig) -> Result<Self> {
        config.validate()?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Ok(Self {
            throttle: RerouteThrottle::new(config.reroute_throttle()),
            config,
            routes,
            positions: None,
            geocoder: None,
            state: JourneyState::default(),
            mode: TrackingMode::Live,
            session: 0,
            simulation_runs: 0,
            watch: None,
            simulation: None,
            place_lookup: None,
            consecutive_failures: 0,
            events_tx,
            events_rx,
        })
    }

    pub fn with_position_source(mut self, positions: Arc<dyn PositionSource>) -> Self {
        self.positions = Some(positions);
        self
    }

    pub fn with_geocoder(mut self, geocoder: Arc<dyn Geocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub fn state(&self) -> &JourneyState {
        &self.state
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    pub fn mode(&self) -> TrackingMode {
        self.mode
    }

    pub fn is_tracking(&self) -> bool {
        self.state.is_tracking
    }

    pub fn is_simulating(&self) -> bool {
        self.simulation.is_some()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Journey state as JSON, for UI bridges.
    pub fn state_json(&self) -> Result<String> {
        serde_json::to_string(&self.state).map_err(|e| TrackingError::Internal {
            message: format!("Failed to serialize journey state: {}", e),
        })
    }

    /// Start tracking a journey to `destination` from the current position.
    ///
    /// Any active journey is stopped first. On failure the message is stored
    /// in [`JourneyState::error`] and the tracker stays idle.
    pub async fn start_journey(&mut self, destination: GpsPoint) -> Result<GpsPoint> {
        self.stop_journey();

        match self.begin(destination).await {
            Ok(origin) => Ok(origin),
            Err(err) => {
                warn!("[JourneyTracker] Failed to start journey: {}", err);
                self.state.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    async fn begin(&mut self, destination: GpsPoint) -> Result<GpsPoint> {
        if !destination.is_valid() {
            return Err(TrackingError::InvalidRoute {
                message: format!(
                    "invalid destination ({}, {})",
                    destination.latitude, destination.longitude
                ),
            });
        }

        let source = match &self.positions {
            Some(source) if source.is_supported() => Arc::clone(source),
            _ => return Err(TrackingError::GeolocationUnsupported),
        };

        if source.check_permission().await == PermissionState::Denied {
            return Err(TrackingError::PermissionDenied);
        }

        let options = self.config.position.clone();
        let fix = tokio::time::timeout(options.timeout(), source.current_position(&options));
        let origin = match fix.await {
            Ok(Ok(position)) => position,
            Ok(Err(err)) => return Err(err.into()),
            Err(_) => return Err(PositionError::timeout().into()),
        };

        let routes = Arc::clone(&self.routes);
        let route = routes
            .fetch_route(origin, destination)
            .await
            .map_err(|err| match err {
                TrackingError::RouteUnavailable { .. } => err,
                other => TrackingError::RouteUnavailable {
                    message: other.to_string(),
                },
            })?;

        info!(
            "[JourneyTracker] Journey started: ({:.5}, {:.5}) -> ({:.5}, {:.5}), {:.2} km",
            origin.latitude,
            origin.longitude,
            destination.latitude,
            destination.longitude,
            route.total_distance_m() / 1000.0
        );

        self.state = JourneyState {
            origin: Some(origin),
            destination: Some(destination),
            current_position: Some(origin),
            total_distance_m: Some(route.total_distance_m()),
            remaining_distance_km: Some(route.total_distance_m() / 1000.0),
            route: Some(route),
            is_tracking: true,
            ..JourneyState::default()
        };

        self.watch = Some(spawn_position_watch(
            source.watch_position(&options),
            self.session,
            self.events_tx.clone(),
        ));

        if let Some(geocoder) = &self.geocoder {
            self.place_lookup = Some(spawn_place_lookup(
                Arc::clone(geocoder),
                origin,
                destination,
                self.session,
                self.events_tx.clone(),
            ));
        }

        Ok(origin)
    }

    /// Stop the journey: cancel the watch and any simulation, and reset to idle.
    ///
    /// Safe to call when nothing is running.
    pub fn stop_journey(&mut self) {
        self.cancel_session_tasks();

        if self.state.is_tracking {
            info!("[JourneyTracker] Journey stopped");
        }

        self.state = JourneyState::default();
        self.mode = TrackingMode::Live;
        self.throttle.reset();
        self.consecutive_failures = 0;
        self.session += 1;
    }

    fn cancel_session_tasks(&mut self) {
        if let Some(watch) = self.watch.take() {
            watch.cancel();
        }
        if let Some(simulation) = self.simulation.take() {
            simulation.task.cancel();
        }
        if let Some(lookup) = self.place_lookup.take() {
            lookup.cancel();
        }
    }

    /// Wait for the next event of the current session and apply it.
    ///
    /// Events from earlier sessions are skipped. Returns `None` only if the
    /// event channel is closed, which cannot happen while the tracker lives.
    pub async fn next_update(&mut self) -> Option<JourneyUpdate> {
        loop {
            let event = self.events_rx.recv().await?;
            if let Some(update) = self.apply_event(event).await {
                return Some(update);
            }
        }
    }

    async fn apply_event(&mut self, event: TrackerEvent) -> Option<JourneyUpdate> {
        match event {
            TrackerEvent::Live { session, result } => {
                if session != self.session || !self.state.is_tracking {
                    return None;
                }
                if self.mode == TrackingMode::Simulated {
                    debug!("[JourneyTracker] Ignoring live position while simulating");
                    return Some(JourneyUpdate::LiveSuppressed);
                }
                match result {
                    Ok(position) => {
                        self.consecutive_failures = 0;
                        self.handle_position(position, PositionKind::Live, false)
                            .await
                            .ok()
                            .map(JourneyUpdate::Position)
                    }
                    Err(err) => Some(self.handle_position_error(err)),
                }
            }
            TrackerEvent::Simulated {
                session,
                run,
                step,
                total,
                position,
            } => {
                let current_run = self.simulation.as_ref().map(|s| s.run);
                if session != self.session || current_run != Some(run) {
                    return None;
                }
                if step >= total {
                    // The task has sent its last event and is finishing on its own
                    self.simulation = None;
                    info!("[JourneyTracker] Simulation complete after {} steps", total);
                }
                self.mode = TrackingMode::Simulated;
                self.handle_position(position, PositionKind::Simulated { step, total }, false)
                    .await
                    .ok()
                    .map(JourneyUpdate::Position)
            }
            TrackerEvent::PlaceNames {
                session,
                origin,
                destination,
            } => {
                if session != self.session {
                    return None;
                }
                self.place_lookup = None;
                self.state.origin_name = origin.clone();
                self.state.destination_name = destination.clone();
                Some(JourneyUpdate::PlacesResolved {
                    origin,
                    destination,
                })
            }
        }
    }

    async fn handle_position(
        &mut self,
        position: GpsPoint,
        kind: PositionKind,
        force_reroute: bool,
    ) -> Result<PositionUpdate> {
        if !self.state.is_tracking {
            return Err(TrackingError::NotTracking);
        }

        // A tracking session always holds a route
        let Some(route) = &self.state.route else {
            return Err(TrackingError::NotTracking);
        };
        let thresholds = ProgressThresholds::from(&self.config);
        let sample = compute_progress_with(&position, route, &thresholds);

        self.state.current_position = Some(position);
        self.state.progress = sample.progress_percent;
        self.state.remaining_distance_km = Some(sample.distance_remaining_km);
        self.state.distance_from_route_m = Some(sample.distance_from_route_m);
        self.state.is_off_route = sample.is_off_route;
        self.state.error = None;

        debug!(
            "[JourneyTracker] {:?} position: {:.1}% complete, {:.2} km left, {:.0} m from route",
            kind,
            sample.progress_percent,
            sample.distance_remaining_km,
            sample.distance_from_route_m
        );

        let reroute = if sample.is_off_route {
            Some(self.maybe_refetch_route(force_reroute).await)
        } else {
            None
        };

        let arrived = !self.state.has_reached_destination && sample.is_arrival(&self.config);
        if arrived {
            self.state.has_reached_destination = true;
            info!("[JourneyTracker] Destination reached");
        }

        Ok(PositionUpdate {
            position,
            kind,
            sample,
            reroute,
            arrived,
        })
    }

    fn handle_position_error(&mut self, error: PositionError) -> JourneyUpdate {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let failures = self.consecutive_failures;

        if failures % self.config.error_log_frequency == 0 {
            warn!(
                "[JourneyTracker] {} consecutive position errors, latest: {}",
                failures, error
            );
        }

        let surfaced = failures > self.config.error_display_threshold;
        if surfaced {
            self.state.error = Some(error.user_message());
        }

        JourneyUpdate::PositionFailed {
            error,
            consecutive_failures: failures,
            surfaced,
        }
    }

    /// Fetch a fresh route from the journey origin to the destination.
    ///
    /// Unless `force` is set, a fetch is skipped while a previous successful
    /// refetch is younger than the throttle window. On failure the current
    /// route stays in place.
    pub async fn maybe_refetch_route(&mut self, force: bool) -> RerouteOutcome {
        let (Some(origin), Some(destination)) = (self.state.origin, self.state.destination) else {
            return RerouteOutcome::NotTracking;
        };
        if !self.state.is_tracking {
            return RerouteOutcome::NotTracking;
        }

        if !self.throttle.permits(force) {
            let retry_in = self.throttle.retry_in().unwrap_or_default();
            debug!("[JourneyTracker] Re-route throttled, retry in {:?}", retry_in);
            return RerouteOutcome::Throttled { retry_in };
        }

        let routes = Arc::clone(&self.routes);
        match routes.fetch_route(origin, destination).await {
            Ok(route) => {
                info!(
                    "[JourneyTracker] Re-routed: {:.2} km, {} points",
                    route.total_distance_m() / 1000.0,
                    route.path().len()
                );
                self.state.total_distance_m = Some(route.total_distance_m());
                self.state.route = Some(route);
                self.state.is_off_route = false;
                self.throttle.record_success();
                RerouteOutcome::Rerouted
            }
            Err(err) => {
                warn!("[JourneyTracker] Re-route failed: {}", err);
                RerouteOutcome::Failed {
                    message: err.to_string(),
                }
            }
        }
    }

    /// Inject a position, switching the tracker to simulated mode.
    ///
    /// Off-route injections force a re-route regardless of the throttle.
    pub async fn set_mock_position(
        &mut self,
        latitude: f64,
        longitude: f64,
    ) -> Result<PositionUpdate> {
        let position = GpsPoint::new(latitude, longitude);
        if !position.is_valid() {
            return Err(TrackingError::InvalidRoute {
                message: format!("invalid position ({}, {})", latitude, longitude),
            });
        }
        if !self.state.is_tracking {
            return Err(TrackingError::NotTracking);
        }

        self.mode = TrackingMode::Simulated;
        self.handle_position(position, PositionKind::Manual, true).await
    }

    /// Jump to the origin, the halfway point or the destination.
    pub async fn quick_set(&mut self, target: QuickSetTarget) -> Result<PositionUpdate> {
        let (Some(origin), Some(destination)) = (self.state.origin, self.state.destination) else {
            return Err(TrackingError::NotTracking);
        };
        let point = match target {
            QuickSetTarget::Origin => origin,
            QuickSetTarget::Halfway => interpolate(&origin, &destination, 0.5),
            QuickSetTarget::Destination => destination,
        };
        self.set_mock_position(point.latitude, point.longitude).await
    }

    /// Toggle the simulated journey. Returns whether a simulation is now running.
    ///
    /// Stopping a simulation leaves the tracker in simulated mode at the last
    /// simulated position.
    pub fn simulate_journey(&mut self) -> Result<bool> {
        if let Some(simulation) = self.simulation.take() {
            simulation.task.cancel();
            info!("[JourneyTracker] Simulation stopped");
            return Ok(false);
        }

        let (Some(origin), Some(destination)) = (self.state.origin, self.state.destination) else {
            return Err(TrackingError::SimulationUnavailable);
        };

        self.simulation_runs += 1;
        let run = self.simulation_runs;
        let task = spawn_simulation(
            origin,
            destination,
            self.config.simulation_steps,
            self.config.simulation_interval(),
            self.session,
            run,
            self.events_tx.clone(),
        );
        self.simulation = Some(ActiveSimulation { run, task });

        info!(
            "[JourneyTracker] Simulating {} steps every {:?}",
            self.config.simulation_steps,
            self.config.simulation_interval()
        );
        Ok(true)
    }
}

impl Drop for JourneyTracker {
    fn drop(&mut self) {
        self.cancel_session_tasks();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::PositionErrorCode;
    use crate::synthetic::{ScriptedPositionSource, ScriptedRouteProvider, StaticGeocoder};
    use std::time::Duration;

    fn origin() -> GpsPoint {
        GpsPoint::new(0.0, 0.0)
    }

    fn destination() -> GpsPoint {
        GpsPoint::new(0.0, 1.0)
    }

    fn tracker_with(
        routes: Arc<ScriptedRouteProvider>,
        positions: Arc<ScriptedPositionSource>,
    ) -> JourneyTracker {
        JourneyTracker::new(routes, TrackingConfig::default())
            .unwrap()
            .with_position_source(positions)
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_sets_tracking_state() {
        let routes = Arc::new(ScriptedRouteProvider::straight_line());
        let positions = Arc::new(ScriptedPositionSource::at(origin()));
        let mut tracker = tracker_with(routes.clone(), positions.clone());

        let start = tracker.start_journey(destination()).await.unwrap();
        assert_eq!(start, origin());

        let state = tracker.state();
        assert!(state.is_tracking);
        assert_eq!(state.origin, Some(origin()));
        assert_eq!(state.destination, Some(destination()));
        assert_eq!(state.current_position, Some(origin()));
        assert_eq!(state.progress, 0.0);
        assert!(state.route.is_some());
        let total = state.total_distance_m.unwrap();
        assert!((state.remaining_distance_km.unwrap() - total / 1000.0).abs() < 1e-9);
        assert_eq!(routes.calls(), 1);
        assert_eq!(positions.watch_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_without_position_source_is_unsupported() {
        let routes = Arc::new(ScriptedRouteProvider::straight_line());
        let mut tracker = JourneyTracker::new(routes.clone(), TrackingConfig::default()).unwrap();

        let err = tracker.start_journey(destination()).await.unwrap_err();
        assert_eq!(err, TrackingError::GeolocationUnsupported);
        assert_eq!(tracker.state().error.as_deref(), Some("Geolocation not supported"));
        assert!(!tracker.is_tracking());
        assert_eq!(routes.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_with_denied_permission() {
        let routes = Arc::new(ScriptedRouteProvider::straight_line());
        let positions =
            Arc::new(ScriptedPositionSource::at(origin()).with_permission(PermissionState::Denied));
        let mut tracker = tracker_with(routes.clone(), positions.clone());

        let err = tracker.start_journey(destination()).await.unwrap_err();
        assert_eq!(err, TrackingError::PermissionDenied);
        assert!(tracker.state().error.is_some());
        assert!(!tracker.is_tracking());
        assert_eq!(positions.watch_calls(), 0);
        assert_eq!(routes.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_times_out_waiting_for_fix() {
        let routes = Arc::new(ScriptedRouteProvider::straight_line());
        let positions = Arc::new(ScriptedPositionSource::hanging());
        let mut tracker = tracker_with(routes, positions);

        let started = tokio::time::Instant::now();
        let err = tracker.start_journey(destination()).await.unwrap_err();
        assert_eq!(err, TrackingError::Position(PositionError::timeout()));
        assert!(started.elapsed() >= Duration::from_secs(60));
        assert!(!tracker.is_tracking());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_with_failing_route_provider() {
        let routes = Arc::new(ScriptedRouteProvider::straight_line());
        routes.fail_next("No route found");
        let positions = Arc::new(ScriptedPositionSource::at(origin()));
        let mut tracker = tracker_with(routes, positions.clone());

        let err = tracker.start_journey(destination()).await.unwrap_err();
        assert!(matches!(err, TrackingError::RouteUnavailable { .. }));
        assert_eq!(
            tracker.state().error.as_deref(),
            Some("Route unavailable: No route found")
        );
        assert!(!tracker.is_tracking());
        assert_eq!(positions.watch_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_position_updates_progress() {
        let routes = Arc::new(ScriptedRouteProvider::straight_line());
        let positions = Arc::new(ScriptedPositionSource::at(origin()));
        let mut tracker = tracker_with(routes, positions.clone());
        tracker.start_journey(destination()).await.unwrap();

        positions.emit(Ok(GpsPoint::new(0.0, 0.25)));
        let update = tracker.next_update().await.unwrap();

        let JourneyUpdate::Position(update) = update else {
            panic!("expected a position update, got {:?}", update);
        };
        assert_eq!(update.kind, PositionKind::Live);
        assert!((update.sample.progress_percent - 25.0).abs() < 0.01);
        assert!(update.reroute.is_none());
        assert!(!update.arrived);
        assert!((tracker.state().progress - 25.0).abs() < 0.01);
        assert_eq!(tracker.state().current_position, Some(GpsPoint::new(0.0, 0.25)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_watch_and_resets() {
        let routes = Arc::new(ScriptedRouteProvider::straight_line());
        let positions = Arc::new(ScriptedPositionSource::at(origin()));
        let mut tracker = tracker_with(routes, positions.clone());
        tracker.start_journey(destination()).await.unwrap();

        // Queued into the old session before stop
        positions.emit(Ok(GpsPoint::new(0.0, 0.9)));
        settle().await;

        tracker.stop_journey();
        settle().await;

        assert_eq!(tracker.state(), &JourneyState::default());
        assert_eq!(positions.active_watches(), 0);
        assert!(!tracker.is_simulating());

        // The stale event is skipped once a new session runs
        tracker.start_journey(destination()).await.unwrap();
        positions.emit(Ok(GpsPoint::new(0.0, 0.1)));
        let Some(JourneyUpdate::Position(update)) = tracker.next_update().await else {
            panic!("expected a position update");
        };
        assert_eq!(update.position, GpsPoint::new(0.0, 0.1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_surface_after_threshold() {
        let routes = Arc::new(ScriptedRouteProvider::straight_line());
        let positions = Arc::new(ScriptedPositionSource::at(origin()));
        let mut tracker = tracker_with(routes, positions.clone());
        tracker.start_journey(destination()).await.unwrap();

        let error = PositionError::new(PositionErrorCode::PositionUnavailable);
        for expected in 1..=21u32 {
            positions.emit(Err(error.clone()));
            let Some(JourneyUpdate::PositionFailed {
                consecutive_failures,
                surfaced,
                ..
            }) = tracker.next_update().await
            else {
                panic!("expected a position failure");
            };
            assert_eq!(consecutive_failures, expected);
            assert_eq!(surfaced, expected > 20);
        }
        assert_eq!(tracker.state().error, Some(error.user_message()));

        positions.emit(Ok(GpsPoint::new(0.0, 0.5)));
        tracker.next_update().await.unwrap();
        assert_eq!(tracker.consecutive_failures(), 0);
        assert!(tracker.state().error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_position_requires_journey() {
        let routes = Arc::new(ScriptedRouteProvider::straight_line());
        let positions = Arc::new(ScriptedPositionSource::at(origin()));
        let mut tracker = tracker_with(routes, positions);

        assert_eq!(
            tracker.set_mock_position(0.0, 0.5).await.unwrap_err(),
            TrackingError::NotTracking
        );
        assert_eq!(
            tracker.simulate_journey().unwrap_err(),
            TrackingError::SimulationUnavailable
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_position_suppresses_live() {
        let routes = Arc::new(ScriptedRouteProvider::straight_line());
        let positions = Arc::new(ScriptedPositionSource::at(origin()));
        let mut tracker = tracker_with(routes, positions.clone());
        tracker.start_journey(destination()).await.unwrap();

        let update = tracker.quick_set(QuickSetTarget::Halfway).await.unwrap();
        assert_eq!(update.kind, PositionKind::Manual);
        assert!((update.sample.progress_percent - 50.0).abs() < 0.01);
        assert_eq!(tracker.mode(), TrackingMode::Simulated);

        positions.emit(Ok(GpsPoint::new(0.0, 0.1)));
        assert_eq!(tracker.next_update().await, Some(JourneyUpdate::LiveSuppressed));
        assert_eq!(tracker.state().current_position, Some(GpsPoint::new(0.0, 0.5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_off_route_mock_forces_reroute() {
        let routes = Arc::new(ScriptedRouteProvider::straight_line());
        let positions = Arc::new(ScriptedPositionSource::at(origin()));
        let mut tracker = tracker_with(routes.clone(), positions);
        tracker.start_journey(destination()).await.unwrap();

        for _ in 0..2 {
            let update = tracker.set_mock_position(0.01, 0.5).await.unwrap();
            assert!(update.sample.is_off_route);
            assert_eq!(update.reroute, Some(RerouteOutcome::Rerouted));
        }
        // Initial fetch plus two forced refetches
        assert_eq!(routes.calls(), 3);
        assert!(!tracker.state().is_off_route);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refetch_throttles_until_window_passes() {
        let routes = Arc::new(ScriptedRouteProvider::straight_line());
        let positions = Arc::new(ScriptedPositionSource::at(origin()));
        let mut tracker = tracker_with(routes.clone(), positions);
        tracker.start_journey(destination()).await.unwrap();

        assert_eq!(tracker.maybe_refetch_route(false).await, RerouteOutcome::Rerouted);
        assert!(matches!(
            tracker.maybe_refetch_route(false).await,
            RerouteOutcome::Throttled { .. }
        ));
        assert_eq!(routes.calls(), 2);

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(tracker.maybe_refetch_route(false).await, RerouteOutcome::Rerouted);
        assert_eq!(routes.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refetch_keeps_route_and_window_open() {
        let routes = Arc::new(ScriptedRouteProvider::straight_line());
        let positions = Arc::new(ScriptedPositionSource::at(origin()));
        let mut tracker = tracker_with(routes.clone(), positions);
        tracker.start_journey(destination()).await.unwrap();
        let before = tracker.state().route.clone();

        routes.fail_next("upstream timeout");
        assert!(matches!(
            tracker.maybe_refetch_route(false).await,
            RerouteOutcome::Failed { .. }
        ));
        assert_eq!(tracker.state().route, before);

        assert_eq!(tracker.maybe_refetch_route(false).await, RerouteOutcome::Rerouted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refetch_when_idle() {
        let routes = Arc::new(ScriptedRouteProvider::straight_line());
        let positions = Arc::new(ScriptedPositionSource::at(origin()));
        let mut tracker = tracker_with(routes.clone(), positions);

        assert_eq!(tracker.maybe_refetch_route(true).await, RerouteOutcome::NotTracking);
        assert_eq!(routes.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_arrival_is_reported_once() {
        let routes = Arc::new(ScriptedRouteProvider::straight_line());
        let positions = Arc::new(ScriptedPositionSource::at(origin()));
        let mut tracker = tracker_with(routes, positions);
        tracker.start_journey(destination()).await.unwrap();

        let first = tracker.quick_set(QuickSetTarget::Destination).await.unwrap();
        assert!(first.arrived);
        let second = tracker.quick_set(QuickSetTarget::Destination).await.unwrap();
        assert!(!second.arrived);

        // Moving back does not clear arrival
        tracker.quick_set(QuickSetTarget::Origin).await.unwrap();
        assert!(tracker.state().has_reached_destination);
        assert_eq!(tracker.state().progress, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulation_toggle() {
        let routes = Arc::new(ScriptedRouteProvider::straight_line());
        let positions = Arc::new(ScriptedPositionSource::at(origin()));
        let mut tracker = tracker_with(routes, positions);
        tracker.start_journey(destination()).await.unwrap();

        assert!(tracker.simulate_journey().unwrap());
        assert!(tracker.is_simulating());

        let Some(JourneyUpdate::Position(update)) = tracker.next_update().await else {
            panic!("expected a simulated position");
        };
        assert_eq!(update.kind, PositionKind::Simulated { step: 1, total: 100 });

        assert!(!tracker.simulate_journey().unwrap());
        assert!(!tracker.is_simulating());
        assert_eq!(tracker.mode(), TrackingMode::Simulated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_place_names_resolved() {
        let routes = Arc::new(ScriptedRouteProvider::straight_line());
        let positions = Arc::new(ScriptedPositionSource::at(origin()));
        let geocoder = Arc::new(
            StaticGeocoder::new()
                .with_place(origin(), "Null Island")
                .with_place(destination(), "Gulf of Guinea"),
        );
        let mut tracker = tracker_with(routes, positions).with_geocoder(geocoder);
        tracker.start_journey(destination()).await.unwrap();

        let update = tracker.next_update().await.unwrap();
        assert_eq!(
            update,
            JourneyUpdate::PlacesResolved {
                origin: Some("Null Island".to_string()),
                destination: Some("Gulf of Guinea".to_string()),
            }
        );
        assert_eq!(tracker.state().origin_name.as_deref(), Some("Null Island"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_json() {
        let routes = Arc::new(ScriptedRouteProvider::straight_line());
        let positions = Arc::new(ScriptedPositionSource::at(origin()));
        let mut tracker = tracker_with(routes, positions);
        tracker.start_journey(destination()).await.unwrap();

        let json: serde_json::Value = serde_json::from_str(&tracker.state_json().unwrap()).unwrap();
        assert_eq!(json["is_tracking"], true);
        assert_eq!(json["destination"]["longitude"], 1.0);
    }
}
