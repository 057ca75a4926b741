//! Deterministic collaborators for tests and demos.
//!
//! Enabled with the `synthetic` feature. Nothing here touches the network or
//! a real device: routes are scripted or straight lines, positions are pushed
//! by the caller.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use tokio::sync::mpsc::{self, UnboundedSender};

use crate::config::PositionOptions;
use crate::error::{Result, TrackingError};
use crate::geo_utils::haversine_distance;
use crate::position::PositionError;
use crate::providers::{Geocoder, PermissionState, PositionSource, RouteProvider};
use crate::route::Route;
use crate::GpsPoint;

/// Route provider answering from a script, then from a fallback.
///
/// Scripted responses are consumed in order. Once the script is empty, every
/// request gets the fixed route if one was given, otherwise a straight line
/// between the requested points.
#[derive(Debug, Default)]
pub struct ScriptedRouteProvider {
    script: Mutex<VecDeque<Result<Route>>>,
    fixed: Option<Route>,
    requests: Mutex<Vec<(GpsPoint, GpsPoint)>>,
    calls: AtomicUsize,
}

impl ScriptedRouteProvider {
    /// Answers every request with a straight-line route.
    pub fn straight_line() -> Self {
        Self::default()
    }

    /// Answers every request with the same route.
    pub fn fixed(route: Route) -> Self {
        Self {
            fixed: Some(route),
            ..Self::default()
        }
    }

    /// Queue a response for the next unanswered request.
    pub fn push_response(&self, response: Result<Route>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(response);
        }
    }

    /// Queue a "no route found" failure.
    pub fn fail_next(&self, message: &str) {
        self.push_response(Err(TrackingError::RouteUnavailable {
            message: message.to_string(),
        }));
    }

    /// Number of fetches made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every (origin, destination) pair requested, in order.
    pub fn requests(&self) -> Vec<(GpsPoint, GpsPoint)> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn answer(&self, origin: GpsPoint, destination: GpsPoint) -> Result<Route> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((origin, destination));
        }

        let scripted = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match (scripted, &self.fixed) {
            (Some(response), _) => response,
            (None, Some(route)) => Ok(route.clone()),
            (None, None) => Route::straight_line(origin, destination),
        }
    }
}

impl RouteProvider for ScriptedRouteProvider {
    fn fetch_route(&self, origin: GpsPoint, destination: GpsPoint) -> BoxFuture<'_, Result<Route>> {
        let response = self.answer(origin, destination);
        async move { response }.boxed()
    }
}

/// Position source driven by the caller.
///
/// The one-shot fix is configured up front; watch emissions are pushed with
/// [`emit`](Self::emit) to every open watch.
#[derive(Debug)]
pub struct ScriptedPositionSource {
    supported: bool,
    permission: PermissionState,
    /// `None` never resolves
    fix: Option<std::result::Result<GpsPoint, PositionError>>,
    watchers: Mutex<Vec<UnboundedSender<std::result::Result<GpsPoint, PositionError>>>>,
    watch_calls: AtomicUsize,
}

impl ScriptedPositionSource {
    /// Source whose fix resolves to `position` with permission granted.
    pub fn at(position: GpsPoint) -> Self {
        Self {
            supported: true,
            permission: PermissionState::Granted,
            fix: Some(Ok(position)),
            watchers: Mutex::new(Vec::new()),
            watch_calls: AtomicUsize::new(0),
        }
    }

    /// Device without positioning.
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::at(GpsPoint::new(0.0, 0.0))
        }
    }

    /// Source whose one-shot fix never resolves.
    pub fn hanging() -> Self {
        Self {
            fix: None,
            ..Self::at(GpsPoint::new(0.0, 0.0))
        }
    }

    pub fn with_permission(mut self, permission: PermissionState) -> Self {
        self.permission = permission;
        self
    }

    pub fn with_fix_error(mut self, error: PositionError) -> Self {
        self.fix = Some(Err(error));
        self
    }

    /// Push an emission to every open watch; returns how many received it.
    pub fn emit(&self, result: std::result::Result<GpsPoint, PositionError>) -> usize {
        let Ok(mut watchers) = self.watchers.lock() else {
            return 0;
        };
        watchers.retain(|tx| !tx.is_closed());
        watchers
            .iter()
            .filter(|tx| tx.send(result.clone()).is_ok())
            .count()
    }

    /// Watches whose consumer is still alive.
    pub fn active_watches(&self) -> usize {
        self.watchers
            .lock()
            .map(|w| w.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    /// Number of watches ever opened.
    pub fn watch_calls(&self) -> usize {
        self.watch_calls.load(Ordering::SeqCst)
    }
}

impl PositionSource for ScriptedPositionSource {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn check_permission(&self) -> BoxFuture<'_, PermissionState> {
        let permission = self.permission;
        async move { permission }.boxed()
    }

    fn current_position(
        &self,
        _options: &PositionOptions,
    ) -> BoxFuture<'_, std::result::Result<GpsPoint, PositionError>> {
        match self.fix.clone() {
            Some(result) => async move { result }.boxed(),
            None => futures::future::pending().boxed(),
        }
    }

    fn watch_position(
        &self,
        _options: &PositionOptions,
    ) -> BoxStream<'static, std::result::Result<GpsPoint, PositionError>> {
        self.watch_calls.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut watchers) = self.watchers.lock() {
            watchers.push(tx);
        }
        futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed()
    }
}

/// Geocoder answering from a fixed list of places.
#[derive(Debug)]
pub struct StaticGeocoder {
    places: Vec<(GpsPoint, String)>,
    /// Match radius in meters
    radius_m: f64,
}

impl StaticGeocoder {
    pub fn new() -> Self {
        Self {
            places: Vec::new(),
            radius_m: 100.0,
        }
    }

    pub fn with_place(mut self, point: GpsPoint, name: &str) -> Self {
        self.places.push((point, name.to_string()));
        self
    }

    fn lookup(&self, point: &GpsPoint) -> Option<String> {
        self.places
            .iter()
            .map(|(p, name)| (haversine_distance(p, point), name))
            .filter(|(distance, _)| *distance <= self.radius_m)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, name)| name.clone())
    }
}

impl Default for StaticGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Geocoder for StaticGeocoder {
    fn reverse_geocode(&self, point: GpsPoint) -> BoxFuture<'_, Option<String>> {
        let name = self.lookup(&point);
        async move { name }.boxed()
    }
}
