//! HTTP client for a Google-style Directions and Geocoding API.
//!
//! Implements [`RouteProvider`] and [`Geocoder`] over:
//! - `GET {base}/directions/json?origin=..&destination=..&mode=driving&key=..`
//! - `GET {base}/geocode/json?latlng=..&key=..`
//!
//! 429 responses are retried with exponential backoff.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use log::{debug, info, warn};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::error::{OptionExt, Result, TrackingError};
use crate::providers::{short_place_name, Geocoder, RouteProvider};
use crate::route::Route;
use crate::GpsPoint;

pub const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api";

const REQUEST_TIMEOUT_SECS: u64 = 30;
const MAX_RETRIES: u32 = 3;

/// Directions API response
#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    routes: Vec<ApiRoute>,
}

#[derive(Debug, Deserialize)]
struct ApiRoute {
    overview_polyline: ApiPolyline,
    #[serde(default)]
    legs: Vec<ApiLeg>,
}

#[derive(Debug, Deserialize)]
struct ApiPolyline {
    points: String,
}

#[derive(Debug, Deserialize)]
struct ApiLeg {
    distance: ApiValue,
    duration: ApiValue,
}

#[derive(Debug, Deserialize)]
struct ApiValue {
    value: f64,
}

/// Geocoding API response
#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    formatted_address: String,
}

/// Directions and reverse-geocoding client.
pub struct DirectionsClient {
    client: Client,
    base_url: String,
    api_key: String,
    consecutive_429s: AtomicU32,
}

impl DirectionsClient {
    /// Create a client for the public API with the given key.
    pub fn new(api_key: &str) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a client against another deployment of the same API.
    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| TrackingError::HttpError {
                message: format!("Failed to create HTTP client: {}", e),
                status_code: None,
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            consecutive_429s: AtomicU32::new(0),
        })
    }

    /// Fetch the driving route between two points.
    pub async fn directions(&self, origin: GpsPoint, destination: GpsPoint) -> Result<Route> {
        let url = format!("{}/directions/json", self.base_url);
        let query = [
            ("origin", format_latlng(&origin)),
            ("destination", format_latlng(&destination)),
            ("mode", "driving".to_string()),
            ("key", self.api_key.clone()),
        ];

        let body = self.get_with_retry(&url, &query).await?;
        let route = parse_directions(&body)?;

        info!(
            "[DirectionsClient] Route: {:.2} km, {:.0} s, {} points",
            route.total_distance_m() / 1000.0,
            route.total_duration_s(),
            route.path().len()
        );
        Ok(route)
    }

    /// Resolve a point to a short place name, `None` on any failure.
    pub async fn place_name(&self, point: GpsPoint) -> Option<String> {
        let url = format!("{}/geocode/json", self.base_url);
        let query = [
            ("latlng", format_latlng(&point)),
            ("key", self.api_key.clone()),
        ];

        match self.get_with_retry(&url, &query).await {
            Ok(body) => parse_geocode(&body),
            Err(e) => {
                warn!("[DirectionsClient] Reverse geocode failed: {}", e);
                None
            }
        }
    }

    async fn get_with_retry(&self, url: &str, query: &[(&str, String)]) -> Result<String> {
        let mut retries = 0;

        loop {
            let response = self
                .client
                .get(url)
                .query(query)
                .send()
                .await
                .map_err(|e| TrackingError::HttpError {
                    message: e.to_string(),
                    status_code: None,
                })?;

            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                retries += 1;
                if retries > MAX_RETRIES {
                    return Err(TrackingError::HttpError {
                        message: "Max retries exceeded (429)".to_string(),
                        status_code: Some(status.as_u16()),
                    });
                }

                let backoff = self.record_429();
                warn!(
                    "[DirectionsClient] 429 from {}, retry {} after {:?}",
                    url, retries, backoff
                );
                tokio::time::sleep(backoff).await;
                continue;
            }

            self.consecutive_429s.store(0, Ordering::Relaxed);

            if !status.is_success() {
                return Err(TrackingError::HttpError {
                    message: format!("HTTP {}", status),
                    status_code: Some(status.as_u16()),
                });
            }

            debug!("[DirectionsClient] {} -> {}", url, status);
            return response.text().await.map_err(|e| TrackingError::HttpError {
                message: format!("Failed to read body: {}", e),
                status_code: Some(status.as_u16()),
            });
        }
    }

    fn record_429(&self) -> Duration {
        let count = self.consecutive_429s.fetch_add(1, Ordering::Relaxed) + 1;
        // Exponential backoff: 2s, 4s, 8s, capped at 16s
        Duration::from_millis(1000 * (1 << count.min(4)))
    }
}

impl RouteProvider for DirectionsClient {
    fn fetch_route(&self, origin: GpsPoint, destination: GpsPoint) -> BoxFuture<'_, Result<Route>> {
        self.directions(origin, destination).boxed()
    }
}

impl Geocoder for DirectionsClient {
    fn reverse_geocode(&self, point: GpsPoint) -> BoxFuture<'_, Option<String>> {
        self.place_name(point).boxed()
    }
}

fn format_latlng(point: &GpsPoint) -> String {
    format!("{},{}", point.latitude, point.longitude)
}

/// Parse a Directions response body into a [`Route`].
///
/// Distance and duration are summed over all legs of the first route.
pub fn parse_directions(body: &str) -> Result<Route> {
    let response: DirectionsResponse =
        serde_json::from_str(body).map_err(|e| TrackingError::HttpError {
            message: format!("Invalid directions response: {}", e),
            status_code: None,
        })?;

    match response.status.as_str() {
        "OK" => {}
        "ZERO_RESULTS" | "NOT_FOUND" => {
            return Err(TrackingError::RouteUnavailable {
                message: "No route found".to_string(),
            })
        }
        other => {
            return Err(TrackingError::RouteUnavailable {
                message: match response.error_message {
                    Some(detail) => format!("{}: {}", other, detail),
                    None => other.to_string(),
                },
            })
        }
    }

    let route = response
        .routes
        .into_iter()
        .next()
        .ok_or_route_unavailable("No route found")?;

    if route.legs.is_empty() {
        return Err(TrackingError::InvalidRoute {
            message: "route has no legs".to_string(),
        });
    }
    let distance: f64 = route.legs.iter().map(|leg| leg.distance.value).sum();
    let duration: f64 = route.legs.iter().map(|leg| leg.duration.value).sum();

    Route::from_encoded(route.overview_polyline.points, distance, duration)
}

/// Parse a Geocoding response body into a short place name.
pub fn parse_geocode(body: &str) -> Option<String> {
    let response: GeocodeResponse = match serde_json::from_str(body) {
        Ok(response) => response,
        Err(e) => {
            warn!("[DirectionsClient] Invalid geocode response: {}", e);
            return None;
        }
    };
    if response.status != "OK" {
        debug!("[DirectionsClient] Geocode status {}", response.status);
        return None;
    }
    response
        .results
        .first()
        .and_then(|result| short_place_name(&result.formatted_address))
}
