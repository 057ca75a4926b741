//! Background tasks bound to a journey session.
//!
//! Each task posts session-tagged [`TrackerEvent`]s into the tracker's channel
//! instead of touching journey state. The tracker owns every [`SessionTask`]
//! handle and either cancels it (stop, toggle) or drops it after the task
//! finished on its own; `cancel` consumes the handle so neither can happen twice.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::BoxStream;
use futures::StreamExt;
use log::debug;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::geo_utils::interpolate;
use crate::journey::TrackerEvent;
use crate::position::PositionError;
use crate::providers::Geocoder;
use crate::GpsPoint;

/// Handle to a spawned session task.
#[derive(Debug)]
pub(crate) struct SessionTask {
    handle: JoinHandle<()>,
}

impl SessionTask {
    fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(future),
        }
    }

    /// Abort the task. Pending events it already sent are discarded by the
    /// tracker through their session tag.
    pub(crate) fn cancel(self) {
        self.handle.abort();
    }
}

/// Positions visited by a simulated journey: `steps` points linearly
/// interpolated from just after `origin` up to exactly `destination`.
pub fn simulated_positions(origin: &GpsPoint, destination: &GpsPoint, steps: u32) -> Vec<GpsPoint> {
    (1..=steps)
        .map(|step| interpolate(origin, destination, step as f64 / steps as f64))
        .collect()
}

/// Forward a live position watch into the tracker channel.
///
/// Aborting the task drops the stream, which cancels the watch.
pub(crate) fn spawn_position_watch(
    mut stream: BoxStream<'static, Result<GpsPoint, PositionError>>,
    session: u64,
    events: UnboundedSender<TrackerEvent>,
) -> SessionTask {
    SessionTask::spawn(async move {
        while let Some(result) = stream.next().await {
            if events.send(TrackerEvent::Live { session, result }).is_err() {
                break;
            }
        }
        debug!("[PositionWatch] Watch for session {} ended", session);
    })
}

/// Run a fixed-cadence simulated journey, one interpolated position per tick.
///
/// The first position is emitted one interval after start.
pub(crate) fn spawn_simulation(
    origin: GpsPoint,
    destination: GpsPoint,
    steps: u32,
    interval: Duration,
    session: u64,
    run: u64,
    events: UnboundedSender<TrackerEvent>,
) -> SessionTask {
    SessionTask::spawn(async move {
        let mut ticker = interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        for (index, position) in simulated_positions(&origin, &destination, steps)
            .into_iter()
            .enumerate()
        {
            ticker.tick().await;
            let event = TrackerEvent::Simulated {
                session,
                run,
                step: index as u32 + 1,
                total: steps,
                position,
            };
            if events.send(event).is_err() {
                return;
            }
        }
    })
}

/// Resolve origin and destination place names without blocking the journey.
pub(crate) fn spawn_place_lookup(
    geocoder: Arc<dyn Geocoder>,
    origin: GpsPoint,
    destination: GpsPoint,
    session: u64,
    events: UnboundedSender<TrackerEvent>,
) -> SessionTask {
    SessionTask::spawn(async move {
        let origin_name = geocoder.reverse_geocode(origin).await;
        let destination_name = geocoder.reverse_geocode(destination).await;
        let _ = events.send(TrackerEvent::PlaceNames {
            session,
            origin: origin_name,
            destination: destination_name,
        });
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_simulated_positions_end_at_destination() {
        let origin = GpsPoint::new(0.0, 0.0);
        let destination = GpsPoint::new(1.0, 2.0);
        let positions = simulated_positions(&origin, &destination, 100);

        assert_eq!(positions.len(), 100);
        assert_eq!(positions[99], destination);
        assert!((positions[0].latitude - 0.01).abs() < 1e-12);
        assert!((positions[49].longitude - 1.0).abs() < 1e-12);
        assert!(positions
            .windows(2)
            .all(|w| w[1].longitude > w[0].longitude));
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulation_emits_every_step_at_cadence() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let start = Instant::now();
        let _task = spawn_simulation(
            GpsPoint::new(0.0, 0.0),
            GpsPoint::new(0.0, 1.0),
            4,
            Duration::from_millis(500),
            7,
            1,
            tx,
        );

        let mut steps = Vec::new();
        while let Some(event) = rx.recv().await {
            if let TrackerEvent::Simulated { session, step, total, .. } = event {
                assert_eq!(session, 7);
                assert_eq!(total, 4);
                steps.push(step);
            }
        }

        assert_eq!(steps, vec![1, 2, 3, 4]);
        assert_eq!(start.elapsed(), Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_simulation_stops_emitting() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let task = spawn_simulation(
            GpsPoint::new(0.0, 0.0),
            GpsPoint::new(0.0, 1.0),
            100,
            Duration::from_millis(500),
            1,
            1,
            tx,
        );

        assert!(matches!(rx.recv().await, Some(TrackerEvent::Simulated { step: 1, .. })));
        task.cancel();

        // The sender is dropped with the aborted task, closing the channel
        assert!(rx.recv().await.is_none());
    }
}
