//! Live nearby-stop board.
//!
//! Re-runs the nearby query and arrival estimates on a timer so a caller
//! can show a countdown. The task only reads the catalogue; cancelling it
//! at any point has no side effects.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use commute_transit::{
    ArrivalEstimator, Clock, Coordinate, LineArrival, NearbyStop, StaticCatalog, find_nearby_stops,
};

use crate::error::{CoreError, Result};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BoardEntry {
    pub stop: NearbyStop,
    pub arrivals: Vec<LineArrival>,
}

fn snapshot<R: Rng, C: Clock>(
    catalog: &StaticCatalog,
    origin: Coordinate,
    radius_meters: f64,
    estimator: &mut ArrivalEstimator<R, C>,
) -> Result<Vec<BoardEntry>> {
    let stops = find_nearby_stops(catalog, origin, radius_meters)?;

    Ok(stops
        .into_iter()
        .map(|stop| BoardEntry {
            arrivals: estimator.arrivals_at(&stop),
            stop,
        })
        .collect())
}

/// Handle to a running board. Dropping it stops the refresh task.
pub struct LiveBoard {
    snapshots: watch::Receiver<Vec<BoardEntry>>,
    task: JoinHandle<()>,
}

impl LiveBoard {
    /// The most recent snapshot.
    pub fn latest(&self) -> Vec<BoardEntry> {
        self.snapshots.borrow().clone()
    }

    /// Wait for the next refresh. `None` once the task has stopped.
    pub async fn changed(&mut self) -> Option<Vec<BoardEntry>> {
        self.snapshots.changed().await.ok()?;
        Some(self.snapshots.borrow_and_update().clone())
    }

    /// Stop refreshing. Same as dropping the handle.
    pub fn cancel(self) {}
}

impl Drop for LiveBoard {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start refreshing the board around `origin` every `period`.
///
/// The first snapshot is computed before returning, so bad input is
/// reported here rather than inside the task. Must be called from within a
/// tokio runtime.
pub fn spawn_live_board<R, C>(
    catalog: Arc<StaticCatalog>,
    origin: Coordinate,
    radius_meters: f64,
    period: Duration,
    mut estimator: ArrivalEstimator<R, C>,
) -> Result<LiveBoard>
where
    R: Rng + Send + 'static,
    C: Clock + 'static,
{
    if period.is_zero() {
        return Err(CoreError::InvalidInput("refresh period must be non-zero".into()));
    }

    let initial = snapshot(&catalog, origin, radius_meters, &mut estimator)?;
    let (tx, rx) = watch::channel(initial);

    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately and the initial snapshot
        // already covers it
        interval.tick().await;

        loop {
            interval.tick().await;

            match snapshot(&catalog, origin, radius_meters, &mut estimator) {
                Ok(board) => {
                    if tx.send(board).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!("live board refresh failed: {e}");
                    break;
                }
            }
        }
    });

    Ok(LiveBoard { snapshots: rx, task })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use commute_transit::{
        ArrivalEstimate, FixedClock, Frequency, Line, LineIdentifier, LineNumber, ServiceWindow, Stop,
    };

    fn catalog(window: ServiceWindow) -> Arc<StaticCatalog> {
        Arc::new(
            StaticCatalog::from_lines(vec![Line {
                id: LineIdentifier::new("c"),
                display_number: LineNumber::new("C"),
                name: "Circolare".into(),
                color: "#546E7A".into(),
                frequency: Frequency::new(4, 12),
                service_window: window,
                stops: vec![
                    Stop::new("Municipio", Coordinate { lat: 44.49, lng: 11.34 }),
                    Stop::new("Stazione", Coordinate { lat: 44.50, lng: 11.34 }),
                ],
            }])
            .unwrap(),
        )
    }

    fn estimator(hour: u32) -> ArrivalEstimator<rand::rngs::StdRng, FixedClock> {
        let clock = FixedClock(
            NaiveDate::from_ymd_opt(2024, 11, 4)
                .unwrap()
                .and_hms_opt(hour, 0, 0)
                .unwrap(),
        );
        ArrivalEstimator::seeded(17, clock)
    }

    fn origin() -> Coordinate {
        Coordinate { lat: 44.4901, lng: 11.3401 }
    }

    #[tokio::test(start_paused = true)]
    async fn test_board_refreshes() {
        let mut board = spawn_live_board(
            catalog(ServiceWindow::new(0, 1440)),
            origin(),
            300.0,
            Duration::from_secs(30),
            estimator(9),
        )
        .unwrap();

        let initial = board.latest();
        assert_eq!(initial.len(), 1);
        assert_eq!(initial[0].stop.stop.name.as_ref(), "Municipio");

        for _ in 0..3 {
            let next = board.changed().await.unwrap();
            assert_eq!(next.len(), 1);
            let minutes = next[0].arrivals[0].estimate.minutes().unwrap();
            assert!((1..=12).contains(&minutes));
        }

        board.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_board_reports_out_of_service() {
        let board = spawn_live_board(
            catalog(ServiceWindow::new(360, 1200)),
            origin(),
            300.0,
            Duration::from_secs(30),
            estimator(23),
        )
        .unwrap();

        assert_eq!(board.latest()[0].arrivals[0].estimate, ArrivalEstimate::OutOfService);
    }

    #[tokio::test]
    async fn test_rejects_bad_input() {
        let bad_origin = spawn_live_board(
            catalog(ServiceWindow::new(0, 1440)),
            Coordinate { lat: 0.0, lng: 200.0 },
            300.0,
            Duration::from_secs(30),
            estimator(9),
        );
        assert!(matches!(bad_origin, Err(CoreError::Transit(_))));

        let zero_period = spawn_live_board(
            catalog(ServiceWindow::new(0, 1440)),
            origin(),
            300.0,
            Duration::ZERO,
            estimator(9),
        );
        assert!(matches!(zero_period, Err(CoreError::InvalidInput(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_board_stops() {
        let board = spawn_live_board(
            catalog(ServiceWindow::new(0, 1440)),
            origin(),
            300.0,
            Duration::from_secs(30),
            estimator(9),
        )
        .unwrap();

        let mut receiver = board.snapshots.clone();
        board.cancel();

        // The sender goes away with the aborted task
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(receiver.changed().await.is_err());
    }
}
