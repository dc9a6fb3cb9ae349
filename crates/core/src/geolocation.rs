//! Device position acquisition.
//!
//! Getting a fix is the only operation that waits on the outside world. It
//! ends in a coordinate or in one of a few distinct reasons, so callers can
//! fall back to manual entry instead of retrying blindly. Nothing here
//! retries on its own.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::watch;

use commute_transit::Coordinate;

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("position unavailable")]
    PositionUnavailable,

    #[error("timed out waiting for a position")]
    Timeout,

    #[error("location request cancelled")]
    Cancelled,
}

/// Something that can report where the device is.
pub trait Geolocator: Send + Sync {
    fn current_position<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Coordinate, LocationError>> + Send + 'a>>;
}

/// A position typed in by the rider, the fallback when the device cannot
/// locate itself.
#[derive(Clone, Copy, Debug)]
pub struct ManualLocation(pub Coordinate);

impl Geolocator for ManualLocation {
    fn current_position<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Coordinate, LocationError>> + Send + 'a>> {
        Box::pin(std::future::ready(Ok(self.0)))
    }
}

/// Cancels the request paired with it.
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.0.send(true);
    }
}

#[derive(Clone, Debug)]
pub struct CancelToken(watch::Receiver<bool>);

impl CancelToken {
    /// Resolves once the paired handle cancels. Never resolves if the
    /// handle is dropped without cancelling.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.0.borrow_and_update() {
                return;
            }
            if self.0.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(tx), CancelToken(rx))
}

/// Ask `geolocator` for a position, giving up after `timeout` or when
/// `cancel` fires.
///
/// A position outside the WGS84 range is reported as
/// [`LocationError::PositionUnavailable`].
pub async fn locate<G: Geolocator + ?Sized>(
    geolocator: &G,
    timeout: Duration,
    mut cancel: CancelToken,
) -> Result<Coordinate, LocationError> {
    let outcome = tokio::select! {
        result = tokio::time::timeout(timeout, geolocator.current_position()) => {
            result.unwrap_or(Err(LocationError::Timeout))
        }
        _ = cancel.cancelled() => Err(LocationError::Cancelled),
    };

    match outcome {
        Ok(coordinate) if coordinate.validate().is_err() => {
            tracing::warn!(lat = coordinate.lat, lng = coordinate.lng, "geolocator returned an invalid position");
            Err(LocationError::PositionUnavailable)
        }
        Ok(coordinate) => Ok(coordinate),
        Err(e) => {
            tracing::debug!("location request failed: {e}");
            Err(e)
        }
    }
}
