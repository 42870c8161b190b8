use std::time::Duration;

use thiserror::Error;

use crate::validation::{Coordinate, CoordinateError};
use crate::{AppError, ErrorKind};

/// One fix from the device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoReading {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_m: Option<f64>,
}

impl GeoReading {
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_m: None,
        }
    }

    pub fn coordinate(&self) -> Result<Coordinate, GeolocationError> {
        Coordinate::new(self.latitude, self.longitude).map_err(GeolocationError::InvalidReading)
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum GeolocationError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("location unavailable: {0}")]
    Unavailable(String),

    #[error("no location fix within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("device reported an invalid position: {0}")]
    InvalidReading(CoordinateError),
}

impl GeolocationError {
    pub(crate) fn timed_out(after: Duration) -> Self {
        Self::Timeout {
            timeout_ms: u64::try_from(after.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl From<GeolocationError> for AppError {
    fn from(e: GeolocationError) -> Self {
        let message = match &e {
            GeolocationError::PermissionDenied => {
                "Location access was denied. Enable it or enter the coordinates manually."
            }
            GeolocationError::Unavailable(_) | GeolocationError::InvalidReading(_) => {
                "Your location could not be determined. Enter the coordinates manually."
            }
            GeolocationError::Timeout { .. } => {
                "Getting your location took too long. Try again or enter the coordinates manually."
            }
        };
        AppError::new(ErrorKind::Location, message).with_internal(e.to_string())
    }
}

/// Yields a single position reading, or a failure.
#[async_trait::async_trait]
pub trait GeolocationProvider: Send + Sync {
    async fn current_position(&self) -> Result<GeoReading, GeolocationError>;
}

/// For shells with no positioning hardware.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoGeolocation;

#[async_trait::async_trait]
impl GeolocationProvider for NoGeolocation {
    async fn current_position(&self) -> Result<GeoReading, GeolocationError> {
        Err(GeolocationError::Unavailable(
            "no geolocation provider configured".to_string(),
        ))
    }
}
