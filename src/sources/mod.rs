//! Positions sources API

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

use crate::Fix;

mod feed;
mod gpx_file;
mod lines;

#[cfg(feature = "csv")]
mod csv_file;

pub use feed::{FixFeed, FixPublisher};
pub use gpx_file::GpxSource;
pub use lines::{parse_line, LineInput, MeterCommand};

#[cfg(feature = "csv")]
pub use csv_file::CsvSource;

/// Failures reported by a position source
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("position unavailable")]
    PositionUnavailable,
    #[error("timed out waiting for a position")]
    Timeout,
    #[error("location capability not supported")]
    Unsupported,
    #[error("failed on read the source: {0}")]
    Read(String),
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

/// Live sequence of fixes of one subscription
pub type FixStream = BoxStream<'static, Result<Fix, SourceError>>;

/// Releases a live subscription when dropped or cancelled
pub struct Unsubscribe(Option<Box<dyn FnOnce() + Send + Sync>>);

impl Unsubscribe {
    pub fn new<F>(release: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self(Some(Box::new(release)))
    }

    /// Handle of a subscription released by dropping its stream
    pub fn noop() -> Self {
        Self(None)
    }

    /// Release the subscription now
    pub fn cancel(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(release) = self.0.take() {
            release();
        }
    }
}

impl Drop for Unsubscribe {
    fn drop(&mut self) {
        self.release();
    }
}

/// An open subscription: the fixes and the handle that ends them.
///
/// Once the handle is released the stream ends and the source no longer
/// counts the subscription.
pub struct Subscription {
    pub fixes: FixStream,
    pub handle: Unsubscribe,
}

/// Source of live position fixes
pub trait LiveSource: Send {
    /// Open a new subscription
    fn watch(&mut self) -> Result<Subscription, SourceError>;
}

/// Environment without any location capability
#[derive(Clone, Copy, Debug, Default)]
pub struct Unavailable;

impl LiveSource for Unavailable {
    fn watch(&mut self) -> Result<Subscription, SourceError> {
        Err(SourceError::Unsupported)
    }
}

/// Source of recorded trip logs
pub trait RecordedSource {
    /// Fetch the fixes recorded during the period
    fn fetch(
        &mut self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<Fix>, SourceError>;
}

/// Column names of a tabular trip log
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldsConfiguration {
    pub time: String,
    pub coordinates: String,
    pub speed: String,
    pub elevation: String,
    /// Coordinates written as `lat,lng` instead of `lng,lat`
    pub flip_coordinates: bool,
}

impl Default for FieldsConfiguration {
    fn default() -> Self {
        Self {
            time: "time".to_string(),
            coordinates: "coordinates".to_string(),
            speed: "speed".to_string(),
            elevation: "elevation".to_string(),
            flip_coordinates: false,
        }
    }
}
