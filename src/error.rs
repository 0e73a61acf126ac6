use std::time::Duration;

use thiserror::Error;

use crate::session::FlightMode;

/// Fatal transport-level failure. Once one of these surfaces the session
/// is over; the caller flushes the telemetry log and exits.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("no serial device matching the radio was found")]
    DeviceNotFound,
    #[error("serial port: {0}")]
    Serial(#[from] serialport::Error),
    #[error("serial i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("channel closed before the frame completed")]
    Closed,
    #[error("no complete frame within {0:?}")]
    Timeout(Duration),
    #[error("frame exceeded {limit} bytes before its delimiter")]
    FrameTooLarge { limit: usize },
}

/// A frame arrived but its payload was unusable. Recoverable: the frame
/// is logged and discarded, and the receive stays armed for the next one.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("telemetry payload is not ascii text")]
    NotText,
    #[error("telemetry payload missing label {0}")]
    MissingLabel(&'static str),
    #[error("bad number for {label}: {text:?}")]
    BadNumber { label: &'static str, text: String },
    #[error("image bytes not bounded by jpeg start/end markers")]
    BadMarkers,
    #[error("jpeg decode: {0}")]
    BadImage(#[from] image::ImageError),
}

/// Everything a `LinkSession` operation can fail with.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("another receive is already in flight")]
    Busy,
    #[error("flight mode {0:?} has no command byte")]
    NotIssuable(FlightMode),
}
