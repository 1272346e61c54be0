use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MeasureError {
    #[error("Invalid calibration width: {0}")]
    InvalidCalibration(String),
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),
    #[error("Image error: {0}")]
    Image(String),
    #[error("Capture error: {0}")]
    Capture(String),
    #[error("Initialization error: {0}")]
    Initialization(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("timeout")]
    Timeout,
    #[error("session is closed")]
    Closed,
    #[error("session is stopped")]
    Stopped,
    #[error("session is already started")]
    AlreadyStarted,
    #[error("session is already stopped")]
    AlreadyStopped,
    #[error("session is already closed")]
    AlreadyClosed,
    #[error("lock poisoned by previous panic")]
    PoisonedLock,
}

impl From<std::io::Error> for MeasureError {
    fn from(e: std::io::Error) -> Self {
        MeasureError::Io(e.to_string())
    }
}

impl From<image::ImageError> for MeasureError {
    fn from(e: image::ImageError) -> Self {
        MeasureError::Image(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for MeasureError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        MeasureError::PoisonedLock
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MeasureError::InvalidCalibration("abc".to_string());
        assert_eq!(err.to_string(), "Invalid calibration width: abc");
        assert_eq!(MeasureError::Closed.to_string(), "session is closed");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.png");
        let err: MeasureError = io.into();
        assert!(matches!(err, MeasureError::Io(ref msg) if msg.contains("missing.png")));
    }
}
