use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Camera permission not granted")]
    PermissionDenied,

    #[error("No camera device detected")]
    NoCamera,

    #[error("Camera {0} not found")]
    CameraNotFound(String),

    #[error("Camera device error: {0}")]
    Device(String),

    #[error("Failed to open url: {0}")]
    Presenter(String),
}

impl ScanError {
    /// Keeps a `ScanError` raised inside platform code, wraps anything else as
    /// a device error.
    pub fn from_device(err: anyhow::Error) -> Self {
        match err.downcast::<ScanError>() {
            Ok(err) => err,
            Err(err) => ScanError::Device(format!("{err:#}")),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn from_device_keeps_scan_errors() {
        let err = ScanError::from_device(ScanError::PermissionDenied.into());
        assert!(matches!(err, ScanError::PermissionDenied));
    }

    #[test]
    fn from_device_wraps_other_errors() {
        let err = ScanError::from_device(anyhow!("AImageReader_new failed"));
        match err {
            ScanError::Device(msg) => assert_eq!(msg, "AImageReader_new failed"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
