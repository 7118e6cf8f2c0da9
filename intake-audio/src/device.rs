use async_trait::async_trait;
use intake_core::error::IntakeError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("no input device found")]
    NoInputDevice,

    #[error("audio device failed: {0}")]
    Device(String),

    #[error("a recording is already in progress")]
    AlreadyRecording,

    #[error("recording was torn down before it finished")]
    Aborted,

    #[error("failed to finalize recording: {0}")]
    Finalize(String),
}

impl From<CaptureError> for IntakeError {
    fn from(e: CaptureError) -> Self {
        match e {
            CaptureError::PermissionDenied => IntakeError::PermissionDenied,
            CaptureError::NoInputDevice => {
                IntakeError::DeviceUnavailable("no input device found".into())
            }
            CaptureError::Device(msg) | CaptureError::Finalize(msg) => {
                IntakeError::DeviceUnavailable(msg)
            }
            CaptureError::AlreadyRecording => IntakeError::AlreadyRecording,
            CaptureError::Aborted => IntakeError::Cancelled,
        }
    }
}

/// Processing hints passed to the device when it is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,

    // Preferred input by name; falls back to the default device.
    pub device_name: Option<String>,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
            device_name: None,
        }
    }
}

/// A microphone that can be acquired for one recording at a time.
#[async_trait]
pub trait AudioDevice: Send + Sync {
    /// Acquires the input. Resolves once access is granted or refused.
    async fn open(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn InputStream>, CaptureError>;
}

/// An open input. Dropping it must release the underlying device.
pub trait InputStream: Send {
    fn content_type(&self) -> &str;

    fn file_extension(&self) -> &str;

    /// Audio buffered since the previous call. Empty when nothing arrived.
    fn take_chunk(&mut self) -> Vec<u8>;

    /// Joins collected chunks into one payload in `content_type()` format.
    fn finalize(&mut self, chunks: Vec<Vec<u8>>) -> Result<Vec<u8>, CaptureError> {
        Ok(chunks.concat())
    }

    /// Releases the device. Must be idempotent.
    fn close(&mut self);
}

/// Stand-in for builds without capture support; every open fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoInputDevice;

#[async_trait]
impl AudioDevice for NoInputDevice {
    async fn open(
        &self,
        _constraints: &CaptureConstraints,
    ) -> Result<Box<dyn InputStream>, CaptureError> {
        Err(CaptureError::NoInputDevice)
    }
}
