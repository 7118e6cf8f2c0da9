pub mod capture;
pub mod device;
pub mod resample;
pub mod session;
pub mod wav;

#[cfg(feature = "microphone")]
pub mod microphone;

pub use capture::{CaptureConfig, CaptureOutcome, MediaCapture, Recording, StopReason};
pub use device::{AudioDevice, CaptureConstraints, CaptureError, InputStream, NoInputDevice};
pub use session::{RecordingSession, RecordingState};

#[cfg(feature = "microphone")]
pub use microphone::CpalMicrophone;
