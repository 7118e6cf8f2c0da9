//
// CPAL-backed microphone.
//
// cpal streams are not `Send`, so each opened input lives on its own worker
// thread. The worker downmixes to mono f32 and forwards buffers over a
// channel; `take_chunk` drains whatever arrived since the last call.

use std::sync::mpsc;
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Sample, SampleFormat, SizedSample, Stream};

use crate::device::{AudioDevice, CaptureConstraints, CaptureError, InputStream};
use crate::wav::{WAV_CONTENT_TYPE, pcm_chunks_to_wav, samples_to_f32le};

const WORKER_STARTUP_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Default, Clone)]
pub struct CpalMicrophone;

impl CpalMicrophone {
    pub fn new() -> Self {
        Self
    }

    pub fn list_input_device_names() -> Result<Vec<String>, CaptureError> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|e| CaptureError::Device(format!("list input devices: {e}")))?;
        let mut out: Vec<String> = devices.filter_map(|d| d.name().ok()).collect();
        out.sort();
        out.dedup();
        Ok(out)
    }
}

#[async_trait]
impl AudioDevice for CpalMicrophone {
    async fn open(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn InputStream>, CaptureError> {
        let name = constraints.device_name.clone();
        let stream = tokio::task::spawn_blocking(move || open_blocking(name.as_deref()))
            .await
            .map_err(|e| CaptureError::Device(format!("audio worker join: {e}")))??;
        Ok(Box::new(stream))
    }
}

fn pick_device(device_name: Option<&str>) -> Result<Device, CaptureError> {
    let host = cpal::default_host();

    if let Some(needle) = device_name.map(str::trim).filter(|n| !n.is_empty()) {
        if let Ok(devices) = host.input_devices() {
            for dev in devices {
                if dev.name().is_ok_and(|n| n == needle) {
                    log::info!("Using input device: {needle}");
                    return Ok(dev);
                }
            }
        }
        log::warn!("Preferred input device not found, falling back to default: {needle}");
    }

    host.default_input_device()
        .ok_or(CaptureError::NoInputDevice)
}

fn classify_build_error(e: cpal::BuildStreamError) -> CaptureError {
    match e {
        cpal::BuildStreamError::DeviceNotAvailable => CaptureError::NoInputDevice,
        // Backends surface OS-level access refusal as a backend error.
        cpal::BuildStreamError::BackendSpecific { err } => {
            let lower = err.description.to_ascii_lowercase();
            if lower.contains("permission") || lower.contains("denied") || lower.contains("access")
            {
                CaptureError::PermissionDenied
            } else {
                CaptureError::Device(err.description)
            }
        }
        other => CaptureError::Device(format!("build stream: {other}")),
    }
}

enum WorkerMsg {
    Ready,
    Failed(CaptureError),
}

fn open_blocking(device_name: Option<&str>) -> Result<CpalStream, CaptureError> {
    let device = pick_device(device_name)?;
    let default_cfg = device
        .default_input_config()
        .map_err(|e| CaptureError::Device(format!("default input config: {e}")))?;
    let sample_rate_hz = default_cfg.sample_rate().0;

    let (sample_tx, sample_rx) = mpsc::channel::<Vec<f32>>();
    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    let (worker_tx, worker_rx) = mpsc::channel::<WorkerMsg>();

    let worker = std::thread::spawn(move || {
        let channels = default_cfg.channels() as usize;
        let config: cpal::StreamConfig = default_cfg.clone().into();
        let stream = match default_cfg.sample_format() {
            SampleFormat::I16 => build_input_stream::<i16>(&device, &config, channels, sample_tx),
            SampleFormat::U16 => build_input_stream::<u16>(&device, &config, channels, sample_tx),
            SampleFormat::I8 => build_input_stream::<i8>(&device, &config, channels, sample_tx),
            SampleFormat::U8 => build_input_stream::<u8>(&device, &config, channels, sample_tx),
            SampleFormat::I32 => build_input_stream::<i32>(&device, &config, channels, sample_tx),
            SampleFormat::U32 => build_input_stream::<u32>(&device, &config, channels, sample_tx),
            SampleFormat::F64 => build_input_stream::<f64>(&device, &config, channels, sample_tx),
            _ => build_input_stream::<f32>(&device, &config, channels, sample_tx),
        };

        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                log::error!("Audio stream build failed: {e}");
                let _ = worker_tx.send(WorkerMsg::Failed(classify_build_error(e)));
                return;
            }
        };

        if let Err(e) = stream.play() {
            log::error!("Audio stream play failed: {e}");
            let _ = worker_tx.send(WorkerMsg::Failed(CaptureError::Device(format!(
                "play stream: {e}"
            ))));
            return;
        }

        let _ = worker_tx.send(WorkerMsg::Ready);

        // Park until released; dropping the stream frees the device.
        let _ = stop_rx.recv();
        drop(stream);
    });

    match worker_rx.recv_timeout(WORKER_STARTUP_TIMEOUT) {
        Ok(WorkerMsg::Ready) => {}
        Ok(WorkerMsg::Failed(e)) => {
            let _ = worker.join();
            return Err(e);
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            let _ = stop_tx.send(());
            return Err(CaptureError::Device("audio worker startup timeout".into()));
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            return Err(CaptureError::Device("audio worker exited".into()));
        }
    }

    Ok(CpalStream {
        sample_rx,
        stop_tx: Some(stop_tx),
        worker: Some(worker),
        sample_rate_hz,
    })
}

fn build_input_stream<T>(
    device: &Device,
    config: &cpal::StreamConfig,
    channels: usize,
    sample_tx: mpsc::Sender<Vec<f32>>,
) -> Result<Stream, cpal::BuildStreamError>
where
    T: Sample + SizedSample + Send + 'static,
    f32: cpal::FromSample<T>,
{
    let cb = move |data: &[T], _: &cpal::InputCallbackInfo| {
        let mono: Vec<f32> = if channels <= 1 {
            data.iter().map(|&s| s.to_sample::<f32>()).collect()
        } else {
            data.chunks_exact(channels)
                .map(|frame| {
                    frame.iter().map(|&s| s.to_sample::<f32>()).sum::<f32>() / channels as f32
                })
                .collect()
        };
        let _ = sample_tx.send(mono);
    };

    device.build_input_stream(
        config,
        cb,
        |err| {
            // Surfaces "recording started but silent".
            log::error!("Audio stream error: {err}");
        },
        None,
    )
}

struct CpalStream {
    sample_rx: mpsc::Receiver<Vec<f32>>,
    stop_tx: Option<mpsc::Sender<()>>,
    worker: Option<std::thread::JoinHandle<()>>,
    sample_rate_hz: u32,
}

impl InputStream for CpalStream {
    fn content_type(&self) -> &str {
        WAV_CONTENT_TYPE
    }

    fn file_extension(&self) -> &str {
        "wav"
    }

    fn take_chunk(&mut self) -> Vec<u8> {
        let mut samples = Vec::new();
        while let Ok(buf) = self.sample_rx.try_recv() {
            samples.extend_from_slice(&buf);
        }
        samples_to_f32le(&samples)
    }

    fn finalize(&mut self, chunks: Vec<Vec<u8>>) -> Result<Vec<u8>, CaptureError> {
        pcm_chunks_to_wav(chunks, self.sample_rate_hz)
    }

    fn close(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(h) = self.worker.take() {
            let _ = h.join();
        }
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        self.close();
    }
}
