use std::sync::Arc;

use intake_audio::AudioDevice;
use intake_core::config::AppConfig;
use intake_engine::IntakeOrchestrator;

use crate::backend::HttpIntakeBackend;
use crate::defaults::backend_password;

/// Build a runnable orchestrator from config and a capture device.
///
/// The backend password comes from the environment, never from the file.
pub fn build_orchestrator_from_config(
    cfg: &AppConfig,
    device: Arc<dyn AudioDevice>,
) -> anyhow::Result<IntakeOrchestrator> {
    build_orchestrator(cfg, device, backend_password())
}

pub fn build_orchestrator(
    cfg: &AppConfig,
    device: Arc<dyn AudioDevice>,
    password: Option<String>,
) -> anyhow::Result<IntakeOrchestrator> {
    let backend = Arc::new(HttpIntakeBackend::from_config(&cfg.backend, password)?);
    let intake_cfg = cfg.effective_intake();
    log::info!(
        "intake for {:?} against {} (hard cap {}s, poll every {}ms x{})",
        cfg.surface,
        cfg.backend.base_url,
        intake_cfg.hard_cap_secs,
        intake_cfg.poll_interval_ms,
        intake_cfg.max_poll_attempts
    );
    Ok(IntakeOrchestrator::new(
        intake_cfg,
        device,
        backend.clone(),
        backend,
    ))
}
