mod cli;

use std::sync::Arc;

use anyhow::anyhow;
use clap::Parser;
use intake_audio::AudioDevice;
use intake_core::config::AppConfig;
use intake_core::error::IntakeError;
use intake_core::types::JobId;
use intake_engine::IntakeOrchestrator;
use intake_engine::session::IntakeStage;
use intake_engine::traits::TranscriptionService;
use intake_runtime::defaults::{backend_password, load_audio_file};
use intake_runtime::{ConfigStore, HttpIntakeBackend, build_orchestrator};

use cli::{Cli, Command, ConfigCommand, FollowUp};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let store = match &cli.config {
        Some(path) => ConfigStore::at_path(path),
        None => ConfigStore::default_location()?,
    };

    match &cli.command {
        Command::Config(cmd) => config_command(&cli, &store, cmd),
        Command::Status { job_id } => {
            let cfg = load_config(&cli, &store)?;
            let backend = HttpIntakeBackend::from_config(&cfg.backend, backend_password())?;
            let report = backend.status(&JobId::new(job_id.as_str())).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("status: {}", report.status.as_str());
                if let Some(text) = &report.text {
                    println!("{text}");
                }
                if let Some(err) = &report.error {
                    println!("error: {err}");
                }
            }
            Ok(())
        }
        Command::Transcribe { file, follow_up } => {
            let cfg = load_config(&cli, &store)?;
            let blob = load_audio_file(file)?;
            let o = orchestrator(&cfg, Arc::new(intake_audio::NoInputDevice))?;
            let progress = watch_progress(&o);

            let result = interruptible(&o, o.transcribe_file(blob), tokio::signal::ctrl_c()).await;
            progress.abort();
            result.map_err(user_facing)?;
            finish(&cli, &o, follow_up).await
        }
        #[cfg(feature = "microphone")]
        Command::Record {
            max_secs,
            follow_up,
        } => {
            let mut cfg = load_config(&cli, &store)?;
            if let Some(secs) = max_secs {
                cfg.intake = Some(cfg.effective_intake().with_hard_cap_secs(*secs));
            }
            let o = orchestrator(&cfg, Arc::new(intake_audio::CpalMicrophone::new()))?;
            record(&o).await?;
            finish(&cli, &o, follow_up).await
        }
        #[cfg(feature = "microphone")]
        Command::Devices => {
            for name in intake_audio::CpalMicrophone::list_input_device_names()? {
                println!("{name}");
            }
            Ok(())
        }
    }
}

fn load_config(cli: &Cli, store: &ConfigStore) -> anyhow::Result<AppConfig> {
    let mut cfg = store.load_or_default()?;
    cli.apply_overrides(&mut cfg);
    Ok(cfg)
}

fn orchestrator(
    cfg: &AppConfig,
    device: Arc<dyn AudioDevice>,
) -> anyhow::Result<IntakeOrchestrator> {
    build_orchestrator(cfg, device, backend_password())
}

fn config_command(cli: &Cli, store: &ConfigStore, cmd: &ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Init { force } => {
            if store.exists() && !force {
                return Err(anyhow!(
                    "config already exists at {} (use --force to overwrite)",
                    store.path().display()
                ));
            }
            let mut cfg = AppConfig::default();
            cli.apply_overrides(&mut cfg);
            store.save(&cfg)?;
            println!("wrote {}", store.path().display());
        }
        ConfigCommand::Show => {
            let cfg = load_config(cli, store)?;
            let view = serde_json::json!({
                "backend": cfg.backend,
                "surface": cfg.surface,
                "intake": cfg.effective_intake(),
            });
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        ConfigCommand::Path => println!("{}", store.path().display()),
    }
    Ok(())
}

/// Logs each stage change while a long step runs.
fn watch_progress(o: &IntakeOrchestrator) -> tokio::task::JoinHandle<()> {
    let mut rx = o.subscribe();
    tokio::spawn(async move {
        let mut last = IntakeStage::Idle;
        let mut attempts = 0;
        while rx.changed().await.is_ok() {
            let snap = rx.borrow_and_update().clone();
            if snap.stage != last {
                log::info!("{}", snap.stage.label());
                last = snap.stage;
            }
            if snap.poll_attempts != attempts {
                attempts = snap.poll_attempts;
                log::debug!("poll attempt {attempts}");
            }
        }
    })
}

#[cfg(feature = "microphone")]
async fn record(o: &IntakeOrchestrator) -> anyhow::Result<()> {
    use anyhow::Context;
    use intake_core::text::format_elapsed;
    use std::time::Duration;

    o.start().await.map_err(user_facing)?;
    eprintln!("Recording... press Ctrl-C to stop.");

    let progress = watch_progress(o);
    let mut tick = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            r = tokio::signal::ctrl_c() => {
                r.context("listen for Ctrl-C")?;
                o.stop();
                break;
            }
            _ = tick.tick() => {
                // Hard cap reached: the recording already submitted itself.
                if o.stage() != IntakeStage::Recording {
                    break;
                }
                if let Some(secs) = o.recording_elapsed_secs() {
                    eprint!("\r{}", format_elapsed(secs));
                }
            }
        }
    }
    eprintln!();

    let result = interruptible(o, o.wait_for_transcript(), tokio::signal::ctrl_c()).await;
    progress.abort();
    result.map_err(user_facing)?;
    Ok(())
}

/// Runs `work` until it resolves or `interrupt` fires. An interrupt discards
/// the session so no upload or poll outlives the command.
async fn interruptible<T>(
    o: &IntakeOrchestrator,
    work: impl Future<Output = Result<T, IntakeError>>,
    interrupt: impl Future<Output = std::io::Result<()>>,
) -> Result<T, IntakeError> {
    tokio::select! {
        res = work => res,
        // A failed signal listener disables this branch instead of cancelling.
        Ok(()) = interrupt => {
            log::info!("Interrupted; discarding the current intake");
            o.reset();
            Err(IntakeError::Cancelled)
        }
    }
}

async fn finish(cli: &Cli, o: &IntakeOrchestrator, follow_up: &FollowUp) -> anyhow::Result<()> {
    let transcript = o.snapshot().transcript.unwrap_or_default();
    if !cli.json {
        println!("{transcript}");
    }

    if follow_up.analyze {
        match o.analyze().await {
            Ok(analysis) if !cli.json => {
                println!();
                if let Some(category) = &analysis.category {
                    println!("category: {category}");
                }
                if let Some(urgency) = &analysis.urgency {
                    println!("urgency: {urgency}");
                }
                for fact in analysis.summary_facts(5) {
                    println!("  {fact}");
                }
                for action in &analysis.suggested_actions {
                    println!("  - {action}");
                }
            }
            Ok(_) => {}
            // Analysis is advisory; a case can still be opened without it.
            Err(e) => log::warn!("{}", e.user_message()),
        }
    }

    if follow_up.create_case {
        let case_id = o
            .create_case(follow_up.client(), &follow_up.title)
            .await
            .map_err(user_facing)?;
        if !cli.json {
            println!("case created: {case_id}");
        }
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&o.snapshot())?);
    }
    Ok(())
}

// `{:#}` prints the friendly message followed by the underlying detail.
fn user_facing(e: IntakeError) -> anyhow::Error {
    let msg = e.user_message();
    anyhow::Error::new(e).context(msg)
}
