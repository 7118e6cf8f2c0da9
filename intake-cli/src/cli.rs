use clap::{Args, Parser, Subcommand, ValueEnum};
use intake_core::config::{AppConfig, Surface};
use intake_core::types::ClientFields;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "intake", version, about = "Record or upload client intake audio, then transcribe, analyze, and open a case")]
pub struct Cli {
    /// Config file (defaults to the per-user config directory).
    #[arg(long, global = true, env = "INTAKE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the backend base URL from the config file.
    #[arg(long, global = true, env = "INTAKE_BASE_URL")]
    pub base_url: Option<String>,

    /// Basic-auth user; the password is read from INTAKE_BACKEND_PASSWORD.
    #[arg(long, global = true, env = "INTAKE_BACKEND_USER")]
    pub user: Option<String>,

    /// Which surface's recording and polling preset to use.
    #[arg(long, global = true, value_enum)]
    pub surface: Option<SurfaceArg>,

    /// Print results as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Upload an audio or video file and wait for its transcript.
    Transcribe {
        file: PathBuf,
        #[command(flatten)]
        follow_up: FollowUp,
    },
    /// Check a transcription job once.
    Status { job_id: String },
    /// Record from the default microphone until Ctrl-C or the hard cap.
    #[cfg(feature = "microphone")]
    Record {
        /// Stop automatically after this many seconds.
        #[arg(long)]
        max_secs: Option<u32>,
        #[command(flatten)]
        follow_up: FollowUp,
    },
    /// List microphones visible to the audio host.
    #[cfg(feature = "microphone")]
    Devices,
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write a default config file.
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration.
    Show,
    /// Print where the config file lives.
    Path,
}

/// What to do once a transcript is in.
#[derive(Debug, Clone, Args)]
pub struct FollowUp {
    /// Classify the transcript.
    #[arg(long)]
    pub analyze: bool,

    /// Open a case from the transcript.
    #[arg(long)]
    pub create_case: bool,

    #[arg(long, default_value = "")]
    pub title: String,
    #[arg(long, default_value = "")]
    pub first_name: String,
    #[arg(long, default_value = "")]
    pub last_name: String,
    #[arg(long, default_value = "")]
    pub email: String,
    #[arg(long, default_value = "")]
    pub phone: String,
    #[arg(long, default_value = "")]
    pub address: String,
}

impl FollowUp {
    pub fn client(&self) -> ClientFields {
        ClientFields {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone.trim().to_string(),
            address: self.address.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SurfaceArg {
    Staff,
    Portal,
    Legacy,
}

impl From<SurfaceArg> for Surface {
    fn from(s: SurfaceArg) -> Self {
        match s {
            SurfaceArg::Staff => Surface::StaffConsole,
            SurfaceArg::Portal => Surface::ClientPortal,
            SurfaceArg::Legacy => Surface::LegacyTranscribePage,
        }
    }
}

impl Cli {
    /// Command-line flags win over the file.
    pub fn apply_overrides(&self, cfg: &mut AppConfig) {
        if let Some(url) = &self.base_url {
            cfg.backend.base_url = url.clone();
        }
        if let Some(user) = &self.user {
            cfg.backend.basic_auth_user = Some(user.clone());
        }
        if let Some(surface) = self.surface {
            cfg.surface = surface.into();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_transcribe_with_case_fields() {
        let cli = Cli::try_parse_from([
            "intake",
            "--base-url",
            "http://firm.local:5000",
            "--surface",
            "portal",
            "transcribe",
            "call.m4a",
            "--analyze",
            "--create-case",
            "--first-name",
            " Ana ",
        ])
        .unwrap();

        let mut cfg = AppConfig::default();
        cli.apply_overrides(&mut cfg);
        assert_eq!(cfg.backend.base_url, "http://firm.local:5000");
        assert_eq!(cfg.surface, Surface::ClientPortal);
        assert!(cfg.backend.basic_auth_user.is_none());

        match cli.command {
            Command::Transcribe { file, follow_up } => {
                assert_eq!(file, PathBuf::from("call.m4a"));
                assert!(follow_up.analyze && follow_up.create_case);
                assert_eq!(follow_up.client().first_name, "Ana");
                assert_eq!(follow_up.title, "");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
