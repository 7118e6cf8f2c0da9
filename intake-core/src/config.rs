use serde::{Deserialize, Serialize};

pub const MIB: u64 = 1024 * 1024;
pub const DEFAULT_SIZE_LIMIT_BYTES: u64 = 16 * MIB;
pub const DEFAULT_HARD_CAP_SECS: u32 = 15 * 60;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 120;
pub const DEFAULT_CHUNK_INTERVAL_MS: u64 = 1_000;

/// The embedding surfaces that each used to carry their own recorder loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    #[default]
    StaffConsole,
    ClientPortal,
    LegacyTranscribePage,
}

/// Per-call-site knobs for the record -> upload -> poll workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    pub hard_cap_secs: u32,
    pub poll_interval_ms: u64,
    pub max_poll_attempts: u32,
    pub size_limit_bytes: u64,
    pub allowed_type_prefixes: Vec<String>,
    pub chunk_interval_ms: u64,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            hard_cap_secs: DEFAULT_HARD_CAP_SECS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_poll_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
            size_limit_bytes: DEFAULT_SIZE_LIMIT_BYTES,
            allowed_type_prefixes: vec!["audio/".into(), "video/".into()],
            chunk_interval_ms: DEFAULT_CHUNK_INTERVAL_MS,
        }
    }
}

impl IntakeConfig {
    pub fn staff_console() -> Self {
        Self {
            poll_interval_ms: 1_500,
            ..Self::default()
        }
    }

    pub fn client_portal() -> Self {
        Self {
            hard_cap_secs: 10 * 60,
            poll_interval_ms: 2_000,
            max_poll_attempts: 30,
            ..Self::default()
        }
    }

    pub fn legacy_transcribe_page() -> Self {
        Self {
            poll_interval_ms: 5_000,
            ..Self::default()
        }
    }

    pub fn for_surface(surface: Surface) -> Self {
        match surface {
            Surface::StaffConsole => Self::staff_console(),
            Surface::ClientPortal => Self::client_portal(),
            Surface::LegacyTranscribePage => Self::legacy_transcribe_page(),
        }
    }

    pub fn with_hard_cap_secs(mut self, secs: u32) -> Self {
        self.hard_cap_secs = secs;
        self
    }

    pub fn with_poll(mut self, interval_ms: u64, max_attempts: u32) -> Self {
        self.poll_interval_ms = interval_ms;
        self.max_poll_attempts = max_attempts;
        self
    }

    /// Upper bound on how long a poll sequence can take, ignoring request latency.
    pub fn poll_budget_ms(&self) -> u64 {
        self.poll_interval_ms
            .saturating_mul(u64::from(self.max_poll_attempts.saturating_sub(1)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub upload_path: String,
    pub status_path: String,
    pub analyze_path: String,
    pub create_case_path: String,

    // The password is read from the environment at runtime, never stored here.
    pub basic_auth_user: Option<String>,
    pub extra_headers: Vec<(String, String)>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".into(),
            upload_path: "/api/transcribe".into(),
            status_path: "/api/transcripts".into(),
            analyze_path: "/api/intake/analyze".into(),
            create_case_path: "/api/intake/auto/staff".into(),
            basic_auth_user: None,
            extra_headers: vec![],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub surface: Surface,

    // When absent, the surface preset applies.
    #[serde(default)]
    pub intake: Option<IntakeConfig>,
}

impl AppConfig {
    pub fn effective_intake(&self) -> IntakeConfig {
        self.intake
            .clone()
            .unwrap_or_else(|| IntakeConfig::for_surface(self.surface))
    }
}
