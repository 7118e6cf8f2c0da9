use anyhow::Context;
use intake_core::config::AppConfig;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the per-user default location.
    pub fn default_location() -> anyhow::Result<Self> {
        Ok(Self::at_path(crate::defaults::default_config_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn load(&self) -> anyhow::Result<AppConfig> {
        let bytes =
            fs::read(&self.path).with_context(|| format!("read config: {}", self.path.display()))?;
        let cfg: AppConfig = serde_json::from_slice(&bytes).context("decode config JSON")?;
        Ok(cfg)
    }

    /// A missing file yields the defaults; a malformed one is still an error.
    pub fn load_or_default(&self) -> anyhow::Result<AppConfig> {
        if !self.exists() {
            log::debug!("no config at {}, using defaults", self.path.display());
            return Ok(AppConfig::default());
        }
        self.load()
    }

    pub fn save(&self, cfg: &AppConfig) -> anyhow::Result<()> {
        let json = serde_json::to_vec_pretty(cfg).context("encode config JSON")?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create config directory: {}", parent.display()))?;
        }

        // Atomic-ish write: write temp then replace.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("write temp: {}", tmp.display()))?;
        replace_file(&tmp, &self.path)
            .with_context(|| format!("replace file: {}", self.path.display()))?;
        Ok(())
    }
}

fn replace_file(tmp: &Path, dst: &Path) -> anyhow::Result<()> {
    let backup = dst.with_extension("bak");

    if dst.exists() {
        let _ = fs::remove_file(&backup);
        fs::rename(dst, &backup)
            .with_context(|| format!("failed rename {} -> {}", dst.display(), backup.display()))?;
    }

    if let Err(e) = fs::rename(tmp, dst) {
        if backup.exists() {
            let _ = fs::rename(&backup, dst);
        }
        let _ = fs::remove_file(tmp);
        return Err(anyhow::Error::new(e).context(format!(
            "failed rename {} -> {}",
            tmp.display(),
            dst.display()
        )));
    }

    let _ = fs::remove_file(&backup);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_core::config::{IntakeConfig, Surface};

    #[test]
    fn round_trips_config() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::at_path(dir.path().join("nested").join("config.json"));

        let mut cfg = AppConfig {
            surface: Surface::ClientPortal,
            intake: Some(IntakeConfig::client_portal().with_hard_cap_secs(120)),
            ..AppConfig::default()
        };
        cfg.backend.base_url = "https://intake.firm.example".into();
        cfg.backend.basic_auth_user = Some("staff".into());

        store.save(&cfg).unwrap();
        assert_eq!(store.load().unwrap(), cfg);

        // Second save replaces the first and leaves no temp or backup behind.
        cfg.backend.base_url = "https://other.example".into();
        store.save(&cfg).unwrap();
        assert_eq!(store.load().unwrap().backend.base_url, "https://other.example");
        let names: Vec<_> = fs::read_dir(dir.path().join("nested"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["config.json".to_string()]);
    }

    #[test]
    fn missing_file_loads_defaults_but_garbage_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::at_path(dir.path().join("config.json"));
        assert_eq!(store.load_or_default().unwrap(), AppConfig::default());
        assert!(store.load().is_err());

        fs::write(store.path(), b"{not json").unwrap();
        assert!(store.load_or_default().is_err());
    }

    #[test]
    fn stored_config_never_contains_a_password() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::at_path(dir.path().join("config.json"));
        let mut cfg = AppConfig::default();
        cfg.backend.basic_auth_user = Some("staff".into());
        store.save(&cfg).unwrap();

        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"basic_auth_user\": \"staff\""));
        assert!(!raw.to_ascii_lowercase().contains("password"));
    }
}
