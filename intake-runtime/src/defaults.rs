use anyhow::{Context, anyhow};
use intake_core::payload::content_type_for_path;
use intake_core::types::AudioBlob;
use std::path::{Path, PathBuf};

/// Environment variable holding the backend's basic-auth password.
pub const PASSWORD_ENV: &str = "INTAKE_BACKEND_PASSWORD";

pub const APP_DIR_NAME: &str = "intake-console";
pub const CONFIG_FILE_NAME: &str = "config.json";

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    let base = dirs::config_dir().ok_or_else(|| anyhow!("no per-user config directory"))?;
    Ok(base.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// The password is never persisted; an unset or blank variable means none.
pub fn backend_password() -> Option<String> {
    std::env::var(PASSWORD_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
}

/// Reads an audio or video file from disk for upload.
///
/// Unknown extensions get a generic content type, which upload validation
/// then rejects with a clear message instead of failing here.
pub fn load_audio_file(path: &Path) -> anyhow::Result<AudioBlob> {
    let bytes = std::fs::read(path).with_context(|| format!("read audio: {}", path.display()))?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string();
    let content_type = content_type_for_path(path).unwrap_or(FALLBACK_CONTENT_TYPE);
    Ok(AudioBlob::new(filename, content_type, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_ends_in_app_dir() {
        if let Ok(p) = default_config_path() {
            assert!(p.ends_with(Path::new(APP_DIR_NAME).join(CONFIG_FILE_NAME)));
        }
    }

    #[test]
    fn loads_files_with_guessed_type() {
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join("Call.WAV");
        std::fs::write(&wav, b"RIFF....").unwrap();
        let blob = load_audio_file(&wav).unwrap();
        assert_eq!(blob.filename, "Call.WAV");
        assert_eq!(blob.content_type, "audio/wav");
        assert_eq!(blob.len(), 8);

        let txt = dir.path().join("notes.txt");
        std::fs::write(&txt, b"hi").unwrap();
        assert_eq!(load_audio_file(&txt).unwrap().content_type, FALLBACK_CONTENT_TYPE);

        assert!(load_audio_file(&dir.path().join("missing.webm")).is_err());
    }
}
