use crate::error::IntakeError;
use crate::types::AudioBlob;
use std::path::Path;

/// Best-effort content type for an upload picked from disk.
pub fn content_type_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let ct = match ext.as_str() {
        "webm" => "audio/webm",
        "wav" => "audio/wav",
        "mp3" | "mpeg" => "audio/mpeg",
        "ogg" | "oga" => "audio/ogg",
        "m4a" => "audio/mp4",
        "flac" => "audio/flac",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        _ => return None,
    };
    Some(ct)
}

/// Size and type checks that must pass before any network call is made.
pub fn validate_payload(
    blob: &AudioBlob,
    size_limit_bytes: u64,
    allowed_type_prefixes: &[String],
) -> Result<(), IntakeError> {
    if blob.len() > size_limit_bytes {
        return Err(IntakeError::PayloadTooLarge {
            size: blob.len(),
            limit: size_limit_bytes,
        });
    }

    let ct = blob.content_type.trim().to_ascii_lowercase();
    let allowed = allowed_type_prefixes
        .iter()
        .any(|p| !p.is_empty() && ct.starts_with(&p.to_ascii_lowercase()));
    if !allowed {
        return Err(IntakeError::UnsupportedType(blob.content_type.clone()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IntakeConfig, MIB};

    fn prefixes() -> Vec<String> {
        IntakeConfig::default().allowed_type_prefixes
    }

    #[test]
    fn accepts_audio_and_video_at_limit() {
        let blob = AudioBlob::new("a.webm", "audio/webm;codecs=opus", vec![0; 16]);
        assert!(validate_payload(&blob, 16, &prefixes()).is_ok());

        let blob = AudioBlob::new("a.mp4", "Video/MP4", vec![0; 4]);
        assert!(validate_payload(&blob, 16, &prefixes()).is_ok());
    }

    #[test]
    fn rejects_oversize_before_type() {
        let blob = AudioBlob::new("a.txt", "text/plain", vec![0; 17]);
        assert_eq!(
            validate_payload(&blob, 16, &prefixes()),
            Err(IntakeError::PayloadTooLarge { size: 17, limit: 16 })
        );
    }

    #[test]
    fn rejects_non_media_types() {
        for ct in ["text/plain", "", "application/octet-stream", "audiox/wav"] {
            let blob = AudioBlob::new("a", ct, vec![1]);
            assert_eq!(
                validate_payload(&blob, MIB, &prefixes()),
                Err(IntakeError::UnsupportedType(ct.to_string())),
                "{ct}"
            );
        }
    }

    #[test]
    fn infers_content_type_from_extension() {
        assert_eq!(content_type_for_path(Path::new("x/rec.WEBM")), Some("audio/webm"));
        assert_eq!(content_type_for_path(Path::new("call.mp3")), Some("audio/mpeg"));
        assert_eq!(content_type_for_path(Path::new("notes.txt")), None);
        assert_eq!(content_type_for_path(Path::new("noext")), None);
    }
}
