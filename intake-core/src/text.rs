use regex::Regex;
use std::sync::OnceLock;

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]{2,}").expect("valid whitespace regex"))
}

fn blank_lines_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n\s*\n(\s*\n)+").expect("valid blank line regex"))
}

/// Normalizes a transcript before it is sent for analysis.
///
/// Paragraph breaks survive; runs of spaces and extra blank lines do not.
pub fn clean_transcript(text: &str) -> String {
    let out = text.replace("\r\n", "\n");
    let out = whitespace_re().replace_all(&out, " ");
    let out = blank_lines_re().replace_all(&out, "\n\n");
    out.trim().to_string()
}

pub fn accept_transcript(text: &str) -> Option<String> {
    let cleaned = clean_transcript(text);
    if cleaned.is_empty() { None } else { Some(cleaned) }
}

/// `MM:SS`, as shown on the stop button. Minutes are not wrapped at 60.
pub fn format_elapsed(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
