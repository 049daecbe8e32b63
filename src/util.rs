use anyhow::{Context, Result};
use std::path::Path;
use unicode_normalization::UnicodeNormalization;

pub fn ensure_dir(p: &Path) -> Result<()> {
    std::fs::create_dir_all(p).with_context(|| format!("create_dir_all {}", p.display()))
}

/// NFKC-normalises extracted page text and drops control characters that
/// are not whitespace. Form feeds, vertical tabs and NEL stay so they still
/// separate words.
pub fn normalize_page_text(s: &str) -> String {
    s.nfkc()
        .filter(|&ch| ch.is_whitespace() || !ch.is_control())
        .collect()
}

/// Keeps the first `max_lines` lines of `s`, appending a `...` line when
/// anything was cut.
pub fn truncate_lines(s: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = s.lines().collect();
    if lines.len() <= max_lines {
        return lines.join("\n");
    }
    let mut kept = lines[..max_lines].to_vec();
    kept.push("...");
    kept.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_fullwidth_and_controls() {
        let raw = "Abrechnung\u{0002} von ０１.０２.２０２４\tbis";
        assert_eq!(normalize_page_text(raw), "Abrechnung von 01.02.2024\tbis");
    }

    #[test]
    fn whitespace_controls_survive() {
        assert_eq!(normalize_page_text("a\x0cb\x0bc\u{85}d"), "a\x0cb\x0bc\u{85}d");
        assert_eq!(normalize_page_text("a\u{7f}b\u{1b}c"), "abc");
    }

    #[test]
    fn truncation_marks_cut() {
        assert_eq!(truncate_lines("a\nb\nc", 5), "a\nb\nc");
        assert_eq!(truncate_lines("a\nb\nc", 2), "a\nb\n...");
    }
}
