//! Post-processing of rewrite responses
//!
//! The model text is stored verbatim; this derives a summary, the
//! rewritten code and a diff against the editor buffer for display.

use regex::Regex;
use serde::Serialize;
use similar::TextDiff;
use std::sync::OnceLock;

const MAX_IMPROVEMENTS: usize = 5;

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```[^\n]*\n(.*?)\n```").expect("valid fence regex"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RewriteSummary {
    pub summary: String,
    pub code: String,
    pub improvements: Vec<String>,
}

impl RewriteSummary {
    pub fn parse(text: &str) -> Self {
        let mut parts = text.split("---");
        let summary = parts.next().unwrap_or_default().trim().to_string();
        // Between the first and second separator
        let after_separator = parts.next();

        let code = match fence_re().captures(text).and_then(|c| c.get(1)) {
            Some(m) => m.as_str().trim().to_string(),
            None => after_separator.unwrap_or(text).trim().to_string(),
        };

        let improvements = summary
            .lines()
            .map(|l| l.trim())
            .filter(|l| l.len() > 5)
            .map(|l| l.trim_start_matches(['-', '*', '•']).trim().to_string())
            .take(MAX_IMPROVEMENTS)
            .collect();

        Self { summary, code, improvements }
    }
}

/// Unified diff from the current buffer to the rewritten code
pub fn unified_diff(original: &str, rewritten: &str) -> String {
    TextDiff::from_lines(original, rewritten)
        .unified_diff()
        .context_radius(3)
        .header("current", "rewritten")
        .to_string()
}
