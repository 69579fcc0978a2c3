//! Submission records and how they map onto repository files.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// One accepted solution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    /// Frontend problem id ("42")
    pub problem_id: String,
    pub title_slug: String,
    pub language_name: String,
    pub code: String,
}

impl SubmissionRecord {
    pub fn new(
        problem_id: impl Into<String>,
        title_slug: impl Into<String>,
        language_name: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            problem_id: problem_id.into(),
            title_slug: title_slug.into(),
            language_name: language_name.into(),
            code: code.into(),
        }
    }

    /// Repository path: `{problem_id}.{title_slug}.{language_name}.txt`.
    pub fn target_path(&self) -> String {
        format!(
            "{}.{}.{}.txt",
            self.problem_id, self.title_slug, self.language_name
        )
    }

    /// Normalized code, base64 encoded for the contents API.
    pub fn encoded_content(&self) -> String {
        STANDARD.encode(normalize_code(&self.code))
    }
}

/// Line endings become `\n`. Code that arrived as a single escaped line
/// (literal `\n` sequences, no real newline) is unescaped first.
pub fn normalize_code(code: &str) -> String {
    let unescaped = if !code.contains('\n') && !code.contains('\r') && code.contains("\\n") {
        code.replace("\\r\\n", "\n").replace("\\n", "\n")
    } else {
        code.to_string()
    };
    unescaped.replace("\r\n", "\n").replace('\r', "\n")
}
