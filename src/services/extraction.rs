//! Rule-based mail-to-task extraction.
//!
//! Keyword heuristics only: subject keywords drive priority, the body
//! is scanned for an explicit due date. Anything smarter belongs to a
//! different extractor tag.

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;

use crate::domain::models::{MailIntegration, MailMessage, TaskPriority, TaskSuggestion};

/// Identifier persisted with every processing-log row.
pub const EXTRACTOR_TAG: &str = "rules-v1";

/// Baseline confidence for a rule-based suggestion.
const BASE_CONFIDENCE: f64 = 0.8;
/// Confidence when an urgency keyword matched the subject.
const URGENT_CONFIDENCE: f64 = 0.9;

/// Fallback title for messages with an empty subject.
const NO_SUBJECT: &str = "(no subject)";

/// Maximum accepted title length; longer subjects are truncated.
const MAX_TITLE_LEN: usize = 255;

pub struct MailExtractor {
    due_date_re: Regex,
}

impl Default for MailExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl MailExtractor {
    pub fn new() -> Self {
        // Matches "due 2025-10-31", "due by: 2025-10-31", "due date 2025-10-31".
        let due_date_re =
            Regex::new(r"(?i)\bdue\s*(?:by|on|date)?\s*[:\-]?\s*(\d{4}-\d{2}-\d{2})")
                .expect("due-date pattern is valid");
        Self { due_date_re }
    }

    /// Turn a message into a task suggestion using the integration's
    /// defaults.
    pub fn extract(&self, message: &MailMessage, integration: &MailIntegration) -> TaskSuggestion {
        let title = normalize_title(&message.subject);
        let subject_lower = message.subject.to_lowercase();

        let (priority, confidence) = if subject_lower.contains("urgent")
            || subject_lower.contains("asap")
        {
            (TaskPriority::Urgent, URGENT_CONFIDENCE)
        } else if subject_lower.contains("important") {
            (TaskPriority::High, BASE_CONFIDENCE)
        } else {
            (integration.default_priority, BASE_CONFIDENCE)
        };

        TaskSuggestion {
            title,
            description: message.body_text.trim().to_string(),
            priority,
            due_date: self.sniff_due_date(&message.body_text),
            confidence,
        }
    }

    /// Best-effort due date from the body. Absent dates stay absent.
    fn sniff_due_date(&self, body: &str) -> Option<DateTime<Utc>> {
        let captures = self.due_date_re.captures(body)?;
        let date = NaiveDate::parse_from_str(captures.get(1)?.as_str(), "%Y-%m-%d").ok()?;
        Some(DateTime::from_naive_utc_and_offset(
            date.and_hms_opt(0, 0, 0)?,
            Utc,
        ))
    }
}

/// Collapse runs of whitespace and bound the length.
fn normalize_title(subject: &str) -> String {
    let collapsed = subject.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return NO_SUBJECT.to_string();
    }
    collapsed.chars().take(MAX_TITLE_LEN).collect()
}
