//! Input checks shared by the Slack forms and the HTTP API.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid Google Sheet URL")]
    InvalidSheetUrl,
    #[error("invalid date `{0}`, expected yyyy-mm-dd")]
    InvalidDate(String),
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z0-9._%+\-]+@[a-z0-9.\-]+\.[a-z]{2,}$").expect("valid email regex")
    })
}

fn sheet_link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^https://docs\.google\.com/spreadsheets/(?:u/\d+/)?d/[a-zA-Z0-9_-]+/edit.*$")
            .expect("valid sheet link regex")
    })
}

fn sheet_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"spreadsheets/d/([^/]+)").expect("valid sheet id regex"))
}

fn action_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)action:\s*([\w_]+)[\s\)]*$").expect("valid action regex")
    })
}

/// Lowercase addresses only; mixed-case input is rejected rather than folded.
pub fn is_valid_email(email: &str) -> bool {
    email_pattern().is_match(email)
}

pub fn is_valid_sheet_link(link: &str) -> bool {
    sheet_link_pattern().is_match(link)
}

pub fn extract_sheet_id(url: &str) -> Result<String, ValidationError> {
    sheet_id_pattern()
        .captures(url)
        .and_then(|captures| captures.get(1))
        .map(|id| id.as_str().to_owned())
        .ok_or(ValidationError::InvalidSheetUrl)
}

/// Returns the trailing `(action: token)` marker of an assistant reply, or an
/// empty string when the reply carries none.
pub fn detect_action(text: &str) -> String {
    action_pattern()
        .captures(text.trim())
        .and_then(|captures| captures.get(1))
        .map(|token| token.as_str().to_owned())
        .unwrap_or_default()
}

/// Converts a Slack datepicker value (`yyyy-mm-dd`) into `dd/mm/yyyy`.
pub fn parse_form_date(value: &str) -> Result<String, ValidationError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map(|date| date.format("%d/%m/%Y").to_string())
        .map_err(|_| ValidationError::InvalidDate(value.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::{
        detect_action, extract_sheet_id, is_valid_email, is_valid_sheet_link, parse_form_date,
        ValidationError,
    };

    const SHARED_LINK: &str = "https://docs.google.com/spreadsheets/u/0/d/1hbWo3suJYJYNIfWhj0oVT6E03qA0kOwhnIRwxMMNXaY/edit?gid=0&pli=1&authuser=0#gid=0";

    #[test]
    fn sheet_links_with_and_without_user_segment_are_valid() {
        assert!(is_valid_sheet_link(SHARED_LINK));
        assert!(is_valid_sheet_link("https://docs.google.com/spreadsheets/d/abc_DEF-1/edit#gid=0"));
        assert!(!is_valid_sheet_link("https://docs.google.com/document/d/abc/edit"));
        assert!(!is_valid_sheet_link("http://docs.google.com/spreadsheets/d/abc/edit"));
    }

    #[test]
    fn sheet_id_is_taken_from_the_path() {
        assert_eq!(
            extract_sheet_id("https://docs.google.com/spreadsheets/d/1hbWo3suJYJYNIfWhj0oVT6E03qA0kOwhnIRwxMMNXaY/edit#gid=0")
                .as_deref(),
            Ok("1hbWo3suJYJYNIfWhj0oVT6E03qA0kOwhnIRwxMMNXaY")
        );
        // Accepted as a link, but the id pattern needs `spreadsheets/d/` adjacent.
        assert_eq!(extract_sheet_id(SHARED_LINK), Err(ValidationError::InvalidSheetUrl));
        assert_eq!(extract_sheet_id("https://example.com/nothing"), Err(ValidationError::InvalidSheetUrl));
        assert_eq!(ValidationError::InvalidSheetUrl.to_string(), "invalid Google Sheet URL");
    }

    #[test]
    fn email_check_is_lowercase_only() {
        assert!(is_valid_email("new.hire+it@company.com.vn"));
        assert!(!is_valid_email("New.Hire@company.com"));
        assert!(!is_valid_email("missing-at.company.com"));
        assert!(!is_valid_email("a@b.c"));
    }

    #[test]
    fn action_marker_is_read_from_the_end_of_the_reply() {
        assert_eq!(detect_action("abc (action: onboard_nhan_vien)"), "onboard_nhan_vien");
        assert_eq!(detect_action("Sure thing!\n(Action:create_buddy)  \n"), "create_buddy");
        assert_eq!(detect_action("action: close_thread"), "close_thread");
        assert_eq!(detect_action("(action: close_thread) and more text"), "");
        assert_eq!(detect_action("no marker here"), "");
    }

    #[test]
    fn form_dates_are_reformatted() {
        assert_eq!(parse_form_date("2026-10-16").as_deref(), Ok("16/10/2026"));
        assert!(matches!(parse_form_date("16/10/2026"), Err(ValidationError::InvalidDate(_))));
    }
}
