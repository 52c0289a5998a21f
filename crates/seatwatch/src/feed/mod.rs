//! The external seat feed: a single JSON array of section records.

mod types;

pub use types::{FeedScheduleEntry, FeedSection, FeedSectionSchedule};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Errors that abort a fetch. Any of these is fatal to the current sync cycle.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Feed returned HTTP {status}")]
    Status { status: u16 },

    #[error("Feed body is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Invalid data format from feed: expected an array, got {found}")]
    NotAnArray { found: &'static str },
}

/// Source of the full current feed snapshot.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<FeedSection>, FeedError>;
}

/// Fetches the feed over HTTP with one GET per call.
pub struct HttpFeedSource {
    client: Client,
    url: String,
}

impl HttpFeedSource {
    /// Creates a feed source for `url`.
    ///
    /// Without a `timeout` the client default applies (no overall timeout).
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, FeedError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self) -> Result<Vec<FeedSection>, FeedError> {
        info!("Requesting feed snapshot (GET {})", self.url);

        let response = self.client.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(FeedError::Status {
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await?;
        parse_feed_body(&body)
    }
}

/// Decodes a feed body.
///
/// The top level must be an array. Elements are decoded one by one; an
/// element that does not decode into a [`FeedSection`] is logged and
/// dropped without affecting the rest.
pub fn parse_feed_body(body: &str) -> Result<Vec<FeedSection>, FeedError> {
    let value: Value = serde_json::from_str(body)?;
    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(FeedError::NotAnArray {
                found: json_kind(&other),
            })
        }
    };

    let total = items.len();
    let sections: Vec<FeedSection> = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(section) => Some(section),
            Err(e) => {
                warn!("Skipping malformed feed entry #{index}: {e}");
                None
            }
        })
        .collect();

    if sections.len() != total {
        warn!(
            "Decoded {} of {} feed entries ({} skipped)",
            sections.len(),
            total,
            total - sections.len()
        );
    }

    Ok(sections)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_feed_body_rejects_non_array() {
        let err = parse_feed_body(r#"{"error": "maintenance"}"#).unwrap_err();
        assert!(matches!(err, FeedError::NotAnArray { found: "an object" }));

        let err = parse_feed_body("null").unwrap_err();
        assert!(matches!(err, FeedError::NotAnArray { found: "null" }));
    }

    #[test]
    fn test_parse_feed_body_rejects_bad_json() {
        assert!(matches!(
            parse_feed_body("<html>"),
            Err(FeedError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_parse_feed_body_skips_bad_entries() {
        let body = r#"[
            {"courseCode": "CSE110", "sectionId": 501, "sectionName": "01",
             "capacity": 40, "consumedSeat": 40,
             "preRegSchedule": "MONDAY(3:30 PM-4:50 PM-10A-04C)",
             "sectionSchedule": {"finalExamDetail": "2024-12-20", "classSchedules": []},
             "labSchedules": null, "labFaculties": null},
            {"courseCode": "CSE111"},
            "not a section"
        ]"#;

        let sections = parse_feed_body(body).unwrap();
        assert_eq!(sections.len(), 1);

        let section = &sections[0];
        assert_eq!(section.key(), "501");
        assert_eq!(section.available(), 0);
        assert_eq!(section.exam_date(), Some("2024-12-20"));
        assert!(section.lab_schedules().is_empty());
    }

    #[test]
    fn test_available_never_negative() {
        let body = r#"[{"courseCode": "CSE110", "sectionId": 7, "capacity": 30, "consumedSeat": 33}]"#;
        let sections = parse_feed_body(body).unwrap();
        assert_eq!(sections[0].available(), 0);
    }

    #[test]
    fn test_extreme_counts_saturate() {
        let body = r#"[
            {"courseCode": "CSE110", "sectionId": 7, "capacity": 9223372036854775807, "consumedSeat": -1},
            {"courseCode": "CSE110", "sectionId": 8, "capacity": -9223372036854775808, "consumedSeat": 1}
        ]"#;
        let sections = parse_feed_body(body).unwrap();
        assert_eq!(sections[0].available(), i64::MAX);
        assert_eq!(sections[1].available(), 0);
    }
}
