use std::{collections::HashSet, sync::Arc};

use chrono::{Duration, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const LABEL_FORMAT: &str = "%-I:%M %p";
const PARSE_FORMATS: &[&str] = &["%I:%M %p", "%I:%M%p", "%H:%M"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("slot template must contain at least one time")]
    Empty,
    #[error("slot template contains a blank time label")]
    BlankLabel,
    #[error("slot template lists {0} more than once")]
    DuplicateLabel(String),
    #[error("slot interval must be positive, got {0} minutes")]
    InvalidInterval(u32),
    #[error("operating window closes at {close} before it opens at {open}")]
    InvertedWindow { open: String, close: String },
    #[error("unrecognized time of day: {0}")]
    UnparsableTime(String),
}

pub fn parse_time_of_day(raw: &str) -> Result<NaiveTime, TemplateError> {
    let trimmed = raw.trim();
    PARSE_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(trimmed, format).ok())
        .ok_or_else(|| TemplateError::UnparsableTime(raw.to_string()))
}

pub fn format_label(time: NaiveTime) -> String {
    time.format(LABEL_FORMAT).to_string()
}

/// Inclusive opening hours sliced into equal slots; the closing time is itself
/// the last bookable slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatingWindow {
    pub open: NaiveTime,
    pub close: NaiveTime,
    pub interval_minutes: u32,
}

impl Default for OperatingWindow {
    fn default() -> Self {
        Self {
            open: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            close: NaiveTime::from_hms_opt(16, 0, 0).unwrap_or(NaiveTime::MIN),
            interval_minutes: 30,
        }
    }
}

impl OperatingWindow {
    pub fn parse(open: &str, close: &str, interval_minutes: u32) -> Result<Self, TemplateError> {
        Ok(Self {
            open: parse_time_of_day(open)?,
            close: parse_time_of_day(close)?,
            interval_minutes,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotTemplate {
    times: Arc<[String]>,
}

impl Default for SlotTemplate {
    fn default() -> Self {
        Self::from_window(&OperatingWindow::default())
            .unwrap_or_else(|_| Self { times: Arc::from(Vec::new()) })
    }
}

impl SlotTemplate {
    pub fn from_window(window: &OperatingWindow) -> Result<Self, TemplateError> {
        if window.interval_minutes == 0 {
            return Err(TemplateError::InvalidInterval(window.interval_minutes));
        }
        if window.close < window.open {
            return Err(TemplateError::InvertedWindow {
                open: format_label(window.open),
                close: format_label(window.close),
            });
        }

        let step = Duration::minutes(i64::from(window.interval_minutes));
        let mut times = Vec::new();
        let mut cursor = window.open;
        while cursor <= window.close {
            times.push(format_label(cursor));
            let (next, wrapped) = cursor.overflowing_add_signed(step);
            if wrapped != 0 {
                break;
            }
            cursor = next;
        }

        Ok(Self {
            times: Arc::from(times),
        })
    }

    /// Builds a template from labels already in chronological order.
    pub fn from_labels<I, S>(labels: I) -> Result<Self, TemplateError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut times = Vec::new();
        for label in labels {
            let label = label.into();
            if label.trim().is_empty() {
                return Err(TemplateError::BlankLabel);
            }
            if !seen.insert(label.clone()) {
                return Err(TemplateError::DuplicateLabel(label));
            }
            times.push(label);
        }
        if times.is_empty() {
            return Err(TemplateError::Empty);
        }
        Ok(Self {
            times: Arc::from(times),
        })
    }

    pub fn canonical_times(&self) -> &[String] {
        &self.times
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn contains(&self, time: &str) -> bool {
        self.position(time).is_some()
    }

    pub fn position(&self, time: &str) -> Option<usize> {
        self.times.iter().position(|candidate| candidate == time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_template_spans_the_working_day() {
        let template = SlotTemplate::default();
        let times = template.canonical_times();
        assert_eq!(times.len(), 17);
        assert_eq!(times.first().map(String::as_str), Some("8:00 AM"));
        assert_eq!(times[8], "12:00 PM");
        assert_eq!(times[9], "12:30 PM");
        assert_eq!(times.last().map(String::as_str), Some("4:00 PM"));
    }

    #[test]
    fn window_generation_is_chronological_and_unique() {
        let template = SlotTemplate::default();
        let parsed: Vec<NaiveTime> = template
            .canonical_times()
            .iter()
            .map(|label| parse_time_of_day(label).expect("label parses"))
            .collect();
        assert!(parsed.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn window_parse_accepts_twelve_and_twenty_four_hour_forms() {
        let window = OperatingWindow::parse("9:00 AM", "13:00", 60).expect("window");
        let template = SlotTemplate::from_window(&window).expect("template");
        assert_eq!(
            template.canonical_times(),
            ["9:00 AM", "10:00 AM", "11:00 AM", "12:00 PM", "1:00 PM"]
        );
    }

    #[test]
    fn window_stops_before_wrapping_past_midnight() {
        let window = OperatingWindow::parse("11:00 PM", "11:59 PM", 45).expect("window");
        let template = SlotTemplate::from_window(&window).expect("template");
        assert_eq!(template.canonical_times(), ["11:00 PM", "11:45 PM"]);
    }

    #[test]
    fn rejects_zero_interval_and_inverted_window() {
        let mut window = OperatingWindow::default();
        window.interval_minutes = 0;
        assert_eq!(
            SlotTemplate::from_window(&window),
            Err(TemplateError::InvalidInterval(0))
        );

        let inverted = OperatingWindow::parse("4:00 PM", "8:00 AM", 30).expect("window");
        assert!(matches!(
            SlotTemplate::from_window(&inverted),
            Err(TemplateError::InvertedWindow { .. })
        ));
    }

    #[test]
    fn from_labels_rejects_duplicates_and_blanks() {
        assert_eq!(
            SlotTemplate::from_labels(["8:00 AM", "8:00 AM"]),
            Err(TemplateError::DuplicateLabel("8:00 AM".into()))
        );
        assert_eq!(
            SlotTemplate::from_labels(["8:00 AM", " "]),
            Err(TemplateError::BlankLabel)
        );
        assert_eq!(
            SlotTemplate::from_labels(Vec::<String>::new()),
            Err(TemplateError::Empty)
        );
    }

    #[test]
    fn lookup_by_label() {
        let template = SlotTemplate::from_labels(["8:00 AM", "8:30 AM"]).expect("template");
        assert_eq!(template.position("8:30 AM"), Some(1));
        assert!(!template.contains("9:00 AM"));
    }
}
