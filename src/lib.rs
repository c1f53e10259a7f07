pub mod aggregate;
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod predict;
pub mod server;
pub mod source;

use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use aggregate::{aggregate, AggregateResult, Aggregator, StatEntry, TrendPoint};
pub use cache::ModelCache;
pub use error::{InsightsError, Result};
pub use predict::{fit, predict, FallbackLevel, Prediction, PredictionModel, Predictor};
pub use source::{JsonFileSource, PostSource, StaticSource};

pub const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub likes_count: i64,
    pub comments_count: i64,
}

impl PostRecord {
    pub fn new(
        id: impl Into<String>,
        timestamp: DateTime<Utc>,
        likes_count: i64,
        comments_count: i64,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp,
            likes_count,
            comments_count,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(InsightsError::invalid_record("<empty>", "id is empty"));
        }
        if self.likes_count < 0 {
            return Err(InsightsError::invalid_record(
                &self.id,
                format!("likes_count is negative: {}", self.likes_count),
            ));
        }
        if self.comments_count < 0 {
            return Err(InsightsError::invalid_record(
                &self.id,
                format!("comments_count is negative: {}", self.comments_count),
            ));
        }
        Ok(())
    }

    // Only meaningful after `validate`.
    pub fn likes(&self) -> u64 {
        self.likes_count.max(0) as u64
    }

    pub fn comments(&self) -> u64 {
        self.comments_count.max(0) as u64
    }

    pub fn local_slot(&self, offset: FixedOffset) -> (u8, Weekday) {
        let local = self.timestamp.with_timezone(&offset);
        (local.hour() as u8, local.weekday())
    }
}

pub fn validate_records(records: &[PostRecord]) -> Result<()> {
    for record in records {
        record.validate()?;
    }
    Ok(())
}

pub fn parse_weekday(value: &str) -> Option<Weekday> {
    match value.trim().to_lowercase().as_str() {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Identifies a record set by its length and a SHA-256 digest over every
/// field of every record, in input order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub count: usize,
    pub digest: u64,
}

impl Fingerprint {
    pub fn of(records: &[PostRecord]) -> Self {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        for record in records {
            hasher.update(record.id.as_bytes());
            hasher.update([0u8]);
            hasher.update(record.timestamp.timestamp().to_be_bytes());
            hasher.update(record.timestamp.timestamp_subsec_nanos().to_be_bytes());
            hasher.update(record.likes_count.to_be_bytes());
            hasher.update(record.comments_count.to_be_bytes());
        }
        let digest = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        Self {
            count: records.len(),
            digest: u64::from_be_bytes(bytes),
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:016x}", self.count, self.digest)
    }
}

/// Groups digits in threes, e.g. `12,345`.
pub fn format_count(count: u64) -> String {
    let digits = count.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
