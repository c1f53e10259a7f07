use chrono::{FixedOffset, Offset, Utc, Weekday};
use serde::Serialize;
use tracing::debug;

use crate::{
    parse_weekday, validate_records, weekday_name, Fingerprint, InsightsError, PostRecord, Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackLevel {
    Bucket,
    Hour,
    Day,
    Global,
}

impl FallbackLevel {
    pub fn label(self) -> &'static str {
        match self {
            FallbackLevel::Bucket => "hour and day",
            FallbackLevel::Hour => "hour only",
            FallbackLevel::Day => "day only",
            FallbackLevel::Global => "all posts",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub likes: u64,
    pub mean: f64,
    pub level: FallbackLevel,
    pub support: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct Mean {
    count: usize,
    total: u64,
}

impl Mean {
    fn add(&mut self, likes: u64) {
        self.count += 1;
        self.total = self.total.saturating_add(likes);
    }

    fn value(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.total as f64 / self.count as f64)
        }
    }
}

/// Grouped like means for every (hour, weekday) bucket plus the hour-only,
/// day-only and global rollups, answered through a fixed fallback chain.
#[derive(Debug, Clone)]
pub struct PredictionModel {
    buckets: [[Mean; 7]; 24],
    hours: [Mean; 24],
    days: [Mean; 7],
    global: Mean,
    fingerprint: Fingerprint,
}

impl PredictionModel {
    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn record_count(&self) -> usize {
        self.global.count
    }

    pub fn predict(&self, hour: i64, day: &str) -> Result<u64> {
        self.explain(hour, day).map(|prediction| prediction.likes)
    }

    pub fn explain(&self, hour: i64, day: &str) -> Result<Prediction> {
        let (hour, day) = parse_query(hour, day)?;
        if self.global.count == 0 {
            return Err(InsightsError::InsufficientData);
        }

        let h = hour as usize;
        let d = day.num_days_from_monday() as usize;
        let chain = [
            (FallbackLevel::Bucket, self.buckets[h][d]),
            (FallbackLevel::Hour, self.hours[h]),
            (FallbackLevel::Day, self.days[d]),
            (FallbackLevel::Global, self.global),
        ];

        for (level, mean) in chain {
            if let Some(value) = mean.value() {
                debug!(
                    hour,
                    day = weekday_name(day),
                    level = level.label(),
                    support = mean.count,
                    "resolved like prediction"
                );
                return Ok(Prediction {
                    likes: value.round().max(0.0) as u64,
                    mean: value,
                    level,
                    support: mean.count,
                });
            }
        }

        Err(InsightsError::InsufficientData)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Predictor {
    offset: FixedOffset,
}

impl Default for Predictor {
    fn default() -> Self {
        Self::utc()
    }
}

impl Predictor {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    pub fn fit(&self, records: &[PostRecord]) -> Result<PredictionModel> {
        validate_records(records)?;

        let mut buckets = [[Mean::default(); 7]; 24];
        let mut hours = [Mean::default(); 24];
        let mut days = [Mean::default(); 7];
        let mut global = Mean::default();

        for record in records {
            let likes = record.likes();
            let (hour, day) = record.local_slot(self.offset);
            let h = hour as usize;
            let d = day.num_days_from_monday() as usize;
            buckets[h][d].add(likes);
            hours[h].add(likes);
            days[d].add(likes);
            global.add(likes);
        }

        let fingerprint = Fingerprint::of(records);
        debug!(records = records.len(), %fingerprint, "fitted prediction model");

        Ok(PredictionModel {
            buckets,
            hours,
            days,
            global,
            fingerprint,
        })
    }
}

pub fn fit(records: &[PostRecord]) -> Result<PredictionModel> {
    Predictor::default().fit(records)
}

pub fn predict(model: &PredictionModel, hour: i64, day: &str) -> Result<u64> {
    model.predict(hour, day)
}

pub fn parse_query(hour: i64, day: &str) -> Result<(u8, Weekday)> {
    if !(0..=23).contains(&hour) {
        return Err(InsightsError::InvalidInput(format!(
            "hour must be between 0 and 23, got {}",
            hour
        )));
    }
    let weekday = parse_weekday(day)
        .ok_or_else(|| InsightsError::InvalidInput(format!("unrecognized weekday: {}", day)))?;
    Ok((hour as u8, weekday))
}
