use chrono::{DateTime, FixedOffset, Offset, Utc, Weekday};
use serde::Serialize;
use std::ops::RangeInclusive;
use tracing::debug;

use crate::{format_count, validate_records, weekday_name, PostRecord, Result, WEEKDAYS};

pub const STAT_TOTAL_POSTS: &str = "Total posts";
pub const STAT_TOTAL_LIKES: &str = "Total likes";
pub const STAT_TOTAL_COMMENTS: &str = "Total comments";
pub const STAT_AVERAGE_LIKES: &str = "Average likes";
pub const STAT_AVERAGE_COMMENTS: &str = "Average comments";
pub const STAT_AVERAGE_ENGAGEMENT: &str = "Average engagement";
pub const STAT_PEAK_HOUR_SHARE: &str = "Peak-hour share";

/// Local hours counted as "peak" for the peak-hour share stat.
pub const PEAK_HOURS: RangeInclusive<u8> = 12..=18;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatEntry {
    pub name: String,
    pub value: f64,
}

impl StatEntry {
    fn new(name: &str, value: f64) -> Self {
        Self {
            name: name.to_string(),
            value,
        }
    }

    /// Value as shown in terminal reports: the peak-hour share as a
    /// percentage, whole counts digit-grouped, averages to one decimal.
    pub fn display_value(&self) -> String {
        if self.name == STAT_PEAK_HOUR_SHARE {
            format!("{:.1}%", self.value * 100.0)
        } else if self.value.fract() == 0.0 && self.value >= 0.0 {
            format_count(self.value as u64)
        } else {
            format!("{:.1}", self.value)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub timestamp: DateTime<Utc>,
    pub likes_count: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateResult {
    pub stats: Vec<StatEntry>,
    pub best_hour: Option<u8>,
    pub best_day: Option<Weekday>,
    pub top_post: Option<PostRecord>,
    pub engagement_trend: Vec<TrendPoint>,
}

impl AggregateResult {
    pub fn stat(&self, name: &str) -> Option<f64> {
        self.stats
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.value)
    }

    pub fn best_day_name(&self) -> Option<&'static str> {
        self.best_day.map(weekday_name)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Aggregator {
    offset: FixedOffset,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::utc()
    }
}

impl Aggregator {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn aggregate(&self, records: &[PostRecord]) -> Result<AggregateResult> {
        validate_records(records)?;

        let mut hours = [Tally::default(); 24];
        let mut days = [Tally::default(); 7];
        let mut total_likes = 0u64;
        let mut total_comments = 0u64;
        let mut peak_posts = 0usize;
        let mut top: Option<&PostRecord> = None;

        for record in records {
            let likes = record.likes();
            let (hour, day) = record.local_slot(self.offset);
            hours[hour as usize].add(likes);
            days[day.num_days_from_monday() as usize].add(likes);

            total_likes = total_likes.saturating_add(likes);
            total_comments = total_comments.saturating_add(record.comments());
            if PEAK_HOURS.contains(&hour) {
                peak_posts += 1;
            }

            top = match top {
                Some(current) if !outranks(record, current) => Some(current),
                _ => Some(record),
            };
        }

        let best_hour = best_slot(&hours).map(|index| index as u8);
        let best_day = best_slot(&days).map(|index| WEEKDAYS[index]);

        let mut ordered: Vec<&PostRecord> = records.iter().collect();
        ordered.sort_by_key(|record| record.timestamp);
        let engagement_trend = ordered
            .into_iter()
            .map(|record| TrendPoint {
                timestamp: record.timestamp,
                likes_count: record.likes(),
            })
            .collect();

        let count = records.len();
        let stats = vec![
            StatEntry::new(STAT_TOTAL_POSTS, count as f64),
            StatEntry::new(STAT_TOTAL_LIKES, total_likes as f64),
            StatEntry::new(STAT_TOTAL_COMMENTS, total_comments as f64),
            StatEntry::new(STAT_AVERAGE_LIKES, mean(total_likes, count)),
            StatEntry::new(STAT_AVERAGE_COMMENTS, mean(total_comments, count)),
            StatEntry::new(
                STAT_AVERAGE_ENGAGEMENT,
                mean(total_likes.saturating_add(total_comments), count),
            ),
            StatEntry::new(STAT_PEAK_HOUR_SHARE, mean(peak_posts as u64, count)),
        ];

        debug!(
            records = count,
            best_hour = ?best_hour,
            best_day = ?best_day.map(weekday_name),
            "aggregated post records"
        );

        Ok(AggregateResult {
            stats,
            best_hour,
            best_day,
            top_post: top.cloned(),
            engagement_trend,
        })
    }
}

pub fn aggregate(records: &[PostRecord]) -> Result<AggregateResult> {
    Aggregator::default().aggregate(records)
}

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    posts: usize,
    likes: u64,
}

impl Tally {
    fn add(&mut self, likes: u64) {
        self.posts += 1;
        self.likes = self.likes.saturating_add(likes);
    }
}

// Scans in index order so the lowest index wins ties. Slots without posts are
// never candidates.
fn best_slot(tallies: &[Tally]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (index, tally) in tallies.iter().enumerate() {
        if tally.posts == 0 {
            continue;
        }
        match best {
            Some(current) if tallies[current].likes >= tally.likes => {}
            _ => best = Some(index),
        }
    }
    best
}

fn outranks(candidate: &PostRecord, current: &PostRecord) -> bool {
    candidate.likes_count > current.likes_count
        || (candidate.likes_count == current.likes_count
            && candidate.timestamp < current.timestamp)
}

fn mean(total: u64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total as f64 / count as f64
    }
}
