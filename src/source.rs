use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{InsightsError, PostRecord, Result};

/// Supplies the full current set of post records. Every call reloads.
#[async_trait]
pub trait PostSource: Send + Sync {
    async fn load(&self) -> Result<Vec<PostRecord>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawPostId {
    Text(String),
    Number(i64),
}

impl RawPostId {
    fn into_string(self) -> String {
        match self {
            RawPostId::Text(value) => value,
            RawPostId::Number(value) => value.to_string(),
        }
    }
}

/// One entry of a post export as it appears on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPostRecord {
    pub id: RawPostId,
    pub timestamp: String,
    pub likes_count: i64,
    #[serde(default)]
    pub comments_count: i64,
}

impl RawPostRecord {
    pub fn into_record(self) -> Result<PostRecord> {
        let id = self.id.into_string();
        let timestamp = parse_timestamp(&self.timestamp).ok_or_else(|| {
            InsightsError::invalid_record(&id, format!("invalid timestamp: {}", self.timestamp))
        })?;
        Ok(PostRecord {
            id,
            timestamp,
            likes_count: self.likes_count,
            comments_count: self.comments_count,
        })
    }
}

/// Accepts RFC 3339 (`2024-03-04T09:00:00Z`, `...+05:30`) and offset-less ISO
/// timestamps, which are read as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}

pub fn parse_records(payload: &str) -> Result<Vec<PostRecord>> {
    if payload.trim().is_empty() {
        return Ok(Vec::new());
    }
    let raw: Vec<RawPostRecord> = serde_json::from_str(payload)
        .map_err(|err| InsightsError::Source(format!("failed to parse posts: {}", err)))?;
    raw.into_iter().map(RawPostRecord::into_record).collect()
}

pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[async_trait]
impl PostSource for JsonFileSource {
    async fn load(&self) -> Result<Vec<PostRecord>> {
        let data = tokio::fs::read_to_string(&self.path).await.map_err(|err| {
            InsightsError::Source(format!(
                "failed to read posts from {}: {}",
                self.path.display(),
                err
            ))
        })?;
        parse_records(&data)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    records: Vec<PostRecord>,
}

impl StaticSource {
    pub fn new(records: Vec<PostRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl PostSource for StaticSource {
    async fn load(&self) -> Result<Vec<PostRecord>> {
        Ok(self.records.clone())
    }
}
