use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AggregateResult, InsightsError, Prediction, Result, StatEntry, TrendPoint};

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ApiHour {
    Number(i64),
    Text(String),
}

#[derive(Debug, Deserialize)]
pub struct ApiPredictRequest {
    pub hour: Option<ApiHour>,
    pub day: Option<String>,
}

impl ApiPredictRequest {
    pub fn into_query(self) -> Result<(i64, String)> {
        let hour = match self.hour {
            Some(ApiHour::Number(value)) => value,
            Some(ApiHour::Text(value)) => value.trim().parse::<i64>().map_err(|_| {
                InsightsError::InvalidInput(format!("hour must be an integer, got {}", value))
            })?,
            None => return Err(InsightsError::InvalidInput("hour is required".to_string())),
        };
        let day = self
            .day
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| InsightsError::InvalidInput("day is required".to_string()))?;
        Ok((hour, day))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPredictResponse {
    pub predicted_likes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basis: Option<Prediction>,
}

impl ApiPredictResponse {
    pub fn from_prediction(prediction: Prediction, explain: bool) -> Self {
        Self {
            predicted_likes: prediction.likes,
            basis: explain.then_some(prediction),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiTopPost {
    pub id: String,
    pub likes: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiStatsResponse {
    pub stats: Vec<StatEntry>,
    pub best_time: Option<u8>,
    pub best_day: Option<String>,
    pub top_post: Option<ApiTopPost>,
    pub engagement_trend: Vec<TrendPoint>,
}

impl ApiStatsResponse {
    pub fn from_result(result: AggregateResult) -> Self {
        let best_day = result.best_day_name().map(str::to_string);
        Self {
            stats: result.stats,
            best_time: result.best_hour,
            best_day,
            top_post: result.top_post.map(|post| ApiTopPost {
                likes: post.likes(),
                id: post.id,
                timestamp: post.timestamp,
            }),
            engagement_trend: result.engagement_trend,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub error: String,
    pub kind: String,
}

impl ApiErrorResponse {
    pub fn from_error(err: &InsightsError) -> Self {
        Self {
            error: err.to_string(),
            kind: err.kind().to_string(),
        }
    }
}
