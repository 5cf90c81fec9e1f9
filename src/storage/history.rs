//! Session history and leaderboard

use crate::session::{MapResult, SessionData};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::time::Duration;

/// Counts derived from a stored session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub directory: String,
    pub started_at: DateTime<Utc>,
    #[serde(with = "humantime_serde")]
    pub original_time_limit: Duration,
    pub author_count: usize,
    pub gold_count: usize,
    pub skipped_count: usize,
    /// Minutes of time limit per author medal; `None` without authors
    pub minutes_per_author: Option<f64>,
}

impl From<&SessionData> for SessionSummary {
    fn from(data: &SessionData) -> Self {
        let author_count = data.count(MapResult::AuthorMedal);
        let minutes = data.original_time_limit.as_secs_f64() / 60.0;
        Self {
            directory: data.directory_name(),
            started_at: data.started_at,
            original_time_limit: data.original_time_limit,
            author_count,
            gold_count: data.count(MapResult::GoldMedal),
            skipped_count: data.count(MapResult::Skipped),
            minutes_per_author: (author_count > 0).then(|| minutes / author_count as f64),
        }
    }
}

/// Order sessions best first
///
/// Fewer minutes per author medal ranks higher; sessions without authors
/// come last. Ties go to more gold medals, then fewer skips.
pub fn rank_best_sessions(sessions: &[SessionData]) -> Vec<SessionSummary> {
    let mut summaries: Vec<SessionSummary> = sessions.iter().map(SessionSummary::from).collect();
    summaries.sort_by(compare);
    summaries
}

fn compare(a: &SessionSummary, b: &SessionSummary) -> Ordering {
    let by_rate = match (a.minutes_per_author, b.minutes_per_author) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_rate
        .then_with(|| b.gold_count.cmp(&a.gold_count))
        .then_with(|| a.skipped_count.cmp(&b.skipped_count))
}
