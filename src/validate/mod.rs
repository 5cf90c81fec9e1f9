//! Post-download map checks
//!
//! The exchange cannot guarantee every rule (derived fields such as the
//! author time, or the session's own time limit), so each artifact is read
//! and checked before it becomes the current map.

use crate::fetch::MapArtifact;
use crate::gbx::{read_map_header, MapMode};
use crate::rules::{Environment, RandomizerRules, RuleEnum};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Unreadable or not a map
    #[error("Map file is corrupt: {0}")]
    Corrupt(String),

    /// A valid map that breaks the rules
    #[error("Map rejected: {0}")]
    Rejected(String),
}

/// What the session needs to know about an accepted map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapInfo {
    pub uid: String,
    pub name: String,
    pub environment: Option<Environment>,
    #[serde(default, with = "humantime_serde")]
    pub author_time: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub gold_time: Option<Duration>,
    pub author_score: Option<u32>,
    pub mode: Option<MapMode>,
    pub track_id: Option<u64>,
}

impl MapInfo {
    pub fn is_stunts(&self) -> bool {
        self.mode == Some(MapMode::Stunts)
    }
}

/// Map an environment collection name to an environment
pub fn environment_from_collection(collection: &str) -> Option<Environment> {
    match collection {
        "Alpine" => Some(Environment::Snow),
        "Speed" => Some(Environment::Desert),
        other => Environment::from_name(other),
    }
}

/// Confirms an artifact is a playable map satisfying the rules
#[async_trait]
pub trait MapValidator: Send + Sync {
    async fn validate(
        &self,
        artifact: &MapArtifact,
        rules: &RandomizerRules,
    ) -> Result<MapInfo, ValidationError>;
}

/// Validates maps from their GBX header alone
#[derive(Debug, Default, Clone, Copy)]
pub struct HeaderMapValidator;

impl HeaderMapValidator {
    pub fn check(
        &self,
        artifact: &MapArtifact,
        rules: &RandomizerRules,
    ) -> Result<MapInfo, ValidationError> {
        let header =
            read_map_header(&artifact.bytes).map_err(|e| ValidationError::Corrupt(e.to_string()))?;

        let info = MapInfo {
            environment: environment_from_collection(&header.collection),
            uid: header.uid,
            name: header.name,
            author_time: header.author_time,
            gold_time: header.gold_time,
            author_score: header.author_score,
            mode: header.mode,
            track_id: artifact.track_id,
        };

        if info.uid.is_empty() {
            return Err(ValidationError::Corrupt("map has no uid".to_string()));
        }

        let request = &rules.request_rules;

        if !request.environments.is_empty() {
            match info.environment {
                Some(env) if request.environments.contains(&env) => {}
                _ => {
                    return Err(ValidationError::Rejected(format!(
                        "environment '{}' was not requested",
                        header.collection
                    )))
                }
            }
        }

        if info.is_stunts() {
            return Ok(info);
        }

        let Some(author_time) = info.author_time else {
            return Err(ValidationError::Rejected("map has no author time".to_string()));
        };

        if author_time > rules.time_limit {
            return Err(ValidationError::Rejected(format!(
                "author time {author_time:?} exceeds the session time limit"
            )));
        }
        if request.author_time_min.is_some_and(|min| author_time < min) {
            return Err(ValidationError::Rejected(format!(
                "author time {author_time:?} is below the minimum"
            )));
        }
        if request.author_time_max.is_some_and(|max| author_time > max) {
            return Err(ValidationError::Rejected(format!(
                "author time {author_time:?} is above the maximum"
            )));
        }

        Ok(info)
    }
}

#[async_trait]
impl MapValidator for HeaderMapValidator {
    async fn validate(
        &self,
        artifact: &MapArtifact,
        rules: &RandomizerRules,
    ) -> Result<MapInfo, ValidationError> {
        self.check(artifact, rules)
    }
}
