//! Ordered field table for the rule set
//!
//! One entry per field: key, getter, setter and scope. The request builder
//! walks the query-scoped entries to build the outgoing query; presets walk
//! every entry to write and read `key=value` lines. Declaration order here
//! is the order of query parameters and preset lines.

use super::{
    Difficulty, Environment, LbType, Mood, PrimaryType, RandomizerRules, RuleEnum, Routes, Site,
    SiteMask, Tag,
};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use std::collections::BTreeSet;
use std::time::Duration;

/// Where a field is used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldScope {
    /// Sent to the exchange as a query parameter
    Query,
    /// Only drives the session (time, skips, sampling); never sent
    Session,
}

/// A single enum value carried with both encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Choice {
    pub ordinal: u8,
    pub name: &'static str,
}

impl Choice {
    fn of<T: RuleEnum>(value: T) -> Self {
        Self {
            ordinal: value.ordinal(),
            name: value.name(),
        }
    }
}

/// Typed value of a set field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Int(u32),
    Text(String),
    Date(NaiveDate),
    Duration(Duration),
    Choice(Choice),
    Choices(Vec<Choice>),
    Sites(SiteMask),
}

impl FieldValue {
    /// Query encoding: booleans as 1/0, durations as milliseconds, dates as
    /// YYYY-MM-DD, enums as ordinals, sets comma-joined
    pub fn to_query(&self) -> String {
        match self {
            FieldValue::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            FieldValue::Int(i) => i.to_string(),
            FieldValue::Text(s) => s.clone(),
            FieldValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            FieldValue::Duration(d) => d.as_millis().to_string(),
            FieldValue::Choice(c) => c.ordinal.to_string(),
            FieldValue::Choices(cs) => cs
                .iter()
                .map(|c| c.ordinal.to_string())
                .collect::<Vec<_>>()
                .join(","),
            FieldValue::Sites(mask) => mask.to_string(),
        }
    }

    /// Preset encoding: like the query encoding but enums by name and
    /// booleans as true/false
    pub fn to_preset(&self) -> String {
        match self {
            FieldValue::Bool(b) => b.to_string(),
            FieldValue::Choice(c) => c.name.to_string(),
            FieldValue::Choices(cs) => cs.iter().map(|c| c.name).collect::<Vec<_>>().join(","),
            other => other.to_query(),
        }
    }
}

type Getter = fn(&RandomizerRules) -> Option<FieldValue>;
type Setter = fn(&mut RandomizerRules, &str) -> Result<(), String>;

/// Entry of the field table
pub struct RuleField {
    pub key: &'static str,
    pub scope: FieldScope,
    pub get: Getter,
    pub set: Setter,
}

impl RuleField {
    /// Query parameter name: the key lower-cased without separators
    pub fn query_name(&self) -> String {
        self.key.replace('_', "")
    }

    pub fn is_query(&self) -> bool {
        self.scope == FieldScope::Query
    }
}

impl std::fmt::Debug for RuleField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleField")
            .field("key", &self.key)
            .field("scope", &self.scope)
            .finish()
    }
}

/// The field table, built once
pub fn rule_fields() -> &'static [RuleField] {
    &RULE_FIELDS
}

/// Look up a field by key
pub fn field(key: &str) -> Option<&'static RuleField> {
    rule_fields().iter().find(|f| f.key == key)
}

fn text(value: &Option<String>) -> Option<FieldValue> {
    value
        .as_ref()
        .filter(|s| !s.is_empty())
        .map(|s| FieldValue::Text(s.clone()))
}

fn choices<T: RuleEnum>(set: &BTreeSet<T>) -> Option<FieldValue> {
    if set.is_empty() {
        None
    } else {
        Some(FieldValue::Choices(set.iter().map(|v| Choice::of(*v)).collect()))
    }
}

fn choice<T: RuleEnum>(value: Option<T>) -> Option<FieldValue> {
    value.map(|v| FieldValue::Choice(Choice::of(v)))
}

fn parse_text(raw: &str) -> Option<String> {
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

fn parse_bool(raw: &str) -> Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(format!("'{other}' is not a boolean")),
    }
}

fn parse_opt_bool(raw: &str) -> Result<Option<bool>, String> {
    if raw.is_empty() {
        Ok(None)
    } else {
        parse_bool(raw).map(Some)
    }
}

fn parse_opt_u32(raw: &str) -> Result<Option<u32>, String> {
    if raw.is_empty() {
        return Ok(None);
    }
    raw.trim()
        .parse::<u32>()
        .map(Some)
        .map_err(|e| format!("'{raw}' is not a non-negative integer: {e}"))
}

fn parse_opt_date(raw: &str) -> Result<Option<NaiveDate>, String> {
    if raw.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map(Some)
        .map_err(|e| format!("'{raw}' is not a YYYY-MM-DD date: {e}"))
}

fn parse_millis(raw: &str) -> Result<Duration, String> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| format!("'{raw}' is not a duration in milliseconds: {e}"))
}

fn parse_opt_millis(raw: &str) -> Result<Option<Duration>, String> {
    if raw.is_empty() {
        Ok(None)
    } else {
        parse_millis(raw).map(Some)
    }
}

fn parse_enum<T: RuleEnum>(raw: &str) -> Result<T, String> {
    let raw = raw.trim();
    T::from_name(raw)
        .or_else(|| raw.parse::<u8>().ok().and_then(T::from_ordinal))
        .ok_or_else(|| format!("'{raw}' is not a known value"))
}

fn parse_opt_enum<T: RuleEnum>(raw: &str) -> Result<Option<T>, String> {
    if raw.is_empty() {
        Ok(None)
    } else {
        parse_enum(raw).map(Some)
    }
}

fn parse_set<T: RuleEnum>(raw: &str) -> Result<BTreeSet<T>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_enum)
        .collect()
}

fn parse_sites(raw: &str) -> Result<SiteMask, String> {
    let mut mask = SiteMask::ANY;
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if name.eq_ignore_ascii_case("any") {
            continue;
        }
        let site = Site::from_name(name).ok_or_else(|| format!("'{name}' is not a site"))?;
        mask = mask.with(site);
    }
    Ok(mask)
}

macro_rules! flag_field {
    ($key:literal, $field:ident) => {
        RuleField {
            key: $key,
            scope: FieldScope::Query,
            get: |r| r.request_rules.$field.map(FieldValue::Bool),
            set: |r, raw| {
                r.request_rules.$field = parse_opt_bool(raw)?;
                Ok(())
            },
        }
    };
}

static RULE_FIELDS: Lazy<Vec<RuleField>> = Lazy::new(|| {
    vec![
        RuleField {
            key: "time_limit",
            scope: FieldScope::Session,
            get: |r| Some(FieldValue::Duration(r.time_limit)),
            set: |r, raw| {
                r.time_limit = parse_millis(raw)?;
                Ok(())
            },
        },
        RuleField {
            key: "site",
            scope: FieldScope::Session,
            get: |r| Some(FieldValue::Sites(r.request_rules.site)),
            set: |r, raw| {
                r.request_rules.site = parse_sites(raw)?;
                Ok(())
            },
        },
        RuleField {
            key: "equal_environment_distribution",
            scope: FieldScope::Session,
            get: |r| {
                Some(FieldValue::Bool(
                    r.request_rules.equal_environment_distribution,
                ))
            },
            set: |r, raw| {
                r.request_rules.equal_environment_distribution = parse_bool(raw)?;
                Ok(())
            },
        },
        RuleField {
            key: "equal_vehicle_distribution",
            scope: FieldScope::Session,
            get: |r| Some(FieldValue::Bool(r.request_rules.equal_vehicle_distribution)),
            set: |r, raw| {
                r.request_rules.equal_vehicle_distribution = parse_bool(raw)?;
                Ok(())
            },
        },
        RuleField {
            key: "author",
            scope: FieldScope::Query,
            get: |r| text(&r.request_rules.author),
            set: |r, raw| {
                r.request_rules.author = parse_text(raw);
                Ok(())
            },
        },
        RuleField {
            key: "environment",
            scope: FieldScope::Query,
            get: |r| choices(&r.request_rules.environments),
            set: |r, raw| {
                r.request_rules.environments = parse_set::<Environment>(raw)?;
                Ok(())
            },
        },
        RuleField {
            key: "name",
            scope: FieldScope::Query,
            get: |r| text(&r.request_rules.name),
            set: |r, raw| {
                r.request_rules.name = parse_text(raw);
                Ok(())
            },
        },
        RuleField {
            key: "vehicle",
            scope: FieldScope::Query,
            get: |r| choices(&r.request_rules.vehicles),
            set: |r, raw| {
                r.request_rules.vehicles = parse_set::<Environment>(raw)?;
                Ok(())
            },
        },
        RuleField {
            key: "primary_type",
            scope: FieldScope::Query,
            get: |r| choice(r.request_rules.primary_type),
            set: |r, raw| {
                r.request_rules.primary_type = parse_opt_enum::<PrimaryType>(raw)?;
                Ok(())
            },
        },
        RuleField {
            key: "tag",
            scope: FieldScope::Query,
            get: |r| choice(r.request_rules.tag),
            set: |r, raw| {
                r.request_rules.tag = parse_opt_enum::<Tag>(raw)?;
                Ok(())
            },
        },
        RuleField {
            key: "mood",
            scope: FieldScope::Query,
            get: |r| choices(&r.request_rules.moods),
            set: |r, raw| {
                r.request_rules.moods = parse_set::<Mood>(raw)?;
                Ok(())
            },
        },
        RuleField {
            key: "difficulty",
            scope: FieldScope::Query,
            get: |r| choices(&r.request_rules.difficulties),
            set: |r, raw| {
                r.request_rules.difficulties = parse_set::<Difficulty>(raw)?;
                Ok(())
            },
        },
        RuleField {
            key: "routes",
            scope: FieldScope::Query,
            get: |r| choices(&r.request_rules.routes),
            set: |r, raw| {
                r.request_rules.routes = parse_set::<Routes>(raw)?;
                Ok(())
            },
        },
        RuleField {
            key: "lb_type",
            scope: FieldScope::Query,
            get: |r| choice(r.request_rules.lb_type),
            set: |r, raw| {
                r.request_rules.lb_type = parse_opt_enum::<LbType>(raw)?;
                Ok(())
            },
        },
        flag_field!("in_beta", in_beta),
        flag_field!("in_play_later", in_play_later),
        flag_field!("in_featured", in_featured),
        flag_field!("in_supporter", in_supporter),
        flag_field!("in_favorite", in_favorite),
        flag_field!("in_downloads", in_downloads),
        flag_field!("in_replays", in_replays),
        flag_field!("in_envmix", in_envmix),
        flag_field!("in_has_record", in_has_record),
        flag_field!("in_latest_author", in_latest_author),
        flag_field!("in_latest_awarded_author", in_latest_awarded_author),
        flag_field!("in_screenshot", in_screenshot),
        RuleField {
            key: "uploaded_before",
            scope: FieldScope::Query,
            get: |r| r.request_rules.uploaded_before.map(FieldValue::Date),
            set: |r, raw| {
                r.request_rules.uploaded_before = parse_opt_date(raw)?;
                Ok(())
            },
        },
        RuleField {
            key: "uploaded_after",
            scope: FieldScope::Query,
            get: |r| r.request_rules.uploaded_after.map(FieldValue::Date),
            set: |r, raw| {
                r.request_rules.uploaded_after = parse_opt_date(raw)?;
                Ok(())
            },
        },
        RuleField {
            key: "survival_mode",
            scope: FieldScope::Session,
            get: |r| Some(FieldValue::Bool(r.request_rules.survival_mode)),
            set: |r, raw| {
                r.request_rules.survival_mode = parse_bool(raw)?;
                Ok(())
            },
        },
        RuleField {
            key: "survival_bonus_time",
            scope: FieldScope::Session,
            get: |r| r.request_rules.survival_bonus_time.map(FieldValue::Duration),
            set: |r, raw| {
                r.request_rules.survival_bonus_time = parse_opt_millis(raw)?;
                Ok(())
            },
        },
        RuleField {
            key: "author_time_min",
            scope: FieldScope::Query,
            get: |r| r.request_rules.author_time_min.map(FieldValue::Duration),
            set: |r, raw| {
                r.request_rules.author_time_min = parse_opt_millis(raw)?;
                Ok(())
            },
        },
        RuleField {
            key: "author_time_max",
            scope: FieldScope::Query,
            get: |r| r.request_rules.author_time_max.map(FieldValue::Duration),
            set: |r, raw| {
                r.request_rules.author_time_max = parse_opt_millis(raw)?;
                Ok(())
            },
        },
        RuleField {
            key: "free_skip_limit",
            scope: FieldScope::Session,
            get: |r| r.request_rules.free_skip_limit.map(FieldValue::Int),
            set: |r, raw| {
                r.request_rules.free_skip_limit = parse_opt_u32(raw)?;
                Ok(())
            },
        },
        RuleField {
            key: "gold_skip_limit",
            scope: FieldScope::Session,
            get: |r| r.request_rules.gold_skip_limit.map(FieldValue::Int),
            set: |r, raw| {
                r.request_rules.gold_skip_limit = parse_opt_u32(raw)?;
                Ok(())
            },
        },
    ]
});
