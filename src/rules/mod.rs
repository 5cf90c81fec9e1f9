//! Declarative rule set for map requests and sessions
//!
//! `RequestRules` is the user-configured, partially-specified constraint set.
//! It carries no behavior besides validation; the request builder turns it
//! into a concrete query and the session orchestrator reads its time and
//! skip controls.

pub mod fields;
pub mod site;
pub mod validation;

pub use fields::{rule_fields, FieldScope, FieldValue, RuleField};
pub use site::{Site, SiteMask};
pub use validation::{validate_rules, RuleValidationError, MAX_TIME_LIMIT};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

/// Closed enumeration whose values travel to the exchange as ordinals
pub trait RuleEnum: Copy + Ord + fmt::Debug + 'static {
    /// Every value, in ordinal order
    const ALL: &'static [Self];

    /// Ordinal sent in requests
    fn ordinal(self) -> u8;

    /// Display name used in presets and logs
    fn name(self) -> &'static str;

    fn from_ordinal(ordinal: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.ordinal() == ordinal)
    }

    /// Case-insensitive lookup by display name
    fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.name().eq_ignore_ascii_case(name))
    }
}

macro_rules! rule_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $ordinal:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl RuleEnum for $name {
            const ALL: &'static [Self] = &[$(Self::$variant),+];

            fn ordinal(self) -> u8 {
                match self {
                    $(Self::$variant => $ordinal),+
                }
            }

            fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant)),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

rule_enum! {
    /// Track environment; also used for the vehicle filter
    Environment {
        Snow = 0,
        Desert = 1,
        Rally = 2,
        Island = 3,
        Coast = 4,
        Bay = 5,
        Stadium = 6,
    }
}

rule_enum! {
    /// Primary track type. A single optional value keeps the choice exclusive.
    PrimaryType {
        Race = 0,
        Puzzle = 1,
        Platform = 2,
        Stunts = 3,
        Shortcut = 4,
    }
}

rule_enum! {
    Tag {
        Normal = 0,
        Stunt = 1,
        Maze = 2,
        Offroad = 3,
        Laps = 4,
        Fullspeed = 5,
        Lol = 6,
        Tech = 7,
        SpeedTech = 8,
        Rpg = 9,
        PressForward = 10,
        Trial = 11,
        Grass = 12,
    }
}

rule_enum! {
    Mood {
        Sunrise = 0,
        Day = 1,
        Sunset = 2,
        Night = 3,
    }
}

rule_enum! {
    Difficulty {
        Beginner = 0,
        Intermediate = 1,
        Expert = 2,
        Lunatic = 3,
    }
}

rule_enum! {
    Routes {
        Single = 0,
        Multiple = 1,
        Symmetrical = 2,
    }
}

rule_enum! {
    /// Leaderboard type
    LbType {
        Standard = 0,
        Classic = 1,
        Nadeo = 2,
    }
}

/// Request constraints plus the per-session survival and skip controls
///
/// Empty sets and `None` values mean "unconstrained" and are never sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestRules {
    pub site: SiteMask,
    pub equal_environment_distribution: bool,
    pub equal_vehicle_distribution: bool,

    pub author: Option<String>,
    pub environments: BTreeSet<Environment>,
    pub name: Option<String>,
    pub vehicles: BTreeSet<Environment>,
    pub primary_type: Option<PrimaryType>,
    pub tag: Option<Tag>,
    pub moods: BTreeSet<Mood>,
    pub difficulties: BTreeSet<Difficulty>,
    pub routes: BTreeSet<Routes>,
    pub lb_type: Option<LbType>,

    pub in_beta: Option<bool>,
    pub in_play_later: Option<bool>,
    pub in_featured: Option<bool>,
    pub in_supporter: Option<bool>,
    pub in_favorite: Option<bool>,
    pub in_downloads: Option<bool>,
    pub in_replays: Option<bool>,
    pub in_envmix: Option<bool>,
    pub in_has_record: Option<bool>,
    pub in_latest_author: Option<bool>,
    pub in_latest_awarded_author: Option<bool>,
    pub in_screenshot: Option<bool>,

    pub uploaded_before: Option<NaiveDate>,
    pub uploaded_after: Option<NaiveDate>,

    pub survival_mode: bool,
    /// Added back to the remaining time on a gold-or-better result, survival mode only
    #[serde(with = "humantime_serde")]
    pub survival_bonus_time: Option<Duration>,

    #[serde(with = "humantime_serde")]
    pub author_time_min: Option<Duration>,
    #[serde(with = "humantime_serde")]
    pub author_time_max: Option<Duration>,

    pub free_skip_limit: Option<u32>,
    pub gold_skip_limit: Option<u32>,
}

impl RequestRules {
    /// Bonus applied on gold-or-better results, `None` outside survival mode
    pub fn effective_survival_bonus(&self) -> Option<Duration> {
        if self.survival_mode {
            self.survival_bonus_time
        } else {
            None
        }
    }
}

/// Top-level rules: overall time limit plus request rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomizerRules {
    #[serde(with = "humantime_serde", default = "default_time_limit")]
    pub time_limit: Duration,
    #[serde(default)]
    pub request_rules: RequestRules,
}

impl Default for RandomizerRules {
    fn default() -> Self {
        Self {
            time_limit: default_time_limit(),
            request_rules: RequestRules::default(),
        }
    }
}

fn default_time_limit() -> Duration {
    Duration::from_secs(60 * 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_ordinals_and_names() {
        assert_eq!(Environment::Island.ordinal(), 3);
        assert_eq!(Environment::from_ordinal(6), Some(Environment::Stadium));
        assert_eq!(Environment::from_name("bay"), Some(Environment::Bay));
        assert_eq!(Environment::from_name("Alpine"), None);
        assert_eq!(Tag::SpeedTech.to_string(), "SpeedTech");
        assert_eq!(LbType::ALL.len(), 3);
    }

    #[test]
    fn test_enum_order_follows_ordinals() {
        for pair in Environment::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].ordinal() < pair[1].ordinal());
        }
    }

    #[test]
    fn test_survival_bonus_only_in_survival_mode() {
        let mut rules = RequestRules {
            survival_bonus_time: Some(Duration::from_secs(60)),
            ..Default::default()
        };
        assert_eq!(rules.effective_survival_bonus(), None);

        rules.survival_mode = true;
        assert_eq!(
            rules.effective_survival_bonus(),
            Some(Duration::from_secs(60))
        );
    }

    #[test]
    fn test_rules_yaml_round_trip() {
        let yaml = r#"
time_limit: 30m
request_rules:
  site: [Sunrise, TMUF]
  environments: [Island, Bay]
  survival_mode: true
  survival_bonus_time: 1m
  author_time_max: 45s
  free_skip_limit: 3
"#;
        let rules: RandomizerRules = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(rules.time_limit, Duration::from_secs(30 * 60));
        assert!(rules.request_rules.site.contains(Site::Sunrise));
        assert!(rules.request_rules.site.contains(Site::Tmuf));
        assert_eq!(rules.request_rules.environments.len(), 2);
        assert_eq!(
            rules.request_rules.author_time_max,
            Some(Duration::from_secs(45))
        );
        assert_eq!(rules.request_rules.free_skip_limit, Some(3));

        let back: RandomizerRules =
            serde_yaml::from_str(&serde_yaml::to_string(&rules).unwrap()).unwrap();
        assert_eq!(back, rules);
    }
}
