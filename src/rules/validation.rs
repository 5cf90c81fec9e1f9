//! Pre-flight checks run on a rule set before a session may start

use super::{RandomizerRules, SiteMask};
use crate::request::compatible_sites;
use chrono::NaiveDate;
use std::time::Duration;
use thiserror::Error;

/// Longest accepted overall time limit (9:59:59)
pub const MAX_TIME_LIMIT: Duration = Duration::from_secs(9 * 3600 + 59 * 60 + 59);

#[derive(Debug, Error, PartialEq)]
pub enum RuleValidationError {
    #[error("Time limit cannot be zero")]
    ZeroTimeLimit,

    #[error("Time limit {0:?} exceeds the maximum of 9:59:59")]
    TimeLimitTooLong(Duration),

    #[error("Author time minimum {min:?} is greater than maximum {max:?}")]
    AuthorTimeRange { min: Duration, max: Duration },

    #[error("Uploaded-after date {after} is later than uploaded-before date {before}")]
    UploadRange { after: NaiveDate, before: NaiveDate },

    #[error("No site ({requested}) can satisfy the environment and vehicle rules")]
    NoCompatibleSite { requested: SiteMask },
}

/// Validate a rule set, reporting the first problem found
pub fn validate_rules(rules: &RandomizerRules) -> Result<(), RuleValidationError> {
    if rules.time_limit.is_zero() {
        return Err(RuleValidationError::ZeroTimeLimit);
    }
    if rules.time_limit > MAX_TIME_LIMIT {
        return Err(RuleValidationError::TimeLimitTooLong(rules.time_limit));
    }

    let request = &rules.request_rules;

    if let (Some(min), Some(max)) = (request.author_time_min, request.author_time_max) {
        if min > max {
            return Err(RuleValidationError::AuthorTimeRange { min, max });
        }
    }

    if let (Some(after), Some(before)) = (request.uploaded_after, request.uploaded_before) {
        if after > before {
            return Err(RuleValidationError::UploadRange { after, before });
        }
    }

    if compatible_sites(request).is_empty() {
        return Err(RuleValidationError::NoCompatibleSite {
            requested: request.site,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Environment, Site};

    #[test]
    fn test_default_rules_are_valid() {
        assert_eq!(validate_rules(&RandomizerRules::default()), Ok(()));
    }

    #[test]
    fn test_time_limit_bounds() {
        let mut rules = RandomizerRules {
            time_limit: Duration::ZERO,
            ..Default::default()
        };
        assert_eq!(
            validate_rules(&rules),
            Err(RuleValidationError::ZeroTimeLimit)
        );

        rules.time_limit = MAX_TIME_LIMIT;
        assert!(validate_rules(&rules).is_ok());

        rules.time_limit = MAX_TIME_LIMIT + Duration::from_secs(1);
        assert!(matches!(
            validate_rules(&rules),
            Err(RuleValidationError::TimeLimitTooLong(_))
        ));
    }

    #[test]
    fn test_inverted_ranges_are_rejected() {
        let mut rules = RandomizerRules::default();
        rules.request_rules.author_time_min = Some(Duration::from_secs(60));
        rules.request_rules.author_time_max = Some(Duration::from_secs(30));
        assert!(matches!(
            validate_rules(&rules),
            Err(RuleValidationError::AuthorTimeRange { .. })
        ));

        let mut rules = RandomizerRules::default();
        rules.request_rules.uploaded_after = NaiveDate::from_ymd_opt(2012, 1, 1);
        rules.request_rules.uploaded_before = NaiveDate::from_ymd_opt(2010, 1, 1);
        assert!(matches!(
            validate_rules(&rules),
            Err(RuleValidationError::UploadRange { .. })
        ));
    }

    #[test]
    fn test_unsatisfiable_site_is_rejected() {
        let mut rules = RandomizerRules::default();
        rules.request_rules.site = SiteMask::only(Site::Nations);
        rules.request_rules.environments.insert(Environment::Bay);
        assert_eq!(
            validate_rules(&rules),
            Err(RuleValidationError::NoCompatibleSite {
                requested: SiteMask::only(Site::Nations)
            })
        );
    }
}
