//! Randomized request builder
//!
//! Turns a partially-specified [`RequestRules`] into one concrete
//! `https://<site host>/trackrandom?...` URL. Site resolution, cross-field
//! compatibility and equal-distribution sampling all draw from the caller's
//! RNG, so a seeded generator yields a reproducible sequence of requests.

use crate::rules::{
    rule_fields, Environment, PrimaryType, RandomizerRules, RequestRules, Site, SiteMask,
};
use rand::Rng;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Path of the random-track endpoint on every site
pub const RANDOM_TRACK_PATH: &str = "/trackrandom";

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("No site ({requested}) can satisfy the requested environments and vehicles")]
    NoCompatibleSite { requested: SiteMask },

    #[error("Invalid request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// A concrete request: the site it targets and the full URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapRequest {
    pub site: Site,
    pub url: Url,
}

impl fmt::Display for MapRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// Sites the rules can be sent to
///
/// Named sites are kept only when compatible, so a pinned site with a
/// disjoint environment set resolves to nothing. The wildcard considers
/// every site.
pub fn compatible_sites(rules: &RequestRules) -> Vec<Site> {
    let candidates = if rules.site.is_any() {
        Site::ALL.to_vec()
    } else {
        rules.site.sites()
    };

    candidates
        .into_iter()
        .filter(|site| is_site_compatible(*site, rules))
        .collect()
}

fn is_site_compatible(site: Site, rules: &RequestRules) -> bool {
    site.accepts(&rules.environments)
        && site.accepts(&rules.vehicles)
        && satisfies_envmix(site, rules)
}

/// Every requested environment must also be a requested vehicle
fn satisfies_envmix(site: Site, rules: &RequestRules) -> bool {
    if !site.requires_envmix() || rules.environments.is_empty() || rules.vehicles.is_empty() {
        return true;
    }
    rules.environments.is_subset(&rules.vehicles)
}

/// Build one request URL from the rules
pub fn build_request<R: Rng + ?Sized>(
    rules: &RequestRules,
    rng: &mut R,
) -> Result<MapRequest, RequestError> {
    let candidates = compatible_sites(rules);
    if candidates.is_empty() {
        return Err(RequestError::NoCompatibleSite {
            requested: rules.site,
        });
    }
    let site = candidates[rng.random_range(0..candidates.len())];

    let mut resolved = RandomizerRules {
        request_rules: rules.clone(),
        ..Default::default()
    };
    let request = &mut resolved.request_rules;
    if request.equal_environment_distribution {
        request.environments = draw_singleton(&request.environments, site, rng);
    }
    if request.equal_vehicle_distribution {
        request.vehicles = draw_singleton(&request.vehicles, site, rng);
    }
    if site.is_basic() {
        restrict_to_basic(request);
    }

    let pairs: Vec<(String, String)> = rule_fields()
        .iter()
        .filter(|field| field.is_query())
        .filter_map(|field| {
            (field.get)(&resolved).map(|value| (field.query_name(), value.to_query()))
        })
        .collect();

    let mut url = Url::parse(&format!("https://{}{}", site.host(), RANDOM_TRACK_PATH))?;
    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs);
    }

    debug!(%site, %url, "Built map request");
    Ok(MapRequest { site, url })
}

/// Convenience wrapper returning just the URL
pub fn build_request_url<R: Rng + ?Sized>(
    rules: &RequestRules,
    rng: &mut R,
) -> Result<Url, RequestError> {
    build_request(rules, rng).map(|request| request.url)
}

/// Draw one environment uniformly from the set, or from the site's
/// sampling domain when the set is empty
fn draw_singleton<R: Rng + ?Sized>(
    set: &BTreeSet<Environment>,
    site: Site,
    rng: &mut R,
) -> BTreeSet<Environment> {
    let pick = if set.is_empty() {
        let domain = site.sampling_domain();
        domain[rng.random_range(0..domain.len())]
    } else {
        let index = rng.random_range(0..set.len());
        // BTreeSet iteration order is the ordinal order, so the index is stable
        match set.iter().nth(index) {
            Some(env) => *env,
            None => return set.clone(),
        }
    };
    BTreeSet::from([pick])
}

/// Basic sites only index Stadium race tracks; anything else is dropped
fn restrict_to_basic(rules: &mut RequestRules) {
    let stadium = BTreeSet::from([Environment::Stadium]);
    if !rules.environments.is_empty() && rules.environments != stadium {
        rules.environments.clear();
    }
    if !rules.vehicles.is_empty() && rules.vehicles != stadium {
        rules.vehicles.clear();
    }
    if rules.primary_type.is_some_and(|t| t != PrimaryType::Race) {
        rules.primary_type = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Mood, Tag};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn params(url: &Url) -> HashMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    #[test]
    fn test_empty_rules_resolve_to_any_site() {
        let rules = RequestRules::default();
        assert_eq!(compatible_sites(&rules), Site::ALL.to_vec());

        let request = build_request(&rules, &mut rng()).unwrap();
        assert_eq!(request.url.path(), RANDOM_TRACK_PATH);
        assert_eq!(request.url.query(), None);
        assert_eq!(request.url.host_str(), Some(request.site.host()));
    }

    #[test]
    fn test_pinned_site_with_disjoint_environment_fails() {
        let rules = RequestRules {
            site: SiteMask::only(Site::Original),
            environments: BTreeSet::from([Environment::Island]),
            ..Default::default()
        };
        assert!(matches!(
            build_request(&rules, &mut rng()),
            Err(RequestError::NoCompatibleSite { .. })
        ));
    }

    #[test]
    fn test_island_resolves_to_sunrise_compatible_sites() {
        let rules = RequestRules {
            environments: BTreeSet::from([Environment::Island]),
            ..Default::default()
        };
        assert_eq!(compatible_sites(&rules), vec![Site::Tmuf, Site::Sunrise]);

        let mut rng = rng();
        for _ in 0..50 {
            let request = build_request(&rules, &mut rng).unwrap();
            assert!(matches!(request.site, Site::Tmuf | Site::Sunrise));
            assert_eq!(params(&request.url)["environment"], "3");
        }
    }

    #[test]
    fn test_envmix_requires_environments_in_vehicles() {
        let rules = RequestRules {
            site: SiteMask::only(Site::Sunrise),
            environments: BTreeSet::from([Environment::Island, Environment::Bay]),
            vehicles: BTreeSet::from([Environment::Island]),
            ..Default::default()
        };
        assert!(compatible_sites(&rules).is_empty());

        let rules = RequestRules {
            vehicles: BTreeSet::from([Environment::Island, Environment::Bay]),
            ..rules
        };
        assert_eq!(compatible_sites(&rules), vec![Site::Sunrise]);
    }

    #[test]
    fn test_basic_site_drops_incompatible_fields() {
        let rules = RequestRules {
            site: SiteMask::only(Site::Nations),
            environments: BTreeSet::from([Environment::Stadium, Environment::Island]),
            primary_type: Some(PrimaryType::Puzzle),
            tag: Some(Tag::Tech),
            ..Default::default()
        };
        let url = build_request_url(&rules, &mut rng()).unwrap();
        let params = params(&url);
        assert!(!params.contains_key("environment"));
        assert!(!params.contains_key("primarytype"));
        assert_eq!(params["tag"], "7");
    }

    #[test]
    fn test_basic_site_keeps_stadium_and_race() {
        let rules = RequestRules {
            site: SiteMask::only(Site::Tmnf),
            environments: BTreeSet::from([Environment::Stadium]),
            primary_type: Some(PrimaryType::Race),
            ..Default::default()
        };
        let params = params(&build_request_url(&rules, &mut rng()).unwrap());
        assert_eq!(params["environment"], "6");
        assert_eq!(params["primarytype"], "0");
    }

    #[test]
    fn test_equal_distribution_sends_singleton() {
        let rules = RequestRules {
            site: SiteMask::only(Site::Tmuf),
            equal_environment_distribution: true,
            environments: BTreeSet::from([Environment::Snow, Environment::Bay]),
            ..Default::default()
        };
        let mut rng = rng();
        for _ in 0..20 {
            let params = params(&build_request_url(&rules, &mut rng).unwrap());
            assert!(matches!(params["environment"].as_str(), "0" | "5"));
        }
    }

    #[test]
    fn test_equal_distribution_empty_set_uses_site_domain() {
        let rules = RequestRules {
            site: SiteMask::only(Site::Original),
            equal_vehicle_distribution: true,
            ..Default::default()
        };
        let mut rng = rng();
        for _ in 0..20 {
            let params = params(&build_request_url(&rules, &mut rng).unwrap());
            assert!(matches!(params["vehicle"].as_str(), "0" | "1" | "2"));
        }
    }

    #[test]
    fn test_sets_are_comma_joined_and_percent_encoded() {
        let rules = RequestRules {
            site: SiteMask::only(Site::Tmuf),
            moods: BTreeSet::from([Mood::Night, Mood::Day]),
            ..Default::default()
        };
        let url = build_request_url(&rules, &mut rng()).unwrap();
        assert_eq!(url.query(), Some("mood=1%2C3"));
        assert_eq!(params(&url)["mood"], "1,3");
    }

    #[test]
    fn test_same_seed_same_request() {
        let rules = RequestRules {
            equal_environment_distribution: true,
            ..Default::default()
        };
        let a = build_request(&rules, &mut StdRng::seed_from_u64(99)).unwrap();
        let b = build_request(&rules, &mut StdRng::seed_from_u64(99)).unwrap();
        assert_eq!(a, b);
    }
}
