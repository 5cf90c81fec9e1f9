//! Site variants of the track exchange and their supported domains

use super::Environment;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Environments indexed by the Sunrise exchange
pub const SUNRISE_ENVIRONMENTS: &[Environment] =
    &[Environment::Island, Environment::Bay, Environment::Coast];

/// Environments indexed by the Original exchange
pub const ORIGINAL_ENVIRONMENTS: &[Environment] =
    &[Environment::Desert, Environment::Snow, Environment::Rally];

/// The only environment of the basic (Nations / Forever) exchanges
pub const STADIUM_ENVIRONMENTS: &[Environment] = &[Environment::Stadium];

/// A concrete exchange deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Site {
    #[serde(rename = "TMNF")]
    Tmnf,
    #[serde(rename = "TMUF")]
    Tmuf,
    Nations,
    Sunrise,
    Original,
}

impl Site {
    pub const ALL: &'static [Site] = &[
        Site::Tmnf,
        Site::Tmuf,
        Site::Nations,
        Site::Sunrise,
        Site::Original,
    ];

    const fn bit(self) -> u8 {
        match self {
            Site::Tmnf => 1,
            Site::Tmuf => 1 << 1,
            Site::Nations => 1 << 2,
            Site::Sunrise => 1 << 3,
            Site::Original => 1 << 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Site::Tmnf => "TMNF",
            Site::Tmuf => "TMUF",
            Site::Nations => "Nations",
            Site::Sunrise => "Sunrise",
            Site::Original => "Original",
        }
    }

    pub fn from_name(name: &str) -> Option<Site> {
        Site::ALL
            .iter()
            .copied()
            .find(|s| s.name().eq_ignore_ascii_case(name))
    }

    pub fn host(self) -> &'static str {
        match self {
            Site::Tmnf => "tmnf.exchange",
            Site::Tmuf => "tmuf.exchange",
            Site::Nations => "nations.tm-exchange.com",
            Site::Sunrise => "sunrise.tm-exchange.com",
            Site::Original => "original.tm-exchange.com",
        }
    }

    /// Environments this site indexes
    pub fn environments(self) -> &'static [Environment] {
        match self {
            Site::Tmnf | Site::Nations => STADIUM_ENVIRONMENTS,
            Site::Sunrise => SUNRISE_ENVIRONMENTS,
            Site::Original => ORIGINAL_ENVIRONMENTS,
            Site::Tmuf => <Environment as super::RuleEnum>::ALL,
        }
    }

    /// Domain an equal-distribution draw falls back to when the set is empty
    pub fn sampling_domain(self) -> &'static [Environment] {
        match self {
            Site::Sunrise => SUNRISE_ENVIRONMENTS,
            Site::Original => ORIGINAL_ENVIRONMENTS,
            _ => <Environment as super::RuleEnum>::ALL,
        }
    }

    /// Stadium-only sites that accept just a fixed subset of fields
    pub fn is_basic(self) -> bool {
        matches!(self, Site::Tmnf | Site::Nations)
    }

    /// Sites where every requested environment must also be a requested vehicle
    pub fn requires_envmix(self) -> bool {
        matches!(self, Site::Sunrise | Site::Original)
    }

    /// An empty set is unconstrained; otherwise it must overlap the site's domain
    pub fn accepts(self, set: &BTreeSet<Environment>) -> bool {
        set.is_empty() || self.environments().iter().any(|env| set.contains(env))
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bitmask over site variants; the empty mask is the "Any" wildcard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<Site>", into = "Vec<Site>")]
pub struct SiteMask(u8);

impl SiteMask {
    pub const ANY: SiteMask = SiteMask(0);

    pub fn only(site: Site) -> Self {
        SiteMask(site.bit())
    }

    pub fn with(self, site: Site) -> Self {
        SiteMask(self.0 | site.bit())
    }

    pub fn contains(self, site: Site) -> bool {
        self.0 & site.bit() != 0
    }

    pub fn is_any(self) -> bool {
        self.0 == 0
    }

    /// Concrete sites named by the mask, in declaration order
    pub fn sites(self) -> Vec<Site> {
        Site::ALL
            .iter()
            .copied()
            .filter(|s| self.contains(*s))
            .collect()
    }
}

impl From<Vec<Site>> for SiteMask {
    fn from(sites: Vec<Site>) -> Self {
        sites.into_iter().fold(SiteMask::ANY, SiteMask::with)
    }
}

impl From<SiteMask> for Vec<Site> {
    fn from(mask: SiteMask) -> Self {
        mask.sites()
    }
}

impl fmt::Display for SiteMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_any() {
            return f.write_str("Any");
        }
        let names: Vec<_> = self.sites().iter().map(|s| s.name()).collect();
        f.write_str(&names.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_mask_membership() {
        let mask = SiteMask::only(Site::Sunrise).with(Site::Tmuf);
        assert!(mask.contains(Site::Sunrise));
        assert!(mask.contains(Site::Tmuf));
        assert!(!mask.contains(Site::Nations));
        assert_eq!(mask.sites(), vec![Site::Tmuf, Site::Sunrise]);
        assert_eq!(mask.to_string(), "TMUF,Sunrise");
        assert!(SiteMask::ANY.is_any());
        assert_eq!(SiteMask::ANY.to_string(), "Any");
    }

    #[test]
    fn test_site_accepts_overlapping_sets() {
        let island: BTreeSet<_> = [Environment::Island].into();
        assert!(Site::Sunrise.accepts(&island));
        assert!(Site::Tmuf.accepts(&island));
        assert!(!Site::Original.accepts(&island));
        assert!(!Site::Nations.accepts(&island));
        assert!(Site::Nations.accepts(&BTreeSet::new()));

        let mixed: BTreeSet<_> = [Environment::Stadium, Environment::Island].into();
        assert!(Site::Tmnf.accepts(&mixed));
    }

    #[test]
    fn test_hosts() {
        assert_eq!(Site::Tmnf.host(), "tmnf.exchange");
        assert_eq!(Site::Original.host(), "original.tm-exchange.com");
    }

    #[test]
    fn test_mask_serde_as_list() {
        let mask: SiteMask = serde_yaml::from_str("[Nations, TMNF]").unwrap();
        assert_eq!(mask, SiteMask::only(Site::Tmnf).with(Site::Nations));
        let any: SiteMask = serde_yaml::from_str("[]").unwrap();
        assert!(any.is_any());
    }
}
