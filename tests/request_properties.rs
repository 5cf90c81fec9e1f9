//! Property tests for the random request builder

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tmx_randomizer::request::{build_request, RequestError, RANDOM_TRACK_PATH};
use tmx_randomizer::rules::{
    Difficulty, Environment, LbType, Mood, PrimaryType, RequestRules, Routes, Site, SiteMask,
    Tag,
};

fn query_of(url: &url::Url) -> HashMap<String, String> {
    url.query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

#[test]
fn test_pinned_site_with_disjoint_environments_always_fails() {
    let cases = [
        (Site::Tmnf, Environment::Island),
        (Site::Nations, Environment::Desert),
        (Site::Original, Environment::Stadium),
        (Site::Sunrise, Environment::Snow),
    ];
    let mut rng = StdRng::seed_from_u64(1);

    for (site, env) in cases {
        let rules = RequestRules {
            site: SiteMask::only(site),
            environments: [env].into(),
            ..RequestRules::default()
        };
        let result = build_request(&rules, &mut rng);
        assert!(
            matches!(result, Err(RequestError::NoCompatibleSite { .. })),
            "{site:?} with {env:?} should be unsatisfiable"
        );
    }
}

#[test]
fn test_equal_environment_distribution_is_uniform() {
    let rules = RequestRules {
        site: SiteMask::only(Site::Tmuf),
        environments: [Environment::Snow, Environment::Island, Environment::Stadium].into(),
        equal_environment_distribution: true,
        ..RequestRules::default()
    };
    let mut rng = StdRng::seed_from_u64(2024);
    let mut counts: HashMap<String, usize> = HashMap::new();
    let draws = 3000;

    for _ in 0..draws {
        let request = build_request(&rules, &mut rng).unwrap();
        let env = query_of(&request.url)
            .remove("environment")
            .expect("environment parameter");
        assert!(!env.contains(','), "expected a single environment, got {env}");
        *counts.entry(env).or_default() += 1;
    }

    assert_eq!(counts.len(), 3);
    for ordinal in ["0", "3", "6"] {
        let count = counts[ordinal];
        // Expected 1000 each; allow a generous band
        assert!(
            (850..=1150).contains(&count),
            "environment {ordinal} drawn {count} times"
        );
    }
}

#[test]
fn test_fully_populated_rules_round_trip_through_the_query() {
    let rules = RequestRules {
        site: SiteMask::only(Site::Tmuf),
        author: Some("someone".to_string()),
        environments: [Environment::Desert, Environment::Coast].into(),
        name: Some("night run".to_string()),
        vehicles: [Environment::Bay].into(),
        primary_type: Some(PrimaryType::Puzzle),
        tag: Some(Tag::SpeedTech),
        moods: [Mood::Day, Mood::Night].into(),
        difficulties: [Difficulty::Expert].into(),
        routes: [Routes::Single, Routes::Symmetrical].into(),
        lb_type: Some(LbType::Classic),
        in_beta: Some(false),
        in_play_later: Some(true),
        in_featured: Some(true),
        in_supporter: Some(false),
        in_favorite: Some(true),
        in_downloads: Some(false),
        in_replays: Some(true),
        in_envmix: Some(false),
        in_has_record: Some(true),
        in_latest_author: Some(false),
        in_latest_awarded_author: Some(true),
        in_screenshot: Some(false),
        uploaded_before: NaiveDate::from_ymd_opt(2023, 12, 31),
        uploaded_after: NaiveDate::from_ymd_opt(2020, 1, 2),
        author_time_min: Some(Duration::from_secs(20)),
        author_time_max: Some(Duration::from_millis(90_500)),
        survival_mode: true,
        survival_bonus_time: Some(Duration::from_secs(60)),
        free_skip_limit: Some(3),
        gold_skip_limit: Some(1),
        ..RequestRules::default()
    };

    let request = build_request(&rules, &mut StdRng::seed_from_u64(5)).unwrap();
    assert_eq!(request.site, Site::Tmuf);
    assert_eq!(request.url.host_str(), Some("tmuf.exchange"));
    assert_eq!(request.url.path(), RANDOM_TRACK_PATH);

    let query = query_of(&request.url);
    let expected = [
        ("author", "someone"),
        ("environment", "1,4"),
        ("name", "night run"),
        ("vehicle", "5"),
        ("primarytype", "1"),
        ("tag", "8"),
        ("mood", "1,3"),
        ("difficulty", "2"),
        ("routes", "0,2"),
        ("lbtype", "1"),
        ("inbeta", "0"),
        ("inplaylater", "1"),
        ("infeatured", "1"),
        ("insupporter", "0"),
        ("infavorite", "1"),
        ("indownloads", "0"),
        ("inreplays", "1"),
        ("inenvmix", "0"),
        ("inhasrecord", "1"),
        ("inlatestauthor", "0"),
        ("inlatestawardedauthor", "1"),
        ("inscreenshot", "0"),
        ("uploadedbefore", "2023-12-31"),
        ("uploadedafter", "2020-01-02"),
        ("authortimemin", "20000"),
        ("authortimemax", "90500"),
    ];
    for (key, value) in expected {
        assert_eq!(query.get(key).map(String::as_str), Some(value), "{key}");
    }
    assert_eq!(query.len(), expected.len(), "unexpected parameters: {query:?}");

    // Parameter order follows the field table
    let keys: Vec<String> = request.url.query_pairs().map(|(k, _)| k.into_owned()).collect();
    let expected_keys: Vec<&str> = expected.iter().map(|(k, _)| *k).collect();
    assert_eq!(keys, expected_keys);
}

#[test]
fn test_basic_site_omits_non_stadium_environments() {
    for site in [Site::Tmnf, Site::Nations] {
        let rules = RequestRules {
            site: SiteMask::only(site),
            environments: [Environment::Stadium, Environment::Snow].into(),
            primary_type: Some(PrimaryType::Platform),
            ..RequestRules::default()
        };
        let request = build_request(&rules, &mut StdRng::seed_from_u64(9)).unwrap();
        let query = query_of(&request.url);
        assert_eq!(request.site, site);
        assert!(!query.contains_key("environment"), "{query:?}");
        assert!(!query.contains_key("primarytype"), "{query:?}");
    }
}

#[test]
fn test_island_only_goes_to_island_sites() {
    let rules = RequestRules {
        environments: [Environment::Island].into(),
        ..RequestRules::default()
    };
    let mut rng = StdRng::seed_from_u64(77);
    let mut hosts = BTreeSet::new();

    for _ in 0..200 {
        let request = build_request(&rules, &mut rng).unwrap();
        assert!(
            matches!(request.site, Site::Tmuf | Site::Sunrise),
            "unexpected site {:?}",
            request.site
        );
        // Sent raw, not as an encoded list
        assert_eq!(request.url.query(), Some("environment=3"));
        hosts.insert(request.url.host_str().unwrap().to_string());
    }
    assert_eq!(hosts.len(), 2, "both compatible sites should be drawn");
}

#[test]
fn test_empty_rules_produce_a_bare_request() {
    let request = build_request(&RequestRules::default(), &mut StdRng::seed_from_u64(3)).unwrap();
    assert_eq!(request.url.query(), None);
    assert!(request.url.as_str().ends_with(RANDOM_TRACK_PATH));
}
