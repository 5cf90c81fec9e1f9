//! Performance benchmarks for request building

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::hint::black_box;
use std::time::Duration;
use tmx_randomizer::presets::{read_preset, write_preset};
use tmx_randomizer::request::build_request;
use tmx_randomizer::rules::{Environment, Mood, RandomizerRules, RequestRules, Tag};

fn sparse_rules() -> RequestRules {
    RequestRules::default()
}

fn dense_rules() -> RequestRules {
    RequestRules {
        author: Some("someone".to_string()),
        environments: [Environment::Snow, Environment::Island, Environment::Stadium].into(),
        vehicles: [Environment::Island].into(),
        tag: Some(Tag::Tech),
        moods: [Mood::Day, Mood::Night].into(),
        in_beta: Some(false),
        in_featured: Some(true),
        author_time_min: Some(Duration::from_secs(20)),
        author_time_max: Some(Duration::from_secs(90)),
        equal_environment_distribution: true,
        ..RequestRules::default()
    }
}

fn bench_build_request(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_request");

    for (name, rules) in [("sparse", sparse_rules()), ("dense", dense_rules())] {
        group.bench_with_input(BenchmarkId::new("url", name), &rules, |b, rules| {
            let mut rng = StdRng::seed_from_u64(42);
            b.iter(|| build_request(black_box(rules), &mut rng).unwrap());
        });
    }

    group.finish();
}

fn bench_presets(c: &mut Criterion) {
    let rules = RandomizerRules {
        request_rules: dense_rules(),
        ..RandomizerRules::default()
    };
    let text = write_preset(&rules);

    c.bench_function("preset_write", |b| b.iter(|| write_preset(black_box(&rules))));
    c.bench_function("preset_read", |b| b.iter(|| read_preset(black_box(&text))));
}

criterion_group!(benches, bench_build_request, bench_presets);
criterion_main!(benches);
