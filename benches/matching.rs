use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mimic::store::{find_match, write_index, Criteria, FixtureDefinition, FixtureResponse};
use mimic::{FixtureStore, Mimic, MimicConfig, Request};
use std::collections::BTreeMap;
use tempfile::TempDir;

fn definitions(count: usize) -> Vec<FixtureDefinition> {
    (0..count)
        .map(|i| FixtureDefinition {
            method: "GET".to_string(),
            headers: Criteria::from([("accept".to_string(), "application/json".into())]),
            query: Criteria::from([("page".to_string(), i.to_string().as_str().into())]),
            response: FixtureResponse {
                status: 200,
                headers: BTreeMap::new(),
                body_file: None,
            },
            executed_request: None,
        })
        .collect()
}

fn last_page_request(count: usize) -> Request {
    Request::new("GET", "http://api.example.com/items")
        .with_header("Accept", "application/json")
        .with_query("page", (count - 1).to_string())
}

fn bench_find_match(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_match");

    for count in [10, 100, 1_000] {
        let index = definitions(count);
        let request = last_page_request(count);

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| find_match(black_box(&index), black_box(&request)));
        });
    }

    group.finish();
}

fn bench_store_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_load");

    for count in [10, 100, 1_000] {
        let base = TempDir::new().unwrap();
        let mimic = Mimic::new(MimicConfig {
            base_path: base.path().to_path_buf(),
            ..MimicConfig::default()
        })
        .unwrap();
        let store = FixtureStore::new(&mimic);
        let request = last_page_request(count);

        let dir = store.request_store_path(&request).unwrap();
        std::fs::create_dir_all(&dir).unwrap();
        write_index(&dir.join(mimic::store::INDEX_FILE), &definitions(count)).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| store.load(black_box(&request)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_find_match, bench_store_load);
criterion_main!(benches);
