use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mapsforge_reader::{MapElement, MapFile, MapFileOptions, QueryResult, Tile, TileDataSink, TileDataSource};
use mapsforge_reader::source::MemorySource;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

#[path = "../tests/common/mod.rs"]
mod common;

use common::{berlin, block_tile, grid, BlockWriter, MapBuilder, Poi, SubFileSpec, Text, Way};

const BASE: u8 = 14;
const ROWS: usize = 5;

struct Count(usize);

impl TileDataSink for Count {
    fn process(&mut self, element: &MapElement) {
        self.0 += element.num_points();
    }

    fn completed(&mut self, result: QueryResult) {
        black_box(result);
    }
}

/// A map whose blocks each hold `ways` zigzag roads and a few POIs.
fn build_map(ways: usize) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let (_, _, width, height) = grid(&berlin(), BASE);
    let mut spec = SubFileSpec::new(BASE, 12, 16);
    for r in 0..height {
        for c in 0..width {
            let mut block = BlockWriter::new(ROWS);
            for i in 0..8 {
                let poi = Poi {
                    lat: -rng.random_range(0..13_000),
                    lon: rng.random_range(0..21_000),
                    tags: vec![0],
                    name: Some(format!("poi {}", i)),
                    ..Default::default()
                };
                block = block.poi(0, &poi);
            }
            for i in 0..ways {
                let nodes: Vec<(i32, i32)> = (0..40)
                    .map(|_| (-rng.random_range(0..13_000), rng.random_range(0..21_000)))
                    .collect();
                let way = Way {
                    bitmask: rng.random(),
                    tags: vec![(i % 3) as u32],
                    name: Some(Text::Inline(format!("road {}", i))),
                    double_delta: i % 2 == 0,
                    ..Way::with_nodes(&nodes)
                };
                block = block.way(i * ROWS / ways.max(1), &way);
            }
            spec = spec.block(r, c, block.finish());
        }
    }
    let mut builder = MapBuilder::new(berlin()).sub_file(spec);
    builder.poi_tags = vec!["amenity=cafe".to_string()];
    builder.way_tags = vec![
        "highway=primary".to_string(),
        "building=yes".to_string(),
        "landuse=forest".to_string(),
    ];
    builder.build()
}

fn open(bytes: &[u8], options: MapFileOptions) -> Arc<MapFile> {
    MapFile::from_source(Box::new(MemorySource::new(bytes.to_vec())), options).unwrap()
}

fn bench_single_tile(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_tile");
    group.measurement_time(Duration::from_secs(5));

    for ways in [10, 100, 500] {
        let map = open(&build_map(ways), MapFileOptions::default());
        let mut db = map.database();
        let tile = block_tile(&berlin(), BASE, 0, 0);

        group.throughput(Throughput::Elements(ways as u64 + 8));
        group.bench_with_input(BenchmarkId::new("base_zoom", ways), &tile, |b, &tile| {
            b.iter(|| {
                let mut sink = Count(0);
                db.query(black_box(tile), &mut sink);
                black_box(sink.0)
            });
        });

        let child = Tile::new(tile.x * 4 + 1, tile.y * 4 + 2, 16);
        group.bench_with_input(BenchmarkId::new("bitmask_zoom", ways), &child, |b, &tile| {
            b.iter(|| {
                let mut sink = Count(0);
                db.query(black_box(tile), &mut sink);
                black_box(sink.0)
            });
        });
    }

    group.finish();
}

fn bench_coarse_tile(c: &mut Criterion) {
    let mut group = c.benchmark_group("coarse_tile");
    let map = open(&build_map(100), MapFileOptions::default());
    let first = block_tile(&berlin(), BASE, 0, 0);
    let coarse = Tile::new(first.x >> 2, first.y >> 2, 12);

    group.bench_function("zoom_12", |b| {
        let mut db = map.database();
        b.iter(|| {
            let mut sink = Count(0);
            db.query(black_box(coarse), &mut sink);
            black_box(sink.0)
        });
    });

    group.finish();
}

fn bench_index_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_cache");
    let bytes = build_map(10);
    let (top, left, width, height) = grid(&berlin(), BASE);
    let tiles: Vec<Tile> = (0..height)
        .flat_map(|r| (0..width).map(move |c| Tile::new((left + c) as u32, (top + r) as u32, BASE)))
        .collect();

    let map = open(&bytes, MapFileOptions::default());
    group.throughput(Throughput::Elements(tiles.len() as u64));
    group.bench_function("warm", |b| {
        let mut db = map.database();
        b.iter(|| {
            for &tile in &tiles {
                db.query(tile, &mut Count(0));
            }
        });
    });
    group.bench_function("cold", |b| {
        let mut db = map.database();
        b.iter(|| {
            map.clear_index_cache();
            for &tile in &tiles {
                db.query(tile, &mut Count(0));
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_single_tile, bench_coarse_tile, bench_index_cache);
criterion_main!(benches);
