use anyhow::{Context, Result};
use mapsforge_reader::projection::{latitude_to_tile_y, longitude_to_tile_x};
use mapsforge_reader::{
    CancelHandle, MapElement, MapError, MapFileOptions, QueryResult, QueryStats, Tile, TileDataSink,
};
use rayon::prelude::*;
use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::cli_utils::{format_number, open_map, parse_threads};

struct Discard;

impl TileDataSink for Discard {
    fn process(&mut self, _element: &MapElement) {}

    fn completed(&mut self, _result: QueryResult) {}
}

#[derive(Default, Clone, Copy)]
struct ScanTotals {
    tiles: u64,
    failed_tiles: u64,
    cancelled_tiles: u64,
    blocks: u64,
    failed_blocks: u64,
    pois: u64,
    ways: u64,
}

impl ScanTotals {
    fn from_query(result: Result<QueryStats, MapError>) -> Self {
        match result {
            Ok(stats) => Self {
                tiles: 1,
                failed_tiles: (stats.failed_blocks > 0) as u64,
                cancelled_tiles: 0,
                blocks: stats.blocks,
                failed_blocks: stats.failed_blocks,
                pois: stats.pois as u64,
                ways: stats.ways as u64,
            },
            Err(MapError::Cancelled) => Self {
                tiles: 1,
                cancelled_tiles: 1,
                ..Default::default()
            },
            Err(_) => Self {
                tiles: 1,
                failed_tiles: 1,
                ..Default::default()
            },
        }
    }

    fn merge(self, other: Self) -> Self {
        Self {
            tiles: self.tiles + other.tiles,
            failed_tiles: self.failed_tiles + other.failed_tiles,
            cancelled_tiles: self.cancelled_tiles + other.cancelled_tiles,
            blocks: self.blocks + other.blocks,
            failed_blocks: self.failed_blocks + other.failed_blocks,
            pois: self.pois + other.pois,
            ways: self.ways + other.ways,
        }
    }
}

pub fn cmd_scan(
    map: PathBuf,
    zoom: u8,
    threads: Option<String>,
    json_output: bool,
    index_cache: usize,
) -> Result<()> {
    let num_threads = parse_threads(threads.as_deref())?;
    let options = MapFileOptions {
        index_cache_capacity: index_cache,
        ..Default::default()
    };
    let file = open_map(&map, options)?;

    let bbox = file.info().bounding_box;
    let last = (1i64 << zoom) - 1;
    let x_min = longitude_to_tile_x(bbox.min_longitude(), zoom).clamp(0, last);
    let x_max = longitude_to_tile_x(bbox.max_longitude(), zoom).clamp(0, last);
    let y_min = latitude_to_tile_y(bbox.max_latitude(), zoom).clamp(0, last);
    let y_max = latitude_to_tile_y(bbox.min_latitude(), zoom).clamp(0, last);
    let tiles: Vec<Tile> = (y_min..=y_max)
        .flat_map(|y| (x_min..=x_max).map(move |x| Tile::new(x as u32, y as u32, zoom)))
        .collect();

    // Every worker registers its cancel handle so Ctrl+C reaches running queries
    let shutdown = Arc::new(AtomicBool::new(false));
    let handles: Arc<Mutex<Vec<CancelHandle>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let shutdown = Arc::clone(&shutdown);
        let handles = Arc::clone(&handles);
        ctrlc::set_handler(move || {
            eprintln!("\n[INFO] Shutting down...");
            shutdown.store(true, Ordering::Relaxed);
            if let Ok(handles) = handles.lock() {
                for handle in handles.iter() {
                    handle.cancel();
                }
            }
        })
        .context("Failed to set Ctrl+C handler")?;
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()
        .context("Failed to build thread pool")?;

    let start = Instant::now();
    let totals = pool.install(|| {
        tiles
            .par_iter()
            .map_init(
                || {
                    let db = file.database();
                    if let Ok(mut handles) = handles.lock() {
                        handles.push(db.cancel_handle());
                    }
                    if shutdown.load(Ordering::Relaxed) {
                        db.cancel_handle().cancel();
                    }
                    db
                },
                |db, &tile| ScanTotals::from_query(db.query_tile(tile, &mut Discard)),
            )
            .reduce(ScanTotals::default, ScanTotals::merge)
    });
    let elapsed = start.elapsed();

    if json_output {
        let output = json!({
            "map": map.display().to_string(),
            "zoom": zoom,
            "threads": num_threads,
            "duration_ms": elapsed.as_millis(),
            "tiles": totals.tiles,
            "failed_tiles": totals.failed_tiles,
            "cancelled_tiles": totals.cancelled_tiles,
            "blocks": totals.blocks,
            "failed_blocks": totals.failed_blocks,
            "pois": totals.pois,
            "ways": totals.ways,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        let secs = elapsed.as_secs_f64().max(f64::EPSILON);
        println!(
            "Scanned {} at zoom {} with {} threads",
            map.display(),
            zoom,
            num_threads
        );
        println!(
            "  Tiles:   {} ({} failed, {} cancelled)",
            format_number(totals.tiles),
            totals.failed_tiles,
            totals.cancelled_tiles
        );
        println!(
            "  Blocks:  {} ({} failed)",
            format_number(totals.blocks),
            totals.failed_blocks
        );
        println!("  POIs:    {}", format_number(totals.pois));
        println!("  Ways:    {}", format_number(totals.ways));
        println!(
            "  Time:    {:.2}s ({:.0} tiles/s)",
            secs,
            totals.tiles as f64 / secs
        );
    }

    if totals.failed_tiles > 0 || totals.cancelled_tiles > 0 {
        std::process::exit(1);
    }
    Ok(())
}
