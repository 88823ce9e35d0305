//! Whole-file validation of map files
//!
//! Opening a map file only checks the header. Blocks are looked up lazily,
//! so a damaged index or block shows up as a failed query much later. The
//! validator walks every sub-file up front:
//!
//! - [`ValidationLevel::Standard`] reads the complete index of each
//!   sub-file and checks every block pointer
//! - [`ValidationLevel::Strict`] additionally decodes every non-empty block
//!
//! # Usage
//!
//! ```rust,no_run
//! use mapsforge_reader::validation::{validate_map_file, ValidationLevel};
//! use std::path::Path;
//!
//! let report = validate_map_file(Path::new("berlin.map"), ValidationLevel::Strict)?;
//!
//! if report.is_valid() {
//!     println!("{}", report.stats.summary());
//! } else {
//!     for error in &report.errors {
//!         println!("  - {}", error);
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::block::{decode_block, BlockContext, QueryScratch};
use crate::database::{
    block_origin, load_block, BlockAddress, BlockLoad, MapFile, QueryResult, TileDataSink,
};
use crate::error::{MapError, Result};
use crate::geometry::MapElement;
use crate::header::{SubFileParameter, SIGNATURE_LENGTH_INDEX};
use crate::query::QueryParameters;
use crate::read_buffer::MAXIMUM_BUFFER_SIZE;
use crate::tile::Tile;
use log::debug;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

const SIGNATURE_INDEX: &[u8] = b"+++IndexStart+++";

/// Errors reported per sub-file before the rest are only counted.
const MAX_ERRORS_PER_SUB_FILE: usize = 20;

/// Validation strictness level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationLevel {
    /// Header, sub-file table and every index entry
    Standard,
    /// Standard checks plus a full decode of every block
    Strict,
}

/// Validation report with detailed findings
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    /// Problems that make parts of the file unreadable
    pub errors: Vec<String>,
    /// Oddities that readers tolerate
    pub warnings: Vec<String>,
    /// Informational messages about the file
    pub info: Vec<String>,
    /// Counters gathered while walking the file
    pub stats: MapStats,
}

/// Counters gathered during validation
#[derive(Debug, Clone, Default, Serialize)]
pub struct MapStats {
    /// File size in bytes
    pub file_size: u64,
    /// Format version
    pub version: i32,
    /// Number of sub-files
    pub sub_files: usize,
    /// Index entries checked
    pub blocks: u64,
    /// Blocks without data
    pub empty_blocks: u64,
    /// Blocks flagged as water only
    pub water_blocks: u64,
    /// Blocks decoded (strict level only)
    pub decoded_blocks: u64,
    /// POIs decoded (strict level only)
    pub pois: usize,
    /// Way geometries decoded (strict level only)
    pub ways: usize,
}

impl ValidationReport {
    fn new() -> Self {
        Self::default()
    }

    /// Whether no errors were found.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    fn info(&mut self, msg: impl Into<String>) {
        self.info.push(msg.into());
    }
}

impl MapStats {
    /// Human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "Version: v{}, Sub-files: {}, Blocks: {} ({} empty, {} water), POIs: {}, Ways: {}, Size: {} KB",
            self.version,
            self.sub_files,
            self.blocks,
            self.empty_blocks,
            self.water_blocks,
            self.pois,
            self.ways,
            self.file_size / 1024
        )
    }
}

/// Validate the map file at `path`.
///
/// I/O failures while opening are returned as errors. A header that does
/// not parse yields a report with that single error.
pub fn validate_map_file(path: &Path, level: ValidationLevel) -> Result<ValidationReport> {
    match MapFile::open(path) {
        Ok(file) => Ok(validate_map(&file, level)),
        Err(MapError::Format(msg)) => {
            let mut report = ValidationReport::new();
            report.error(format!("invalid header: {}", msg));
            Ok(report)
        }
        Err(e) => Err(e),
    }
}

/// Validate an already opened map file.
pub fn validate_map(file: &Arc<MapFile>, level: ValidationLevel) -> ValidationReport {
    let mut report = ValidationReport::new();
    let info = file.info();

    report.stats.file_size = info.file_size;
    report.stats.version = info.file_version;
    report.stats.sub_files = file.header().sub_files().len();
    report.info(format!(
        "File size: {} bytes ({} KB)",
        info.file_size,
        info.file_size / 1024
    ));
    report.info(format!(
        "Format version {}, {} POI tags, {} way tags",
        info.file_version,
        info.poi_tags.len(),
        info.way_tags.len()
    ));
    let bbox = &info.bounding_box;
    report.info(format!(
        "Bounding box: {:.6},{:.6} - {:.6},{:.6}",
        bbox.min_latitude(),
        bbox.min_longitude(),
        bbox.max_latitude(),
        bbox.max_longitude()
    ));
    if info.debug_file {
        report.info("Debug signatures present");
    }

    let mut scratch = QueryScratch::new();
    for (index, params) in file.header().sub_files().iter().enumerate() {
        report.info(format!(
            "Sub-file {}: base zoom {}, zoom {}..={}, {}x{} blocks",
            index,
            params.base_zoom_level,
            params.zoom_level_min,
            params.zoom_level_max,
            params.blocks_width,
            params.blocks_height
        ));
        validate_sub_file(file, index, params, level, &mut scratch, &mut report);
    }

    debug!(
        "validation finished: {} errors, {} warnings",
        report.errors.len(),
        report.warnings.len()
    );
    report
}

fn validate_sub_file(
    file: &MapFile,
    index: usize,
    params: &SubFileParameter,
    level: ValidationLevel,
    scratch: &mut QueryScratch,
    report: &mut ValidationReport,
) {
    let file_size = file.info().file_size;
    if params.end_address() > file_size {
        report.error(format!(
            "sub-file {}: ends at {} beyond file size {}",
            index,
            params.end_address(),
            file_size
        ));
        return;
    }
    if !(params.zoom_level_min..=params.zoom_level_max).contains(&params.base_zoom_level) {
        report.warning(format!(
            "sub-file {}: base zoom {} outside zoom range {}..={}",
            index, params.base_zoom_level, params.zoom_level_min, params.zoom_level_max
        ));
    }
    if file.info().debug_file {
        let mut signature = [0u8; SIGNATURE_LENGTH_INDEX as usize];
        let read = file.source().read_at(params.start_address, &mut signature);
        if !matches!(read, Ok(n) if n == signature.len()) || signature != SIGNATURE_INDEX {
            report.error(format!("sub-file {}: invalid index signature", index));
        }
    }

    let blocks = params.number_of_blocks.max(0) as u64;
    let mut errors = 0usize;
    let mut previous = 0u64;
    for block_number in 0..blocks {
        report.stats.blocks += 1;
        let entry = match file.index_entry(index, block_number) {
            Ok(entry) => entry,
            Err(e) => {
                report.error(format!(
                    "sub-file {}: index entry {}: {}",
                    index, block_number, e
                ));
                // the rest of the index is unreadable as well
                return;
            }
        };
        if entry.water {
            report.stats.water_blocks += 1;
        }

        let mut problem = None;
        if entry.offset < 1 || entry.offset > params.sub_file_size {
            problem = Some(format!("pointer {} outside sub-file", entry.offset));
        } else if entry.offset < previous {
            problem = Some(format!(
                "pointer {} before previous pointer {}",
                entry.offset, previous
            ));
        }
        if let Some(problem) = problem {
            errors += 1;
            if errors <= MAX_ERRORS_PER_SUB_FILE {
                report.error(format!(
                    "sub-file {}: block {}: {}",
                    index, block_number, problem
                ));
            }
            continue;
        }
        previous = entry.offset;

        let end = if block_number + 1 == blocks {
            params.sub_file_size
        } else {
            match file.index_entry(index, block_number + 1) {
                Ok(next) => next.offset,
                Err(_) => params.sub_file_size,
            }
        };
        let size = end.saturating_sub(entry.offset);
        if size == 0 {
            report.stats.empty_blocks += 1;
            continue;
        }
        if size > MAXIMUM_BUFFER_SIZE as u64 {
            report.warning(format!(
                "sub-file {}: block {}: {} bytes exceeds the read limit",
                index, block_number, size
            ));
            continue;
        }

        if level == ValidationLevel::Strict {
            if let Err(e) = decode_for_validation(file, index, params, block_number, scratch, report)
            {
                errors += 1;
                if errors <= MAX_ERRORS_PER_SUB_FILE {
                    report.error(format!(
                        "sub-file {}: block {}: {}",
                        index, block_number, e
                    ));
                }
            }
        }
    }

    if errors > MAX_ERRORS_PER_SUB_FILE {
        report.error(format!(
            "sub-file {}: {} further errors not listed",
            index,
            errors - MAX_ERRORS_PER_SUB_FILE
        ));
    }
}

struct Discard;

impl TileDataSink for Discard {
    fn process(&mut self, _element: &MapElement) {}

    fn completed(&mut self, _result: QueryResult) {}
}

/// Decode one block at the sub-file's maximum zoom level, which covers
/// every record the block holds.
fn decode_for_validation(
    file: &MapFile,
    index: usize,
    params: &SubFileParameter,
    block_number: u64,
    scratch: &mut QueryScratch,
    report: &mut ValidationReport,
) -> Result<()> {
    let row = (block_number / params.blocks_width as u64) as i64;
    let col = (block_number % params.blocks_width as u64) as i64;
    let address = BlockAddress {
        sub_file: index,
        row,
        col,
    };
    if let BlockLoad::Skipped = load_block(file, params, address, &mut scratch.buffer)? {
        return Ok(());
    }

    let query = QueryParameters {
        query_zoom_level: params.zoom_level_max,
        from_block_x: col,
        from_block_y: row,
        to_block_x: col,
        to_block_y: row,
        ..Default::default()
    };
    let tile = Tile::new(
        (params.boundary_tile_left + col) as u32,
        (params.boundary_tile_top + row) as u32,
        params.base_zoom_level,
    );
    scratch.projection.set_tile(tile);
    scratch.set_tile_clipping(&query, 0, 0);

    let (tile_latitude, tile_longitude) = block_origin(params, row, col);
    let ctx = BlockContext {
        info: file.info(),
        sub_file: params,
        query: &query,
        language: None,
        string_table: file.string_table_active(),
        tile_latitude,
        tile_longitude,
    };
    let stats = decode_block(&ctx, scratch, &mut Discard)?;
    report.stats.decoded_blocks += 1;
    report.stats.pois += stats.pois;
    report.stats.ways += stats.ways;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_report_validity() {
        let mut report = ValidationReport::new();
        assert!(report.is_valid());
        report.warning("odd");
        assert!(report.is_valid());
        report.error("broken");
        assert!(!report.is_valid());
    }

    #[test]
    fn test_stats_summary() {
        let stats = MapStats {
            file_size: 4096,
            version: 3,
            sub_files: 2,
            blocks: 10,
            empty_blocks: 4,
            water_blocks: 1,
            decoded_blocks: 6,
            pois: 7,
            ways: 8,
        };
        let summary = stats.summary();
        assert!(summary.contains("v3"));
        assert!(summary.contains("Blocks: 10 (4 empty, 1 water)"));
        assert!(summary.contains("4 KB"));
    }

    #[test]
    fn test_bad_header_is_reported_not_returned() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"definitely not a mapsforge file").unwrap();
        file.flush().unwrap();
        let report = validate_map_file(file.path(), ValidationLevel::Standard).unwrap();
        assert!(!report.is_valid());
        assert!(report.errors[0].contains("invalid header"));
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(validate_map_file(Path::new("/nonexistent.map"), ValidationLevel::Strict).is_err());
    }
}
