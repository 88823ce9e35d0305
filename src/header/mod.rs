//! Map file header parsing
//!
//! The header is read once when a file is opened. Fields are validated in
//! file order and the first violation aborts the open with a
//! [`MapError::Format`]; no partially parsed header is ever exposed.
//!
//! Layout after the 20-byte magic and the 4-byte remaining-header size:
//!
//! ```text
//! version:i32  file_size:i64  map_date:i64
//! min_lat:i32  min_lon:i32  max_lat:i32  max_lon:i32
//! tile_pixel_size:i16  projection:string
//! optional_flags:u8  [optional fields]
//! poi_tags:i16 + strings  way_tags:i16 + strings
//! sub_files:u8 + (base:u8 min:u8 max:u8 start:i64 size:i64)*
//! ```

mod info;
mod optional;
mod required;
mod sub_file;

pub use info::{BoundingBox, FileInfo, LatLon};
pub use optional::START_ZOOM_LEVEL_MAX;
pub use required::{
    HEADER_SIZE_MAX, HEADER_SIZE_MIN, MAGIC, MAP_DATE_MIN, MERCATOR, SUPPORTED_FILE_VERSION_MAX,
    SUPPORTED_FILE_VERSION_MIN,
};
pub use sub_file::{SubFileParameter, BYTES_PER_INDEX_ENTRY, SIGNATURE_LENGTH_INDEX};

use crate::error::{MapError, Result};
use crate::read_buffer::ReadBuffer;
use crate::source::MapSource;
use log::{debug, warn};
use optional::OptionalFields;

/// Highest base zoom level a sub-file may declare.
pub const BASE_ZOOM_LEVEL_MAX: i8 = 20;

/// Highest zoom level a sub-file may answer for.
pub const ZOOM_LEVEL_MAX: i8 = 22;

/// Parsed and validated header of one map file.
#[derive(Debug, Clone)]
pub struct MapFileHeader {
    info: FileInfo,
    sub_files: Vec<SubFileParameter>,
    zoom_table: Vec<Option<usize>>,
    zoom_level_min: u8,
    zoom_level_max: u8,
}

impl MapFileHeader {
    /// Read and validate the header at the start of `source`.
    ///
    /// `buffer` is used as scratch and holds the header bytes afterwards.
    pub fn read(source: &dyn MapSource, buffer: &mut ReadBuffer) -> Result<Self> {
        let file_size = source.len();
        required::read_magic_and_header(source, buffer)?;
        Self::parse(buffer, file_size).map_err(|e| match e {
            MapError::Decode(msg) => MapError::Format(format!("truncated header: {}", msg)),
            other => other,
        })
    }

    fn parse(buffer: &mut ReadBuffer, file_size: u64) -> Result<Self> {
        let file_version = required::read_file_version(buffer)?;
        let file_size = required::read_file_size(buffer, file_size)?;
        let map_date = required::read_map_date(buffer)?;
        let bounding_box = required::read_bounding_box(buffer)?;
        let tile_pixel_size = required::read_tile_pixel_size(buffer)?;
        let projection_name = required::read_projection_name(buffer)?;
        let optional = OptionalFields::read(buffer)?;
        let poi_tags = required::read_poi_tags(buffer)?;
        let way_tags = required::read_way_tags(buffer)?;

        let sub_files =
            read_sub_file_parameters(buffer, file_size, &bounding_box, optional.debug_file)?;

        let zoom_level_min = sub_files
            .iter()
            .map(|p| p.zoom_level_min)
            .min()
            .unwrap_or(0);
        let zoom_level_max = sub_files
            .iter()
            .map(|p| p.zoom_level_max)
            .max()
            .unwrap_or(0);

        // later sub-files overwrite earlier ones on overlapping ranges
        let mut zoom_table = vec![None; zoom_level_max as usize + 1];
        for (i, params) in sub_files.iter().enumerate() {
            for zoom in params.zoom_level_min..=params.zoom_level_max {
                zoom_table[zoom as usize] = Some(i);
            }
        }

        let info = FileInfo {
            bounding_box,
            file_version,
            file_size,
            map_date,
            projection_name,
            tile_pixel_size,
            poi_tags,
            way_tags,
            zoom_levels: sub_files.iter().map(|p| p.base_zoom_level).collect(),
            start_position: optional.start_position,
            start_zoom_level: optional.start_zoom_level,
            languages_preference: optional.languages_preference,
            comment: optional.comment,
            created_by: optional.created_by,
            debug_file: optional.debug_file,
        };

        debug!(
            "map header: version {}, {} sub-files, zoom {}..={}, {} POI tags, {} way tags",
            info.file_version,
            sub_files.len(),
            zoom_level_min,
            zoom_level_max,
            info.poi_tags.len(),
            info.way_tags.len()
        );

        Ok(Self {
            info,
            sub_files,
            zoom_table,
            zoom_level_min,
            zoom_level_max,
        })
    }

    /// File metadata.
    pub fn info(&self) -> &FileInfo {
        &self.info
    }

    /// All sub-files in file order.
    pub fn sub_files(&self) -> &[SubFileParameter] {
        &self.sub_files
    }

    /// Lowest zoom level any sub-file answers for.
    pub fn zoom_level_min(&self) -> u8 {
        self.zoom_level_min
    }

    /// Highest zoom level any sub-file answers for.
    pub fn zoom_level_max(&self) -> u8 {
        self.zoom_level_max
    }

    /// Clamp a requested zoom level to the range the file covers.
    pub fn query_zoom_level(&self, zoom: u8) -> u8 {
        zoom.clamp(self.zoom_level_min, self.zoom_level_max)
    }

    /// Index into [`sub_files`](Self::sub_files) of the sub-file answering
    /// for `query_zoom`.
    pub fn sub_file_index(&self, query_zoom: u8) -> Option<usize> {
        self.zoom_table.get(query_zoom as usize).copied().flatten()
    }

    /// The sub-file answering for `query_zoom`, if any.
    pub fn sub_file_for(&self, query_zoom: u8) -> Option<&SubFileParameter> {
        self.sub_file_index(query_zoom).map(|i| &self.sub_files[i])
    }
}

fn read_sub_file_parameters(
    buffer: &mut ReadBuffer,
    file_size: u64,
    bounding_box: &BoundingBox,
    debug_file: bool,
) -> Result<Vec<SubFileParameter>> {
    let count = buffer.read_byte()? as i8;
    if count < 1 {
        return Err(MapError::format(format!(
            "invalid number of sub-files: {}",
            count
        )));
    }

    let mut sub_files = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let base_zoom = buffer.read_byte()? as i8;
        if !(0..=BASE_ZOOM_LEVEL_MAX).contains(&base_zoom) {
            return Err(MapError::format(format!(
                "invalid base zoom level: {}",
                base_zoom
            )));
        }
        let zoom_min = buffer.read_byte()? as i8;
        if !(0..=ZOOM_LEVEL_MAX).contains(&zoom_min) {
            return Err(MapError::format(format!(
                "invalid minimum zoom level: {}",
                zoom_min
            )));
        }
        let zoom_max = buffer.read_byte()? as i8;
        if !(0..=ZOOM_LEVEL_MAX).contains(&zoom_max) {
            return Err(MapError::format(format!(
                "invalid maximum zoom level: {}",
                zoom_max
            )));
        }
        if zoom_min > zoom_max {
            return Err(MapError::format(format!(
                "invalid zoom level range: {} {}",
                zoom_min, zoom_max
            )));
        }

        let start_address = buffer.read_long()?;
        if start_address < HEADER_SIZE_MIN as i64 || start_address as u64 >= file_size {
            return Err(MapError::format(format!(
                "invalid start address: {}",
                start_address
            )));
        }
        let sub_file_size = buffer.read_long()?;
        if sub_file_size < 1 {
            return Err(MapError::format(format!(
                "invalid sub-file size: {}",
                sub_file_size
            )));
        }
        if !(zoom_min..=zoom_max).contains(&base_zoom) {
            warn!(
                "base zoom level {} outside sub-file zoom range {}..={}",
                base_zoom, zoom_min, zoom_max
            );
        }

        sub_files.push(SubFileParameter::new(
            base_zoom as u8,
            zoom_min as u8,
            zoom_max as u8,
            start_address as u64,
            sub_file_size as u64,
            bounding_box,
            debug_file,
        ));
    }
    Ok(sub_files)
}
