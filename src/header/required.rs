//! Fixed-position header fields every map file carries

use super::info::BoundingBox;
use crate::error::{MapError, Result};
use crate::read_buffer::ReadBuffer;
use crate::source::MapSource;
use crate::tag::Tag;

/// Signature at offset 0 of every map file.
pub const MAGIC: &[u8] = b"mapsforge binary OSM";

/// Smallest accepted size of the header after the size field.
pub const HEADER_SIZE_MIN: i32 = 70;

/// Largest accepted size of the header after the size field.
pub const HEADER_SIZE_MAX: i32 = 1_000_000;

/// Oldest supported format version.
pub const SUPPORTED_FILE_VERSION_MIN: i32 = 3;

/// Newest supported format version.
pub const SUPPORTED_FILE_VERSION_MAX: i32 = 4;

/// Map dates before this (early 2008, in ms) are rejected.
pub const MAP_DATE_MIN: i64 = 1_200_000_000_000;

/// The only supported projection.
pub const MERCATOR: &str = "Mercator";

pub(crate) const LATITUDE_MAX_E6: i32 = 90_000_000;
pub(crate) const LATITUDE_MIN_E6: i32 = -90_000_000;
pub(crate) const LONGITUDE_MAX_E6: i32 = 180_000_000;
pub(crate) const LONGITUDE_MIN_E6: i32 = -180_000_000;

/// Check the magic bytes and load the rest of the header into `buffer`.
///
/// On return the cursor sits on the file version, the first field after
/// the remaining-header-size prefix.
pub(crate) fn read_magic_and_header(source: &dyn MapSource, buffer: &mut ReadBuffer) -> Result<()> {
    let prefix_len = MAGIC.len() + 4;
    if source.len() < prefix_len as u64 {
        return Err(MapError::format(format!(
            "file too small for a map header: {} bytes",
            source.len()
        )));
    }
    buffer.read_from_source(source, 0, prefix_len)?;
    if &buffer.bytes()[..MAGIC.len()] != MAGIC {
        return Err(MapError::format("invalid magic byte"));
    }
    buffer.skip_bytes(MAGIC.len())?;

    let remaining = buffer.read_int()?;
    if !(HEADER_SIZE_MIN..=HEADER_SIZE_MAX).contains(&remaining) {
        return Err(MapError::format(format!(
            "invalid remaining header size: {}",
            remaining
        )));
    }
    let available = source.len() - prefix_len as u64;
    if remaining as u64 > available {
        return Err(MapError::format(format!(
            "reading header data has failed: {}",
            remaining
        )));
    }
    buffer.read_from_source(source, prefix_len as u64, remaining as usize)
}

pub(crate) fn read_file_version(buffer: &mut ReadBuffer) -> Result<i32> {
    let version = buffer.read_int()?;
    if !(SUPPORTED_FILE_VERSION_MIN..=SUPPORTED_FILE_VERSION_MAX).contains(&version) {
        return Err(MapError::format(format!(
            "unsupported file version: {}",
            version
        )));
    }
    Ok(version)
}

pub(crate) fn read_file_size(buffer: &mut ReadBuffer, actual: u64) -> Result<u64> {
    let declared = buffer.read_long()?;
    if declared < 0 || declared as u64 != actual {
        return Err(MapError::format(format!("invalid file size: {}", declared)));
    }
    Ok(actual)
}

pub(crate) fn read_map_date(buffer: &mut ReadBuffer) -> Result<i64> {
    let date = buffer.read_long()?;
    if date < MAP_DATE_MIN {
        return Err(MapError::format(format!("invalid map date: {}", date)));
    }
    Ok(date)
}

fn check_range(value: i32, min: i32, max: i32, what: &str) -> Result<i32> {
    if value < min || value > max {
        return Err(MapError::format(format!("invalid {}: {}", what, value)));
    }
    Ok(value)
}

pub(crate) fn read_bounding_box(buffer: &mut ReadBuffer) -> Result<BoundingBox> {
    let min_lat = check_range(
        buffer.read_int()?,
        LATITUDE_MIN_E6,
        LATITUDE_MAX_E6,
        "minimum latitude",
    )?;
    let min_lon = check_range(
        buffer.read_int()?,
        LONGITUDE_MIN_E6,
        LONGITUDE_MAX_E6,
        "minimum longitude",
    )?;
    let max_lat = check_range(
        buffer.read_int()?,
        LATITUDE_MIN_E6,
        LATITUDE_MAX_E6,
        "maximum latitude",
    )?;
    let max_lon = check_range(
        buffer.read_int()?,
        LONGITUDE_MIN_E6,
        LONGITUDE_MAX_E6,
        "maximum longitude",
    )?;

    if min_lat > max_lat {
        return Err(MapError::format(format!(
            "invalid latitude range: {} {}",
            min_lat, max_lat
        )));
    }
    if min_lon > max_lon {
        return Err(MapError::format(format!(
            "invalid longitude range: {} {}",
            min_lon, max_lon
        )));
    }

    Ok(BoundingBox {
        min_latitude_e6: min_lat,
        min_longitude_e6: min_lon,
        max_latitude_e6: max_lat,
        max_longitude_e6: max_lon,
    })
}

pub(crate) fn read_tile_pixel_size(buffer: &mut ReadBuffer) -> Result<i16> {
    buffer.read_short()
}

pub(crate) fn read_projection_name(buffer: &mut ReadBuffer) -> Result<String> {
    let name = buffer.read_utf8_string()?;
    if name != MERCATOR {
        return Err(MapError::format(format!("unsupported projection: {}", name)));
    }
    Ok(name)
}

pub(crate) fn read_poi_tags(buffer: &mut ReadBuffer) -> Result<Vec<Tag>> {
    read_tag_dictionary(buffer, "POI", true)
}

pub(crate) fn read_way_tags(buffer: &mut ReadBuffer) -> Result<Vec<Tag>> {
    read_tag_dictionary(buffer, "way", false)
}

fn read_tag_dictionary(buffer: &mut ReadBuffer, kind: &str, allow_empty: bool) -> Result<Vec<Tag>> {
    let count = buffer.read_short()?;
    if count < 0 {
        return Err(MapError::format(format!(
            "invalid number of {} tags: {}",
            kind, count
        )));
    }
    let mut tags = Vec::with_capacity(count as usize);
    for id in 0..count {
        let entry = buffer.read_utf8_string()?;
        if entry.is_empty() && !allow_empty {
            return Err(MapError::format(format!(
                "{} tag must not be null: {}",
                kind, id
            )));
        }
        tags.push(Tag::parse(&entry));
    }
    Ok(tags)
}
