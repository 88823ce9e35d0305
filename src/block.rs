//! Decoding of one data block into POI and way elements
//!
//! A block is the data of one base tile. It starts with a zoom table of
//! cumulative POI and way counts per zoom level of its sub-file, followed
//! by the offset of the first way, the POI records and the way records.
//! Records are sorted by the lowest zoom level they appear at, so a query
//! reads a prefix of each list.
//!
//! Every decoded element goes through the same pipeline before it reaches
//! the sink: project into tile pixels, clip to the block's share of the
//! tile (ways without a `building` tag only), simplify.

use crate::database::TileDataSink;
use crate::error::{MapError, Result};
use crate::geometry::{is_area, GeometryType, MapElement, TileClipper, TileProjection};
use crate::header::{FileInfo, SubFileParameter};
use crate::language::extract_localized_name;
use crate::projection::TILE_SIZE;
use crate::query::QueryParameters;
use crate::read_buffer::ReadBuffer;
use crate::tag::{Tag, KEY_ELE, KEY_HOUSE_NUMBER, KEY_NAME, KEY_REF};

/// Largest cumulative POI or way count a zoom table may hold.
pub const MAXIMUM_ZOOM_TABLE_OBJECTS: u32 = 65536 * 2;

/// Longest node sequence of a single way coordinate block.
pub const MAXIMUM_WAY_NODES_SEQUENCE_LENGTH: u32 = 8192;

const MAXIMUM_WAY_COORDINATE_BLOCKS: u32 = i16::MAX as u32;

const SIGNATURE_LENGTH_BLOCK: usize = 32;
const SIGNATURE_LENGTH_POI: usize = 32;
const SIGNATURE_LENGTH_WAY: usize = 32;
const SIGNATURE_BLOCK: &str = "###TileStart";
const SIGNATURE_POI: &str = "***POIStart";
const SIGNATURE_WAY: &str = "---WayStart";

const LAYER_BITMASK: u8 = 0xf0;
const LAYER_SHIFT: u8 = 4;
const NUMBER_OF_TAGS_BITMASK: u8 = 0x0f;

const POI_FEATURE_NAME: u8 = 0x80;
const POI_FEATURE_HOUSE_NUMBER: u8 = 0x40;
const POI_FEATURE_ELEVATION: u8 = 0x20;

const WAY_FEATURE_NAME: u8 = 0x80;
const WAY_FEATURE_HOUSE_NUMBER: u8 = 0x40;
const WAY_FEATURE_REF: u8 = 0x20;
const WAY_FEATURE_LABEL_POSITION: u8 = 0x10;
const WAY_FEATURE_DATA_BLOCKS_BYTE: u8 = 0x08;
const WAY_FEATURE_DOUBLE_DELTA_ENCODING: u8 = 0x04;

const PADDING: f32 = 16.0;

/// Per-query scratch space, reused for every block and record.
#[derive(Debug)]
pub(crate) struct QueryScratch {
    pub buffer: ReadBuffer,
    pub element: MapElement,
    pub coords: Vec<i32>,
    pub projection: TileProjection,
    pub clipper: TileClipper,
}

impl QueryScratch {
    pub fn new() -> Self {
        Self {
            buffer: ReadBuffer::new(),
            element: MapElement::default(),
            coords: vec![0; MAXIMUM_WAY_NODES_SEQUENCE_LENGTH as usize * 2],
            projection: TileProjection::default(),
            clipper: TileClipper::new(
                -PADDING,
                -PADDING,
                TILE_SIZE as f32 + PADDING,
                TILE_SIZE as f32 + PADDING,
            ),
        }
    }

    /// Clip to the share of the tile covered by block (`row`, `col`),
    /// both relative to the first block of the query.
    pub fn set_tile_clipping(&mut self, query: &QueryParameters, row: i64, col: i64) {
        let num_rows = query.to_block_y - query.from_block_y;
        let num_cols = query.to_block_x - query.from_block_x;
        let size = TILE_SIZE as i64;

        let mut xmin = -PADDING;
        let mut ymin = -PADDING;
        let mut xmax = size as f32 + PADDING;
        let mut ymax = size as f32 + PADDING;

        if num_rows > 0 {
            let w = size / (num_cols + 1);
            let h = size / (num_rows + 1);
            if col > 0 {
                xmin = (col * w) as f32;
            }
            if col < num_cols {
                xmax = (col * w + w) as f32;
            }
            if row > 0 {
                ymin = (row * h) as f32;
            }
            if row < num_rows {
                ymax = (row * h + h) as f32;
            }
        }
        self.clipper.set_rect(xmin, ymin, xmax, ymax);
    }
}

/// What a query needs to know to decode a block.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BlockContext<'a> {
    pub info: &'a FileInfo,
    pub sub_file: &'a SubFileParameter,
    pub query: &'a QueryParameters,
    pub language: Option<&'a str>,
    pub string_table: bool,
    /// Latitude of the block's tile origin in microdegrees
    pub tile_latitude: i64,
    /// Longitude of the block's tile origin in microdegrees
    pub tile_longitude: i64,
}

/// Elements one block delivered to the sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockStats {
    /// POIs emitted
    pub pois: usize,
    /// Way geometries emitted; a way with several data blocks counts once per block
    pub ways: usize,
}

/// Decode the block loaded in `scratch.buffer`.
pub(crate) fn decode_block(
    ctx: &BlockContext<'_>,
    scratch: &mut QueryScratch,
    sink: &mut dyn TileDataSink,
) -> Result<BlockStats> {
    let mut decoder = BlockDecoder {
        ctx,
        s: scratch,
        sink,
        string_offset: 0,
        stats: BlockStats::default(),
    };
    decoder.run()?;
    Ok(decoder.stats)
}

struct BlockDecoder<'c, 's, 'k> {
    ctx: &'c BlockContext<'c>,
    s: &'s mut QueryScratch,
    sink: &'k mut dyn TileDataSink,
    string_offset: usize,
    stats: BlockStats,
}

impl BlockDecoder<'_, '_, '_> {
    fn run(&mut self) -> Result<()> {
        if self.ctx.info.debug_file {
            self.check_signature(SIGNATURE_BLOCK, SIGNATURE_LENGTH_BLOCK)?;
        }

        let (pois, ways) = self.read_zoom_table()?;

        let buffer = &mut self.s.buffer;
        let relative = buffer.read_unsigned_varint()? as usize;
        let first_way_offset = relative + buffer.position();
        if first_way_offset > buffer.len() {
            return Err(MapError::decode(format!(
                "invalid first way offset: {}",
                first_way_offset
            )));
        }

        self.process_pois(pois)?;

        let buffer = &mut self.s.buffer;
        if buffer.position() > first_way_offset {
            return Err(MapError::decode(format!(
                "invalid buffer position after POIs: {} > {}",
                buffer.position(),
                first_way_offset
            )));
        }
        buffer.set_position(first_way_offset)?;

        self.process_ways(ways)
    }

    fn check_signature(&mut self, expected: &str, len: usize) -> Result<()> {
        let signature = self.s.buffer.read_utf8_string_of_len(len)?;
        if !signature.starts_with(expected) {
            return Err(MapError::decode(format!(
                "invalid signature, expected {}: {:?}",
                expected,
                signature.trim_end()
            )));
        }
        Ok(())
    }

    /// Cumulative (POIs, ways) at the query zoom level.
    fn read_zoom_table(&mut self) -> Result<(u32, u32)> {
        let sub_file = self.ctx.sub_file;
        let rows = sub_file.zoom_table_rows();
        let wanted = self
            .ctx
            .query
            .query_zoom_level
            .saturating_sub(sub_file.zoom_level_min) as usize;

        let mut pois = 0u32;
        let mut ways = 0u32;
        let mut at_query = (0, 0);
        for row in 0..rows {
            pois = pois.saturating_add(self.s.buffer.read_unsigned_varint()?);
            ways = ways.saturating_add(self.s.buffer.read_unsigned_varint()?);
            if pois > MAXIMUM_ZOOM_TABLE_OBJECTS {
                return Err(MapError::decode(format!(
                    "invalid cumulated number of POIs in row {}: {}",
                    row, pois
                )));
            }
            if ways > MAXIMUM_ZOOM_TABLE_OBJECTS {
                return Err(MapError::decode(format!(
                    "invalid cumulated number of ways in row {}: {}",
                    row, ways
                )));
            }
            if row == wanted {
                at_query = (pois, ways);
            }
        }
        Ok(at_query)
    }

    fn localized(&self, name: &str) -> String {
        extract_localized_name(name, self.ctx.language).to_string()
    }

    fn process_pois(&mut self, count: u32) -> Result<()> {
        let ctx = self.ctx;
        let debug = ctx.info.debug_file;
        let dictionary = &ctx.info.poi_tags;

        for _ in 0..count {
            if debug {
                self.check_signature(SIGNATURE_POI, SIGNATURE_LENGTH_POI)?;
            }
            let s = &mut *self.s;
            let latitude = self.ctx.tile_latitude + s.buffer.read_signed_varint()? as i64;
            let longitude = self.ctx.tile_longitude + s.buffer.read_signed_varint()? as i64;

            let special = s.buffer.read_byte()?;
            let layer = (special & LAYER_BITMASK) >> LAYER_SHIFT;
            let number_of_tags = special & NUMBER_OF_TAGS_BITMASK;

            let e = &mut s.element;
            e.tags.clear();
            e.label_position = None;
            if number_of_tags != 0 {
                s.buffer.read_tags(&mut e.tags, dictionary, number_of_tags)?;
            }

            let feature = s.buffer.read_byte()?;
            if feature & POI_FEATURE_NAME != 0 {
                let name = s.buffer.read_utf8_string()?;
                let name = extract_localized_name(&name, self.ctx.language);
                e.tags.add(Tag::new(KEY_NAME, name));
            }
            if feature & POI_FEATURE_HOUSE_NUMBER != 0 {
                let number = s.buffer.read_utf8_string()?;
                e.tags.add(Tag::new(KEY_HOUSE_NUMBER, number));
            }
            if feature & POI_FEATURE_ELEVATION != 0 {
                let elevation = s.buffer.read_signed_varint()?;
                e.tags.add(Tag::new(KEY_ELE, elevation.to_string()));
            }

            s.projection.project_point(latitude, longitude, e)?;
            e.set_layer(layer);
            self.sink.process(e);
            self.stats.pois += 1;
        }
        Ok(())
    }

    fn process_ways(&mut self, count: u32) -> Result<()> {
        let debug = self.ctx.info.debug_file;
        let query = self.ctx.query;

        if self.ctx.string_table {
            let size = self.s.buffer.read_unsigned_varint()? as usize;
            self.string_offset = self.s.buffer.position();
            self.s.buffer.skip_bytes(size)?;
        }

        let mut remaining = count as usize;
        while remaining > 0 {
            self.s.element.tags.clear();
            self.s.element.label_position = None;

            if debug {
                self.check_signature(SIGNATURE_WAY, SIGNATURE_LENGTH_WAY)?;
                let size = self.s.buffer.read_unsigned_varint()? as usize;
                let bitmask = self.s.buffer.read_short()? as u16;
                if query.use_tile_bitmask && bitmask & query.query_tile_bitmask == 0 {
                    let rest = size.checked_sub(2).ok_or_else(|| {
                        MapError::decode(format!("invalid way data size: {}", size))
                    })?;
                    self.s.buffer.skip_bytes(rest)?;
                    remaining -= 1;
                    continue;
                }
            } else if query.use_tile_bitmask {
                let skip = self
                    .s
                    .buffer
                    .skip_ways(query.query_tile_bitmask, remaining)?;
                remaining = skip.remaining;
                if remaining == 0 {
                    break;
                }
                if self.ctx.string_table {
                    if let Some(position) = skip.last_tag_position {
                        self.inherit_tags(position)?;
                    }
                }
            } else {
                self.s.buffer.read_unsigned_varint()?;
                // way tile bitmask
                self.s.buffer.skip_bytes(2)?;
            }

            self.process_way()?;
            remaining -= 1;
        }
        Ok(())
    }

    /// Load the tags of the skipped way whose special byte sits at `position`.
    fn inherit_tags(&mut self, position: usize) -> Result<()> {
        let s = &mut *self.s;
        let resume = s.buffer.position();
        s.buffer.set_position(position)?;
        let number_of_tags = s.buffer.read_byte()? & NUMBER_OF_TAGS_BITMASK;
        s.buffer
            .read_tags(&mut s.element.tags, &self.ctx.info.way_tags, number_of_tags)?;
        s.buffer.set_position(resume)
    }

    fn read_text(&mut self) -> Result<String> {
        if self.ctx.string_table {
            let offset = self.s.buffer.read_unsigned_varint()? as usize;
            self.s.buffer.read_utf8_string_at(self.string_offset + offset)
        } else {
            self.s.buffer.read_utf8_string()
        }
    }

    fn process_way(&mut self) -> Result<()> {
        let special = self.s.buffer.read_byte()?;
        let layer = (special & LAYER_BITMASK) >> LAYER_SHIFT;
        let number_of_tags = special & NUMBER_OF_TAGS_BITMASK;
        if number_of_tags != 0 {
            let s = &mut *self.s;
            s.buffer
                .read_tags(&mut s.element.tags, &self.ctx.info.way_tags, number_of_tags)?;
        }

        let feature = self.s.buffer.read_byte()?;
        let double_delta = feature & WAY_FEATURE_DOUBLE_DELTA_ENCODING != 0;

        if feature & WAY_FEATURE_NAME != 0 {
            let name = self.read_text()?;
            let name = self.localized(&name);
            self.s.element.tags.add(Tag::new(KEY_NAME, name));
        }
        if feature & WAY_FEATURE_HOUSE_NUMBER != 0 {
            let number = self.read_text()?;
            self.s.element.tags.add(Tag::new(KEY_HOUSE_NUMBER, number));
        }
        if feature & WAY_FEATURE_REF != 0 {
            let reference = self.read_text()?;
            self.s.element.tags.add(Tag::new(KEY_REF, reference));
        }
        if feature & WAY_FEATURE_LABEL_POSITION != 0 {
            let s = &mut *self.s;
            let lat = self.ctx.tile_latitude + s.buffer.read_signed_varint()? as i64;
            let lon = self.ctx.tile_longitude + s.buffer.read_signed_varint()? as i64;
            s.element.label_position = Some((
                s.projection.project_lon(lon as f64),
                s.projection.project_lat(lat as f64),
            ));
        }

        let data_blocks = if feature & WAY_FEATURE_DATA_BLOCKS_BYTE != 0 {
            let n = self.s.buffer.read_unsigned_varint()?;
            if n < 1 {
                return Err(MapError::decode(format!(
                    "invalid number of way data blocks: {}",
                    n
                )));
            }
            n
        } else {
            1
        };

        let is_line = !is_area(&self.s.element.tags);
        for _ in 0..data_blocks {
            self.s.element.clear();
            self.process_way_data_block(double_delta, is_line)?;

            let s = &mut *self.s;
            let e = &mut s.element;
            if e.is_poly() && e.index()[0] < 6 {
                continue;
            }
            s.projection.project(&mut e.geometry);
            if !e.tags.contains_key("building") && !s.clipper.clip(&mut e.geometry)? {
                continue;
            }
            e.simplify(1.0, true);
            e.set_layer(layer);
            self.sink.process(e);
            self.stats.ways += 1;
        }
        Ok(())
    }

    fn process_way_data_block(&mut self, double_delta: bool, is_line: bool) -> Result<()> {
        let num_blocks = self.s.buffer.read_unsigned_varint()?;
        if !(1..=MAXIMUM_WAY_COORDINATE_BLOCKS).contains(&num_blocks) {
            return Err(MapError::decode(format!(
                "invalid number of way coordinate blocks: {}",
                num_blocks
            )));
        }
        let num_blocks = num_blocks as usize;
        let geom = &mut self.s.element.geometry;
        geom.ensure_index_size(num_blocks);
        geom.index[num_blocks] = -1;

        for block in 0..num_blocks {
            let nodes = self.s.buffer.read_unsigned_varint()?;
            if !(2..=MAXIMUM_WAY_NODES_SEQUENCE_LENGTH).contains(&nodes) {
                return Err(MapError::decode(format!(
                    "invalid number of way nodes: {}",
                    nodes
                )));
            }
            let count = self.decode_way_nodes(double_delta, nodes as usize * 2, is_line)?;
            self.s.element.geometry.index[block] = count as i32;
        }
        Ok(())
    }

    /// Append one node sequence as raw `(lon, lat)` microdegrees and
    /// return the number of floats written.
    fn decode_way_nodes(&mut self, double_delta: bool, length: usize, is_line: bool) -> Result<usize> {
        let s = &mut *self.s;
        let coords = &mut s.coords[..length];
        s.buffer.read_signed_varints(coords)?;

        let geom = &mut s.element.geometry;
        geom.ensure_point_size((geom.point_pos + length) >> 1);
        let mut out = geom.point_pos;

        let mut lat = self.ctx.tile_latitude + coords[0] as i64;
        let mut lon = self.ctx.tile_longitude + coords[1] as i64;
        let (first_lat, first_lon) = (lat, lon);
        geom.points[out] = lon as f32;
        geom.points[out + 1] = lat as f32;
        out += 2;
        let mut count = 2;

        let mut delta_lat = 0i64;
        let mut delta_lon = 0i64;
        let mut pos = 2;
        while pos < length {
            if double_delta {
                delta_lat += coords[pos] as i64;
                delta_lon += coords[pos + 1] as i64;
            } else {
                delta_lat = coords[pos] as i64;
                delta_lon = coords[pos + 1] as i64;
            }
            lat += delta_lat;
            lon += delta_lon;

            let keep = if pos == length - 2 {
                // the closing node of a ring is implied
                let line = is_line || lon != first_lon || lat != first_lat;
                if geom.kind() == GeometryType::None {
                    geom.set_kind(if line {
                        GeometryType::Line
                    } else {
                        GeometryType::Poly
                    });
                }
                line
            } else {
                true
            };
            if keep {
                geom.points[out] = lon as f32;
                geom.points[out + 1] = lat as f32;
                out += 2;
                count += 2;
            }
            pos += 2;
        }

        geom.point_pos = out;
        Ok(count)
    }
}
