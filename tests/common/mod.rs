//! Synthetic map file writer shared by the integration tests.
//!
//! Produces byte-exact mapsforge files: header, sub-file table, block
//! index and hand-assembled blocks.

#![allow(dead_code)]

use mapsforge_reader::header::MAGIC;
use mapsforge_reader::projection::{latitude_to_tile_y, longitude_to_tile_x};
use mapsforge_reader::{BoundingBox, GeometryType, MapElement, QueryResult, Tag, TileDataSink};
use mapsforge_reader::Tile;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use tempfile::NamedTempFile;

pub const WATER_BIT: u64 = 0x80_0000_0000;

/// Offset of the declared file size inside the header.
pub const FILE_SIZE_OFFSET: usize = 20 + 4 + 4;

pub fn unsigned(mut v: u32, out: &mut Vec<u8>) {
    while v > 0x7f {
        out.push((v & 0x7f) as u8 | 0x80);
        v >>= 7;
    }
    out.push(v as u8);
}

pub fn signed(v: i32, out: &mut Vec<u8>) {
    let negative = v < 0;
    let mut mag = v.unsigned_abs() as u64;
    while mag > 0x3f {
        out.push((mag & 0x7f) as u8 | 0x80);
        mag >>= 7;
    }
    out.push(mag as u8 | if negative { 0x40 } else { 0 });
}

pub fn string(s: &str, out: &mut Vec<u8>) {
    unsigned(s.len() as u32, out);
    out.extend_from_slice(s.as_bytes());
}

/// A debug signature padded with spaces to 32 bytes.
pub fn signature(prefix: &str) -> Vec<u8> {
    let mut out = prefix.as_bytes().to_vec();
    out.resize(32, b' ');
    out
}

/// A bounding box around central Berlin.
pub fn berlin() -> BoundingBox {
    BoundingBox {
        min_latitude_e6: 52_500_000,
        min_longitude_e6: 13_380_000,
        max_latitude_e6: 52_530_000,
        max_longitude_e6: 13_420_000,
    }
}

/// Top row, left column, width and height of the block grid.
pub fn grid(bbox: &BoundingBox, base_zoom: u8) -> (i64, i64, i64, i64) {
    let top = latitude_to_tile_y(bbox.max_latitude(), base_zoom);
    let bottom = latitude_to_tile_y(bbox.min_latitude(), base_zoom);
    let left = longitude_to_tile_x(bbox.min_longitude(), base_zoom);
    let right = longitude_to_tile_x(bbox.max_longitude(), base_zoom);
    (top, left, right - left + 1, bottom - top + 1)
}

/// The base tile of block (`row`, `col`).
pub fn block_tile(bbox: &BoundingBox, base_zoom: u8, row: i64, col: i64) -> Tile {
    let (top, left, _, _) = grid(bbox, base_zoom);
    Tile::new((left + col) as u32, (top + row) as u32, base_zoom)
}

#[derive(Debug, Clone, Default)]
pub struct Poi {
    /// Latitude offset from the block origin, microdegrees
    pub lat: i32,
    /// Longitude offset from the block origin, microdegrees
    pub lon: i32,
    pub layer: u8,
    pub tags: Vec<u32>,
    pub name: Option<String>,
    pub house_number: Option<String>,
    pub elevation: Option<i32>,
}

impl Poi {
    pub fn encode(&self, debug: bool) -> Vec<u8> {
        let mut out = Vec::new();
        if debug {
            out.extend(signature("***POIStart1"));
        }
        signed(self.lat, &mut out);
        signed(self.lon, &mut out);
        out.push((self.layer << 4) | self.tags.len() as u8);
        for &id in &self.tags {
            unsigned(id, &mut out);
        }
        let mut feature = 0u8;
        if self.name.is_some() {
            feature |= 0x80;
        }
        if self.house_number.is_some() {
            feature |= 0x40;
        }
        if self.elevation.is_some() {
            feature |= 0x20;
        }
        out.push(feature);
        if let Some(name) = &self.name {
            string(name, &mut out);
        }
        if let Some(number) = &self.house_number {
            string(number, &mut out);
        }
        if let Some(ele) = self.elevation {
            signed(ele, &mut out);
        }
        out
    }
}

/// Text stored inline or as an offset into the block's string table.
#[derive(Debug, Clone)]
pub enum Text {
    Inline(String),
    Offset(u32),
}

impl Text {
    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Text::Inline(s) => string(s, out),
            Text::Offset(o) => unsigned(*o, out),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Way {
    pub bitmask: u16,
    pub layer: u8,
    pub tags: Vec<u32>,
    pub name: Option<Text>,
    pub house_number: Option<Text>,
    pub reference: Option<Text>,
    /// Label offset from the block origin
    pub label: Option<(i32, i32)>,
    pub double_delta: bool,
    /// Data blocks, each a list of rings of `(lat, lon)` offsets from the
    /// block origin
    pub data_blocks: Vec<Vec<Vec<(i32, i32)>>>,
}

impl Default for Way {
    fn default() -> Self {
        Self {
            bitmask: 0xffff,
            layer: 5,
            tags: Vec::new(),
            name: None,
            house_number: None,
            reference: None,
            label: None,
            double_delta: false,
            data_blocks: Vec::new(),
        }
    }
}

impl Way {
    /// A way with one data block holding one ring.
    pub fn with_nodes(nodes: &[(i32, i32)]) -> Self {
        Self {
            data_blocks: vec![vec![nodes.to_vec()]],
            ..Default::default()
        }
    }

    fn encode_ring(&self, ring: &[(i32, i32)], out: &mut Vec<u8>) {
        unsigned(ring.len() as u32, out);
        let (mut prev_lat, mut prev_lon) = ring[0];
        signed(prev_lat, out);
        signed(prev_lon, out);
        let (mut prev_dlat, mut prev_dlon) = (0, 0);
        for &(lat, lon) in &ring[1..] {
            let (dlat, dlon) = (lat - prev_lat, lon - prev_lon);
            if self.double_delta {
                signed(dlat - prev_dlat, out);
                signed(dlon - prev_dlon, out);
            } else {
                signed(dlat, out);
                signed(dlon, out);
            }
            prev_dlat = dlat;
            prev_dlon = dlon;
            prev_lat = lat;
            prev_lon = lon;
        }
    }

    pub fn encode(&self, debug: bool) -> Vec<u8> {
        let mut body = Vec::new();
        body.push((self.layer << 4) | self.tags.len() as u8);
        for &id in &self.tags {
            unsigned(id, &mut body);
        }
        let mut feature = 0u8;
        if self.name.is_some() {
            feature |= 0x80;
        }
        if self.house_number.is_some() {
            feature |= 0x40;
        }
        if self.reference.is_some() {
            feature |= 0x20;
        }
        if self.label.is_some() {
            feature |= 0x10;
        }
        if self.data_blocks.len() > 1 {
            feature |= 0x08;
        }
        if self.double_delta {
            feature |= 0x04;
        }
        body.push(feature);
        for text in [&self.name, &self.house_number, &self.reference]
            .into_iter()
            .flatten()
        {
            text.encode(&mut body);
        }
        if let Some((lat, lon)) = self.label {
            signed(lat, &mut body);
            signed(lon, &mut body);
        }
        if self.data_blocks.len() > 1 {
            unsigned(self.data_blocks.len() as u32, &mut body);
        }
        for block in &self.data_blocks {
            unsigned(block.len() as u32, &mut body);
            for ring in block {
                self.encode_ring(ring, &mut body);
            }
        }

        let mut out = Vec::new();
        if debug {
            out.extend(signature("---WayStart1"));
        }
        unsigned(body.len() as u32 + 2, &mut out);
        out.extend_from_slice(&self.bitmask.to_be_bytes());
        out.extend(body);
        out
    }
}

/// Assembles one block: zoom table, POIs, ways.
#[derive(Debug, Clone)]
pub struct BlockWriter {
    poi_counts: Vec<u32>,
    way_counts: Vec<u32>,
    pois: Vec<u8>,
    ways: Vec<u8>,
    debug: bool,
    string_table: Option<Vec<u8>>,
}

impl BlockWriter {
    /// A block for a sub-file with `zoom_rows` zoom levels.
    pub fn new(zoom_rows: usize) -> Self {
        Self {
            poi_counts: vec![0; zoom_rows],
            way_counts: vec![0; zoom_rows],
            pois: Vec::new(),
            ways: Vec::new(),
            debug: false,
            string_table: None,
        }
    }

    pub fn debug(mut self) -> Self {
        self.debug = true;
        self
    }

    /// Add a POI first visible at zoom row `row`. Rows must not decrease.
    pub fn poi(mut self, row: usize, poi: &Poi) -> Self {
        self.poi_counts[row] += 1;
        self.pois.extend(poi.encode(self.debug));
        self
    }

    /// Add a way first visible at zoom row `row`. Rows must not decrease.
    pub fn way(mut self, row: usize, way: &Way) -> Self {
        self.way_counts[row] += 1;
        self.ways.extend(way.encode(self.debug));
        self
    }

    /// Strings for string-table mode, each varint length-prefixed.
    /// Returns the offset of every string.
    pub fn string_table(&mut self, strings: &[&str]) -> Vec<u32> {
        let mut table = Vec::new();
        let mut offsets = Vec::new();
        for s in strings {
            offsets.push(table.len() as u32);
            string(s, &mut table);
        }
        self.string_table = Some(table);
        offsets
    }

    pub fn finish(&self) -> Vec<u8> {
        let mut out = Vec::new();
        if self.debug {
            out.extend(signature("###TileStart1,1"));
        }
        for (pois, ways) in self.poi_counts.iter().zip(&self.way_counts) {
            unsigned(*pois, &mut out);
            unsigned(*ways, &mut out);
        }
        unsigned(self.pois.len() as u32, &mut out);
        out.extend_from_slice(&self.pois);
        if let Some(table) = &self.string_table {
            unsigned(table.len() as u32, &mut out);
            out.extend_from_slice(table);
        }
        out.extend_from_slice(&self.ways);
        out
    }
}

#[derive(Debug, Clone)]
pub struct SubFileSpec {
    pub base_zoom: u8,
    pub zoom_min: u8,
    pub zoom_max: u8,
    /// Block bytes by (row, col) relative to the grid origin
    pub blocks: BTreeMap<(i64, i64), Vec<u8>>,
    pub water: BTreeSet<(i64, i64)>,
}

impl SubFileSpec {
    pub fn new(base_zoom: u8, zoom_min: u8, zoom_max: u8) -> Self {
        Self {
            base_zoom,
            zoom_min,
            zoom_max,
            blocks: BTreeMap::new(),
            water: BTreeSet::new(),
        }
    }

    pub fn zoom_rows(&self) -> usize {
        (self.zoom_max - self.zoom_min) as usize + 1
    }

    pub fn block(mut self, row: i64, col: i64, bytes: Vec<u8>) -> Self {
        self.blocks.insert((row, col), bytes);
        self
    }
}

#[derive(Debug, Clone)]
pub struct MapBuilder {
    pub version: i32,
    pub bbox: BoundingBox,
    pub map_date: i64,
    pub tile_pixel_size: i16,
    pub projection: String,
    pub debug: bool,
    pub start_position: Option<(i32, i32)>,
    pub start_zoom: Option<u8>,
    pub languages: Option<String>,
    pub comment: Option<String>,
    pub created_by: Option<String>,
    pub poi_tags: Vec<String>,
    pub way_tags: Vec<String>,
    pub sub_files: Vec<SubFileSpec>,
}

impl MapBuilder {
    pub fn new(bbox: BoundingBox) -> Self {
        Self {
            version: 3,
            bbox,
            map_date: 1_600_000_000_000,
            tile_pixel_size: 256,
            projection: "Mercator".to_string(),
            debug: false,
            start_position: None,
            start_zoom: None,
            languages: None,
            comment: None,
            created_by: None,
            poi_tags: Vec::new(),
            way_tags: Vec::new(),
            sub_files: Vec::new(),
        }
    }

    pub fn sub_file(mut self, spec: SubFileSpec) -> Self {
        self.sub_files.push(spec);
        self
    }

    fn sub_file_bytes(&self, spec: &SubFileSpec) -> Vec<u8> {
        let (_, _, width, height) = grid(&self.bbox, spec.base_zoom);
        let blocks = (width * height).max(0);
        let signature_len = if self.debug { 16 } else { 0 };
        let index_len = signature_len + blocks as usize * 5;

        let mut index = Vec::with_capacity(index_len);
        if self.debug {
            index.extend_from_slice(b"+++IndexStart+++");
        }
        let mut data = Vec::new();
        for block in 0..blocks {
            let key = (block / width, block % width);
            let mut raw = (index_len + data.len()) as u64;
            if spec.water.contains(&key) {
                raw |= WATER_BIT;
            }
            index.extend_from_slice(&raw.to_be_bytes()[3..]);
            if let Some(bytes) = spec.blocks.get(&key) {
                data.extend_from_slice(bytes);
            }
        }
        index.extend(data);
        index
    }

    fn header(&self, table: &[(u64, u64)], file_size: u64) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&self.version.to_be_bytes());
        body.extend_from_slice(&(file_size as i64).to_be_bytes());
        body.extend_from_slice(&self.map_date.to_be_bytes());
        body.extend_from_slice(&self.bbox.min_latitude_e6.to_be_bytes());
        body.extend_from_slice(&self.bbox.min_longitude_e6.to_be_bytes());
        body.extend_from_slice(&self.bbox.max_latitude_e6.to_be_bytes());
        body.extend_from_slice(&self.bbox.max_longitude_e6.to_be_bytes());
        body.extend_from_slice(&self.tile_pixel_size.to_be_bytes());
        string(&self.projection, &mut body);

        let mut flags = 0u8;
        if self.debug {
            flags |= 0x80;
        }
        if self.start_position.is_some() {
            flags |= 0x40;
        }
        if self.start_zoom.is_some() {
            flags |= 0x20;
        }
        if self.languages.is_some() {
            flags |= 0x10;
        }
        if self.comment.is_some() {
            flags |= 0x08;
        }
        if self.created_by.is_some() {
            flags |= 0x04;
        }
        body.push(flags);
        if let Some((lat, lon)) = self.start_position {
            body.extend_from_slice(&lat.to_be_bytes());
            body.extend_from_slice(&lon.to_be_bytes());
        }
        if let Some(zoom) = self.start_zoom {
            body.push(zoom);
        }
        for s in [&self.languages, &self.comment, &self.created_by]
            .into_iter()
            .flatten()
        {
            string(s, &mut body);
        }

        for tags in [&self.poi_tags, &self.way_tags] {
            body.extend_from_slice(&(tags.len() as i16).to_be_bytes());
            for tag in tags {
                string(tag, &mut body);
            }
        }

        body.push(self.sub_files.len() as u8);
        for (spec, (start, size)) in self.sub_files.iter().zip(table) {
            body.push(spec.base_zoom);
            body.push(spec.zoom_min);
            body.push(spec.zoom_max);
            body.extend_from_slice(&(*start as i64).to_be_bytes());
            body.extend_from_slice(&(*size as i64).to_be_bytes());
        }

        let mut out = MAGIC.to_vec();
        out.extend_from_slice(&(body.len() as i32).to_be_bytes());
        out.extend(body);
        out
    }

    pub fn build(&self) -> Vec<u8> {
        let sub_files: Vec<Vec<u8>> = self
            .sub_files
            .iter()
            .map(|s| self.sub_file_bytes(s))
            .collect();
        let placeholder = vec![(0u64, 0u64); sub_files.len()];
        let header_len = self.header(&placeholder, 0).len() as u64;

        let mut table = Vec::new();
        let mut start = header_len;
        for bytes in &sub_files {
            table.push((start, bytes.len() as u64));
            start += bytes.len() as u64;
        }

        let mut out = self.header(&table, start);
        for bytes in sub_files {
            out.extend(bytes);
        }
        out
    }
}

/// Rewrite the declared file size to match `bytes`.
pub fn patch_file_size(bytes: &mut [u8]) {
    let size = bytes.len() as i64;
    bytes[FILE_SIZE_OFFSET..FILE_SIZE_OFFSET + 8].copy_from_slice(&size.to_be_bytes());
}

pub fn write_temp(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}

/// Owned copy of one emitted element.
#[derive(Debug, Clone)]
pub struct Element {
    pub kind: GeometryType,
    pub points: Vec<f32>,
    pub rings: Vec<usize>,
    pub tags: Vec<Tag>,
    pub layer: u8,
    pub label: Option<(f32, f32)>,
}

impl Element {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.key == key)
            .map(|t| t.value.as_str())
    }
}

#[derive(Debug, Default)]
pub struct Collect {
    pub elements: Vec<Element>,
    pub results: Vec<QueryResult>,
}

impl Collect {
    pub fn of_kind(&self, kind: GeometryType) -> Vec<&Element> {
        self.elements.iter().filter(|e| e.kind == kind).collect()
    }
}

impl TileDataSink for Collect {
    fn process(&mut self, element: &MapElement) {
        self.elements.push(Element {
            kind: element.kind(),
            points: element.points().to_vec(),
            rings: element.rings().map(|r| r.len() / 2).collect(),
            tags: element.tags.as_slice().to_vec(),
            layer: element.layer,
            label: element.label_position,
        });
    }

    fn completed(&mut self, result: QueryResult) {
        self.results.push(result);
    }
}
