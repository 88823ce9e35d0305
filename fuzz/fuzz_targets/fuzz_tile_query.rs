#![no_main]
use libfuzzer_sys::fuzz_target;
use mapsforge_reader::source::MemorySource;
use mapsforge_reader::{
    MapElement, MapFile, MapFileOptions, QueryResult, Tile, TileDataSink, TileDataSource,
};

const LATITUDE: i32 = 52_500_000;
const LONGITUDE: i32 = 13_400_000;

struct Discard;

impl TileDataSink for Discard {
    fn process(&mut self, element: &MapElement) {
        std::hint::black_box(element.num_points());
    }
    fn completed(&mut self, _result: QueryResult) {}
}

fn string(s: &str, out: &mut Vec<u8>) {
    out.push(s.len() as u8);
    out.extend_from_slice(s.as_bytes());
}

/// Header of a single-block map at base zoom 14, with `sub_file_size` bytes
/// of index and block data following it.
fn header(version: i32, start: u64, sub_file_size: u64) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&version.to_be_bytes());
    body.extend_from_slice(&((start + sub_file_size) as i64).to_be_bytes());
    body.extend_from_slice(&1_600_000_000_000i64.to_be_bytes());
    for v in [LATITUDE, LONGITUDE, LATITUDE + 100, LONGITUDE + 100] {
        body.extend_from_slice(&v.to_be_bytes());
    }
    body.extend_from_slice(&256i16.to_be_bytes());
    string("Mercator", &mut body);
    body.push(0);
    body.extend_from_slice(&2i16.to_be_bytes());
    string("amenity=cafe", &mut body);
    string("tourism=museum", &mut body);
    body.extend_from_slice(&3i16.to_be_bytes());
    string("highway=primary", &mut body);
    string("building=yes", &mut body);
    string("area=no", &mut body);
    body.push(1);
    body.extend_from_slice(&[14, 12, 16]);
    body.extend_from_slice(&(start as i64).to_be_bytes());
    body.extend_from_slice(&(sub_file_size as i64).to_be_bytes());

    let mut out = b"mapsforge binary OSM".to_vec();
    out.extend_from_slice(&(body.len() as i32).to_be_bytes());
    out.extend(body);
    out
}

fuzz_target!(|data: &[u8]| {
    let Some((&flags, block)) = data.split_first() else {
        return;
    };
    let version = if flags & 1 != 0 { 4 } else { 3 };
    let sub_file_size = 5 + block.len() as u64;
    let start = header(version, 0, sub_file_size).len() as u64;

    let mut bytes = header(version, start, sub_file_size);
    bytes.extend_from_slice(&[0, 0, 0, 0, 5]);
    bytes.extend_from_slice(block);

    let options = MapFileOptions {
        preferred_language: (flags & 2 != 0).then(|| "en".to_string()),
        string_table: flags & 4 != 0,
        ..Default::default()
    };
    let Ok(map) = MapFile::from_source(Box::new(MemorySource::new(bytes)), options) else {
        return;
    };

    let base = Tile::containing(52.5, 13.4, 14);
    let mut db = map.database();
    db.query(base, &mut Discard);
    db.query(Tile::new(base.x >> 2, base.y >> 2, 12), &mut Discard);
    let shift = (flags >> 3) & 3;
    db.query(
        Tile::new(base.x * 4 + shift as u32, base.y * 4 + 3 - shift as u32, 16),
        &mut Discard,
    );
});
