#![no_main]
use libfuzzer_sys::fuzz_target;
use mapsforge_reader::validation::{validate_map, ValidationLevel};
use mapsforge_reader::{MapElement, MapFile, QueryResult, Tile, TileDataSink, TileDataSource};

struct Discard;

impl TileDataSink for Discard {
    fn process(&mut self, _element: &MapElement) {}
    fn completed(&mut self, _result: QueryResult) {}
}

fuzz_target!(|data: &[u8]| {
    // This should never crash or panic, even on garbage input
    let Ok(map) = MapFile::from_bytes(data.to_vec()) else {
        return;
    };

    let center = map.info().bounding_box.center();
    let mut db = map.database();
    for zoom in [0, 8, 14, 20] {
        let tile = Tile::containing(center.latitude(), center.longitude(), zoom);
        db.query(tile, &mut Discard);
    }
    let _ = validate_map(&map, ValidationLevel::Strict);
});
