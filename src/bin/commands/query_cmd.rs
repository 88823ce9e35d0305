use anyhow::Result;
use mapsforge_reader::{MapFileOptions, QueryResult, Tile, TileDataSource};
use serde_json::json;
use std::path::PathBuf;

use crate::cli_utils::{open_map, CollectingSink};

pub fn cmd_query(
    map: PathBuf,
    tile: Tile,
    json_output: bool,
    language: Option<String>,
    string_table: bool,
) -> Result<()> {
    if !tile.is_valid() {
        anyhow::bail!("Invalid tile: {}", tile);
    }
    let options = MapFileOptions {
        preferred_language: language,
        string_table,
        ..Default::default()
    };
    let file = open_map(&map, options)?;
    let mut db = file.database();

    let mut sink = CollectingSink {
        keep_json: json_output,
        ..Default::default()
    };
    db.query(tile, &mut sink);
    let result = sink.result.unwrap_or(QueryResult::Failed);

    if json_output {
        let output = json!({
            "tile": tile,
            "result": result,
            "elements": sink.elements,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for line in &sink.lines {
            println!("{}", line);
        }
        println!();
        println!("{} elements, {:?}", sink.lines.len(), result);
    }

    // Exit with appropriate code
    if result == QueryResult::Success {
        Ok(())
    } else {
        std::process::exit(1);
    }
}
