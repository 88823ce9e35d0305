use anyhow::Result;
use mapsforge_reader::MapFileOptions;
use serde_json::json;
use std::path::PathBuf;

use crate::cli_utils::{format_bytes, format_map_date, open_map};

pub fn cmd_info(map: PathBuf, json_output: bool, verbose: bool) -> Result<()> {
    let file = open_map(&map, MapFileOptions::default())?;
    let info = file.info();
    let header = file.header();

    if json_output {
        let output = json!({
            "file": map.display().to_string(),
            "info": info,
            "zoom_level_min": header.zoom_level_min(),
            "zoom_level_max": header.zoom_level_max(),
            "sub_files": header.sub_files(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let bbox = &info.bounding_box;
    println!("Map file:   {}", map.display());
    println!("Version:    {}", info.file_version);
    println!("Size:       {}", format_bytes(info.file_size));
    println!("Date:       {}", format_map_date(info.map_date));
    println!(
        "Bounds:     {:.6},{:.6} - {:.6},{:.6}",
        bbox.min_latitude(),
        bbox.min_longitude(),
        bbox.max_latitude(),
        bbox.max_longitude()
    );
    println!("Projection: {}", info.projection_name);
    println!("Tile size:  {} px", info.tile_pixel_size);
    println!(
        "Zoom:       {}..={}",
        header.zoom_level_min(),
        header.zoom_level_max()
    );
    if let Some(start) = info.start_position {
        println!(
            "Start:      {:.6},{:.6}",
            start.latitude(),
            start.longitude()
        );
    }
    if let Some(zoom) = info.start_zoom_level {
        println!("Start zoom: {}", zoom);
    }
    if let Some(languages) = &info.languages_preference {
        println!("Languages:  {}", languages);
    }
    if let Some(comment) = &info.comment {
        println!("Comment:    {}", comment);
    }
    if let Some(created_by) = &info.created_by {
        println!("Created by: {}", created_by);
    }
    if info.debug_file {
        println!("Debug:      yes");
    }
    println!(
        "Tags:       {} POI, {} way",
        info.poi_tags.len(),
        info.way_tags.len()
    );

    println!();
    println!("Sub-files:");
    for (i, sub_file) in header.sub_files().iter().enumerate() {
        println!(
            "  {}: base zoom {:>2}, zoom {:>2}..={:<2} {:>6} blocks ({}x{}), {}",
            i,
            sub_file.base_zoom_level,
            sub_file.zoom_level_min,
            sub_file.zoom_level_max,
            sub_file.number_of_blocks,
            sub_file.blocks_width,
            sub_file.blocks_height,
            format_bytes(sub_file.sub_file_size)
        );
    }

    if verbose {
        println!();
        println!("POI tags:");
        for (id, tag) in info.poi_tags.iter().enumerate() {
            println!("  {:>4}  {}", id, tag);
        }
        println!("Way tags:");
        for (id, tag) in info.way_tags.iter().enumerate() {
            println!("  {:>4}  {}", id, tag);
        }
    }

    Ok(())
}
