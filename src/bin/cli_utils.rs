use mapsforge_reader::geometry::GeometryType;
use mapsforge_reader::{MapElement, MapFile, MapFileOptions, QueryResult, TileDataSink};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

pub fn open_map(path: &Path, options: MapFileOptions) -> Result<Arc<MapFile>> {
    MapFile::from(path)
        .options(options)
        .mmap()
        .open()
        .with_context(|| format!("Failed to open map file: {}", path.display()))
}

/// Parse a `-j` argument: a thread count, or "auto"/"0" for all cores.
pub fn parse_threads(arg: Option<&str>) -> Result<usize> {
    match arg {
        None | Some("auto") | Some("0") => Ok(std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)),
        Some(s) => s
            .parse::<usize>()
            .with_context(|| format!("Invalid thread count: '{}'", s)),
    }
}

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a map date (milliseconds since the epoch) as a UTC date.
pub fn format_map_date(millis: i64) -> String {
    if millis < 0 {
        return format!("Invalid map date: {}", millis);
    }
    let total_secs = (millis / 1000) as u64;
    let days = total_secs / 86400;
    let remaining = total_secs % 86400;
    let (year, month, day) = days_to_ymd(days);
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02} UTC",
        year,
        month,
        day,
        remaining / 3600,
        (remaining % 3600) / 60
    )
}

fn days_to_ymd(days: u64) -> (u64, u64, u64) {
    let mut year = 1970;
    let mut remaining_days = days;
    loop {
        let days_in_year = if is_leap_year(year) { 366 } else { 365 };
        if remaining_days < days_in_year {
            break;
        }
        remaining_days -= days_in_year;
        year += 1;
    }

    let february = if is_leap_year(year) { 29 } else { 28 };
    let days_in_months = [31, february, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    let mut month = 1;
    for days_in_month in days_in_months {
        if remaining_days < days_in_month {
            break;
        }
        remaining_days -= days_in_month;
        month += 1;
    }
    (year, month, remaining_days + 1)
}

fn is_leap_year(year: u64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn element_to_json(element: &MapElement) -> serde_json::Value {
    let rings: Vec<Vec<[f32; 2]>> = element
        .rings()
        .map(|ring| ring.chunks_exact(2).map(|p| [p[0], p[1]]).collect())
        .collect();
    let tags: serde_json::Map<String, serde_json::Value> = element
        .tags
        .iter()
        .map(|t| (t.key.clone(), json!(t.value)))
        .collect();
    let mut value = json!({
        "kind": element.kind(),
        "layer": element.layer,
        "tags": tags,
        "rings": rings,
    });
    if let Some((x, y)) = element.label_position {
        value["label_position"] = json!([x, y]);
    }
    value
}

pub fn describe_element(element: &MapElement) -> String {
    let kind = match element.kind() {
        GeometryType::Point => "POI ",
        GeometryType::Line => "LINE",
        GeometryType::Poly => "POLY",
        GeometryType::None => "NONE",
    };
    let tags: Vec<String> = element.tags.iter().map(|t| t.to_string()).collect();
    format!(
        "{} layer {:>2} points {:>5} rings {:>3}  {}",
        kind,
        element.layer,
        element.num_points(),
        element.rings().count(),
        tags.join(" ")
    )
}

/// Sink that keeps a JSON copy of every element.
#[derive(Default)]
pub struct CollectingSink {
    pub elements: Vec<serde_json::Value>,
    pub lines: Vec<String>,
    pub result: Option<QueryResult>,
    pub keep_json: bool,
}

impl TileDataSink for CollectingSink {
    fn process(&mut self, element: &MapElement) {
        if self.keep_json {
            self.elements.push(element_to_json(element));
        } else {
            self.lines.push(describe_element(element));
        }
    }

    fn completed(&mut self, result: QueryResult) {
        self.result = Some(result);
    }
}
