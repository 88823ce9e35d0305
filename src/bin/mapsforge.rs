mod cli_utils;
mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use mapsforge_reader::Tile;
use std::path::PathBuf;

use commands::{cmd_info, cmd_query, cmd_scan, cmd_validate};

#[derive(Parser)]
#[command(name = "mapsforge")]
#[command(
    about = "Inspect, query and validate mapsforge binary map files",
    long_about = "mapsforge - Decoder for mapsforge binary map files (.map)\n\n\
    Reads the header, decodes single tiles into POIs, lines and polygons,\n\
    scans whole zoom levels in parallel and checks files for corruption.\n\n\
    Examples:\n\
      mapsforge info berlin.map\n\
      mapsforge query berlin.map 14 8802 5373 --json\n\
      mapsforge scan berlin.map --zoom 12 -j 8\n\
      mapsforge validate berlin.map --level strict"
)]
#[command(version)]
struct Cli {
    /// Increase log output (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the header and sub-file table of a map file
    Info {
        /// Path to the map file
        #[arg(value_name = "MAP")]
        map: PathBuf,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,

        /// Also list the tag dictionaries
        #[arg(short, long)]
        details: bool,
    },

    /// Decode one tile and print its elements
    Query {
        /// Path to the map file
        #[arg(value_name = "MAP")]
        map: PathBuf,

        /// Zoom level of the tile
        #[arg(value_name = "ZOOM", value_parser = clap::value_parser!(u8).range(0..=30))]
        zoom: u8,

        /// Tile column
        #[arg(value_name = "X")]
        x: u32,

        /// Tile row
        #[arg(value_name = "Y")]
        y: u32,

        /// Output elements as JSON
        #[arg(short, long)]
        json: bool,

        /// Preferred language for names (e.g. de, en-GB)
        #[arg(short, long)]
        language: Option<String>,

        /// Read names through the per-block string table (version 4 files)
        #[arg(long)]
        string_table: bool,
    },

    /// Query every tile covering the map at one zoom level
    Scan {
        /// Path to the map file
        #[arg(value_name = "MAP")]
        map: PathBuf,

        /// Zoom level to scan
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=22))]
        zoom: u8,

        /// Number of worker threads (default: all cores)
        #[arg(short = 'j', long)]
        threads: Option<String>,

        /// Output results as JSON
        #[arg(long)]
        json: bool,

        /// Index blocks cached per map file
        #[arg(long, default_value = "64")]
        index_cache: usize,
    },

    /// Validate a map file for corruption
    Validate {
        /// Path to the map file
        #[arg(value_name = "MAP")]
        map: PathBuf,

        /// Validation level: standard or strict (default)
        #[arg(short, long, default_value = "strict")]
        level: String,

        /// Output results as JSON
        #[arg(short, long)]
        json: bool,

        /// Show warnings and info messages
        #[arg(short, long)]
        details: bool,
    },
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Info { map, json, details } => cmd_info(map, json, details),
        Commands::Query {
            map,
            zoom,
            x,
            y,
            json,
            language,
            string_table,
        } => cmd_query(map, Tile::new(x, y, zoom), json, language, string_table),
        Commands::Scan {
            map,
            zoom,
            threads,
            json,
            index_cache,
        } => cmd_scan(map, zoom, threads, json, index_cache),
        Commands::Validate {
            map,
            level,
            json,
            details,
        } => cmd_validate(map, level, json, details),
    }
}
