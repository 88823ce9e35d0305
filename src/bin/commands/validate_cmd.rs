use anyhow::{Context, Result};
use mapsforge_reader::validation::{validate_map_file, ValidationLevel};
use serde_json::json;
use std::path::PathBuf;
use std::time::Instant;

pub fn cmd_validate(
    map: PathBuf,
    level_str: String,
    json_output: bool,
    verbose: bool,
) -> Result<()> {
    let level = match level_str.to_lowercase().as_str() {
        "standard" => ValidationLevel::Standard,
        "strict" => ValidationLevel::Strict,
        _ => {
            anyhow::bail!(
                "Invalid validation level: '{}'. Must be: standard or strict",
                level_str
            );
        }
    };

    let start = Instant::now();
    let report = validate_map_file(&map, level)
        .with_context(|| format!("Validation failed: {}", map.display()))?;
    let duration = start.elapsed();

    if json_output {
        let output = json!({
            "map": map.display().to_string(),
            "validation_level": level,
            "is_valid": report.is_valid(),
            "duration_ms": duration.as_millis(),
            "errors": report.errors,
            "warnings": report.warnings,
            "info": report.info,
            "stats": report.stats,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("Validating: {}", map.display());
        println!("Level:      {}", level_str);
        println!();

        println!("Statistics:");
        println!("  {}", report.stats.summary());
        println!("  Validation time: {}ms", duration.as_millis());
        println!();

        if !report.errors.is_empty() {
            println!("ERRORS ({}):", report.errors.len());
            for error in &report.errors {
                println!("  • {}", error);
            }
            println!();
        }

        if !report.warnings.is_empty() && verbose {
            println!("WARNINGS ({}):", report.warnings.len());
            for warning in &report.warnings {
                println!("  • {}", warning);
            }
            println!();
        } else if !report.warnings.is_empty() {
            println!(
                "{} warning(s) (use --details to show)",
                report.warnings.len()
            );
            println!();
        }

        if verbose && !report.info.is_empty() {
            println!("INFORMATION ({}):", report.info.len());
            for info in &report.info {
                println!("  • {}", info);
            }
            println!();
        }

        if report.is_valid() {
            println!("VALIDATION PASSED");
        } else {
            println!("VALIDATION FAILED");
            println!("   Map file has {} error(s).", report.errors.len());
        }
    }

    // Exit with appropriate code
    if report.is_valid() {
        Ok(())
    } else {
        std::process::exit(1);
    }
}
