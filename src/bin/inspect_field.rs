//! Print the layout of a NetCDF file and, optionally, a summary of one
//! decoded field. Useful for checking cached subsets and EFI archives.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::Parser;
use std::path::PathBuf;

use synoptic::loader::decode;
use synoptic::{BoundingBox, Level};

#[derive(Parser, Debug)]
#[command(name = "inspect_field", about = "Inspect a NetCDF file used by synoptic")]
struct Args {
    /// NetCDF file to inspect
    path: PathBuf,

    /// Variable to decode
    #[arg(short, long)]
    variable: Option<String>,

    /// Valid time, YYYYMMDDHH; omit for files without a time axis
    #[arg(short, long)]
    time: Option<String>,

    /// Pressure level in hPa; omit for single-level fields
    #[arg(short, long)]
    level: Option<u32>,

    /// Box as "W, E, S, N"
    #[arg(short, long, default_value = "0, 360, -90, 90")]
    bbox: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let summary = decode::describe(&args.path).with_context(|| format!("cannot open {}", args.path.display()))?;
    println!("{}", args.path.display());
    println!("\nDimensions:");
    for (name, len) in &summary.dimensions {
        println!("  {} = {}", name, len);
    }
    println!("\nVariables:");
    for var in &summary.variables {
        println!(
            "  {} [{}] {}",
            var.name,
            var.dimensions.join(", "),
            var.units.as_deref().unwrap_or("")
        );
    }

    let Some(variable) = args.variable.as_deref() else {
        return Ok(());
    };
    let bbox = BoundingBox::parse(&args.bbox)?;

    let fields = match args.time.as_deref() {
        Some(text) => {
            let time = NaiveDateTime::parse_from_str(&format!("{}00", text), "%Y%m%d%H%M")
                .with_context(|| format!("'{}' is not YYYYMMDDHH", text))?;
            let level = args.level.map(Level::Isobaric).unwrap_or(Level::Surface);
            decode::read_fields(&args.path, variable, time, &[level], &bbox)?
        }
        None => decode::read_steps(&args.path, variable, &bbox)?,
    };

    println!("\n{} in {}:", variable, bbox);
    for (i, field) in fields.iter().enumerate() {
        let (rows, cols) = field.shape();
        let range = field
            .finite_range()
            .map(|(lo, hi)| format!("{:.3} .. {:.3}", lo, hi))
            .unwrap_or_else(|| "no finite values".to_string());
        println!("  [{}] {}x{} {} ({})", i, rows, cols, range, field.units());
    }
    Ok(())
}
