use anyhow::{bail, Context, Result};
use clap::Parser;
use platecut::*;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "platecut")]
#[command(about = "Generate tabbed router G-code for a flat plate drawn in DXF")]
#[command(version)]
struct Cli {
    /// Input DXF drawing
    input: PathBuf,

    /// Output G-code file
    #[arg(short, long)]
    output: PathBuf,

    /// Material preset name
    #[arg(long, default_value = "plywood")]
    material: String,

    /// Stock thickness in inches
    #[arg(long, default_value_t = 0.25)]
    thickness: f64,

    /// Tool diameter in inches
    #[arg(long, default_value_t = 0.157)]
    tool: f64,

    /// Number of tabs on the perimeter
    #[arg(long, conflicts_with = "tab_spacing")]
    tabs: Option<usize>,

    /// Distance between tabs along the perimeter, in inches
    #[arg(long)]
    tab_spacing: Option<f64>,

    /// Depth cut into the sacrifice board, in inches
    #[arg(long, default_value_t = 0.02)]
    overcut: f64,

    /// Drawing units: in or mm
    #[arg(long, default_value = "in")]
    units: String,

    /// Rotate the drawing counter-clockwise by this many degrees
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    rotate: f64,

    /// Peck drill holes at their centre instead of milling them
    #[arg(long)]
    drill: bool,

    /// Material library JSON file (defaults to ~/.platecut/materials.json)
    #[arg(long)]
    materials: Option<PathBuf>,

    /// Also write the job summary as JSON
    #[arg(long)]
    summary_json: Option<PathBuf>,
}

fn main() -> Result<()> {
    platecut::init_logging()?;
    let cli = Cli::parse();

    let library_path = match &cli.materials {
        Some(path) => path.clone(),
        None => MaterialLibrary::default_library_path()?,
    };
    let library = MaterialLibrary::load_from_path(&library_path)?;
    let preset = library.resolve(&cli.material)?;

    let Some(units) = Units::parse(&cli.units) else {
        bail!("unknown units '{}', expected in or mm", cli.units);
    };

    let mut config = JobConfig::default()
        .with_material(preset)
        .with_thickness(cli.thickness)
        .with_tool_diameter(cli.tool)
        .with_overcut(cli.overcut)
        .with_units(units)
        .with_rotation(cli.rotate);
    if let Some(count) = cli.tabs {
        config = config.with_tabs(TabMode::Count(count));
    } else if let Some(spacing) = cli.tab_spacing {
        config = config.with_tabs(TabMode::Spacing(spacing));
    }
    if cli.drill {
        config = config.with_hole_strategy(HoleStrategy::Drill);
    }

    let output = generate_from_path(&cli.input, &config)
        .with_context(|| format!("Failed to generate G-code for {}", cli.input.display()))?;

    fs::write(&cli.output, output.gcode.to_text())
        .with_context(|| format!("Failed to write G-code to {}", cli.output.display()))?;
    if let Some(path) = &cli.summary_json {
        let json = serde_json::to_string_pretty(&output.summary)
            .context("Failed to serialize job summary")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write summary to {}", path.display()))?;
    }

    for line in output.summary.console_lines() {
        println!("{line}");
    }
    println!("Wrote {}", cli.output.display());
    Ok(())
}
