//! Oppreport CLI - monthly opportunity reports from a spreadsheet
//!
//! # Main Commands
//!
//! ```bash
//! oppreport report opportunities.xlsx --out-dir out   # Pivots, charts, CSV exports
//! oppreport serve                                     # Start HTTP server (port 3000)
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! oppreport load opportunities.xlsx   # Typed records as JSON
//! oppreport config                    # Show effective configuration
//! ```

use clap::{Parser, Subcommand};
use oppreport::{build_report_from_path, load_records, write_exports, ReportConfig};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "oppreport")]
#[command(about = "Monthly opportunity pivots, cumulative series and charts", long_about = None)]
struct Cli {
    /// Configuration file (JSON); falls back to $OPPREPORT_CONFIG
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full report: pivots, cumulative series and charts
    Report {
        /// Input spreadsheet (xlsx, xls or csv)
        input: PathBuf,

        /// Write the two CSV exports into this directory
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Write the full report as JSON
        #[arg(short, long)]
        json: Option<PathBuf>,
    },

    /// Load and type a spreadsheet, output records as JSON
    Load {
        /// Input spreadsheet (xlsx, xls or csv)
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the effective configuration
    Config,

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match ReportConfig::load(cli.config.as_deref()) {
        Ok(config) => match cli.command {
            Commands::Report { input, out_dir, json } => {
                cmd_report(&input, out_dir.as_deref(), json.as_deref(), &config)
            }
            Commands::Load { input, output } => cmd_load(&input, output.as_deref(), &config),
            Commands::Config => cmd_config(&config),
            Commands::Serve { port } => cmd_serve(port, config).await,
        },
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_report(
    input: &Path,
    out_dir: Option<&Path>,
    json: Option<&Path>,
    config: &ReportConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let report = build_report_from_path(input, config)?;

    println!("\n📋 Monthly opportunity counts\n");
    print!("{}", report.count_pivot);

    println!("\n💰 Monthly opportunity values ({})\n", report.value_column);
    print!("{}", report.value_pivot);

    for chart in &report.charts {
        println!();
        print!("{}", chart.render_text());
    }

    if !report.skipped_rows.is_empty() {
        println!("\n⚠️  {} row issue(s) skipped:", report.skipped_rows.len());
        for issue in report.skipped_rows.iter().take(10) {
            println!("   - {}", issue);
        }
    }

    if let Some(dir) = out_dir {
        for path in write_exports(&report, dir)? {
            eprintln!("💾 Written: {}", path.display());
        }
    }

    if let Some(path) = json {
        let content = serde_json::to_string_pretty(&report)?;
        fs::write(path, content)?;
        eprintln!("💾 Report written to: {}", path.display());
    }

    eprintln!("\n✨ Done!");
    Ok(())
}

fn cmd_load(input: &Path, output: Option<&Path>, config: &ReportConfig) -> Result<(), Box<dyn std::error::Error>> {
    let loaded = load_records(input, config)?;
    eprintln!("✅ Typed {} records", loaded.records.len());

    let json = serde_json::to_string_pretty(&loaded)?;
    write_output(&json, output)
}

fn cmd_config(config: &ReportConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", config.to_json()?);
    Ok(())
}

async fn cmd_serve(port: u16, config: ReportConfig) -> Result<(), Box<dyn std::error::Error>> {
    oppreport::server::start_server(port, config).await
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
