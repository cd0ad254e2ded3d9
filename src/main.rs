//! # Nimbo CLI
//!
//! Command-line interface for label printing.
//!
//! ## Usage
//!
//! ```bash
//! # Find nearby printers
//! nimbo scan
//!
//! # Print two "new"-condition labels for a product
//! nimbo print B001XYZ CN --quantity 2
//!
//! # Pre-render every condition before printing
//! nimbo print B001XYZ CN --precache
//!
//! # Render a label to a PNG without a printer
//! nimbo preview B001XYZ CN --png label.png
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use nimbo::transport::BleScanner;
use nimbo::{Condition, LabelRenderer, NimboError, PrinterConfig, PrinterSession};

/// Nimbo - label printer utility
#[derive(Parser, Debug)]
#[command(name = "nimbo")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan for nearby label printers
    Scan {
        /// Scan window in seconds
        #[arg(long, default_value = "5")]
        timeout: u64,

        /// Print the device names as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print an identification label
    Print {
        /// Product code (e.g. an ASIN)
        code: String,

        /// Condition label: CN, FB or B
        condition: String,

        /// Number of copies
        #[arg(long, default_value = "1")]
        quantity: u8,

        /// Pre-render every condition for the code before printing
        #[arg(long)]
        precache: bool,

        /// Scan window in seconds
        #[arg(long, default_value = "5")]
        timeout: u64,
    },

    /// Render a label to a PNG file without a printer
    Preview {
        /// Product code (e.g. an ASIN)
        code: String,

        /// Condition label: CN, FB or B
        condition: String,

        /// Output file
        #[arg(long, value_name = "FILE", default_value = "label.png")]
        png: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    env_logger::init();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), NimboError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan { timeout, json } => scan(timeout, json).await,
        Commands::Print {
            code,
            condition,
            quantity,
            precache,
            timeout,
        } => print(&code, &condition, quantity, precache, timeout).await,
        Commands::Preview {
            code,
            condition,
            png,
        } => preview(&code, &condition, &png),
    }
}

async fn scan(timeout: u64, json: bool) -> Result<(), NimboError> {
    let config = PrinterConfig::default();
    let scanner = BleScanner::new()
        .await?
        .with_scan_timeout(Duration::from_secs(timeout));

    let devices = scanner.discover(&config.device_filter()).await?;
    let names: Vec<String> = devices.iter().map(|d| d.name()).collect();

    if json {
        let rendered = serde_json::to_string_pretty(&names)
            .map_err(|e| NimboError::Transport(format!("JSON encoding failed: {e}")))?;
        println!("{rendered}");
    } else if names.is_empty() {
        println!("No printers found.");
    } else {
        println!("Found printers:");
        for name in names {
            println!("  {name}");
        }
    }
    Ok(())
}

async fn print(
    code: &str,
    condition: &str,
    quantity: u8,
    precache: bool,
    timeout: u64,
) -> Result<(), NimboError> {
    let session = PrinterSession::new(PrinterConfig::default());
    let scanner = BleScanner::new()
        .await?
        .with_scan_timeout(Duration::from_secs(timeout));
    let filter = session.config().device_filter();

    println!("Searching for a printer...");
    if !session
        .connection()
        .discover_and_connect(&scanner, &filter)
        .await?
    {
        return Err(NimboError::Transport(
            "another connect attempt is already in progress".into(),
        ));
    }

    if precache {
        println!("Pre-rendering condition labels for {code}...");
        session.precache(code).await;
    }

    println!("Printing {code}{condition} x{quantity}...");
    session.print_label(code, condition, quantity).await?;
    println!("Printed successfully.");
    Ok(())
}

fn preview(code: &str, condition: &str, png: &PathBuf) -> Result<(), NimboError> {
    // Same validation as a real job: only the three printable buckets.
    Condition::from_wire_label(condition)
        .ok_or_else(|| NimboError::UnsupportedCondition(condition.to_string()))?;

    let image = LabelRenderer::default().render_device_image(code, condition)?;
    image
        .save(png)
        .map_err(|e| NimboError::Render(format!("saving {} failed: {e}", png.display())))?;

    println!("Wrote {}", png.display());
    Ok(())
}
