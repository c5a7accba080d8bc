//! QuakeWatch CLI
//!
//! Command-line interface for QuakeWatch operations:
//! - Inspect panels, figures and the quake map
//! - Trigger a refresh tick
//! - Toggle dark mode for a page
//! - Bucketize a CSV file offline

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use quakewatch::pipeline::{bucketize, BucketInterval, SeriesOrder};
use quakewatch::sources::CsvSource;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "quakewatch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Seismic dashboard client")]
#[command(long_about = "QuakeWatch keeps quake charts for Earth, Mars and the Moon current.\nThis client talks to a running QuakeWatch server or bucketizes CSV files offline.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API server URL
    #[arg(long, default_value = "http://localhost:8086", global = true)]
    pub api_url: String,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show server status
    Status,

    /// List panels and their refresh status
    Panels {
        /// Only panels of one body (earth, mars, moon)
        #[arg(short, long)]
        section: Option<String>,
    },

    /// Show the latest figure of a panel
    Figure {
        /// Panel id (e.g. earth-1min)
        id: String,
    },

    /// Run one refresh tick now
    Refresh,

    /// Show the quake map markers
    Map,

    /// Show or toggle dark mode for a page
    DarkMode {
        /// Page name
        page: String,
        /// Flip the current setting
        #[arg(long)]
        toggle: bool,
    },

    /// Bucketize a CSV file of timestamp,magnitude rows
    Bucketize {
        /// Path to CSV file
        path: PathBuf,
        /// Bucket width in seconds
        #[arg(long)]
        interval_secs: u32,
        /// Sort buckets by time instead of first-seen order
        #[arg(long)]
        chronological: bool,
        /// Timestamp column (0-indexed)
        #[arg(long, default_value = "0")]
        timestamp_col: usize,
        /// Magnitude column (0-indexed)
        #[arg(long, default_value = "1")]
        magnitude_col: usize,
        /// File has no header row
        #[arg(long)]
        no_header: bool,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let json_output = cli.format == "json";

    match cli.command {
        Commands::Status => {
            let health = get_json(&client, &format!("{}/health", cli.api_url)).await?;

            if json_output {
                println!("{}", serde_json::to_string_pretty(&health)?);
                return Ok(());
            }

            println!("QuakeWatch v{}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("API Status: {}", health["status"].as_str().unwrap_or("unknown"));
            println!("Scheduler:  {}", health["scheduler"].as_str().unwrap_or("unknown"));
            println!(
                "Panels:     {}/{} rendered, {} failing",
                health["panels_rendered"].as_u64().unwrap_or(0),
                health["panels_total"].as_u64().unwrap_or(0),
                health["panels_failing"].as_u64().unwrap_or(0)
            );
            println!("Markers:    {}", health["markers"].as_u64().unwrap_or(0));

            if let Some(uptime) = health["uptime_seconds"].as_u64() {
                println!();
                println!("Uptime: {}", format_duration(uptime));
            }
        }

        Commands::Panels { section } => {
            let mut url = format!("{}/api/v1/panels", cli.api_url);
            if let Some(section) = &section {
                url.push_str(&format!("?section={}", urlencoding::encode(section)));
            }
            let data = get_json(&client, &url).await?;

            if json_output {
                println!("{}", serde_json::to_string_pretty(&data)?);
                return Ok(());
            }

            println!(
                "{:<14} {:<34} {:>5} {:>8} {:<10}",
                "ID", "Title", "Runs", "Failures", "Last"
            );
            println!("{}", "-".repeat(75));

            for panel in data["panels"].as_array().into_iter().flatten() {
                let status = &panel["status"];
                println!(
                    "{:<14} {:<34} {:>5} {:>8} {:<10}",
                    panel["id"].as_str().unwrap_or("-"),
                    panel["title"].as_str().unwrap_or("-"),
                    status["runs"].as_u64().unwrap_or(0),
                    status["consecutive_failures"].as_u64().unwrap_or(0),
                    status["last_outcome"]["status"].as_str().unwrap_or("never")
                );
            }
        }

        Commands::Figure { id } => {
            let url = format!(
                "{}/api/v1/panels/{}",
                cli.api_url,
                urlencoding::encode(&id)
            );
            let data = get_json(&client, &url).await?;

            if json_output {
                println!("{}", serde_json::to_string_pretty(&data)?);
                return Ok(());
            }

            println!("{}", data["title"].as_str().unwrap_or("-"));
            println!(
                "Rendered at {} ({} points)",
                data["rendered_at"].as_str().unwrap_or("-"),
                data["points"].as_u64().unwrap_or(0)
            );
            println!();

            let trace = &data["figure"]["data"][0];
            let times = trace["x"].as_array().cloned().unwrap_or_default();
            let mags = trace["y"].as_array().cloned().unwrap_or_default();

            println!("{:<26} {}", "Time", "Max magnitude");
            println!("{}", "-".repeat(42));
            for (t, m) in times.iter().zip(mags.iter()) {
                println!(
                    "{:<26} {:.2}",
                    t.as_str().unwrap_or("-"),
                    m.as_f64().unwrap_or(f64::NAN)
                );
            }
        }

        Commands::Refresh => {
            let response = client
                .post(format!("{}/api/v1/refresh", cli.api_url))
                .send()
                .await
                .with_context(|| cannot_connect(&cli.api_url))?;
            let data = read_json(response).await?;

            if json_output {
                println!("{}", serde_json::to_string_pretty(&data)?);
                return Ok(());
            }

            println!(
                "Rendered {}, failed {}, skipped {}",
                data["rendered"].as_u64().unwrap_or(0),
                data["failed"].as_u64().unwrap_or(0),
                data["skipped"].as_u64().unwrap_or(0)
            );
            for report in data["reports"].as_array().into_iter().flatten() {
                let outcome = &report["outcome"];
                if outcome["status"] == "failed" {
                    println!(
                        "  {}: {}",
                        report["panel"].as_str().unwrap_or("-"),
                        outcome["error"].as_str().unwrap_or("unknown error")
                    );
                }
            }
        }

        Commands::Map => {
            let data = get_json(&client, &format!("{}/api/v1/map", cli.api_url)).await?;

            if json_output {
                println!("{}", serde_json::to_string_pretty(&data)?);
                return Ok(());
            }

            let markers = data["markers"].as_array().cloned().unwrap_or_default();
            if markers.is_empty() {
                println!("No markers yet.");
                return Ok(());
            }

            println!("{:>9} {:>10} {:>6}", "Lat", "Lon", "Mag");
            println!("{}", "-".repeat(27));
            for marker in markers {
                println!(
                    "{:>9.3} {:>10.3} {:>6.1}",
                    marker["lat"].as_f64().unwrap_or(f64::NAN),
                    marker["lon"].as_f64().unwrap_or(f64::NAN),
                    marker["magnitude"].as_f64().unwrap_or(f64::NAN)
                );
            }
        }

        Commands::DarkMode { page, toggle } => {
            let url = format!(
                "{}/api/v1/preferences/{}",
                cli.api_url,
                urlencoding::encode(&page)
            );
            let data = if toggle {
                let response = client
                    .post(format!("{}/toggle", url))
                    .send()
                    .await
                    .with_context(|| cannot_connect(&cli.api_url))?;
                read_json(response).await?
            } else {
                get_json(&client, &url).await?
            };

            if json_output {
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                let on = data["dark_mode"].as_bool().unwrap_or(false);
                println!(
                    "{} dark mode: {} {}",
                    page,
                    if on { "enabled" } else { "disabled" },
                    data["theme"]["toggle_icon"].as_str().unwrap_or("")
                );
            }
        }

        Commands::Bucketize {
            path,
            interval_secs,
            chronological,
            timestamp_col,
            magnitude_col,
            no_header,
        } => {
            if !path.exists() {
                bail!("File not found: {:?}", path);
            }
            let interval = BucketInterval::from_secs(interval_secs)
                .context("--interval-secs must be greater than zero")?;

            let report = CsvSource::new(&path)
                .with_columns(timestamp_col, magnitude_col)
                .with_header(!no_header)
                .load()?;

            let order = if chronological {
                SeriesOrder::Chronological
            } else {
                SeriesOrder::FirstSeen
            };
            let series = bucketize(&report.readings, interval).ordered(order);

            if json_output {
                println!("{}", serde_json::to_string_pretty(&series)?);
            } else {
                println!("Rows processed: {}", report.rows_processed);
                println!("Rows failed:    {}", report.rows_failed);
                for error in &report.errors {
                    println!("  {}", error);
                }
                println!("Buckets:        {}", series.len());
                println!();

                println!("{:<26} {}", "Time", "Max magnitude");
                println!("{}", "-".repeat(42));
                for (time, magnitude) in series.points() {
                    println!("{:<26} {:.2}", time.to_rfc3339(), magnitude);
                }
            }
        }

        Commands::Config { output } => {
            let config = quakewatch::config::generate_default_config();

            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }
    }

    Ok(())
}

async fn get_json(client: &reqwest::Client, url: &str) -> anyhow::Result<serde_json::Value> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| cannot_connect(url))?;
    read_json(response).await
}

async fn read_json(response: reqwest::Response) -> anyhow::Result<serde_json::Value> {
    let status = response.status();
    if !status.is_success() {
        let body: serde_json::Value = response.json().await.unwrap_or_default();
        let message = body["error"]["message"].as_str().unwrap_or("no details");
        bail!("Request failed ({}): {}", status, message);
    }
    Ok(response.json().await?)
}

fn cannot_connect(url: &str) -> String {
    format!(
        "Cannot connect to QuakeWatch at {}. Start the server with: cargo run --bin quakewatch",
        url
    )
}

fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else if seconds < 86400 {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    } else {
        format!("{}d {}h", seconds / 86400, (seconds % 86400) / 3600)
    }
}
