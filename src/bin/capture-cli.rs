use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use prefix_stable_proxy::capture::{inspect, read_capture, replay, ReplayOptions};
use prefix_stable_proxy::config::NormalizationConfig;

#[derive(Parser)]
#[command(name = "capture-cli")]
#[command(about = "Replay and inspect requests captured by prefix-stable-proxy", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resend captured requests through a running proxy, in order
    Replay {
        /// Capture file (JSON Lines)
        file: PathBuf,

        #[arg(short, long, default_value = "http://127.0.0.1:1234")]
        url: String,

        /// Force "stream": true on every request
        #[arg(long)]
        stream: bool,

        #[arg(long, default_value_t = 300)]
        timeout_secs: u64,

        /// Replay at most this many records
        #[arg(long)]
        limit: Option<usize>,

        /// Include passthrough records (their bodies were not captured)
        #[arg(long)]
        all: bool,

        /// Characters of model output to print per request
        #[arg(long, default_value_t = 400)]
        preview: usize,
    },
    /// Summarize captured requests
    Inspect {
        /// Capture file (JSON Lines)
        file: PathBuf,

        /// Print summaries as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            file,
            url,
            stream,
            timeout_secs,
            limit,
            all,
            preview,
        } => {
            let log = read_capture(&file)?;
            report_skipped(log.skipped);
            let records: Vec<_> = log
                .records
                .into_iter()
                .filter(|record| all || record.target.is_some())
                .take(limit.unwrap_or(usize::MAX))
                .collect();

            let options = ReplayOptions {
                proxy_url: url,
                force_stream: stream,
                timeout: Duration::from_secs(timeout_secs),
            };
            for outcome in replay(&records, &options).await? {
                let status = outcome.status.map_or("-".to_string(), |s| s.to_string());
                print!(
                    "#{} {} {} | status={} | {}ms | bytes={} | events={}",
                    outcome.index, outcome.method, outcome.path, status, outcome.elapsed_ms, outcome.bytes, outcome.events
                );
                if let Some(usage) = &outcome.usage {
                    print!(" | usage={}", usage);
                }
                if !outcome.function_calls.is_empty() {
                    print!(" | tools={}", outcome.function_calls.join(","));
                }
                if let Some(error) = &outcome.error {
                    print!(" | error={}", error);
                }
                println!();
                print_preview(outcome.output_text.trim(), preview);
            }
        }
        Commands::Inspect { file, json } => {
            let log = read_capture(&file)?;
            report_skipped(log.skipped);
            let summaries = inspect(&log.records, &NormalizationConfig::default().item_fields);
            if json {
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            } else {
                for summary in &summaries {
                    println!("{}", summary);
                }
            }
        }
    }

    Ok(())
}

fn print_preview(text: &str, limit: usize) {
    if text.is_empty() || limit == 0 {
        return;
    }
    let total = text.chars().count();
    let shown: String = text.chars().take(limit).collect();
    for line in shown.lines() {
        println!("    {}", line);
    }
    if total > limit {
        println!("    ... [{} chars total]", total);
    }
}

fn report_skipped(skipped: usize) {
    if skipped > 0 {
        eprintln!("Warning: skipped {} malformed line(s)", skipped);
    }
}
