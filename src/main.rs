//! Prefix-stable proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────┐
//!                     │               PREFIX-STABLE PROXY             │
//!                     │                                              │
//!   Client Request    │  ┌─────────┐   ┌─────────┐   ┌───────────┐   │
//!   ──────────────────┼─▶│  http   │──▶│ routing │──▶│ normalize │   │
//!                     │  │ server  │   │ targets │   │  (target) │   │
//!                     │  └─────────┘   └────┬────┘   └─────┬─────┘   │
//!                     │                     │ passthrough  │         │
//!                     │                     ▼              ▼         │
//!   Client Response   │  ┌─────────┐   ┌──────────────────────────┐  │
//!   ◀─────────────────┼──│ stream  │◀──│   pooled backend client  │◀─┼──── Inference
//!                     │  │ + report│   │ (semaphore, timeouts)    │  │     Server
//!                     │  └─────────┘   └──────────────────────────┘  │
//!                     │                                              │
//!                     │  config · observability · capture · lifecycle │
//!                     └──────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tokio::net::TcpListener;

use prefix_stable_proxy::config::{resolve_config, LogFormat, Overrides};
use prefix_stable_proxy::observability::{self, metrics};
use prefix_stable_proxy::{HttpServer, Shutdown};

#[derive(Parser, Debug)]
#[command(name = "prefix-stable-proxy", version)]
#[command(about = "Keeps LLM prompt prefixes byte-stable by stripping volatile fragments")]
struct Args {
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address, e.g. 0.0.0.0:1234.
    #[arg(long)]
    listen: Option<String>,

    /// Backend base URL, e.g. http://127.0.0.1:12345.
    #[arg(long)]
    backend: Option<String>,

    /// Strip volatile keys such as message_id.
    #[arg(long)]
    strip_volatile_keys: Option<bool>,

    /// Strip timestamp prefixes at line starts.
    #[arg(long)]
    strip_timestamps: Option<bool>,

    #[arg(long, value_enum)]
    log_format: Option<LogFormatArg>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let overrides = Overrides {
        bind_address: args.listen,
        backend_url: args.backend,
        strip_volatile_keys: args.strip_volatile_keys,
        strip_timestamp_prefixes: args.strip_timestamps,
        log_format: args.log_format.map(Into::into),
    };

    let config = resolve_config(args.config.as_deref(), &overrides)?;
    observability::init_logging(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config,
        "prefix-stable-proxy starting"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config)?;

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
