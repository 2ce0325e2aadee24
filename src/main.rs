//! resilient-probe
//!
//! Fires a batch of requests at one URL through the resilient client and
//! reports how each call ended, plus the final state of every breaker.
//!
//! ```text
//! resilient-probe --config client.toml --url http://127.0.0.1:8080/health --count 20
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{Method, Request};
use clap::Parser;
use serde_json::json;

use resilient_http::config::{load_config, ClientConfig};
use resilient_http::observability::{logging, metrics};
use resilient_http::{CallContext, ClientError, ResilientClient};

#[derive(Parser)]
#[command(name = "resilient-probe")]
#[command(about = "Probe an HTTP endpoint through retries and circuit breakers", long_about = None)]
struct Cli {
    /// Client configuration file (TOML). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Target URL.
    #[arg(short, long)]
    url: String,

    /// HTTP method.
    #[arg(short, long, default_value = "GET")]
    method: Method,

    /// Number of calls to make.
    #[arg(short = 'n', long, default_value_t = 10)]
    count: u32,

    /// Resource key; derived from method and path when omitted.
    #[arg(short, long)]
    resource: Option<String>,

    /// Per-call deadline in milliseconds.
    #[arg(short, long)]
    deadline_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ClientConfig::default(),
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!(
        url = %cli.url,
        count = cli.count,
        retry = config.retry.is_some(),
        circuit_breaker = config.circuit_breaker.is_some(),
        "resilient-probe starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let client = ResilientClient::from_config(&config);
    let mut totals: BTreeMap<&'static str, u64> = BTreeMap::new();

    for i in 0..cli.count {
        let request = Request::builder()
            .method(cli.method.clone())
            .uri(cli.url.as_str())
            .body(Bytes::new())?;

        let ctx = match cli.deadline_ms {
            Some(ms) => CallContext::new().with_timeout(Duration::from_millis(ms)),
            None => CallContext::new(),
        };

        let result = match &cli.resource {
            Some(resource) => client.call_with(resource, request, ctx).await,
            None => client.send_with(request, ctx).await,
        };

        let label = match &result {
            Ok(response) => {
                tracing::info!(call = i, status = %response.status(), "Call succeeded");
                "ok"
            }
            Err(err) => {
                tracing::warn!(call = i, error = %err, "Call failed");
                outcome_label(err)
            }
        };
        *totals.entry(label).or_default() += 1;
    }

    let breakers: BTreeMap<String, String> = client
        .breakers()
        .map(|registry| {
            registry
                .snapshot()
                .into_iter()
                .map(|(resource, state)| (resource, state.to_string()))
                .collect()
        })
        .unwrap_or_default();

    let summary = json!({
        "url": cli.url,
        "calls": cli.count,
        "outcomes": totals,
        "breakers": breakers,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}

/// Summary label for a failed call: its own kind, so exhausted retries stay distinct.
fn outcome_label(err: &ClientError) -> &'static str {
    err.kind()
}
