//! Report a committed change to a running relay.
//!
//! Write-side tooling and scripts use this to push a change through
//! `POST /emit` when they bypass the relay's own process.
//!
//! # Examples
//! ```sh
//! villagelink-notify --relay http://localhost:8080 \
//!     --table comreqs --action new --data '{"category":"Complaint"}'
//! ```

use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::{Context, Result};
use reqwest::Url;
use serde_json::Value;
use villagelink::domain::ChangeEvent;
use villagelink::domain::ports::ChangeNotifier;
use villagelink::outbound::relay::RelayHttpNotifier;

/// `villagelink-notify` command arguments.
#[derive(Debug, Parser)]
#[command(
    name = "villagelink-notify",
    about = "Send a change notification to a VillageLink relay",
    version
)]
struct CliArgs {
    /// Base URL of the relay.
    #[arg(long, value_name = "url", default_value = "http://localhost:8080")]
    relay: Url,
    /// Table the change was committed to.
    #[arg(long)]
    table: String,
    /// Change action, for example `new` or `update`.
    #[arg(long)]
    action: String,
    /// JSON object describing the changed row.
    #[arg(long, value_name = "json", default_value = "{}")]
    data: String,
    /// Request timeout in milliseconds.
    #[arg(long, value_name = "ms", default_value_t = 5000)]
    timeout_ms: u64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = CliArgs::parse();

    let data: Value = serde_json::from_str(&args.data).wrap_err("--data must be valid JSON")?;
    let change = ChangeEvent::from_parts(Some(&args.table), Some(&args.action), Some(data))
        .wrap_err("invalid change")?;
    let endpoint = args.relay.join("emit").wrap_err("build /emit URL")?;
    let notifier = RelayHttpNotifier::new(endpoint, Duration::from_millis(args.timeout_ms))
        .wrap_err("build HTTP client")?;

    notifier
        .notify(change)
        .await
        .wrap_err_with(|| format!("notify relay at {}", notifier.endpoint()))?;
    println!("{}", change_summary(&args.table, &args.action));
    Ok(())
}

fn change_summary(table: &str, action: &str) -> String {
    format!("published {action}_{table}")
}
