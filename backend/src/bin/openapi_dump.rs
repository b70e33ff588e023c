//! Print the relay's OpenAPI document as JSON.
//!
//! # Examples
//! ```sh
//! cargo run --manifest-path backend/Cargo.toml --bin openapi-dump -- --compact
//! ```

use clap::Parser;
use color_eyre::eyre::{Context, Result};
use utoipa::OpenApi;
use villagelink::ApiDoc;

/// `openapi-dump` command arguments.
#[derive(Debug, Parser)]
#[command(name = "openapi-dump", about = "Print the relay OpenAPI document", version)]
struct CliArgs {
    /// Emit single-line JSON instead of pretty-printed output.
    #[arg(long)]
    compact: bool,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = CliArgs::parse();
    let doc = ApiDoc::openapi();
    let json = if args.compact {
        doc.to_json()
    } else {
        doc.to_pretty_json()
    }
    .wrap_err("serialise OpenAPI document")?;
    println!("{json}");
    Ok(())
}
