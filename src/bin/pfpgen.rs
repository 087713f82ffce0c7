//! Profile picture generator CLI
//!
//! Command-line front-end for the pfpgen pipeline: background removal,
//! adjustments, filters, backgrounds, shape crops and social exports.

#[cfg(feature = "cli")]
use pfpgen::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}
