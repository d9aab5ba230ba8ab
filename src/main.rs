//! Cosmetica Scraper
//!
//! Usage:
//!   cosmetica_scraper --input notify.xlsx --results out/results.csv --errors out/errors.csv
//!   SPREADSHEET_ID=... GOOGLE_OAUTH_TOKEN=... cosmetica_scraper
//!
//! Log level follows `RUST_LOG` (default `info`).

use clap::Parser;
use cosmetica_scraper::utils::constants::{APP_NAME, APP_VERSION};
use cosmetica_scraper::{AppError, Args, Scraper};

use eyre::Result;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    println!(
        r#"
    ╔══════════════════════════════════════════════╗
    ║   {:<20} v{:<21}║
    ║   Thai FDA cosmetics registry → sheets       ║
    ╚══════════════════════════════════════════════╝
    "#,
        APP_NAME, APP_VERSION
    );

    let scraper = match args.into_config().and_then(Scraper::new) {
        Ok(scraper) => scraper,
        Err(e) => return Err(report(e)),
    };

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => println!("\n\n🛑 Shutting down gracefully..."),
            // no signal handler: run to completion
            Err(_) => std::future::pending::<()>().await,
        }
    };

    match scraper.run_until(shutdown).await {
        Ok(summary) => {
            info!("🏁 Done: {} ok, {} failed", summary.succeeded, summary.failed);
            Ok(())
        }
        Err(e) => Err(report(e)),
    }
}

fn report(e: AppError) -> eyre::Report {
    if e.is_fatal() {
        error!("❌ Configuration error, nothing was fetched: {}", e);
    } else {
        error!("❌ Error: {}", e);
    }
    e.into()
}
