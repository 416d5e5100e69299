use std::process::ExitCode;

use ipex_scraper::{ScrapeRequest, ScraperConfig, ScraperService};
use tower::Service;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,ipex_scraper=debug")),
        )
        .init();

    let config = match ScraperConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let request = ScrapeRequest::new(config.output_dir.clone())
        .with_export_path(config.export_path.clone())
        .with_headless(config.headless)
        .with_base(config);

    match ScraperService::new().call(request).await {
        Ok(report) => {
            info!("Data successfully exported to {:?}", report.export_path);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Scrape aborted: {}", e);
            ExitCode::FAILURE
        }
    }
}
