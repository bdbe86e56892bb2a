use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use untis_digest::{DigestService, HomeworkQuery, UntisConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("Starting WebUntis digest example");

    // UNTIS_SCHOOL, UNTIS_USERNAME, UNTIS_PASSWORD, UNTIS_SERVER and optionally
    // UNTIS_RESOURCE_ID / UNTIS_TRANSPORT
    let config = UntisConfig::from_env().context("loading WebUntis configuration")?;

    // Create the digest service
    let digest_service =
        DigestService::from_config(config).context("creating the digest service")?;

    // Print the current report once before serving
    let report = digest_service
        .homework_report(HomeworkQuery::default())
        .await
        .context("fetching the homework report")?;
    println!("{report}");

    // Create router with the digest service
    let app = Router::new()
        .nest("/api/untis", digest_service.router())
        .route("/health", axum::routing::get(|| async { "OK" }));

    // Start server
    let listener = TcpListener::bind("0.0.0.0:3000").await?;
    info!("Server running on http://0.0.0.0:3000");

    axum::serve(listener, app).await?;

    Ok(())
}

/*
Example usage of the service:

1. GET /api/untis/homework?days=5&only_incomplete=true&exclude_today=false
   - Plain-text homework report

2. GET /api/untis/homework/json?days=5
   - Normalized homework records, or null when nothing is due

3. GET /api/untis/timetable?start=2025-01-06&end=2025-01-10&skip_cancelled=true
   - Flattened lesson list, or null when the range is empty

4. POST /api/untis/session/reset
   - Forces a fresh login on the next request
*/
