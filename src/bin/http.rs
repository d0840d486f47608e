#[cfg(feature = "http_api")]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use rams_workload::{AppConfig, SqlitePlanningStore, WorkCalendar, http_api, logging};

    let config = AppConfig::from_env()?;
    logging::init(&config.log_filter);

    let store = SqlitePlanningStore::new(&config.database_path)?;
    let state = http_api::AppState::new(store, WorkCalendar::default());

    println!(
        "rams-workload HTTP API listening on http://{} (database {})",
        config.http_addr,
        config.database_path.display()
    );
    http_api::serve(config.http_addr, state).await?;
    Ok(())
}

#[cfg(not(feature = "http_api"))]
fn main() {
    eprintln!("Rebuild with the `http_api` feature to enable the HTTP server.");
}
