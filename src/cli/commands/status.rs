use anyhow::Result;

use crate::cli::output::{StatusInfo, get_formatter};
use crate::models::{Config, OutputFormat, VectorDriver};
use crate::services::{MetricsStore, MetricsSummary, create_backend};

pub async fn handle_status(format: OutputFormat, _verbose: bool) -> Result<()> {
    let config = Config::load()?.config;
    let formatter = get_formatter(format);

    let (vector_store_connected, vector_store_points) = match create_backend(
        &config.vector_store,
        u64::from(config.embedding.dimension),
    )
    .await
    {
        Ok(store) => {
            let connected = store.health_check().await.unwrap_or(false);
            let points = if connected {
                store
                    .collection_info()
                    .await
                    .ok()
                    .flatten()
                    .map_or(0, |info| info.points_count)
            } else {
                0
            };
            (connected, points)
        }
        Err(_) => (false, 0),
    };

    let api_key_configured = config
        .gemini
        .api_key
        .as_deref()
        .is_some_and(|k| !k.trim().is_empty());

    let status = StatusInfo {
        vector_store_driver: config.vector_store.driver.to_string(),
        vector_store_url: config.vector_store.url.clone(),
        vector_store_connected,
        vector_store_points,
        collection: config.vector_store.collection.clone(),
        api_key_configured,
        embedding_model: config.embedding.model.clone(),
        generation_model: config.generation.model.clone(),
        metrics: metrics_summary(&config),
    };

    print!("{}", formatter.format_status(&status));

    if !vector_store_connected || !api_key_configured {
        eprintln!();
        if !api_key_configured {
            eprintln!("Warning: Gemini API key not set. Export GEMINI_API_KEY or set gemini.api_key.");
        }
        if !vector_store_connected {
            match config.vector_store.driver {
                VectorDriver::Qdrant => {
                    eprintln!(
                        "Warning: Qdrant not running. Start with: docker run -p 6334:6334 qdrant/qdrant"
                    );
                }
                VectorDriver::PostgreSQL => {
                    eprintln!("Warning: PostgreSQL not accessible. Check connection settings.");
                }
                VectorDriver::Memory => {}
            }
        }
    }

    Ok(())
}

/// Summary from the metrics database written by `docqa serve`, if there is one.
fn metrics_summary(config: &Config) -> Option<MetricsSummary> {
    if !config.metrics.enabled {
        return None;
    }
    let path = Config::metrics_db_path().filter(|p| p.exists())?;
    let store = MetricsStore::open(&path).ok()?;
    Some(store.get_summary(config.metrics.retention_days))
}
