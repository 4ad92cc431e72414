use anyhow::Result;

use crate::cli::output::{StatusInfo, get_formatter};
use crate::models::{Config, OutputFormat, VectorDriver};
use crate::services::create_backend;

pub async fn handle_status(config: &Config, format: OutputFormat, _verbose: bool) -> Result<()> {
    let formatter = get_formatter(format);

    let (connected, info) = match create_backend(&config.vector_store) {
        Ok(store) => {
            let connected = store.health_check().await.unwrap_or(false);
            let info = if connected {
                store
                    .collection_info(&config.vector_store.collection)
                    .await
                    .ok()
                    .flatten()
            } else {
                None
            };
            (connected, info)
        }
        Err(_) => (false, None),
    };

    let status = StatusInfo {
        embedding_model: config.embedding.model.clone(),
        embedding_url: config.embedding.base_url.clone(),
        embedding_dimension: config.embedding.dimension,
        api_key_configured: config.embedding.api_key.is_some(),
        vector_store_driver: config.vector_store.driver.to_string(),
        vector_store_url: config.vector_store.url.clone(),
        vector_store_connected: connected,
        collection: config.vector_store.collection.clone(),
        collection_exists: info.is_some(),
        collection_points: info.as_ref().map_or(0, |i| i.points_count),
        collection_dimension: info.as_ref().and_then(|i| i.dimension),
    };

    print!("{}", formatter.format_status(&status));

    if !status.api_key_configured || !connected {
        eprintln!();
        if !status.api_key_configured {
            eprintln!("Hint: no embedding API key. Set OPENAI_API_KEY or add it to .env");
        }
        if !connected && config.vector_store.driver == VectorDriver::Qdrant {
            eprintln!("Warning: Qdrant not reachable. Start with: docker run -p 6334:6334 qdrant/qdrant");
        }
    }
    if let Some(dim) = status
        .collection_dimension
        .filter(|d| *d != u64::from(config.embedding.dimension))
    {
        eprintln!(
            "Warning: collection has {} dimensions but the embedding model is configured for {}",
            dim, config.embedding.dimension
        );
    }

    Ok(())
}
