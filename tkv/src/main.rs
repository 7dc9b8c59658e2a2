use std::time::Duration;

use futures::StreamExt;
use rand::Rng;
use tkv::{MemoryStore, Record, TimeKv, TimeRange, Timestamp, TkvConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SEED_RECORDS: usize = 5_000;
const MAX_PAYLOAD_LEN: usize = 256;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tkv=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment variables
    let config = match TkvConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        "Loaded configuration: namespace={}, delimiter={}, page_size={}, strategy={:?}",
        config.namespace,
        config.delimiter,
        config.page_size,
        config.strategy()
    );

    let kv = TimeKv::from_config(MemoryStore::new(), &config);
    let now = Timestamp::now();

    // Spread records over the last two minutes so only part of them is in range
    let mut rng = rand::rng();
    let records: Vec<Record> = (0..SEED_RECORDS)
        .map(|i| {
            let age = Duration::from_millis(rng.random_range(0..120_000));
            let mut payload = vec![0u8; rng.random_range(1..=MAX_PAYLOAD_LEN)];
            rng.fill(payload.as_mut_slice());
            Record::new(["demo".to_string(), i.to_string()], payload, now.saturating_sub(age))
        })
        .collect();

    for batch in records.chunks(config.page_size) {
        if let Err(e) = kv.bulk_set(batch).await {
            tracing::error!("Failed to seed records: {e}");
            std::process::exit(1);
        }
    }
    tracing::info!("Seeded {} records", records.len());

    let range = TimeRange::between(now.saturating_sub(Duration::from_secs(60)), now);
    let stream = match kv.paginate(config.strategy(), range, 0, config.page_size).await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!("Failed to read records: {e}");
            std::process::exit(1);
        }
    };

    let (count, bytes) = stream
        .fold((0usize, 0usize), |(count, bytes), item| async move {
            match item {
                Ok(payload) => (count + 1, bytes + payload.len()),
                Err(e) => {
                    tracing::warn!("Stopped reading early: {e}");
                    (count, bytes)
                }
            }
        })
        .await;

    tracing::info!("Read {count} records ({bytes} bytes) modified in {range}");
}
