use anyhow::Result;
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::time::Duration;

/// biometric PIN -> employee id. Device syncs hammer this lookup once per
/// punch, so it lives in memory with a DB fallback for cold entries.
pub static PIN_CACHE: Lazy<Cache<String, u64>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(100_000)
        .time_to_live(Duration::from_secs(86400)) // 24h TTL
        .build()
});

pub async fn remember(pin: &str, employee_id: u64) {
    PIN_CACHE.insert(pin.to_string(), employee_id).await;
}

pub async fn forget(pin: &str) {
    PIN_CACHE.invalidate(pin).await;
}

/// Resolve a device PIN to an employee id, falling back to the database and
/// back-filling the cache on a hit. Unknown PINs resolve to None.
pub async fn resolve_pin(pool: &MySqlPool, pin: &str) -> Option<u64> {
    if let Some(id) = PIN_CACHE.get(pin).await {
        return Some(id);
    }

    let id = sqlx::query_scalar::<_, u64>(
        "SELECT id FROM employees WHERE biometric_pin = ? LIMIT 1",
    )
    .bind(pin)
    .fetch_optional(pool)
    .await
    .ok()
    .flatten()?;

    remember(pin, id).await;
    Some(id)
}

/// Load every enrolled PIN into the cache in batches at startup.
pub async fn warmup_pin_cache(pool: &MySqlPool, batch_size: usize) -> Result<()> {
    let mut stream = sqlx::query_as::<_, (String, u64)>(
        r#"
        SELECT biometric_pin, id
        FROM employees
        WHERE biometric_pin IS NOT NULL AND status = 'active'
        "#,
    )
    .fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total = 0usize;

    while let Some(row) = stream.next().await {
        let (pin, id) = row?;
        batch.push((pin, id));
        total += 1;

        if batch.len() >= batch_size {
            flush(&batch).await;
            batch.clear();
        }
    }

    if !batch.is_empty() {
        flush(&batch).await;
    }

    log::info!("PIN cache warmup complete: {} enrolled employees", total);

    Ok(())
}

async fn flush(batch: &[(String, u64)]) {
    let futures: Vec<_> = batch
        .iter()
        .map(|(pin, id)| PIN_CACHE.insert(pin.clone(), *id))
        .collect();

    futures::future::join_all(futures).await;
}
