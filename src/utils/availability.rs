use anyhow::{Result, anyhow};
use autoscale_cuckoo_filter::CuckooFilter;
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::sync::RwLock;
use std::time::Duration;

/// Registration-time availability checks for usernames and volunteer emails.
///
/// Two tiers in front of the database, both keyed by a prefixed lowercase
/// string ("u:" for usernames, "e:" for emails):
/// 1. Cuckoo filter: fast negative ("definitely unused")
/// 2. Moka cache: fast positive ("known taken")
/// 3. Database: fallback EXISTS query

/// Expected capacity and false-positive rate.
/// Tune these based on real registration volume.
const FILTER_CAPACITY: usize = 100_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

static TAKEN_FILTER: Lazy<RwLock<CuckooFilter<String>>> =
    Lazy::new(|| RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)));

/// true => key is TAKEN (only taken keys are stored)
static TAKEN_CACHE: Lazy<Cache<String, bool>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(500_000)
        .time_to_live(Duration::from_secs(86400)) // 24h TTL
        .build()
});

#[inline]
fn username_key(username: &str) -> String {
    format!("u:{}", username.trim().to_lowercase())
}

#[inline]
fn email_key(email: &str) -> String {
    format!("e:{}", email.trim().to_lowercase())
}

fn filter_insert(key: String) {
    TAKEN_FILTER
        .write()
        .expect("availability filter poisoned")
        .add(&key);
}

async fn is_taken(key: String, pool: &MySqlPool, exists_sql: &str, raw: &str) -> bool {
    // 1. Cuckoo filter, a miss means the key was never registered
    let might_exist = TAKEN_FILTER
        .read()
        .expect("availability filter poisoned")
        .contains(&key);
    if !might_exist {
        return false;
    }

    // 2. Moka cache, fast positive
    if TAKEN_CACHE.get(&key).await.unwrap_or(false) {
        return true;
    }

    // 3. Database fallback
    sqlx::query_scalar::<_, bool>(exists_sql)
        .bind(raw.trim().to_lowercase())
        .fetch_one(pool)
        .await
        .unwrap_or(true) // fail-safe: treat lookup failures as taken
}

/// true  => username AVAILABLE
/// false => username TAKEN
pub async fn is_username_available(username: &str, pool: &MySqlPool) -> bool {
    !is_taken(
        username_key(username),
        pool,
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ? LIMIT 1)",
        username,
    )
    .await
}

/// true  => email AVAILABLE
/// false => email TAKEN
pub async fn is_email_available(email: &str, pool: &MySqlPool) -> bool {
    !is_taken(
        email_key(email),
        pool,
        "SELECT EXISTS(SELECT 1 FROM volunteers WHERE email = ? LIMIT 1)",
        email,
    )
    .await
}

pub async fn mark_username_taken(username: &str) {
    let key = username_key(username);
    filter_insert(key.clone());
    TAKEN_CACHE.insert(key, true).await;
}

pub async fn mark_email_taken(email: &str) {
    let key = email_key(email);
    filter_insert(key.clone());
    TAKEN_CACHE.insert(key, true).await;
}

async fn mark_batch(keys: &[String]) {
    for key in keys {
        filter_insert(key.clone());
    }
    let futures: Vec<_> = keys
        .iter()
        .map(|k| TAKEN_CACHE.insert(k.clone(), true))
        .collect();
    futures::future::join_all(futures).await;
}

/// Warm the filter with every registered username and email, streamed in
/// batches so startup does not hold the whole table in memory.
pub async fn warmup_filter(pool: &MySqlPool, batch_size: usize) -> Result<()> {
    let mut total = 0usize;

    for (sql, keyer) in [
        (
            "SELECT username FROM users",
            username_key as fn(&str) -> String,
        ),
        ("SELECT email FROM volunteers", email_key),
    ] {
        let mut stream = sqlx::query_as::<_, (String,)>(sql).fetch(pool);
        let mut batch = Vec::with_capacity(batch_size);

        while let Some(row) = stream.next().await {
            let (value,) = row.map_err(|e| anyhow!("DB row fetch failed: {}", e))?;
            batch.push(keyer(&value));
            total += 1;

            if batch.len() == batch_size {
                for key in batch.drain(..) {
                    filter_insert(key);
                }
            }
        }

        for key in batch {
            filter_insert(key);
        }
    }

    log::info!("Availability filter warmup complete: {} keys", total);
    Ok(())
}

/// Load RECENT registrations into the in-memory cache (batched); older keys
/// fall through to the DB on first touch.
pub async fn warmup_recent_cache(pool: &MySqlPool, days: u32, batch_size: usize) -> Result<()> {
    let mut stream = sqlx::query_as::<_, (String, String)>(
        r#"
        SELECT u.username, v.email
        FROM users u
        JOIN volunteers v ON v.id = u.volunteer_id
        WHERE v.joined_at >= NOW() - INTERVAL ? DAY
        ORDER BY v.joined_at DESC
        "#,
    )
    .bind(days)
    .fetch(pool);

    let mut batch = Vec::with_capacity(batch_size * 2);
    let mut total = 0usize;

    while let Some(row) = stream.next().await {
        let (username, email) = row?;
        batch.push(username_key(&username));
        batch.push(email_key(&email));
        total += 1;

        if batch.len() >= batch_size * 2 {
            mark_batch(&batch).await;
            batch.clear();
        }
    }

    if !batch.is_empty() {
        mark_batch(&batch).await;
    }

    log::info!(
        "Availability cache warmup complete: {} recent registrations (last {} days)",
        total,
        days
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_normalized_and_prefixed() {
        assert_eq!(username_key("  JDoe "), "u:jdoe");
        assert_eq!(email_key("Jane.Doe@Example.ORG"), "e:jane.doe@example.org");
        // same value in both namespaces must not collide
        assert_ne!(username_key("x"), email_key("x"));
    }

    fn in_filter(key: &String) -> bool {
        TAKEN_FILTER.read().unwrap().contains(key)
    }

    #[actix_web::test]
    async fn test_mark_taken_hits_filter_and_cache() {
        mark_username_taken("FilterProbe").await;
        assert!(in_filter(&username_key("filterprobe")));
        assert_eq!(
            TAKEN_CACHE.get(&username_key("filterprobe")).await,
            Some(true)
        );

        mark_email_taken("probe@example.org").await;
        assert!(in_filter(&email_key("PROBE@example.org")));
    }

    #[test]
    fn test_unknown_key_misses_filter() {
        assert!(!in_filter(&username_key("never-registered-anywhere-7f3a")));
    }
}
