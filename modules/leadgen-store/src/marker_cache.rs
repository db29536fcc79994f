//! Seen-marker cache kept in an unlogged Postgres table, so markers outlive
//! the process that wrote them. Expiry is judged by the database clock.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;

use leadgen_dedup::{CacheError, FastCache, KeyTtl};

#[derive(Clone)]
pub struct PgMarkerCache {
    pool: PgPool,
}

impl PgMarkerCache {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn unavailable(err: sqlx::Error) -> CacheError {
    CacheError::Unavailable(err.to_string())
}

#[async_trait]
impl FastCache for PgMarkerCache {
    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM seen_markers WHERE key = $1 AND (expires_at IS NULL OR expires_at > now()))",
        )
        .bind(key)
        .fetch_one(&self.pool)
        .await
        .map_err(unavailable)
    }

    async fn set_with_ttl(&self, key: &str, ttl: Duration) -> Result<(), CacheError> {
        chrono::Duration::from_std(ttl).map_err(|_| CacheError::TtlOutOfRange(ttl))?;

        sqlx::query(
            r#"
            INSERT INTO seen_markers (key, expires_at)
            VALUES ($1, now() + make_interval(secs => $2))
            ON CONFLICT (key) DO UPDATE SET expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(key)
        .bind(ttl.as_secs_f64())
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl, CacheError> {
        let remaining = sqlx::query_scalar::<_, Option<f64>>(
            r#"
            SELECT EXTRACT(EPOCH FROM expires_at - now())::float8
            FROM seen_markers
            WHERE key = $1 AND (expires_at IS NULL OR expires_at > now())
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(match remaining {
            None => KeyTtl::Missing,
            Some(None) => KeyTtl::Persistent,
            Some(Some(secs)) => KeyTtl::Expires(Duration::from_secs_f64(secs.max(0.0))),
        })
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, CacheError> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT key FROM seen_markers
            WHERE starts_with(key, $1) AND (expires_at IS NULL OR expires_at > now())
            ORDER BY key
            "#,
        )
        .bind(prefix)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let result = sqlx::query("DELETE FROM seen_markers WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(result.rows_affected() > 0)
    }

    async fn purge_expired(&self) -> Result<usize, CacheError> {
        let result = sqlx::query("DELETE FROM seen_markers WHERE expires_at <= now()")
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(result.rows_affected() as usize)
    }
}
