use sqlx::{postgres::PgPoolOptions, PgPool};

/// Tables owned by this service. Every statement is idempotent.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS geocoding_cache (
        address     TEXT PRIMARY KEY,
        lat         DOUBLE PRECISION NOT NULL,
        lng         DOUBLE PRECISION NOT NULL,
        normalized  TEXT NOT NULL,
        provider    TEXT NOT NULL,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS map_data_cache (
        query_hash  TEXT PRIMARY KEY,
        query       TEXT NOT NULL,
        response    TEXT NOT NULL,
        checksum    TEXT NOT NULL,
        expires_at  TIMESTAMPTZ NOT NULL,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS map_data_cache_expires_at_idx ON map_data_cache (expires_at)",
    r#"
    CREATE TABLE IF NOT EXISTS audit_log (
        id           UUID PRIMARY KEY,
        piva         TEXT NOT NULL,
        field        TEXT NOT NULL,
        value        JSONB NOT NULL,
        source       TEXT NOT NULL,
        method       TEXT NOT NULL,
        confidence   TEXT NOT NULL,
        recorded_at  TIMESTAMPTZ NOT NULL,
        request_id   UUID NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS audit_log_piva_idx ON audit_log (piva, recorded_at DESC)",
];

pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Creates the cache and audit tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::info!("Database schema ready");
        Ok(())
    }
}
