// src/core/database.rs
//! Database connection management and schema migrations

use anyhow::{Context, Result};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::info;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS tenants (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT UNIQUE COLLATE NOCASE,
        domain TEXT UNIQUE COLLATE NOCASE,
        tenant_name TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        CONSTRAINT email_or_domain_check CHECK (
            (email IS NOT NULL AND domain IS NULL) OR
            (email IS NULL AND domain IS NOT NULL)
        )
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_tenants_tenant_name ON tenants(tenant_name)",
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        tenant_id INTEGER NOT NULL REFERENCES tenants(id),
        email TEXT NOT NULL UNIQUE COLLATE NOCASE,
        display_name TEXT,
        role TEXT NOT NULL,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TEXT NOT NULL,
        last_seen_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_users_tenant ON users(tenant_id)",
    r#"
    CREATE TABLE IF NOT EXISTS jobs (
        id BLOB PRIMARY KEY,
        tenant_id INTEGER NOT NULL REFERENCES tenants(id),
        title TEXT NOT NULL,
        company TEXT NOT NULL,
        location TEXT NOT NULL DEFAULT '',
        description TEXT NOT NULL DEFAULT '',
        employment_type TEXT NOT NULL,
        remote BOOLEAN NOT NULL DEFAULT FALSE,
        salary_min INTEGER,
        salary_max INTEGER,
        currency TEXT NOT NULL,
        skills TEXT NOT NULL DEFAULT '[]',
        source TEXT NOT NULL,
        source_url TEXT,
        status TEXT NOT NULL,
        posted_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE (tenant_id, source_url)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_jobs_status_posted ON jobs(status, posted_at)",
    r#"
    CREATE TABLE IF NOT EXISTS resumes (
        id BLOB PRIMARY KEY,
        user_id INTEGER NOT NULL REFERENCES users(id),
        title TEXT NOT NULL,
        summary TEXT NOT NULL DEFAULT '',
        skills TEXT NOT NULL DEFAULT '[]',
        experience_years INTEGER NOT NULL DEFAULT 0,
        content TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_resumes_user ON resumes(user_id)",
    r#"
    CREATE TABLE IF NOT EXISTS applications (
        id BLOB PRIMARY KEY,
        job_id BLOB NOT NULL REFERENCES jobs(id),
        user_id INTEGER NOT NULL REFERENCES users(id),
        resume_id BLOB,
        status TEXT NOT NULL,
        applied_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE (job_id, user_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS match_results (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        resume_id BLOB NOT NULL,
        job_id BLOB NOT NULL,
        score REAL NOT NULL,
        matched_skills TEXT NOT NULL,
        missing_skills TEXT NOT NULL,
        summary TEXT NOT NULL,
        source TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_match_results_pair ON match_results(resume_id, job_id)",
    r#"
    CREATE TABLE IF NOT EXISTS user_events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        tenant_id INTEGER NOT NULL,
        user_id INTEGER NOT NULL,
        event_type TEXT NOT NULL,
        metadata TEXT NOT NULL DEFAULT '{}',
        occurred_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_user_events_tenant_time ON user_events(tenant_id, occurred_at)",
    "CREATE INDEX IF NOT EXISTS idx_user_events_user ON user_events(user_id, occurred_at)",
    r#"
    CREATE TABLE IF NOT EXISTS user_funnel_stages (
        user_id INTEGER NOT NULL,
        tenant_id INTEGER NOT NULL,
        stage TEXT NOT NULL,
        reached_at TEXT NOT NULL,
        PRIMARY KEY (user_id, stage)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_funnel_tenant ON user_funnel_stages(tenant_id, stage)",
    r#"
    CREATE TABLE IF NOT EXISTS user_segments (
        user_id INTEGER PRIMARY KEY,
        tenant_id INTEGER NOT NULL,
        segment TEXT NOT NULL,
        events_7d INTEGER NOT NULL,
        events_30d INTEGER NOT NULL,
        computed_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_user_segments_tenant ON user_segments(tenant_id)",
];

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create new database connection with automatic setup
    pub async fn connect(database_path: &Path) -> Result<Self> {
        if let Some(parent) = database_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create database directory")?;
        }

        let database_url = format!("sqlite:{}?mode=rwc", database_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(&database_url)
            .await
            .with_context(|| {
                format!("Failed to connect to database: {}", database_path.display())
            })?;

        info!("Database connection established: {}", database_path.display());

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Private in-memory database; a single connection so every query sees the same data
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory database")?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Get pool reference for custom operations
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Database migration failed")?;
        }

        info!("Database migrations completed");
        Ok(())
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("Database health check failed")?;
        Ok(())
    }
}
