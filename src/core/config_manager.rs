// src/core/config_manager.rs
//! Unified configuration management: defaults, optional config.yaml, then env overrides

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone)]
pub struct ConfigManager {
    pub environment: EnvironmentConfig,
    pub service: ServiceConfig,
    pub auth: AuthSettings,
    pub cache: CacheSettings,
    pub analytics: AnalyticsSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub database_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub ai_service_url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub issuer: String,
    pub audience: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub match_ttl_seconds: u64,
    pub salary_ttl_seconds: u64,
    pub questions_ttl_seconds: u64,
    pub search_ttl_seconds: u64,
    pub max_entries: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyticsSettings {
    pub segment_refresh_seconds: u64,
    pub power_user_weekly_events: i64,
    pub active_user_weekly_events: i64,
    pub new_user_days: i64,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("hireflow.db"),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            ai_service_url: "http://127.0.0.1:5555".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: "dev-secret-change-me".to_string(),
            issuer: "hireflow".to_string(),
            audience: "hireflow-api".to_string(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            match_ttl_seconds: 60 * 60,
            salary_ttl_seconds: 24 * 60 * 60,
            questions_ttl_seconds: 6 * 60 * 60,
            search_ttl_seconds: 5 * 60,
            max_entries: 10_000,
        }
    }
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            segment_refresh_seconds: 60 * 60,
            power_user_weekly_events: 20,
            active_user_weekly_events: 5,
            new_user_days: 7,
        }
    }
}

/// One environment block of config.yaml
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileSection {
    environment: Option<EnvironmentConfig>,
    service: Option<ServiceConfig>,
    auth: Option<AuthSettings>,
    cache: Option<CacheSettings>,
    analytics: Option<AnalyticsSettings>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    local: FileSection,
    production: FileSection,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self {
            environment: EnvironmentConfig::default(),
            service: ServiceConfig::default(),
            auth: AuthSettings::default(),
            cache: CacheSettings::default(),
            analytics: AnalyticsSettings::default(),
        }
    }
}

impl ConfigManager {
    /// Load all configurations from config.yaml (if present) and the environment
    pub fn load() -> Result<Self> {
        let env = Self::environment_name();
        info!("Loading configuration for environment: {}", env);

        let mut config = Self::default();
        let config_path = PathBuf::from("config.yaml");
        if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).context("Failed to read config.yaml")?;
            config.apply_file(&content, &env)?;
        }

        config.apply_env(|key| std::env::var(key).ok())?;
        config.environment.database_path = Self::resolve_path(&config.environment.database_path)?;
        Ok(config)
    }

    fn environment_name() -> String {
        std::env::var("HIREFLOW_ENV")
            .or_else(|_| std::env::var("ENVIRONMENT"))
            .unwrap_or_else(|_| "local".to_string())
    }

    fn apply_file(&mut self, content: &str, env: &str) -> Result<()> {
        let file: ConfigFile =
            serde_yaml::from_str(content).context("Failed to parse config.yaml")?;

        let section = match env {
            "production" => file.production,
            _ => file.local,
        };

        if let Some(environment) = section.environment {
            self.environment = environment;
        }
        if let Some(service) = section.service {
            self.service = service;
        }
        if let Some(auth) = section.auth {
            self.auth = auth;
        }
        if let Some(cache) = section.cache {
            self.cache = cache;
        }
        if let Some(analytics) = section.analytics {
            self.analytics = analytics;
        }
        Ok(())
    }

    fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("DATABASE_PATH") {
            self.environment.database_path = PathBuf::from(path);
        }
        if let Some(url) = lookup("AI_SERVICE_URL") {
            self.service.ai_service_url = url.trim_end_matches('/').to_string();
        }
        if let Some(timeout) = lookup("AI_SERVICE_TIMEOUT") {
            self.service.timeout_seconds = timeout
                .parse()
                .context("AI_SERVICE_TIMEOUT must be a number of seconds")?;
        }
        if let Some(secret) = lookup("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(refresh) = lookup("SEGMENT_REFRESH_SECONDS") {
            self.analytics.segment_refresh_seconds = refresh
                .parse()
                .context("SEGMENT_REFRESH_SECONDS must be a number of seconds")?;
        }
        Ok(())
    }

    fn resolve_path(path: &Path) -> Result<PathBuf> {
        if path.is_absolute() {
            Ok(path.to_path_buf())
        } else {
            let current_dir = std::env::current_dir().context("Failed to get current directory")?;
            Ok(current_dir.join(path))
        }
    }

    /// Ensure all required directories exist
    pub async fn ensure_directories(&self) -> Result<()> {
        if let Some(db_parent) = self.environment.database_path.parent() {
            tokio::fs::create_dir_all(db_parent)
                .await
                .with_context(|| {
                    format!("Failed to create database directory: {}", db_parent.display())
                })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_file_section_overrides_defaults() {
        let yaml = r#"
local:
  service:
    ai_service_url: "http://ai.local:9000"
  cache:
    match_ttl_seconds: 10
production:
  service:
    ai_service_url: "http://ai.prod"
"#;
        let mut config = ConfigManager::default();
        config.apply_file(yaml, "local").unwrap();

        assert_eq!(config.service.ai_service_url, "http://ai.local:9000");
        assert_eq!(config.service.timeout_seconds, 30);
        assert_eq!(config.cache.match_ttl_seconds, 10);
        assert_eq!(config.cache.max_entries, 10_000);
    }

    #[test]
    fn test_production_section_selected() {
        let yaml = "production:\n  auth:\n    jwt_secret: prod-secret\n";
        let mut config = ConfigManager::default();
        config.apply_file(yaml, "production").unwrap();
        assert_eq!(config.auth.jwt_secret, "prod-secret");
        assert_eq!(config.auth.issuer, "hireflow");
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("AI_SERVICE_URL", "http://ai:1234/"),
            ("AI_SERVICE_TIMEOUT", "5"),
            ("SEGMENT_REFRESH_SECONDS", "120"),
        ]
        .into_iter()
        .collect();

        let mut config = ConfigManager::default();
        config
            .apply_env(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.service.ai_service_url, "http://ai:1234");
        assert_eq!(config.service.timeout_seconds, 5);
        assert_eq!(config.analytics.segment_refresh_seconds, 120);
    }

    #[test]
    fn test_invalid_env_number_is_rejected() {
        let mut config = ConfigManager::default();
        let result = config.apply_env(|key| {
            (key == "AI_SERVICE_TIMEOUT").then(|| "soon".to_string())
        });
        assert!(result.is_err());
    }
}
