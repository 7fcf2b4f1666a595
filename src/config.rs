//! Service configuration
//!
//! Loads `config.yml` (current directory, then parent), falling back to
//! built-in defaults. `.env` is loaded first; YAML string values written as
//! `${VAR}` are resolved from the environment, and the well-known variables
//! (`NEO4J_URI`, `GROQ_API_KEY`, ...) take precedence over literal values.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::{Error, Result};

pub const DEFAULT_NEO4J_URI: &str = "bolt://localhost:7687";
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_LLM_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_FEED_URL: &str = "https://techcrunch.com/feed/";
pub const DEFAULT_FEED_ITEMS: usize = 3;
/// Six hours.
pub const DEFAULT_SCHEDULE_SECS: u64 = 6 * 60 * 60;
pub const DEFAULT_NEIGHBORHOOD_LIMIT: usize = 50;
pub const DEFAULT_GLOBAL_SAMPLE_LIMIT: usize = 20;
pub const DEFAULT_GRAPH_EXPORT_LIMIT: usize = 500;
pub const DEFAULT_SERVER_ADDR: &str = "0.0.0.0:8000";

/// What happens when an existing node id is merged again with another type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeTypePolicy {
    /// The type recorded on creation is kept.
    #[default]
    FirstWins,
    /// The most recently observed type replaces the previous one.
    LastWins,
    /// Every observed type is accumulated; the first stays the display group.
    MultiType,
}

/// Graph store implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Neo4j,
    /// In-process store, contents are lost on exit.
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Neo4jConfig {
    pub uri: String,
    pub username: String,
    pub password: String,
    pub query_timeout_secs: u64,
}

impl Default for Neo4jConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_NEO4J_URI.to_string(),
            username: "neo4j".to_string(),
            password: String::new(),
            query_timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Neo4j,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            temperature: 0.0,
            max_tokens: 2048,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub url: String,
    pub max_items: usize,
    pub timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEED_URL.to_string(),
            max_items: DEFAULT_FEED_ITEMS,
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Skip articles whose link was already ingested.
    pub dedupe_by_url: bool,
    pub node_type_policy: NodeTypePolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            dedupe_by_url: true,
            node_type_policy: NodeTypePolicy::FirstWins,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    /// Skip a tick while the previous run is still in progress.
    pub serialize_runs: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: DEFAULT_SCHEDULE_SECS,
            serialize_runs: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QaConfig {
    pub neighborhood_limit: usize,
    pub global_sample_limit: usize,
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            neighborhood_limit: DEFAULT_NEIGHBORHOOD_LIMIT,
            global_sample_limit: DEFAULT_GLOBAL_SAMPLE_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
    pub graph_export_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_SERVER_ADDR.to_string(),
            graph_export_limit: DEFAULT_GRAPH_EXPORT_LIMIT,
        }
    }
}

/// Main configuration struct
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub neo4j: Neo4jConfig,
    pub store: StoreConfig,
    pub llm: LlmConfig,
    pub feed: FeedConfig,
    pub ingest: IngestConfig,
    pub scheduler: SchedulerConfig,
    pub qa: QaConfig,
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from config.yml or use defaults.
    /// Environment variables take precedence over config.yml values.
    pub fn new() -> Self {
        Self::load_from_file("config.yml")
            .or_else(|_| Self::load_from_file("../config.yml"))
            .unwrap_or_else(|_| {
                Self::load_dotenv();
                let mut config = Self::default();
                config.apply_env();
                config
            })
    }

    /// Load .env file into environment variables using dotenvy
    fn load_dotenv() {
        if dotenvy::dotenv().is_err() {
            let _ = dotenvy::from_filename("../.env");
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_dotenv();

        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let mut config = Self::from_yaml(&content)?;
        config.apply_env();
        Ok(config)
    }

    /// Parse YAML without consulting the environment.
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Resolve `${VAR}` placeholders and apply env overrides.
    fn apply_env(&mut self) {
        self.neo4j.uri = resolve_env_string(&self.neo4j.uri, &["NEO4J_URI"]);
        self.neo4j.username =
            resolve_env_string(&self.neo4j.username, &["NEO4J_USERNAME", "NEO4J_USER"]);
        self.neo4j.password = resolve_env_string(&self.neo4j.password, &["NEO4J_PASSWORD"]);
        self.llm.api_key = resolve_env_string(&self.llm.api_key, &["GROQ_API_KEY", "LLM_API_KEY"]);
        self.llm.base_url = resolve_env_string(&self.llm.base_url, &["LLM_BASE_URL"]);
        self.llm.model = resolve_env_string(&self.llm.model, &["LLM_MODEL"]);
        self.feed.url = resolve_env_string(&self.feed.url, &["FEED_URL"]);
        self.server.addr = resolve_env_string(&self.server.addr, &["SERVER_ADDR"]);

        if let Some(secs) = std::env::var("SCHEDULE_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            self.scheduler.interval_secs = secs;
        }
    }

    /// Reject values the pipelines cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.interval_secs == 0 {
            return Err(Error::Config("scheduler.interval_secs must be > 0".into()));
        }
        if self.feed.max_items == 0 {
            return Err(Error::Config("feed.max_items must be > 0".into()));
        }
        if self.qa.neighborhood_limit == 0 || self.qa.global_sample_limit == 0 {
            return Err(Error::Config("qa limits must be > 0".into()));
        }
        Ok(())
    }
}

/// Resolve a value: `${VAR}` placeholders first, then the listed env keys,
/// then the literal value.
fn resolve_env_string(value: &str, env_keys: &[&str]) -> String {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        if let Ok(env_val) = std::env::var(var_name) {
            return env_val;
        }
    }
    for key in env_keys {
        if let Ok(env_val) = std::env::var(key) {
            if !env_val.is_empty() {
                return env_val;
            }
        }
    }
    if value.starts_with("${") {
        return String::new();
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{LazyLock, Mutex};

    static ENV_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

    struct EnvGuard {
        key: String,
        original: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &str, value: &str) -> Self {
            let original = std::env::var(key).ok();
            std::env::set_var(key, value);
            Self {
                key: key.to_string(),
                original,
            }
        }

        fn unset(key: &str) -> Self {
            let original = std::env::var(key).ok();
            std::env::remove_var(key);
            Self {
                key: key.to_string(),
                original,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.original {
                Some(value) => std::env::set_var(&self.key, value),
                None => std::env::remove_var(&self.key),
            }
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.feed.max_items, 3);
        assert_eq!(config.scheduler.interval_secs, 21_600);
        assert!(config.scheduler.serialize_runs);
        assert_eq!(config.ingest.node_type_policy, NodeTypePolicy::FirstWins);
        assert_eq!(config.qa.neighborhood_limit, 50);
        assert_eq!(config.qa.global_sample_limit, 20);
        assert_eq!(config.server.graph_export_limit, 500);
        assert_eq!(config.llm.model, DEFAULT_LLM_MODEL);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = Config::from_yaml(
            "ingest:\n  node_type_policy: multi_type\nqa:\n  neighborhood_limit: 10\n",
        )
        .unwrap();
        assert_eq!(config.ingest.node_type_policy, NodeTypePolicy::MultiType);
        assert!(config.ingest.dedupe_by_url);
        assert_eq!(config.qa.neighborhood_limit, 10);
        assert_eq!(config.qa.global_sample_limit, 20);
    }

    #[test]
    fn test_unknown_policy_is_rejected() {
        let err = Config::from_yaml("ingest:\n  node_type_policy: random\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_placeholder_resolved_from_env() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _key = EnvGuard::set("INSIDER_TEST_NEO4J_PASS", "s3cret");
        let _pass = EnvGuard::unset("NEO4J_PASSWORD");

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "neo4j:\n  password: \"${{INSIDER_TEST_NEO4J_PASS}}\"").unwrap();

        let config = Config::load_from_file(file.path()).unwrap();
        assert_eq!(config.neo4j.password, "s3cret");
    }

    #[test]
    fn test_env_overrides_literal_yaml() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _model = EnvGuard::set("LLM_MODEL", "llama-3.1-8b-instant");
        let _interval = EnvGuard::set("SCHEDULE_INTERVAL_SECS", "60");

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "llm:\n  model: gpt-4o-mini\nscheduler:\n  interval_secs: 3600").unwrap();

        let config = Config::load_from_file(file.path()).unwrap();
        assert_eq!(config.llm.model, "llama-3.1-8b-instant");
        assert_eq!(config.scheduler.interval_secs, 60);
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = Config::default();
        config.scheduler.interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_errors() {
        let err = Config::load_from_file("/nonexistent/insider/config.yml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
