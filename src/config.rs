//! Runtime settings for the API server and the seeder
//!
//! Values come from environment variables (a `.env` file is honoured) with an
//! optional `config.yml` supplying defaults. Environment variables take
//! precedence; YAML values may reference them as `${VAR}`.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Default constants (fallback if neither env nor config.yml set them)
pub const DEFAULT_NEO4J_URI: &str = "bolt://localhost:7687";
pub const DEFAULT_NEO4J_USER: &str = "neo4j";
pub const DEFAULT_NEO4J_PASS: &str = "secret";
pub const DEFAULT_API_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_SEED_DOCUMENT: &str = "data/source.pdf";

/// Which seeding routine runs when seeding is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeedMode {
    /// Extract a knowledge graph from source documents (default)
    #[default]
    Extraction,
    /// Execute the bundled Cypher statements
    Statements,
}

impl FromStr for SeedMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "extraction" | "pdf" | "pipeline" => Ok(SeedMode::Extraction),
            "statements" | "cypher" | "fixed" => Ok(SeedMode::Statements),
            other => Err(format!("unknown seed mode: {}", other)),
        }
    }
}

/// YAML config structures
#[derive(Debug, Default, Deserialize)]
struct YamlConfig {
    neo4j: Option<Neo4jYaml>,
    models: Option<ModelsYaml>,
    seed: Option<SeedYaml>,
    api: Option<ApiYaml>,
    retry: Option<RetryYaml>,
}

#[derive(Debug, Default, Deserialize)]
struct Neo4jYaml {
    uri: Option<String>,
    user: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ModelsYaml {
    embedding: Option<String>,
    llm: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SeedYaml {
    enabled: Option<bool>,
    mode: Option<String>,
    documents: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiYaml {
    addr: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RetryYaml {
    max_attempts: Option<u32>,
    max_elapsed_secs: Option<u64>,
}

/// Neo4j connection parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neo4jSettings {
    pub uri: String,
    pub user: String,
    pub password: String,
}

/// Main settings struct
#[derive(Debug, Clone)]
pub struct Settings {
    pub neo4j: Neo4jSettings,
    /// Registry key for the embedding provider (`EMBEDDING_MODEL_TYPE`)
    pub embedding_model_type: Option<String>,
    /// Registry key for the generation provider (`LLM_MODEL_TYPE`)
    pub llm_model_type: Option<String>,
    /// Run seeding at process start (`SEED=true`)
    pub seed: bool,
    pub seed_mode: SeedMode,
    pub seed_documents: Vec<PathBuf>,
    pub api_addr: String,
    /// Optional cap on connection/seeding retries; unbounded when `None`
    pub max_retries: Option<u32>,
    pub max_retry_elapsed: Option<Duration>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

impl Settings {
    /// Load settings from config.yml (if present) with env overrides
    pub fn new() -> Self {
        Self::load_dotenv();
        let yaml = Self::read_yaml("config.yml")
            .or_else(|_| Self::read_yaml("../config.yml"))
            .unwrap_or_default();
        Self::from_yaml(yaml)
    }

    /// Load settings from a specific YAML file with env overrides
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        Self::load_dotenv();
        let yaml = Self::read_yaml(path)?;
        Ok(Self::from_yaml(yaml))
    }

    /// Settings from environment variables only
    pub fn from_env() -> Self {
        Self::from_yaml(YamlConfig::default())
    }

    fn read_yaml<P: AsRef<Path>>(path: P) -> Result<YamlConfig, String> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        serde_yaml::from_str(&content).map_err(|e| format!("Failed to parse config file: {}", e))
    }

    /// Load .env file into environment variables using dotenvy
    fn load_dotenv() {
        if dotenvy::dotenv().is_err() {
            let _ = dotenvy::from_filename("../.env");
        }
    }

    fn from_yaml(yaml: YamlConfig) -> Self {
        let neo4j = yaml.neo4j.unwrap_or_default();
        let models = yaml.models.unwrap_or_default();
        let seed = yaml.seed.unwrap_or_default();
        let api = yaml.api.unwrap_or_default();
        let retry = yaml.retry.unwrap_or_default();

        let seed_mode = Self::resolve_env_string(seed.mode, "SEED_MODE")
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();

        let seed_documents = match std::env::var("SEED_DOCUMENTS") {
            Ok(list) => parse_list(&list),
            Err(_) => seed.documents.unwrap_or_default(),
        };
        let seed_documents = if seed_documents.is_empty() {
            vec![PathBuf::from(DEFAULT_SEED_DOCUMENT)]
        } else {
            seed_documents.into_iter().map(PathBuf::from).collect()
        };

        let seed_enabled = match std::env::var("SEED") {
            Ok(value) => value == "true",
            Err(_) => seed.enabled.unwrap_or(false),
        };

        let max_retries = Self::resolve_env_parsed("NEO4J_MAX_RETRIES").or(retry.max_attempts);
        let max_retry_elapsed = Self::resolve_env_parsed::<u64>("NEO4J_MAX_RETRY_SECS")
            .or(retry.max_elapsed_secs)
            .map(Duration::from_secs);

        Self {
            neo4j: Neo4jSettings {
                uri: Self::resolve_env_string(neo4j.uri, "NEO4J_URI")
                    .unwrap_or_else(|| DEFAULT_NEO4J_URI.to_string()),
                user: Self::resolve_env_string(neo4j.user, "NEO4J_USER")
                    .unwrap_or_else(|| DEFAULT_NEO4J_USER.to_string()),
                password: Self::resolve_env_string(neo4j.password, "NEO4J_PASS")
                    .unwrap_or_else(|| DEFAULT_NEO4J_PASS.to_string()),
            },
            embedding_model_type: Self::resolve_env_string(models.embedding, "EMBEDDING_MODEL_TYPE"),
            llm_model_type: Self::resolve_env_string(models.llm, "LLM_MODEL_TYPE"),
            seed: seed_enabled,
            seed_mode,
            seed_documents,
            api_addr: Self::resolve_env_string(api.addr, "API_ADDR")
                .unwrap_or_else(|| DEFAULT_API_ADDR.to_string()),
            max_retries,
            max_retry_elapsed,
        }
    }

    /// Resolve a value: `${VAR}` placeholder first, then the explicit env key,
    /// then the literal YAML value.
    fn resolve_env_string(value: Option<String>, env_key: &str) -> Option<String> {
        if let Some(ref v) = value {
            if v.starts_with("${") && v.ends_with('}') {
                let var_name = &v[2..v.len() - 1];
                if let Ok(env_val) = std::env::var(var_name) {
                    return Some(env_val);
                }
            }
        }
        if let Ok(env_val) = std::env::var(env_key) {
            return Some(env_val);
        }
        value.filter(|v| !(v.starts_with("${") && v.ends_with('}')))
    }

    fn resolve_env_parsed<T: FromStr>(env_key: &str) -> Option<T> {
        std::env::var(env_key)
            .ok()
            .and_then(|v| v.trim().parse::<T>().ok())
    }

    /// Retry policy for connection establishment and statement seeding.
    ///
    /// Without caps this is the unbounded `2 * 2^n` seconds schedule.
    pub fn retry_policy(&self) -> RetryPolicy {
        let mut policy = RetryPolicy::unbounded();
        if let Some(max) = self.max_retries {
            policy = policy.with_max_attempts(max);
        }
        if let Some(elapsed) = self.max_retry_elapsed {
            policy = policy.with_max_elapsed(elapsed);
        }
        policy
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
