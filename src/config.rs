#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Environment-driven runtime configuration.
//!
//! Read once, on first use, into a shared [`ConfigHandle`]. The library types
//! never read this themselves: engine and grader settings are plain values
//! handed to their constructors, and this module only assembles them for the
//! binary.

use std::{
    fmt::Display,
    path::PathBuf,
    str::FromStr,
    sync::{Arc, Mutex, OnceLock},
    time::Duration,
};

use anyhow::{Context, Result, anyhow, ensure};
use reqwest::Client;
use tokio::sync::Semaphore;

use crate::{
    agent::{HttpAgent, HttpAgentConfig, OpenAiAgent, OpenAiAgentConfig, ScoringAgent},
    consensus::{ConsensusEngine, ConsensusSettings, OpinionBounds},
    constants::{
        DEFAULT_ADDR, DEFAULT_AGENT_TIMEOUT, DEFAULT_CONFIDENCE_THRESHOLD,
        DEFAULT_MAX_CONCURRENT_QUERIES, DEFAULT_MIN_CONFIDENCE,
    },
    grade::{AssignmentGrader, GraderSettings, MissingCriterionPolicy},
    schema::{DirectorySchemaStore, SampleSchemaStore, SchemaStore},
};

/// OpenAI credentials and the models to query, sourced from the environment.
#[derive(Clone)]
pub struct OpenAiEnv {
    /// Base URL for the OpenAI-compatible API endpoint.
    api_base:    String,
    /// API key used to authenticate OpenAI requests.
    api_key:     String,
    /// One scoring agent is built per model.
    models:      Vec<String>,
    /// Optional temperature override, if provided.
    temperature: Option<f32>,
}

impl OpenAiEnv {
    /// Construct an `OpenAiEnv` from environment variables; returns `None` if
    /// any required field is missing, and an error if the temperature does
    /// not parse.
    fn from_env() -> Result<Option<Self>> {
        let (Ok(api_base), Ok(api_key)) =
            (std::env::var("OPENAI_ENDPOINT"), std::env::var("OPENAI_API_KEY"))
        else {
            return Ok(None);
        };
        let (api_base, api_key) = (api_base.trim().to_owned(), api_key.trim().to_owned());
        let models = std::env::var("OPENAI_MODELS")
            .or_else(|_| std::env::var("OPENAI_MODEL"))
            .ok()
            .map(|raw| split_list(&raw))
            .unwrap_or_default();

        if api_base.is_empty() || api_key.is_empty() || models.is_empty() {
            return Ok(None);
        }

        let temperature = read_setting::<f32>("OPENAI_TEMPERATURE")?;

        Ok(Some(Self {
            api_base,
            api_key,
            models,
            temperature,
        }))
    }

    /// Returns the API base URL used for OpenAI requests.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Returns the configured model identifiers.
    pub fn models(&self) -> &[String] {
        &self.models
    }

    /// Returns the configured temperature, if any.
    pub fn temperature(&self) -> Option<f32> {
        self.temperature
    }

    /// One agent configuration per model.
    fn agent_configs(&self) -> Vec<OpenAiAgentConfig> {
        self.models
            .iter()
            .map(|model| {
                OpenAiAgentConfig::builder()
                    .api_base(self.api_base.clone())
                    .api_key(self.api_key.clone())
                    .model(model.clone())
                    .maybe_temperature(self.temperature)
                    .build()
            })
            .collect()
    }
}

/// Runtime configuration shared across the binary.
pub struct ConfigState {
    /// Shared reqwest HTTP client reused by HTTP scoring agents.
    http_client:       Client,
    /// Cached OpenAI configuration, if available.
    openai:            Option<OpenAiEnv>,
    /// Scoring service endpoints, one agent each.
    scoring_endpoints: Vec<String>,
    /// Bearer token sent to every scoring service.
    scoring_token:     Option<String>,
    /// Consensus engine tunables.
    consensus:         ConsensusSettings,
    /// Grader tunables.
    grader:            GraderSettings,
    /// Directory of `<assignment>.json` schemas, if configured.
    schema_dir:        Option<PathBuf>,
    /// Address the HTTP API binds to.
    addr:              String,
}

impl ConfigState {
    /// Construct a new configuration instance by reading the environment.
    fn new() -> Result<Self> {
        let http_client = Client::builder()
            .build()
            .context("Failed to construct shared HTTP client")?;

        let scoring_endpoints = std::env::var("SCORING_SERVICE_ENDPOINTS")
            .map(|raw| split_list(&raw))
            .unwrap_or_default();
        let scoring_token = std::env::var("SCORING_SERVICE_TOKEN")
            .ok()
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty());

        let bounds: OpinionBounds = read_setting("OPINION_BOUNDS")?.unwrap_or_default();
        let agent_timeout = read_setting("AGENT_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_AGENT_TIMEOUT);
        let consensus = ConsensusSettings::builder()
            .min_confidence(
                read_confidence("CONSENSUS_MIN_CONFIDENCE")?.unwrap_or(DEFAULT_MIN_CONFIDENCE),
            )
            .agent_timeout(agent_timeout)
            .max_concurrent_queries(
                read_concurrency("AGENT_MAX_CONCURRENCY")?
                    .unwrap_or(DEFAULT_MAX_CONCURRENT_QUERIES),
            )
            .bounds(bounds)
            .build();

        let missing_policy: MissingCriterionPolicy =
            read_setting("MISSING_CRITERION_POLICY")?.unwrap_or_default();
        let grader = GraderSettings::builder()
            .confidence_threshold(
                read_confidence("GRADER_CONFIDENCE_THRESHOLD")?
                    .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
            )
            .missing_policy(missing_policy)
            .build();

        let schema_dir = std::env::var("GRADER_SCHEMA_DIR")
            .ok()
            .filter(|d| !d.trim().is_empty())
            .map(PathBuf::from);
        let addr = std::env::var("GRADER_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());

        Ok(Self {
            http_client,
            openai: OpenAiEnv::from_env()?,
            scoring_endpoints,
            scoring_token,
            consensus,
            grader,
            schema_dir,
            addr,
        })
    }

    /// Returns a clone of the shared reqwest HTTP client.
    pub fn http_client(&self) -> Client {
        self.http_client.clone()
    }

    /// Returns the OpenAI configuration, if all required environment variables
    /// are present.
    pub fn openai(&self) -> Option<&OpenAiEnv> {
        self.openai.as_ref()
    }

    /// Returns the consensus engine settings.
    pub fn consensus(&self) -> &ConsensusSettings {
        &self.consensus
    }

    /// Returns the grader settings.
    pub fn grader(&self) -> &GraderSettings {
        &self.grader
    }

    /// Returns the schema directory, if configured.
    pub fn schema_dir(&self) -> Option<&PathBuf> {
        self.schema_dir.as_ref()
    }

    /// Returns the address the HTTP API binds to.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Builds every configured agent, chat models first, in a stable order.
    pub fn agents(&self) -> Vec<Arc<dyn ScoringAgent>> {
        let mut agents: Vec<Arc<dyn ScoringAgent>> = Vec::new();

        if let Some(openai) = &self.openai {
            for cfg in openai.agent_configs() {
                agents.push(Arc::new(OpenAiAgent::new(cfg)));
            }
        }

        for endpoint in &self.scoring_endpoints {
            let cfg = HttpAgentConfig::builder()
                .endpoint(endpoint.clone())
                .maybe_token(self.scoring_token.clone())
                .build();
            agents.push(Arc::new(HttpAgent::with_client(cfg, self.http_client())));
        }

        agents
    }

    /// Builds a grader over every configured agent.
    pub fn grader_instance(&self) -> AssignmentGrader {
        let agents = self.agents();
        if agents.is_empty() {
            tracing::warn!(
                "No scoring agents configured; set OPENAI_ENDPOINT, OPENAI_API_KEY and \
                 OPENAI_MODELS, or SCORING_SERVICE_ENDPOINTS. Every criterion will need review."
            );
        }
        AssignmentGrader::new(
            ConsensusEngine::new(agents, self.consensus.clone()),
            self.grader.clone(),
        )
    }

    /// Returns the schema store: the configured directory, or the sample
    /// rubric when none is set.
    pub fn schema_store(&self) -> Arc<dyn SchemaStore> {
        match &self.schema_dir {
            Some(dir) => Arc::new(DirectorySchemaStore::new(dir.clone())),
            None => {
                tracing::warn!("GRADER_SCHEMA_DIR is not set, serving the sample schema");
                Arc::new(SampleSchemaStore)
            }
        }
    }
}

/// Shared configuration handle used throughout the crate.
#[derive(Clone)]
pub struct ConfigHandle(Arc<ConfigState>);

impl std::ops::Deref for ConfigHandle {
    type Target = ConfigState;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Global storage for the lazily constructed configuration state.
static CONFIG_SLOT: OnceLock<Mutex<Option<Arc<ConfigState>>>> = OnceLock::new();

/// Returns the mutex guarding the global configuration slot.
fn slot() -> &'static Mutex<Option<Arc<ConfigState>>> {
    CONFIG_SLOT.get_or_init(|| Mutex::new(None))
}

/// Ensure the global configuration has been initialized and return a handle.
pub fn ensure_initialized() -> Result<ConfigHandle> {
    let slot = slot();
    let mut guard = slot.lock().expect("config slot poisoned");
    if let Some(cfg) = guard.as_ref() {
        return Ok(ConfigHandle(Arc::clone(cfg)));
    }

    let cfg = Arc::new(ConfigState::new()?);
    *guard = Some(Arc::clone(&cfg));
    Ok(ConfigHandle(cfg))
}

/// Splits a comma separated list, dropping blanks.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Reads an environment variable, treating unset or blank as `None`.
fn read_env(env: &str) -> Option<String> {
    std::env::var(env).ok().filter(|value| !value.trim().is_empty())
}

/// Parses a setting's value. Bad values are errors, never silently replaced
/// by the default.
fn parse_setting<T>(env: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| anyhow!("Invalid value for {env} (`{}`): {e}", value.trim()))
}

/// Parses a confidence threshold, which must lie within [0, 1].
fn parse_confidence(env: &str, value: &str) -> Result<f64> {
    let confidence: f64 = parse_setting(env, value)?;
    ensure!(
        (0.0..=1.0).contains(&confidence),
        "{env} must be between 0 and 1, got {confidence}"
    );
    Ok(confidence)
}

/// Parses a concurrency limit, which a semaphore must be able to hold.
fn parse_concurrency(env: &str, value: &str) -> Result<usize> {
    let limit: usize = parse_setting(env, value)?;
    ensure!(
        (1..=Semaphore::MAX_PERMITS).contains(&limit),
        "{env} must be between 1 and {}, got {limit}",
        Semaphore::MAX_PERMITS
    );
    Ok(limit)
}

/// Reads and parses an optional setting.
fn read_setting<T>(env: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    read_env(env)
        .map(|value| parse_setting(env, &value))
        .transpose()
}

/// Reads an optional confidence threshold.
fn read_confidence(env: &str) -> Result<Option<f64>> {
    read_env(env)
        .map(|value| parse_confidence(env, &value))
        .transpose()
}

/// Reads an optional concurrency limit.
fn read_concurrency(env: &str) -> Result<Option<usize>> {
    read_env(env)
        .map(|value| parse_concurrency(env, &value))
        .transpose()
}
