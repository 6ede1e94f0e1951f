#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Scoring agent that delegates to a remote scoring service over HTTP.

use async_trait::async_trait;
use bon::Builder;
use reqwest::Client;
use serde::Serialize;

use super::{AgentFailure, ScoringAgent, ScoringOpinion, parse_opinion};
use crate::schema::GradingCriterion;

/// Where and how to reach a scoring service.
///
/// The service receives `{"submission_text": ..., "criterion": {...}}` as a
/// JSON POST and answers with an opinion object.
#[derive(Clone, Builder)]
#[builder(on(String, into))]
pub struct HttpAgentConfig {
    /// Name reported in logs; defaults to the endpoint URL
    name:     Option<String>,
    /// URL the scoring request is posted to
    endpoint: String,
    /// Optional bearer token
    token:    Option<String>,
}

impl std::fmt::Debug for HttpAgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAgentConfig")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl HttpAgentConfig {
    /// Returns the endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Request body sent to the scoring service.
#[derive(Serialize)]
struct ScoreRequest<'a> {
    /// The plain submission text
    submission_text: &'a str,
    /// The criterion to score against
    criterion:       &'a GradingCriterion,
}

/// A [`ScoringAgent`] backed by a remote scoring service.
pub struct HttpAgent {
    /// Name reported in logs
    name:   String,
    /// Service settings
    config: HttpAgentConfig,
    /// HTTP client, reused across queries
    client: Client,
}

impl HttpAgent {
    /// Creates an agent with its own HTTP client.
    pub fn new(config: HttpAgentConfig) -> anyhow::Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self::with_client(config, client))
    }

    /// Creates an agent sharing an existing HTTP client.
    pub fn with_client(config: HttpAgentConfig, client: Client) -> Self {
        let name = config
            .name
            .clone()
            .unwrap_or_else(|| config.endpoint.clone());
        Self {
            name,
            config,
            client,
        }
    }
}

#[async_trait]
impl ScoringAgent for HttpAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn score(
        &self,
        submission_text: &str,
        criterion: &GradingCriterion,
    ) -> Result<ScoringOpinion, AgentFailure> {
        let mut request = self.client.post(&self.config.endpoint).json(&ScoreRequest {
            submission_text,
            criterion,
        });
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let body = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AgentFailure::Request(e.to_string()))?
            .text()
            .await
            .map_err(|e| AgentFailure::Request(e.to_string()))?;

        parse_opinion(&body)
    }
}
