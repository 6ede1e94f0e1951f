#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Scoring agent that asks an OpenAI-compatible chat model for an opinion.

use async_openai::{
    Client as OpenAIClient,
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
    },
};
use async_trait::async_trait;
use bon::Builder;

use super::{AgentFailure, ScoringAgent, ScoringOpinion, parse_opinion};
use crate::{constants::PROMPT_TRUNCATE, schema::GradingCriterion};

/// Connection and sampling settings for one chat-model backend.
#[derive(Clone, Builder)]
#[builder(on(String, into))]
pub struct OpenAiAgentConfig {
    /// Name reported in logs; defaults to the model identifier
    name:        Option<String>,
    /// Base URL of the OpenAI-compatible API
    api_base:    String,
    /// API key
    api_key:     String,
    /// Model identifier
    model:       String,
    /// Sampling temperature; `0.0` keeps the model as deterministic as the
    /// backend allows
    #[builder(default = 0.0)]
    temperature: f32,
}

impl std::fmt::Debug for OpenAiAgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiAgentConfig")
            .field("name", &self.name)
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}

impl OpenAiAgentConfig {
    /// Returns the model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the sampling temperature.
    pub fn temperature(&self) -> f32 {
        self.temperature
    }
}

/// A chat-model backed [`ScoringAgent`].
pub struct OpenAiAgent {
    /// Name reported in logs
    name:   String,
    /// Backend settings
    config: OpenAiAgentConfig,
    /// API client, reused across queries
    client: OpenAIClient<OpenAIConfig>,
}

impl OpenAiAgent {
    /// Creates an agent from its configuration.
    pub fn new(config: OpenAiAgentConfig) -> Self {
        let client = OpenAIClient::with_config(
            OpenAIConfig::new()
                .with_api_base(&config.api_base)
                .with_api_key(&config.api_key),
        );
        let name = config
            .name
            .clone()
            .unwrap_or_else(|| config.model.clone());

        Self {
            name,
            config,
            client,
        }
    }

    /// Returns this agent's configuration.
    pub fn config(&self) -> &OpenAiAgentConfig {
        &self.config
    }
}

/// Renders the user message describing the criterion and the submission.
///
/// Submissions longer than [`PROMPT_TRUNCATE`] characters are cut off.
pub fn render_criterion_prompt(submission_text: &str, criterion: &GradingCriterion) -> String {
    let submission: String = submission_text.chars().take(PROMPT_TRUNCATE).collect();
    let rubric = if criterion.rubric().is_empty() {
        String::from("(no rubric levels given)")
    } else {
        criterion.rubric_lines()
    };

    format!(
        include_str!("prompts/criterion_message.md"),
        name = criterion.name(),
        description = criterion.description(),
        max_points = criterion.max_points(),
        rubric = rubric,
        submission = submission,
    )
}

/// Builds the system and user messages for one scoring query.
fn build_messages(
    submission_text: &str,
    criterion: &GradingCriterion,
) -> Result<Vec<ChatCompletionRequestMessage>, AgentFailure> {
    let system = ChatCompletionRequestSystemMessageArgs::default()
        .content(include_str!("prompts/system_message.md").to_string())
        .build()
        .map_err(|e| AgentFailure::Request(e.to_string()))?;
    let user = ChatCompletionRequestUserMessageArgs::default()
        .content(render_criterion_prompt(submission_text, criterion))
        .build()
        .map_err(|e| AgentFailure::Request(e.to_string()))?;

    Ok(vec![system.into(), user.into()])
}

#[async_trait]
impl ScoringAgent for OpenAiAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn score(
        &self,
        submission_text: &str,
        criterion: &GradingCriterion,
    ) -> Result<ScoringOpinion, AgentFailure> {
        let messages = build_messages(submission_text, criterion)?;

        let response = self
            .client
            .chat()
            .create(CreateChatCompletionRequest {
                model: self.config.model.clone(),
                messages,
                temperature: Some(self.config.temperature),
                n: Some(1),
                ..Default::default()
            })
            .await
            .map_err(|e| AgentFailure::Request(e.to_string()))?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or(AgentFailure::EmptyResponse)?;

        parse_opinion(&content)
    }
}
