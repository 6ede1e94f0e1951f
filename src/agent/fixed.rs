use async_trait::async_trait;

use super::{AgentFailure, ScoringAgent, ScoringOpinion};
use crate::schema::GradingCriterion;

/// An agent that always answers the same way.
///
/// Handy offline and in tests: it is fully deterministic and can be told to
/// fail. Per-criterion answers override the default.
#[derive(Debug, Clone)]
pub struct FixedAgent {
    /// Name reported in logs
    name:         String,
    /// Outcome for criteria without an override
    default:      Result<ScoringOpinion, AgentFailure>,
    /// Outcomes keyed by criterion name
    by_criterion: Vec<(String, Result<ScoringOpinion, AgentFailure>)>,
}

impl FixedAgent {
    /// An agent that returns `opinion` for every criterion.
    pub fn new(name: impl Into<String>, opinion: ScoringOpinion) -> Self {
        Self {
            name:         name.into(),
            default:      Ok(opinion),
            by_criterion: Vec::new(),
        }
    }

    /// An agent that fails every query with `failure`.
    pub fn failing(name: impl Into<String>, failure: AgentFailure) -> Self {
        Self {
            name:         name.into(),
            default:      Err(failure),
            by_criterion: Vec::new(),
        }
    }

    /// Overrides the answer for one criterion.
    pub fn with_criterion(
        mut self,
        criterion: impl Into<String>,
        outcome: Result<ScoringOpinion, AgentFailure>,
    ) -> Self {
        self.by_criterion.push((criterion.into(), outcome));
        self
    }
}

#[async_trait]
impl ScoringAgent for FixedAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn score(
        &self,
        _submission_text: &str,
        criterion: &GradingCriterion,
    ) -> Result<ScoringOpinion, AgentFailure> {
        self.by_criterion
            .iter()
            .find(|(name, _)| name == criterion.name())
            .map(|(_, outcome)| outcome.clone())
            .unwrap_or_else(|| self.default.clone())
    }
}
