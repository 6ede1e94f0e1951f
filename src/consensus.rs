#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Reconciles independent per-criterion opinions into a single result.
//!
//! Opinions below the engine's `min_confidence` are dropped. Points of the
//! survivors are averaged weighted by confidence, while the consensus
//! confidence is their plain, unweighted mean.

use std::{str::FromStr, sync::Arc, time::Duration};

use bon::Builder;
use futures::future::join_all;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::{
    agent::{AgentFailure, ScoringAgent, ScoringOpinion},
    constants::{DEFAULT_AGENT_TIMEOUT, DEFAULT_MAX_CONCURRENT_QUERIES, DEFAULT_MIN_CONFIDENCE},
    schema::GradingCriterion,
};

/// What to do with opinions whose points leave [0, max_points] or whose
/// confidence leaves [0, 1].
///
/// Non-finite points or confidences are always rejected, whatever the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpinionBounds {
    /// Use the opinion as given.
    Trust,
    /// Clamp points and confidence into range.
    Clamp,
    /// Treat the opinion as an agent failure.
    #[default]
    Reject,
}

impl OpinionBounds {
    /// Applies this policy to an opinion on a criterion worth `max_points`.
    pub fn apply(
        self,
        opinion: ScoringOpinion,
        max_points: f64,
    ) -> Result<ScoringOpinion, AgentFailure> {
        let in_range = (0.0..=max_points).contains(&opinion.points)
            && (0.0..=1.0).contains(&opinion.confidence);
        let finite = opinion.points.is_finite() && opinion.confidence.is_finite();

        match self {
            OpinionBounds::Trust if finite => Ok(opinion),
            _ if in_range => Ok(opinion),
            OpinionBounds::Clamp if finite => Ok(ScoringOpinion {
                points: opinion.points.clamp(0.0, max_points),
                confidence: opinion.confidence.clamp(0.0, 1.0),
                ..opinion
            }),
            _ => Err(AgentFailure::OutOfRange {
                points: opinion.points,
                max_points,
                confidence: opinion.confidence,
            }),
        }
    }
}

impl FromStr for OpinionBounds {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trust" => Ok(OpinionBounds::Trust),
            "clamp" => Ok(OpinionBounds::Clamp),
            "reject" => Ok(OpinionBounds::Reject),
            other => anyhow::bail!("Unknown opinion bounds policy `{other}`"),
        }
    }
}

/// Tunables for a [`ConsensusEngine`].
#[derive(Debug, Clone, Builder)]
pub struct ConsensusSettings {
    /// Opinions with a lower confidence are ignored
    #[builder(default = DEFAULT_MIN_CONFIDENCE)]
    min_confidence:         f64,
    /// Longest a single agent query may take before counting as failed
    #[builder(default = DEFAULT_AGENT_TIMEOUT)]
    agent_timeout:          Duration,
    /// Agent queries allowed in flight at once
    #[builder(default = DEFAULT_MAX_CONCURRENT_QUERIES)]
    max_concurrent_queries: usize,
    /// Policy for out-of-range opinions
    #[builder(default)]
    bounds:                 OpinionBounds,
}

impl Default for ConsensusSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ConsensusSettings {
    /// Returns the minimum confidence an opinion needs to be counted.
    pub fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    /// Returns the per-query timeout.
    pub fn agent_timeout(&self) -> Duration {
        self.agent_timeout
    }

    /// Returns the concurrent query limit.
    pub fn max_concurrent_queries(&self) -> usize {
        self.max_concurrent_queries
    }

    /// Returns the out-of-range policy.
    pub fn bounds(&self) -> OpinionBounds {
        self.bounds
    }
}

/// The reconciled outcome for one criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    /// Confidence-weighted mean of the surviving points, to 2 decimals
    pub(crate) points:        f64,
    /// Surviving explanations, one labelled line each
    pub(crate) explanation:   String,
    /// Unweighted mean of the surviving confidences
    pub(crate) confidence:    f64,
    /// How many opinions survived the confidence filter
    pub(crate) opinions_used: usize,
}

impl ConsensusResult {
    /// Returns the reconciled points.
    pub fn points(&self) -> f64 {
        self.points
    }

    /// Returns the combined explanation.
    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    /// Returns the combined confidence.
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Returns how many opinions were reconciled.
    pub fn opinions_used(&self) -> usize {
        self.opinions_used
    }
}

/// Fatal problems while seeking consensus.
#[derive(thiserror::Error, Debug, Clone)]
pub enum ConsensusError {
    /// Every configured agent failed to answer for this criterion.
    #[error("All {} scoring agents failed for criterion `{criterion}`", .failures.len())]
    AllAgentsFailed {
        /// The criterion being scored
        criterion: String,
        /// Agent name and failure, in agent order
        failures:  Vec<(String, AgentFailure)>,
    },
}

/// Rounds to 2 decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Reconciles opinions already gathered, in agent order.
///
/// Returns `None` when no opinion reaches `min_confidence`. That is an
/// expected outcome meaning a human has to look, not an error.
pub fn reconcile(opinions: &[ScoringOpinion], min_confidence: f64) -> Option<ConsensusResult> {
    let surviving = opinions
        .iter()
        .filter(|o| o.confidence >= min_confidence)
        .collect::<Vec<_>>();
    if surviving.is_empty() {
        return None;
    }

    let count = surviving.len() as f64;
    let total_weight: f64 = surviving.iter().map(|o| o.confidence).sum();
    let points = if total_weight > 0.0 {
        surviving.iter().map(|o| o.points * o.confidence).sum::<f64>() / total_weight
    } else {
        // only reachable with a non-positive threshold
        surviving.iter().map(|o| o.points).sum::<f64>() / count
    };

    let explanation = surviving
        .iter()
        .enumerate()
        .map(|(i, o)| format!("Model {} ({:.2} confidence): {}", i + 1, o.confidence, o.explanation))
        .join("\n");

    Some(ConsensusResult {
        points: round2(points),
        explanation,
        confidence: total_weight / count,
        opinions_used: surviving.len(),
    })
}

/// Queries every agent on a criterion and reconciles their opinions.
///
/// Queries for all criteria share one pool of permits, so any number of
/// criteria can be graded concurrently without exceeding
/// `max_concurrent_queries` in-flight requests.
#[derive(Clone)]
pub struct ConsensusEngine {
    /// Agents in their stable, configured order
    agents:   Vec<Arc<dyn ScoringAgent>>,
    /// Engine tunables
    settings: ConsensusSettings,
    /// Shared in-flight query limit
    permits:  Arc<Semaphore>,
}

impl std::fmt::Debug for ConsensusEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsensusEngine")
            .field("agents", &self.agents.iter().map(|a| a.name()).collect::<Vec<_>>())
            .field("settings", &self.settings)
            .finish()
    }
}

impl ConsensusEngine {
    /// Creates an engine over `agents`, which keep the given order.
    pub fn new(agents: Vec<Arc<dyn ScoringAgent>>, settings: ConsensusSettings) -> Self {
        let permits = Arc::new(Semaphore::new(
            settings
                .max_concurrent_queries
                .clamp(1, Semaphore::MAX_PERMITS),
        ));
        Self {
            agents,
            settings,
            permits,
        }
    }

    /// Returns the agents in their configured order.
    pub fn agents(&self) -> &[Arc<dyn ScoringAgent>] {
        &self.agents
    }

    /// Returns the engine settings.
    pub fn settings(&self) -> &ConsensusSettings {
        &self.settings
    }

    /// Asks one agent, holding a permit and honouring the timeout.
    async fn query(
        &self,
        agent: &dyn ScoringAgent,
        submission_text: &str,
        criterion: &GradingCriterion,
    ) -> Result<ScoringOpinion, AgentFailure> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| AgentFailure::Request(e.to_string()))?;

        match tokio::time::timeout(
            self.settings.agent_timeout,
            agent.score(submission_text, criterion),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(AgentFailure::TimedOut(self.settings.agent_timeout)),
        }
    }

    /// Asks every agent concurrently; outcomes come back in agent order,
    /// regardless of which finished first.
    pub async fn gather(
        &self,
        submission_text: &str,
        criterion: &GradingCriterion,
    ) -> Vec<(String, Result<ScoringOpinion, AgentFailure>)> {
        let queries = self.agents.iter().map(|agent| async move {
            let outcome = self.query(agent.as_ref(), submission_text, criterion).await;
            (agent.name().to_string(), outcome)
        });
        join_all(queries).await
    }

    /// Grades one criterion.
    ///
    /// Failed agents are logged and left out. `Ok(None)` means no opinion was
    /// confident enough. With no agents configured there is trivially no
    /// consensus; if agents are configured but none of them answered at all,
    /// the criterion cannot be graded and an error is returned.
    pub async fn grade_with_consensus(
        &self,
        submission_text: &str,
        criterion: &GradingCriterion,
    ) -> Result<Option<ConsensusResult>, ConsensusError> {
        let outcomes = self.gather(submission_text, criterion).await;
        let answered = outcomes.iter().filter(|(_, o)| o.is_ok()).count();

        let mut opinions = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for (agent, outcome) in outcomes {
            match outcome.and_then(|o| self.settings.bounds.apply(o, criterion.max_points())) {
                Ok(opinion) => {
                    tracing::debug!(
                        agent = %agent,
                        criterion = criterion.name(),
                        points = opinion.points,
                        confidence = opinion.confidence,
                        "Received opinion"
                    );
                    opinions.push(opinion);
                }
                Err(failure) => {
                    tracing::warn!(
                        agent = %agent,
                        criterion = criterion.name(),
                        "Agent failed to produce an opinion: {failure}"
                    );
                    failures.push((agent, failure));
                }
            }
        }

        if !self.agents.is_empty() && answered == 0 {
            return Err(ConsensusError::AllAgentsFailed {
                criterion: criterion.name().to_string(),
                failures,
            });
        }

        let result = reconcile(&opinions, self.settings.min_confidence);
        match &result {
            Some(r) => tracing::debug!(
                criterion = criterion.name(),
                points = r.points,
                confidence = r.confidence,
                opinions = r.opinions_used,
                "Consensus reached"
            ),
            None => tracing::info!(
                criterion = criterion.name(),
                opinions = opinions.len(),
                "No opinion met the minimum confidence of {}",
                self.settings.min_confidence
            ),
        }
        Ok(result)
    }
}
