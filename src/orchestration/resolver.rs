//! Resolution of conflicting agent responses.
//!
//! When several agents answer the same question differently, the
//! [`ConflictResolver`] picks one answer according to a configured
//! [`ConflictStrategy`].

use crate::agents::AgentType;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How to pick a winner among conflicting responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictStrategy {
    /// Most frequent response wins; first occurrence breaks ties.
    #[default]
    MajorityVote,
    /// Response with the highest expertise score wins.
    ExpertPriority,
    /// A response every agent agrees on, else the first response.
    Consensus,
    /// First response as submitted.
    ManualOverride,
}

impl std::fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictStrategy::MajorityVote => write!(f, "majority-vote"),
            ConflictStrategy::ExpertPriority => write!(f, "expert-priority"),
            ConflictStrategy::Consensus => write!(f, "consensus"),
            ConflictStrategy::ManualOverride => write!(f, "manual-override"),
        }
    }
}

/// One agent's answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub agent: AgentType,
    pub response: Value,
    /// How much weight the agent's opinion carries, 0.0 to 1.0.
    #[serde(default)]
    pub expertise_score: f64,
}

impl AgentResponse {
    pub fn new(agent: AgentType, response: Value) -> Self {
        Self {
            agent,
            response,
            expertise_score: 0.0,
        }
    }

    pub fn with_expertise(mut self, score: f64) -> Self {
        self.expertise_score = score;
        self
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictResolver {
    strategy: ConflictStrategy,
}

impl ConflictResolver {
    pub fn new(strategy: ConflictStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> ConflictStrategy {
        self.strategy
    }

    /// Pick the winning response.
    ///
    /// Returns `None` for no responses; a single response always wins.
    pub fn resolve(&self, responses: Vec<AgentResponse>) -> Option<AgentResponse> {
        if responses.len() <= 1 {
            return responses.into_iter().next();
        }

        let winner = match self.strategy {
            ConflictStrategy::MajorityVote => majority_index(&responses),
            ConflictStrategy::ExpertPriority => expert_index(&responses),
            // A unanimous answer is also the first one; without unanimity the
            // first response stands.
            ConflictStrategy::Consensus | ConflictStrategy::ManualOverride => 0,
        };

        responses.into_iter().nth(winner)
    }
}

fn majority_index(responses: &[AgentResponse]) -> usize {
    let mut best = 0;
    let mut best_votes = 0;
    for (i, candidate) in responses.iter().enumerate() {
        let votes = responses
            .iter()
            .filter(|r| r.response == candidate.response)
            .count();
        if votes > best_votes {
            best = i;
            best_votes = votes;
        }
    }
    best
}

fn expert_index(responses: &[AgentResponse]) -> usize {
    let mut best = 0;
    for (i, candidate) in responses.iter().enumerate().skip(1) {
        if candidate.expertise_score > responses[best].expertise_score {
            best = i;
        }
    }
    best
}
