//! Agent capability registry and agent selection.
//!
//! The registry is built once at startup and shared read-only between runs.

use crate::config::AgentOverride;
use crate::core::task::TaskDefinition;
use crate::error::{Error, Result};
use crate::elog_warn;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Known agent types.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum AgentType {
    Enforcer,
    Architect,
    Orchestrator,
    BugTriageSpecialist,
    CodeReviewer,
    SecurityAuditor,
    Refactorer,
    TestArchitect,
}

impl AgentType {
    pub const ALL: [AgentType; 8] = [
        AgentType::Enforcer,
        AgentType::Architect,
        AgentType::Orchestrator,
        AgentType::BugTriageSpecialist,
        AgentType::CodeReviewer,
        AgentType::SecurityAuditor,
        AgentType::Refactorer,
        AgentType::TestArchitect,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::Enforcer => "enforcer",
            AgentType::Architect => "architect",
            AgentType::Orchestrator => "orchestrator",
            AgentType::BugTriageSpecialist => "bug-triage-specialist",
            AgentType::CodeReviewer => "code-reviewer",
            AgentType::SecurityAuditor => "security-auditor",
            AgentType::Refactorer => "refactorer",
            AgentType::TestArchitect => "test-architect",
        }
    }
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AgentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        AgentType::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| Error::Validation(format!("Unknown agent type: {}", s)))
    }
}

/// Capability tags an agent declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    ComplianceMonitoring,
    DesignReview,
    TaskCoordination,
    ErrorAnalysis,
    CodeQualityAssessment,
    VulnerabilityDetection,
    CodeModernization,
    TestStrategyDesign,
}

/// What one agent can do and how much of it at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentCapability {
    pub agent: AgentType,
    pub capabilities: Vec<Capability>,
    /// Highest task complexity this agent should be handed.
    pub complexity_threshold: u8,
    pub max_concurrent: usize,
}

impl AgentCapability {
    fn new(
        agent: AgentType,
        capabilities: &[Capability],
        complexity_threshold: u8,
        max_concurrent: usize,
    ) -> Self {
        Self {
            agent,
            capabilities: capabilities.to_vec(),
            complexity_threshold,
            max_concurrent,
        }
    }

    pub fn can_handle(&self, complexity: u8) -> bool {
        self.complexity_threshold >= complexity
    }
}

/// Immutable table of agent capability records.
#[derive(Debug, Clone)]
pub struct AgentRegistry {
    records: HashMap<AgentType, AgentCapability>,
}

impl AgentRegistry {
    /// Registry with the built-in capability table.
    pub fn new() -> Self {
        use Capability::*;

        let records = [
            AgentCapability::new(
                AgentType::Enforcer,
                &[ComplianceMonitoring, CodeQualityAssessment],
                70,
                3,
            ),
            AgentCapability::new(AgentType::Architect, &[DesignReview, TaskCoordination], 100, 2),
            AgentCapability::new(AgentType::Orchestrator, &[TaskCoordination], 100, 5),
            AgentCapability::new(AgentType::BugTriageSpecialist, &[ErrorAnalysis], 80, 3),
            AgentCapability::new(
                AgentType::CodeReviewer,
                &[CodeQualityAssessment, DesignReview],
                60,
                4,
            ),
            AgentCapability::new(
                AgentType::SecurityAuditor,
                &[VulnerabilityDetection, ComplianceMonitoring],
                90,
                2,
            ),
            AgentCapability::new(
                AgentType::Refactorer,
                &[CodeModernization, CodeQualityAssessment],
                75,
                2,
            ),
            AgentCapability::new(AgentType::TestArchitect, &[TestStrategyDesign], 70, 3),
        ];

        Self {
            records: records.into_iter().map(|r| (r.agent, r)).collect(),
        }
    }

    /// Built-in table with configured overrides applied.
    ///
    /// Override keys that do not name an agent are logged and ignored. A
    /// `max_concurrent` of zero is raised to one so the agent stays usable.
    pub fn with_overrides(overrides: &BTreeMap<String, AgentOverride>) -> Self {
        let mut registry = Self::new();
        for (name, o) in overrides {
            let agent: AgentType = match name.parse() {
                Ok(agent) => agent,
                Err(_) => {
                    elog_warn!("Ignoring override for unknown agent '{}'", name);
                    continue;
                }
            };
            if let Some(record) = registry.records.get_mut(&agent) {
                if let Some(threshold) = o.complexity_threshold {
                    record.complexity_threshold = threshold.min(100);
                }
                if let Some(max) = o.max_concurrent {
                    record.max_concurrent = max.max(1);
                }
            }
        }
        registry
    }

    pub fn get(&self, agent: AgentType) -> Option<&AgentCapability> {
        self.records.get(&agent)
    }

    /// Max concurrent tasks for an agent; one if the agent is not registered.
    pub fn max_concurrent(&self, agent: AgentType) -> usize {
        self.get(agent).map(|r| r.max_concurrent).unwrap_or(1)
    }

    pub fn capabilities_of(&self, agent: AgentType) -> &[Capability] {
        self.get(agent)
            .map(|r| r.capabilities.as_slice())
            .unwrap_or(&[])
    }

    /// Agents declaring a capability, in `AgentType` order.
    pub fn agents_with(&self, capability: Capability) -> Vec<AgentType> {
        let mut agents: Vec<AgentType> = self
            .records
            .values()
            .filter(|r| r.capabilities.contains(&capability))
            .map(|r| r.agent)
            .collect();
        agents.sort();
        agents
    }

    /// Pick the agent for a task of the given complexity.
    ///
    /// First candidate whose threshold covers the complexity wins; when none
    /// does, the first candidate takes it anyway.
    ///
    /// # Errors
    /// `UnknownTaskKind` if the task's kind has no candidates.
    pub fn select_agent(&self, task: &TaskDefinition, complexity: u8) -> Result<AgentType> {
        let candidates = task.kind.candidates().ok_or_else(|| Error::UnknownTaskKind {
            task: task.id.to_string(),
            kind: task.kind.to_string(),
        })?;

        let chosen = candidates
            .iter()
            .copied()
            .find(|agent| self.get(*agent).map(|r| r.can_handle(complexity)).unwrap_or(false))
            .unwrap_or(candidates[0]);

        Ok(chosen)
    }

    /// True when no candidate of the task's kind covers the complexity.
    pub fn exceeds_all_candidates(&self, task: &TaskDefinition, complexity: u8) -> bool {
        match task.kind.candidates() {
            Some(candidates) => !candidates
                .iter()
                .any(|agent| self.get(*agent).map(|r| r.can_handle(complexity)).unwrap_or(false)),
            None => false,
        }
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
