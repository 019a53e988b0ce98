//! Core domain models for workflow coordination.
//!
//! This module contains the fundamental data structures used throughout
//! the engine: task and workflow definitions and the dependency DAG.

pub mod dag;
pub mod task;
pub mod workflow;

pub use dag::TaskDAG;
pub use task::{Priority, RiskLevel, TaskDefinition, TaskId, TaskKind};
pub use workflow::{SessionId, Workflow, WorkflowContext, WorkflowId, CONTEXT_VERSION};
