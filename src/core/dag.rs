//! Task DAG (Directed Acyclic Graph) for dependency management.
//!
//! This module provides the TaskDAG structure that represents task dependencies
//! as a directed graph and slices it into phases: batches of tasks whose
//! dependencies are all satisfied by earlier batches.

use crate::core::task::{TaskDefinition, TaskId};
use crate::error::{Error, Result};
use petgraph::algo::{is_cyclic_directed, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{HashMap, HashSet};

/// The task dependency graph.
///
/// Nodes are tasks; an edge `a -> b` means `b` depends on `a`. Node indices
/// follow insertion order, so phases preserve the workflow's declared order.
pub struct TaskDAG {
    graph: DiGraph<TaskDefinition, ()>,
    task_index: HashMap<TaskId, NodeIndex>,
}

impl TaskDAG {
    /// Create a new empty TaskDAG.
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            task_index: HashMap::new(),
        }
    }

    /// Build a graph from a task list.
    ///
    /// Tolerant of malformed input so the validator can inspect it: a repeated
    /// id keeps its first occurrence, and dependencies on ids that are not in
    /// the list are skipped.
    pub fn from_tasks(tasks: &[TaskDefinition]) -> Self {
        let mut dag = Self::new();
        for task in tasks {
            dag.add_task(task.clone());
        }
        for task in tasks {
            for dep in &task.dependencies {
                // Unknown ids are reported by the validator, not here.
                let _ = dag.add_dependency(dep, &task.id);
            }
        }
        dag
    }

    /// Add a task to the DAG.
    ///
    /// If a task with the same id already exists, the existing node is kept
    /// and its index returned.
    pub fn add_task(&mut self, task: TaskDefinition) -> NodeIndex {
        if let Some(&index) = self.task_index.get(&task.id) {
            return index;
        }

        let id = task.id.clone();
        let index = self.graph.add_node(task);
        self.task_index.insert(id, index);
        index
    }

    /// Record that `to` depends on `from`.
    ///
    /// Cycles are accepted here; they surface through [`TaskDAG::cycles`] and
    /// [`TaskDAG::phases`].
    ///
    /// # Errors
    /// Returns an error if either task is not in the DAG.
    pub fn add_dependency(&mut self, from: &TaskId, to: &TaskId) -> Result<()> {
        let from_index = self
            .task_index
            .get(from)
            .ok_or_else(|| Error::Validation(format!("Task {} not found in DAG", from)))?;

        let to_index = self
            .task_index
            .get(to)
            .ok_or_else(|| Error::Validation(format!("Task {} not found in DAG", to)))?;

        self.graph.update_edge(*from_index, *to_index, ());
        Ok(())
    }

    /// Get a reference to a task by its ID.
    pub fn get_task(&self, id: &TaskId) -> Option<&TaskDefinition> {
        self.task_index
            .get(id)
            .and_then(|&index| self.graph.node_weight(index))
    }

    /// Get the number of tasks in the DAG.
    pub fn task_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Get the number of dependencies (edges) in the DAG.
    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Check if the DAG is empty.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Check if the DAG contains a task.
    pub fn contains_task(&self, id: &TaskId) -> bool {
        self.task_index.contains_key(id)
    }

    /// Get all tasks that the given task depends on (predecessors).
    pub fn dependencies_of(&self, id: &TaskId) -> Vec<&TaskDefinition> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Get all tasks that depend on the given task (successors).
    pub fn dependents_of(&self, id: &TaskId) -> Vec<&TaskDefinition> {
        self.neighbors(id, Direction::Outgoing)
    }

    fn neighbors(&self, id: &TaskId, direction: Direction) -> Vec<&TaskDefinition> {
        match self.task_index.get(id) {
            Some(&index) => self
                .graph
                .neighbors_directed(index, direction)
                .filter_map(|neighbor| self.graph.node_weight(neighbor))
                .collect(),
            None => Vec::new(),
        }
    }

    /// True if any dependency cycle exists.
    pub fn has_cycle(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Slice the graph into execution phases.
    ///
    /// Each scan places every unplaced task whose dependencies were all placed
    /// by earlier scans. A scan that places nothing means the remaining tasks
    /// sit on a cycle.
    ///
    /// # Errors
    /// Returns `CircularDependency` naming the first blocked task.
    pub fn phases(&self) -> Result<Vec<Vec<TaskDefinition>>> {
        let mut placed: HashSet<NodeIndex> = HashSet::new();
        let mut remaining: Vec<NodeIndex> = self.graph.node_indices().collect();
        let mut phases = Vec::new();

        while !remaining.is_empty() {
            let (ready, blocked): (Vec<NodeIndex>, Vec<NodeIndex>) =
                remaining.into_iter().partition(|&index| {
                    self.graph
                        .neighbors_directed(index, Direction::Incoming)
                        .all(|dep| placed.contains(&dep))
                });

            if ready.is_empty() {
                let task = blocked
                    .first()
                    .map(|&index| self.graph[index].id.to_string())
                    .unwrap_or_default();
                return Err(Error::CircularDependency { task });
            }

            placed.extend(ready.iter().copied());
            phases.push(ready.iter().map(|&i| self.graph[i].clone()).collect());
            remaining = blocked;
        }

        Ok(phases)
    }

    /// Find tasks that close a dependency cycle.
    ///
    /// Depth-first search with a recursion stack; every task reached again
    /// while still on the stack is reported once, in discovery order.
    pub fn cycles(&self) -> Vec<TaskId> {
        let mut visited = HashSet::new();
        let mut on_stack = HashSet::new();
        let mut found = Vec::new();

        for start in self.graph.node_indices() {
            if !visited.contains(&start) {
                self.visit(start, &mut visited, &mut on_stack, &mut found);
            }
        }

        found
    }

    fn visit(
        &self,
        index: NodeIndex,
        visited: &mut HashSet<NodeIndex>,
        on_stack: &mut HashSet<NodeIndex>,
        found: &mut Vec<TaskId>,
    ) {
        visited.insert(index);
        on_stack.insert(index);

        for next in self.graph.neighbors_directed(index, Direction::Outgoing) {
            if on_stack.contains(&next) {
                let id = &self.graph[next].id;
                if !found.contains(id) {
                    found.push(id.clone());
                }
            } else if !visited.contains(&next) {
                self.visit(next, visited, on_stack, found);
            }
        }

        on_stack.remove(&index);
    }

    /// Get tasks in topological order (respecting dependencies).
    ///
    /// # Errors
    /// Returns `CircularDependency` if the graph contains a cycle.
    pub fn topological_order(&self) -> Result<Vec<&TaskDefinition>> {
        let sorted = toposort(&self.graph, None).map_err(|cycle| {
            let task = self
                .graph
                .node_weight(cycle.node_id())
                .map(|t| t.id.to_string())
                .unwrap_or_default();
            Error::CircularDependency { task }
        })?;

        Ok(sorted
            .into_iter()
            .filter_map(|index| self.graph.node_weight(index))
            .collect())
    }
}

impl Default for TaskDAG {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TaskDAG {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskDAG")
            .field("tasks", &self.task_count())
            .field("dependencies", &self.dependency_count())
            .finish()
    }
}
