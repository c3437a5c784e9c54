//! Task dependency graph.
//!
//! Edges point from a task to the tasks it depends on. The relation is kept
//! acyclic: every new edge is checked against the graph with the edge already
//! in place. Ids with no known task are nodes without outgoing edges.

use std::collections::{BTreeMap, HashSet};

use crate::error::{Error, Result};
use crate::task::Task;

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: BTreeMap<String, Vec<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut graph = Self::new();
        for task in tasks {
            graph.insert_task(task);
        }
        graph
    }

    /// Add or replace a node with the task's current edges
    pub fn insert_task(&mut self, task: &Task) {
        self.edges.insert(task.id.clone(), task.depends_on.clone());
    }

    pub fn contains(&self, id: &str) -> bool {
        self.edges.contains_key(id)
    }

    /// Whether a walk from `start` reaches a node on the current path.
    ///
    /// The path begins as `target_path`; `start` and every node on the
    /// branch being explored join it. Meeting a node again through a
    /// different branch is not a cycle.
    pub fn has_cycle(&self, start: &str, target_path: &[&str]) -> bool {
        self.walk_finds_path(start, target_path, None)
    }

    fn walk_finds_path(&self, start: &str, target_path: &[&str], extra: Option<(&str, &str)>) -> bool {
        let mut on_path: HashSet<&str> = target_path.iter().copied().collect();
        let mut finished: HashSet<&str> = HashSet::new();
        let mut stack: Vec<(&str, usize)> = vec![(start, 0)];
        on_path.insert(start);

        while let Some(frame) = stack.last_mut() {
            let (node, next) = *frame;
            let child = self.neighbour(node, next, extra);
            frame.1 += 1;

            match child {
                Some(child) => {
                    if on_path.contains(child) {
                        return true;
                    }
                    if finished.contains(child) {
                        continue;
                    }
                    on_path.insert(child);
                    stack.push((child, 0));
                }
                None => {
                    stack.pop();
                    if !target_path.iter().any(|seed| *seed == node) {
                        on_path.remove(node);
                    }
                    finished.insert(node);
                }
            }
        }

        false
    }

    /// `index`-th outgoing edge of `node`, with `extra` appended to its source
    fn neighbour<'a>(&'a self, node: &str, index: usize, extra: Option<(&'a str, &'a str)>) -> Option<&'a str> {
        let own = self.edges.get(node).map(Vec::as_slice).unwrap_or(&[]);
        if let Some(id) = own.get(index) {
            return Some(id.as_str());
        }
        match extra {
            Some((from, to)) if from == node && index == own.len() => Some(to),
            _ => None,
        }
    }

    /// Record that `task` depends on `dependency_id`, returning the updated task.
    pub fn add_dependency(&mut self, task: &Task, dependency_id: &str) -> Result<Task> {
        if task.depends_on.iter().any(|id| id == dependency_id) {
            return Err(Error::DuplicateDependency {
                task: task.id.clone(),
                dependency: dependency_id.to_string(),
            });
        }

        self.insert_task(task);
        if self.walk_finds_path(&task.id, &[task.id.as_str()], Some((task.id.as_str(), dependency_id))) {
            tracing::debug!(task = %task.id, dependency = dependency_id, "dependency rejected: cycle");
            return Err(Error::CycleDetected {
                task: task.id.clone(),
                dependency: dependency_id.to_string(),
            });
        }

        let mut updated = task.clone();
        updated.depends_on.push(dependency_id.to_string());
        self.insert_task(&updated);
        Ok(updated)
    }

    /// Drop the edge if present; the returned task is unchanged otherwise
    pub fn remove_dependency(&mut self, task: &Task, dependency_id: &str) -> Task {
        let mut updated = task.clone();
        updated.depends_on.retain(|id| id != dependency_id);
        self.insert_task(&updated);
        updated
    }

    /// Tasks that may become dependencies of `for_task` without a cycle
    pub fn available_candidates<'a>(&self, tasks: &'a [Task], for_task: &str) -> Vec<&'a Task> {
        tasks
            .iter()
            .filter(|task| task.id != for_task)
            .filter(|task| !self.has_cycle(&task.id, &[for_task]))
            .collect()
    }

    /// Direct dependencies of `id`
    pub fn dependencies_of(&self, id: &str) -> &[String] {
        self.edges.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every node that transitively depends on `id`
    pub fn dependents_of(&self, id: &str) -> Vec<String> {
        let mut reached: HashSet<&str> = HashSet::new();
        let mut frontier = vec![id];
        while let Some(target) = frontier.pop() {
            for (node, deps) in &self.edges {
                if deps.iter().any(|dep| dep == target) && reached.insert(node.as_str()) {
                    frontier.push(node.as_str());
                }
            }
        }
        self.edges
            .keys()
            .filter(|node| node.as_str() != id && reached.contains(node.as_str()))
            .cloned()
            .collect()
    }

    /// Remove the node and every edge into it.
    ///
    /// Returns the ids whose dependency lists changed.
    pub fn remove_task(&mut self, id: &str) -> Vec<String> {
        self.edges.remove(id);
        let mut touched = Vec::new();
        for (node, deps) in self.edges.iter_mut() {
            let before = deps.len();
            deps.retain(|dep| dep != id);
            if deps.len() != before {
                touched.push(node.clone());
            }
        }
        touched
    }
}
