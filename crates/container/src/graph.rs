//! Service dependency graph.
//!
//! Nodes are service ids stored in an arena and addressed by index; edges are
//! adjacency lists of indices. Built from the definition registry for
//! compile-time cycle checks and diagnostics.

use std::collections::HashMap;
use tracing::debug;

use crate::builder::Registry;

#[derive(Debug, Clone, Default)]
pub struct ServiceGraph {
    ids: Vec<String>,
    index: HashMap<String, usize>,
    edges: Vec<Vec<usize>>,
    reverse: Vec<Vec<usize>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceGraphStats {
    pub total_services: usize,
    pub total_dependencies: usize,
    pub average_fan_out: f64,
    pub max_outgoing_dependencies: usize,
    pub max_incoming_dependencies: usize,
    pub most_dependent_service: Option<String>,
    pub most_depended_upon_service: Option<String>,
}

impl ServiceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, id: &str) -> usize {
        if let Some(&node) = self.index.get(id) {
            return node;
        }
        let node = self.ids.len();
        self.ids.push(id.to_string());
        self.index.insert(id.to_string(), node);
        self.edges.push(Vec::new());
        self.reverse.push(Vec::new());
        node
    }

    /// `from` needs `to` to be constructed first
    pub fn add_edge(&mut self, from: &str, to: &str) {
        let from = self.add_node(from);
        let to = self.add_node(to);
        if !self.edges[from].contains(&to) {
            self.edges[from].push(to);
            self.reverse[to].push(from);
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.iter().map(Vec::len).sum()
    }

    pub fn dependencies(&self, id: &str) -> Vec<&str> {
        self.neighbours(id, &self.edges)
    }

    pub fn dependents(&self, id: &str) -> Vec<&str> {
        self.neighbours(id, &self.reverse)
    }

    fn neighbours<'a>(&'a self, id: &str, lists: &'a [Vec<usize>]) -> Vec<&'a str> {
        self.index
            .get(id)
            .map(|&node| lists[node].iter().map(|&n| self.ids[n].as_str()).collect())
            .unwrap_or_default()
    }

    /// First cycle in node order, as a closed path (`a -> b -> a`)
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        self.cycles().into_iter().next()
    }

    pub fn cycles(&self) -> Vec<Vec<String>> {
        let mut visited = vec![false; self.ids.len()];
        let mut on_stack = vec![false; self.ids.len()];
        let mut path = Vec::new();
        let mut cycles = Vec::new();

        for node in 0..self.ids.len() {
            if !visited[node] {
                self.visit(node, &mut visited, &mut on_stack, &mut path, &mut cycles);
            }
        }
        cycles
    }

    fn visit(
        &self,
        node: usize,
        visited: &mut [bool],
        on_stack: &mut [bool],
        path: &mut Vec<usize>,
        cycles: &mut Vec<Vec<String>>,
    ) {
        visited[node] = true;
        on_stack[node] = true;
        path.push(node);

        for &next in &self.edges[node] {
            if !visited[next] {
                self.visit(next, visited, on_stack, path, cycles);
            } else if on_stack[next] {
                if let Some(start) = path.iter().position(|&n| n == next) {
                    let mut cycle: Vec<String> =
                        path[start..].iter().map(|&n| self.ids[n].clone()).collect();
                    cycle.push(self.ids[next].clone());
                    debug!(cycle = %cycle.join(" -> "), "cycle found");
                    cycles.push(cycle);
                }
            }
        }

        path.pop();
        on_stack[node] = false;
    }

    pub fn stats(&self) -> ServiceGraphStats {
        let total_services = self.ids.len();
        let total_dependencies = self.edge_count();
        let average_fan_out = if total_services > 0 {
            total_dependencies as f64 / total_services as f64
        } else {
            0.0
        };

        let busiest = |lists: &[Vec<usize>]| {
            lists
                .iter()
                .enumerate()
                .filter(|(_, list)| !list.is_empty())
                // max_by_key keeps the last maximum; reverse so the earliest node wins ties
                .rev()
                .max_by_key(|(_, list)| list.len())
                .map(|(node, list)| (list.len(), self.ids[node].clone()))
        };
        let outgoing = busiest(&self.edges);
        let incoming = busiest(&self.reverse);

        ServiceGraphStats {
            total_services,
            total_dependencies,
            average_fan_out,
            max_outgoing_dependencies: outgoing.as_ref().map_or(0, |(n, _)| *n),
            max_incoming_dependencies: incoming.as_ref().map_or(0, |(n, _)| *n),
            most_dependent_service: outgoing.map(|(_, id)| id),
            most_depended_upon_service: incoming.map(|(_, id)| id),
        }
    }

    /// Human readable summary
    pub fn report(&self) -> String {
        let stats = self.stats();
        let cycles = self.cycles();
        let cycle_lines: String = cycles
            .iter()
            .enumerate()
            .map(|(i, cycle)| format!("Cycle {}: {}\n", i + 1, cycle.join(" -> ")))
            .collect();

        format!(
            "=== Service Dependency Report ===\n\
             Total services: {}\n\
             Total dependencies: {}\n\
             Average fan-out: {:.2}\n\
             Max outgoing dependencies: {}\n\
             Max incoming dependencies: {}\n\
             Most dependent service: {}\n\
             Most depended upon service: {}\n\
             Circular dependencies found: {}\n\
             {}=================================",
            stats.total_services,
            stats.total_dependencies,
            stats.average_fan_out,
            stats.max_outgoing_dependencies,
            stats.max_incoming_dependencies,
            stats.most_dependent_service.as_deref().unwrap_or("None"),
            stats.most_depended_upon_service.as_deref().unwrap_or("None"),
            cycles.len(),
            cycle_lines,
        )
    }

    /// Edges for every concrete definition.
    ///
    /// Aliases are followed. References to lazy services and to missing
    /// services add no edge: neither is constructed as part of the consumer.
    pub(crate) fn from_registry(registry: &Registry) -> Self {
        let mut graph = Self::new();

        for id in registry.ids() {
            let Ok(definition) = registry.resolved_definition(id) else {
                continue;
            };
            if definition.is_abstract() {
                continue;
            }
            graph.add_node(id);

            let mut targets: Vec<String> = definition
                .references()
                .iter()
                .map(|reference| reference.id().to_string())
                .collect();
            for tag in definition.tagged_arguments() {
                targets.extend(registry.tagged(tag).into_iter().map(|(tagged, _)| tagged));
            }

            for target in targets {
                let Ok((target, _)) = registry.resolve_alias(&target) else {
                    continue;
                };
                let Ok(dependency) = registry.resolved_definition(&target) else {
                    continue;
                };
                if dependency.is_lazy() {
                    continue;
                }
                graph.add_edge(id, &target);
            }
        }

        graph
    }
}
