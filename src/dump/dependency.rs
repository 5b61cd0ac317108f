// ABOUTME: Foreign key dependency graph and deterministic topological table ordering
// ABOUTME: Cycles are broken at their earliest member with a warning instead of failing the dump

use crate::schema::ForeignKeyEdge;
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};

/// Table name -> names of the tables it references
pub type DependencyGraph = HashMap<String, BTreeSet<String>>;

/// Outcome of ordering a table set
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SortedTables {
    /// Every requested table exactly once, parents before children
    pub order: Vec<String>,
    /// Each foreign key cycle the sort had to break, members in input order
    pub cycles: Vec<Vec<String>>,
}

impl SortedTables {
    pub fn has_cycle(&self) -> bool {
        !self.cycles.is_empty()
    }

    /// Whether `table` sits on one of the reported cycles
    pub fn is_cyclic(&self, table: &str) -> bool {
        self.cycles.iter().flatten().any(|t| t == table)
    }
}

/// Build the dependency graph for a table set
///
/// Keeps only edges whose parent table is also in `tables` and drops
/// self-references such as `categories.parent_id -> categories.id`, which do
/// not constrain ordering.
///
/// # Examples
///
/// ```
/// # use portable_sql_dump::dump::dependency::get_table_dependencies;
/// # use portable_sql_dump::schema::ForeignKeyEdge;
/// let tables = vec!["m_projects".to_string(), "v4_users".to_string()];
/// let edges = vec![ForeignKeyEdge::new("v4_users", "project_id", "m_projects", "id")];
/// let graph = get_table_dependencies(&tables, &edges);
/// assert!(graph["v4_users"].contains("m_projects"));
/// assert!(graph["m_projects"].is_empty());
/// ```
pub fn get_table_dependencies(tables: &[String], edges: &[ForeignKeyEdge]) -> DependencyGraph {
    let mut graph: DependencyGraph = tables
        .iter()
        .map(|t| (t.clone(), BTreeSet::new()))
        .collect();

    for edge in edges {
        if edge.is_self_reference() || !graph.contains_key(&edge.parent_table) {
            continue;
        }
        if let Some(parents) = graph.get_mut(&edge.child_table) {
            parents.insert(edge.parent_table.clone());
        }
    }

    graph
}

/// Order tables so every parent precedes the tables referencing it
///
/// Kahn's algorithm where, among tables whose parents are all emitted, the
/// one earliest in `tables` goes first. When the graph has a cycle the sort
/// stalls; the earliest remaining table that lies on a cycle is then emitted
/// regardless of its parents and sorting resumes. Each stall reports the
/// strongly connected component of that table in [`SortedTables::cycles`],
/// so tables that merely depend on a cycle are never listed.
pub fn topological_sort(tables: &[String], graph: &DependencyGraph) -> SortedTables {
    let position: HashMap<&str, usize> = tables
        .iter()
        .enumerate()
        .map(|(i, t)| (t.as_str(), i))
        .collect();

    let mut in_degree = vec![0usize; tables.len()];
    let mut parents_of: Vec<Vec<usize>> = vec![Vec::new(); tables.len()];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); tables.len()];

    for (idx, table) in tables.iter().enumerate() {
        let Some(parents) = graph.get(table) else {
            continue;
        };
        for parent in parents {
            if let Some(&parent_idx) = position.get(parent.as_str()) {
                if parent_idx != idx {
                    in_degree[idx] += 1;
                    parents_of[idx].push(parent_idx);
                    children[parent_idx].push(idx);
                }
            }
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, deg)| **deg == 0)
        .map(|(idx, _)| Reverse(idx))
        .collect();
    let mut emitted = vec![false; tables.len()];
    let mut reported = vec![false; tables.len()];
    let mut result = SortedTables::default();

    while result.order.len() < tables.len() {
        let next = match ready.pop() {
            Some(Reverse(idx)) => idx,
            None => {
                // Stalled: every remaining table waits on another remaining table
                let Some((idx, component)) = break_cycle(&parents_of, &children, &emitted)
                else {
                    break;
                };
                if component.iter().any(|&i| !reported[i]) {
                    let members: Vec<String> =
                        component.iter().map(|&i| tables[i].clone()).collect();
                    tracing::warn!(
                        "⚠ Foreign key cycle detected between: {}. Emitting {} first",
                        members.join(", "),
                        tables[idx]
                    );
                    for &i in &component {
                        reported[i] = true;
                    }
                    result.cycles.push(members);
                }
                idx
            }
        };

        if emitted[next] {
            continue;
        }
        emitted[next] = true;
        result.order.push(tables[next].clone());

        for &child in &children[next] {
            if in_degree[child] > 0 {
                in_degree[child] -= 1;
                if in_degree[child] == 0 && !emitted[child] {
                    ready.push(Reverse(child));
                }
            }
        }
    }

    result
}

/// Pick the earliest unemitted table on a cycle, with its component
///
/// The component is every unemitted table that both reaches and is reached
/// from the picked one, in input order.
fn break_cycle(
    parents_of: &[Vec<usize>],
    children: &[Vec<usize>],
    emitted: &[bool],
) -> Option<(usize, Vec<usize>)> {
    for idx in (0..emitted.len()).filter(|&i| !emitted[i]) {
        let upstream = reachable(idx, parents_of, emitted);
        if !upstream[idx] {
            continue;
        }
        let downstream = reachable(idx, children, emitted);
        let component = (0..emitted.len())
            .filter(|&i| upstream[i] && downstream[i])
            .collect();
        return Some((idx, component));
    }
    let first = (0..emitted.len()).find(|&i| !emitted[i])?;
    Some((first, vec![first]))
}

/// Unemitted tables reachable from `start` in one or more steps
fn reachable(start: usize, edges: &[Vec<usize>], emitted: &[bool]) -> Vec<bool> {
    let mut seen = vec![false; emitted.len()];
    let mut stack: Vec<usize> = edges[start].clone();
    while let Some(idx) = stack.pop() {
        if emitted[idx] || seen[idx] {
            continue;
        }
        seen[idx] = true;
        stack.extend(edges[idx].iter().copied());
    }
    seen
}
