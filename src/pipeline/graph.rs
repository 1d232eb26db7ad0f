//! Dependency graph over registered actions and its execution order.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;

use crate::error::ConfigurationError;

/// Adjacency map keyed by registration index.
///
/// Built from `(name, depends_on)` pairs in registration order. Construction
/// validates names and dependencies; [`DependencyGraph::order`] then yields a
/// topological order or the members of a cycle.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    names: Vec<String>,
    /// `dependencies[i]` are the indices node `i` waits on
    dependencies: Vec<Vec<usize>>,
    /// `dependents[i]` are the indices waiting on node `i`
    dependents: Vec<Vec<usize>>,
}

impl DependencyGraph {
    pub fn new<'a, I>(nodes: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = (&'a str, &'a [String])>,
    {
        let nodes: Vec<(&str, &[String])> = nodes.into_iter().collect();

        let mut index = HashMap::with_capacity(nodes.len());
        for (i, (name, _)) in nodes.iter().enumerate() {
            if name.is_empty() {
                return Err(ConfigurationError::EmptyName);
            }
            if index.insert(*name, i).is_some() {
                return Err(ConfigurationError::DuplicateAction((*name).to_string()));
            }
        }

        let mut dependencies = vec![Vec::new(); nodes.len()];
        let mut dependents = vec![Vec::new(); nodes.len()];
        for (i, (name, deps)) in nodes.iter().enumerate() {
            for dep in deps.iter() {
                let Some(&j) = index.get(dep.as_str()) else {
                    return Err(ConfigurationError::MissingDependency {
                        action: (*name).to_string(),
                        dependency: dep.clone(),
                    });
                };
                if !dependencies[i].contains(&j) {
                    dependencies[i].push(j);
                    dependents[j].push(i);
                }
            }
        }

        Ok(Self {
            names: nodes.iter().map(|(name, _)| (*name).to_string()).collect(),
            dependencies,
            dependents,
        })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, index: usize) -> &str {
        &self.names[index]
    }

    /// Indices of every node that transitively depends on `index`.
    pub fn dependents_of(&self, index: usize) -> HashSet<usize> {
        let mut seen = HashSet::new();
        let mut stack = vec![index];
        while let Some(node) = stack.pop() {
            for &next in &self.dependents[node] {
                if seen.insert(next) {
                    stack.push(next);
                }
            }
        }
        seen
    }

    /// Topological order of node indices (Kahn's algorithm).
    ///
    /// Among nodes that are ready at the same time the one registered first
    /// runs first, so identical registrations always produce identical orders.
    pub fn order(&self) -> Result<Vec<usize>, ConfigurationError> {
        let mut in_degree: Vec<usize> = self.dependencies.iter().map(Vec::len).collect();
        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &d)| d == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(self.len());
        while let Some(Reverse(node)) = ready.pop() {
            order.push(node);
            for &next in &self.dependents[node] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }

        if order.len() == self.len() {
            Ok(order)
        } else {
            Err(ConfigurationError::Cycle {
                members: self.find_cycle(),
            })
        }
    }

    /// Members of the strongly connected component that blocks ordering.
    ///
    /// Nodes are returned in registration order. When several independent
    /// cycles exist, the one containing the earliest registered node is
    /// reported.
    fn find_cycle(&self) -> Vec<String> {
        let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();
        for node in 0..self.len() {
            graph.add_node(node);
        }
        for (node, deps) in self.dependencies.iter().enumerate() {
            for &dep in deps {
                graph.add_edge(node, dep, ());
            }
        }

        tarjan_scc(&graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
            .map(|mut scc| {
                scc.sort_unstable();
                scc
            })
            .min_by_key(|scc| scc[0])
            .map(|scc| scc.iter().map(|&i| self.names[i].clone()).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&str, &[&str])]) -> Result<DependencyGraph, ConfigurationError> {
        let owned: Vec<(String, Vec<String>)> = edges
            .iter()
            .map(|(n, deps)| ((*n).to_string(), deps.iter().map(|d| (*d).to_string()).collect()))
            .collect();
        DependencyGraph::new(owned.iter().map(|(n, d)| (n.as_str(), d.as_slice())))
    }

    fn names(g: &DependencyGraph, order: &[usize]) -> Vec<String> {
        order.iter().map(|&i| g.name(i).to_string()).collect()
    }

    #[test]
    fn test_order_respects_dependencies() {
        let g = graph(&[("c", &["a", "b"]), ("b", &["a"]), ("a", &[])]).unwrap();
        let order = g.order().unwrap();
        assert_eq!(names(&g, &order), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_ties_broken_by_registration_order() {
        let g = graph(&[("x", &[]), ("y", &[]), ("z", &["y"]), ("w", &[])]).unwrap();
        let order = g.order().unwrap();
        assert_eq!(names(&g, &order), vec!["x", "y", "w", "z"]);
    }

    #[test]
    fn test_missing_dependency() {
        let err = graph(&[("a", &["ghost"])]).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::MissingDependency {
                action: "a".into(),
                dependency: "ghost".into(),
            }
        );
    }

    #[test]
    fn test_duplicate_name() {
        let err = graph(&[("a", &[]), ("a", &[])]).unwrap_err();
        assert_eq!(err, ConfigurationError::DuplicateAction("a".into()));
    }

    #[test]
    fn test_empty_name() {
        assert_eq!(graph(&[("", &[])]).unwrap_err(), ConfigurationError::EmptyName);
    }

    #[test]
    fn test_cycle_names_members() {
        let g = graph(&[("root", &[]), ("a", &["root", "c"]), ("b", &["a"]), ("c", &["b"]), ("tail", &["a"])])
            .unwrap();
        let ConfigurationError::Cycle { members } = g.order().unwrap_err() else {
            panic!("expected a cycle");
        };

        assert_eq!(members, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_earliest_cycle_reported_first() {
        let g = graph(&[("x", &["y"]), ("y", &["x"]), ("a", &["b"]), ("b", &["a"])]).unwrap();
        assert_eq!(
            g.order().unwrap_err(),
            ConfigurationError::Cycle {
                members: vec!["x".into(), "y".into()],
            }
        );
    }

    #[test]
    fn test_self_loop_is_cycle() {
        let g = graph(&[("a", &["a"])]).unwrap();
        assert_eq!(
            g.order().unwrap_err(),
            ConfigurationError::Cycle {
                members: vec!["a".into()],
            }
        );
    }

    #[test]
    fn test_dependents_are_transitive() {
        let g = graph(&[("a", &[]), ("b", &["a"]), ("c", &["b"]), ("d", &[])]).unwrap();
        let dependents = g.dependents_of(0);
        assert_eq!(dependents, HashSet::from([1, 2]));
        assert!(g.dependents_of(3).is_empty());
    }

    #[test]
    fn test_order_is_deterministic() {
        let edges: &[(&str, &[&str])] = &[
            ("e", &["b", "d"]),
            ("a", &[]),
            ("d", &["a"]),
            ("b", &["a"]),
            ("c", &[]),
        ];
        let first = graph(edges).unwrap().order().unwrap();
        for _ in 0..10 {
            assert_eq!(graph(edges).unwrap().order().unwrap(), first);
        }
    }
}
