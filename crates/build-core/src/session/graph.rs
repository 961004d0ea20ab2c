//! Graph-build mode's static cycle check: a pre-build pass over a host's
//! already-evaluated project reference graph, complementing the scheduler's
//! own dynamic `register_block_on`/`reaches` check for requests that only
//! reveal their children at execution time.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::SchedulerError;

/// One project in a host-supplied static reference graph. `dependencies` are
/// indices into the same slice this node lives in.
#[derive(Debug, Clone)]
pub struct ProjectGraphNode {
    pub project_full_path: PathBuf,
    pub global_properties: BTreeMap<String, String>,
    pub dependencies: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Rejects the graph if any project reference chain returns to its origin.
/// Runs once, before any node is dispatched, so a cyclic graph never gets as
/// far as submitting a single request.
pub fn validate_no_static_cycles(nodes: &[ProjectGraphNode]) -> Result<(), SchedulerError> {
    let mut marks = vec![Mark::Unvisited; nodes.len()];
    for start in 0..nodes.len() {
        if marks[start] == Mark::Unvisited {
            visit(nodes, start, &mut marks, &mut Vec::new())?;
        }
    }
    Ok(())
}

fn visit(nodes: &[ProjectGraphNode], index: usize, marks: &mut [Mark], path: &mut Vec<usize>) -> Result<(), SchedulerError> {
    match marks[index] {
        Mark::Done => return Ok(()),
        Mark::InProgress => {
            let mut cycle: Vec<i32> = path.iter().map(|&i| i as i32).collect();
            cycle.push(index as i32);
            return Err(SchedulerError::CircularDependency(cycle));
        }
        Mark::Unvisited => {}
    }
    marks[index] = Mark::InProgress;
    path.push(index);
    for &dep in &nodes[index].dependencies {
        visit(nodes, dep, marks, path)?;
    }
    path.pop();
    marks[index] = Mark::Done;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(deps: &[usize]) -> ProjectGraphNode {
        ProjectGraphNode { project_full_path: PathBuf::from("/p.proj"), global_properties: BTreeMap::new(), dependencies: deps.to_vec() }
    }

    #[test]
    fn acyclic_chain_passes() {
        let nodes = vec![node(&[1]), node(&[2]), node(&[])];
        assert!(validate_no_static_cycles(&nodes).is_ok());
    }

    #[test]
    fn direct_cycle_is_rejected() {
        let nodes = vec![node(&[1]), node(&[0])];
        assert!(matches!(validate_no_static_cycles(&nodes), Err(SchedulerError::CircularDependency(_))));
    }

    #[test]
    fn self_reference_is_rejected() {
        let nodes = vec![node(&[0])];
        assert!(validate_no_static_cycles(&nodes).is_err());
    }

    #[test]
    fn shared_dependency_without_cycle_passes() {
        // 0 -> 2, 1 -> 2: a diamond, not a cycle.
        let nodes = vec![node(&[2]), node(&[2]), node(&[])];
        assert!(validate_no_static_cycles(&nodes).is_ok());
    }
}
