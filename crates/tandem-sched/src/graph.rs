//! Dependency-graph construction and validation.
//!
//! Built once at `build()` time from the actions' declared read/write
//! sets. Validation order: duplicate writers first, then undeclared
//! reads, then cycle detection — a configuration with several problems
//! reports the earliest class first.
//!
//! The graph is an arena of integer-indexed nodes with successor lists
//! and dependency counts; round execution decrements counts instead of
//! walking pointers.

use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;
use tandem_action::Action;
use tandem_core::{AttrRef, BuildError};

/// Edge lists and dependency counts for one scheduler's actions.
#[derive(Clone, Debug)]
pub(crate) struct DepGraph {
    /// `succs[i]` = indices of actions that must wait for action `i`.
    pub(crate) succs: Vec<SmallVec<[usize; 4]>>,
    /// `dep_count[i]` = number of distinct predecessors of action `i`.
    pub(crate) dep_count: Vec<usize>,
    /// Which action writes each attribute.
    pub(crate) writer_of: IndexMap<AttrRef, usize>,
}

impl DepGraph {
    /// Number of nodes.
    pub(crate) fn len(&self) -> usize {
        self.succs.len()
    }
}

/// Build and validate the dependency graph.
pub(crate) fn build_graph(
    actions: &[Box<dyn Action>],
    externals: &IndexSet<AttrRef>,
) -> Result<DepGraph, BuildError> {
    if actions.is_empty() {
        return Err(BuildError::EmptyScheduler);
    }

    // 1. Single-writer check, in registration order.
    let mut writer_of: IndexMap<AttrRef, usize> = IndexMap::new();
    for (i, action) in actions.iter().enumerate() {
        for attr in action.writes() {
            if let Some(&j) = writer_of.get(&attr) {
                return Err(BuildError::DuplicateWriter {
                    attr,
                    first: actions[j].name().to_string(),
                    second: actions[i].name().to_string(),
                });
            }
            writer_of.insert(attr, i);
        }
    }

    // 2. Every read must have a writer or be declared external.
    for action in actions {
        for attr in action.reads() {
            if !writer_of.contains_key(&attr) && !externals.contains(&attr) {
                return Err(BuildError::UndeclaredAttribute {
                    action: action.name().to_string(),
                    attr,
                });
            }
        }
    }

    // 3. Edges: producer -> consumer for every sibling-written read,
    // plus barrier ordering (everything before a barrier precedes it,
    // everything after follows it).
    let n = actions.len();
    let mut succs: Vec<SmallVec<[usize; 4]>> = vec![SmallVec::new(); n];
    let mut dep_count = vec![0usize; n];

    let mut add_edge = |succs: &mut Vec<SmallVec<[usize; 4]>>,
                        dep_count: &mut Vec<usize>,
                        from: usize,
                        to: usize| {
        if from != to && !succs[from].contains(&to) {
            succs[from].push(to);
            dep_count[to] += 1;
        }
    };

    for (i, action) in actions.iter().enumerate() {
        for attr in action.reads() {
            if let Some(&w) = writer_of.get(&attr) {
                if w == i {
                    // A self-read is a one-node cycle; report it with
                    // the same taxonomy as longer cycles.
                    return Err(BuildError::CycleDetected {
                        members: vec![action.name().to_string()],
                    });
                }
                add_edge(&mut succs, &mut dep_count, w, i);
            }
        }
    }
    for (b, action) in actions.iter().enumerate() {
        if action.is_barrier() {
            for i in 0..b {
                add_edge(&mut succs, &mut dep_count, i, b);
            }
            for j in (b + 1)..n {
                add_edge(&mut succs, &mut dep_count, b, j);
            }
        }
    }

    // 4. Cycle detection: iterative DFS tracking the active path.
    detect_cycle(actions, &succs)?;

    Ok(DepGraph {
        succs,
        dep_count,
        writer_of,
    })
}

/// Depth-first search for a back-edge, visiting roots in registration
/// order so the reported cycle is deterministic.
fn detect_cycle(
    actions: &[Box<dyn Action>],
    succs: &[SmallVec<[usize; 4]>],
) -> Result<(), BuildError> {
    const UNVISITED: u8 = 0;
    const ON_PATH: u8 = 1;
    const DONE: u8 = 2;

    let n = succs.len();
    let mut state = vec![UNVISITED; n];
    // (node, next successor index to explore)
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for root in 0..n {
        if state[root] != UNVISITED {
            continue;
        }
        state[root] = ON_PATH;
        stack.push((root, 0));

        while let Some(frame) = stack.last_mut() {
            let node = frame.0;
            if frame.1 < succs[node].len() {
                let succ = succs[node][frame.1];
                frame.1 += 1;
                match state[succ] {
                    UNVISITED => {
                        state[succ] = ON_PATH;
                        stack.push((succ, 0));
                    }
                    ON_PATH => {
                        // Back-edge: the cycle is the active path from
                        // `succ` down to `node`.
                        let start = stack
                            .iter()
                            .position(|&(v, _)| v == succ)
                            .unwrap_or(stack.len() - 1);
                        let members = stack[start..]
                            .iter()
                            .map(|&(v, _)| actions[v].name().to_string())
                            .collect();
                        return Err(BuildError::CycleDetected { members });
                    }
                    _ => {}
                }
            } else {
                state[node] = DONE;
                stack.pop();
            }
        }
    }
    Ok(())
}
