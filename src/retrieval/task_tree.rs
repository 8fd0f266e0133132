//! Greedy task-tree retrieval.
//!
//! Backward chaining from the goal node over the outputs-to-units map: pop an
//! unmet object from a FIFO queue, try its producing units newest first, and
//! commit the first unit whose inputs are all available. Committing marks the
//! unit's outputs as available and purges the object's recorded subgoals from
//! the queue. An object no unit produces is assumed obtainable as-is. The
//! search gives up once the goal node has been re-encountered more often than
//! the configured depth bound, which breaks recipe cycles deterministically.

use std::collections::VecDeque;

use indexmap::IndexMap;
use rayon::prelude::*;

use crate::config::RetrievalConfig;
use crate::error::RetrievalError;
use crate::graph::indices::LevelIndices;
use crate::graph::node::{NodeIndex, ObjectNode, UnitIndex};
use crate::graph::{FoonGraph, LevelGraph};
use crate::retrieval::{find_goal_candidates, resolve_environment, GoalSpec, Plan, Substituter};
use crate::types::Level;

/// Finds the first plan that produces the goal from the given items.
///
/// Goal candidates (every graph node matching the goal's signature) are tried
/// newest first; the first one that resolves wins. A goal already present in
/// the environment yields an empty plan.
pub fn retrieve(
    graph: &FoonGraph,
    level: Level,
    goal: &GoalSpec,
    environment: &[ObjectNode],
    config: &RetrievalConfig,
    substituter: &dyn Substituter,
) -> Result<Plan, RetrievalError> {
    let indices = graph.indices(level).ok_or(RetrievalError::IndicesNotBuilt)?;
    let arena = graph.level(level);
    let env = resolve_environment(graph, level, environment, substituter);
    let goals = find_goal_candidates(graph, level, goal)?;

    if let Some(&goal_node) = goals.iter().find(|g| env.contains(g)) {
        log::debug!(
            "[task_tree] goal '{}' already available, nothing to do",
            arena.object(goal_node).label
        );
        return Ok(Plan::new(Vec::new()));
    }

    // candidate goal nodes are independent searches over a read-only graph;
    // try them in parallel and keep the first success in candidate order
    let outcomes: Vec<Result<Plan, RetrievalError>> = goals
        .par_iter()
        .map(|&goal_node| search_from(arena, indices, goal_node, &env, level, config))
        .collect();

    let mut last_failure = None;
    for (goal_node, outcome) in goals.iter().zip(outcomes) {
        match outcome {
            Ok(plan) => {
                log::info!(
                    "[task_tree] plan of {} units found for '{}'",
                    plan.len(),
                    arena.object(*goal_node).label
                );
                return Ok(plan);
            }
            Err(err) => {
                log::debug!("[task_tree] candidate {goal_node} failed: {err}");
                last_failure = Some(err);
            }
        }
    }

    // goals is non-empty, so at least one failure was recorded
    Err(last_failure.unwrap_or(RetrievalError::GoalNotFound {
        key: goal.key(),
        level: level.index() as u8 + 1,
    }))
}

fn search_from(
    arena: &LevelGraph,
    indices: &LevelIndices,
    goal_node: NodeIndex,
    env: &[NodeIndex],
    level: Level,
    config: &RetrievalConfig,
) -> Result<Plan, RetrievalError> {
    let mut queue: VecDeque<NodeIndex> = VecDeque::from([goal_node]);
    let mut subgoals: IndexMap<NodeIndex, Vec<NodeIndex>> = IndexMap::new();
    let mut available: Vec<NodeIndex> = env.to_vec();
    let mut tree: Vec<UnitIndex> = Vec::new();
    let mut re_encounters = 0usize;

    while let Some(node) = queue.pop_front() {
        if node == goal_node {
            re_encounters += 1;
            if re_encounters > config.depth_bound {
                return Err(RetrievalError::UnresolvableWithinDepth {
                    key: arena.object(goal_node).object_key(level),
                    bound: config.depth_bound,
                    pending: queue.into_iter().collect(),
                    available,
                });
            }
        }

        if available.contains(&goal_node) {
            break;
        }
        if available.contains(&node) {
            continue;
        }

        let mut producers = indices.outputs_to_units[node].clone();
        if producers.is_empty() {
            // nothing in the graph makes this object, so take it as given
            log::debug!(
                "[task_tree] no producer for '{}', assuming it is obtainable",
                arena.object(node).label
            );
            available.push(node);
            continue;
        }

        let mut committed = false;
        while let Some(unit) = producers.pop() {
            let inputs = &arena.units[unit].inputs;
            let mut satisfied = 0;
            for &input in inputs {
                if available.contains(&input) {
                    satisfied += 1;
                } else if !queue.contains(&input) {
                    let mini_goals = subgoals.entry(node).or_default();
                    if !mini_goals.contains(&input) {
                        mini_goals.push(input);
                    }
                    queue.push_back(input);
                }
            }

            if satisfied == inputs.len() && satisfied > 0 {
                // every unmet object queued for this node is now moot
                if let Some(mini_goals) = subgoals.swap_remove(&node) {
                    queue.retain(|n| !mini_goals.contains(n));
                }
                push_unique(&mut available, node);
                for &out in &arena.units[unit].outputs {
                    push_unique(&mut available, out);
                }
                if !tree.contains(&unit) {
                    tree.push(unit);
                }
                committed = true;
                break;
            }
        }

        if !committed && !queue.contains(&node) {
            // retry once its subgoals have been worked through
            queue.push_back(node);
        }
    }

    if available.contains(&goal_node) {
        Ok(Plan::new(tree))
    } else {
        Err(RetrievalError::UnresolvableWithinDepth {
            key: arena.object(goal_node).object_key(level),
            bound: config.depth_bound,
            pending: queue.into_iter().collect(),
            available,
        })
    }
}

fn push_unique(list: &mut Vec<NodeIndex>, node: NodeIndex) {
    if !list.contains(&node) {
        list.push(node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::State;
    use crate::loader::test_support::{bread_graph, raw_unit, states};
    use crate::retrieval::NoSubstitution;

    fn item(object_type: i32, label: &str, state_list: &[(i32, &str)]) -> ObjectNode {
        let mut o = ObjectNode::new(object_type, label);
        for (t, l) in state_list {
            o.add_state(State::new(*t, *l));
        }
        o
    }

    fn retrieve_bread(graph: &FoonGraph, env: &[ObjectNode]) -> Result<Plan, RetrievalError> {
        retrieve(
            graph,
            Level::Three,
            &GoalSpec::new(3, vec![12]),
            env,
            &RetrievalConfig::default(),
            &NoSubstitution,
        )
    }

    #[test]
    fn chains_backward_to_raw_materials() {
        let mut graph = bread_graph();
        graph.build_indices();

        // flour is not produced by any unit, so it is assumed obtainable
        let plan = retrieve_bread(&graph, &[]).unwrap();
        let arena = graph.level(Level::Three);
        let labels: Vec<&str> = plan
            .units
            .iter()
            .map(|&u| arena.motion(arena.units[u].motion).label.as_str())
            .collect();
        assert_eq!(labels, vec!["mix", "bake"]);
    }

    #[test]
    fn explicit_environment_yields_the_same_plan() {
        let mut graph = bread_graph();
        graph.build_indices();
        let env = vec![item(1, "flour", &[(10, "whole")])];
        let plan = retrieve_bread(&graph, &env).unwrap();
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn goal_in_environment_needs_no_steps() {
        let mut graph = bread_graph();
        graph.build_indices();
        let env = vec![item(3, "bread", &[(12, "baked")])];
        let plan = retrieve_bread(&graph, &env).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn unknown_goal_is_reported() {
        let mut graph = bread_graph();
        graph.build_indices();
        let err = retrieve(
            &graph,
            Level::Three,
            &GoalSpec::new(99, vec![1]),
            &[],
            &RetrievalConfig::default(),
            &NoSubstitution,
        )
        .unwrap_err();
        assert!(matches!(err, RetrievalError::GoalNotFound { .. }));
    }

    #[test]
    fn cyclic_recipes_hit_the_depth_bound() {
        let mut graph = bread_graph();
        // close the loop: bread can be ground back into flour
        graph
            .append_unit(&raw_unit(
                &[(3, "bread", states(&[(12, "baked")]))],
                (9, "grind"),
                &[(1, "flour", states(&[(10, "whole")]))],
            ))
            .unwrap();
        graph.build_indices();

        let err = retrieve_bread(&graph, &[]).unwrap_err();
        match err {
            RetrievalError::UnresolvableWithinDepth { bound, .. } => assert_eq!(bound, 25),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn depth_bound_is_configurable() {
        let mut graph = bread_graph();
        graph
            .append_unit(&raw_unit(
                &[(3, "bread", states(&[(12, "baked")]))],
                (9, "grind"),
                &[(1, "flour", states(&[(10, "whole")]))],
            ))
            .unwrap();
        graph.build_indices();

        let config = RetrievalConfig {
            depth_bound: 3,
            ..RetrievalConfig::default()
        };
        let err = retrieve(
            &graph,
            Level::Three,
            &GoalSpec::new(3, vec![12]),
            &[],
            &config,
            &NoSubstitution,
        )
        .unwrap_err();
        match err {
            RetrievalError::UnresolvableWithinDepth { bound, .. } => assert_eq!(bound, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn indices_are_required() {
        let graph = bread_graph();
        let err = retrieve_bread(&graph, &[]).unwrap_err();
        assert!(matches!(err, RetrievalError::IndicesNotBuilt));
    }
}
