//! Exhaustive path-tree retrieval.
//!
//! For every unit that produces the goal, a search tree is grown breadth
//! first: a tree node holds a set of functional units, and its children are
//! the Cartesian combinations of the producer sets of the node's unmet
//! inputs. Tree nodes are hash-consed on their unit set, ancestor sets keep
//! recipe cycles out of every branch, and inputs that are raw materials
//! (producer-less, base-state or already in the environment) are never
//! expanded. Every root-to-leaf branch then yields one plan in execution
//! order. Roots are independent, so they are explored in parallel.

use std::collections::VecDeque;

use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use rayon::prelude::*;

use crate::config::{PathTreeOptions, RetrievalConfig};
use crate::error::RetrievalError;
use crate::graph::indices::LevelIndices;
use crate::graph::node::{NodeIndex, ObjectNode, UnitIndex};
use crate::graph::{FoonGraph, LevelGraph};
use crate::retrieval::{
    find_goal_candidates, object_is_kept, resolve_environment, GoalSpec, Plan, Substituter,
};
use crate::types::Level;

/// Enumerates every acyclic plan that produces the goal.
///
/// The result preserves root order (newest goal candidates first) and is free
/// of duplicate plans; it is empty when the goal exists but nothing in the
/// graph produces it.
pub fn retrieve(
    graph: &FoonGraph,
    level: Level,
    goal: &GoalSpec,
    environment: &[ObjectNode],
    config: &RetrievalConfig,
    options: &PathTreeOptions,
    substituter: &dyn Substituter,
) -> Result<Vec<Plan>, RetrievalError> {
    let indices = graph.indices(level).ok_or(RetrievalError::IndicesNotBuilt)?;
    let arena = graph.level(level);
    let env = resolve_environment(graph, level, environment, substituter);
    let goals = find_goal_candidates(graph, level, goal)?;

    if let Some(&goal_node) = goals.iter().find(|g| env.contains(g)) {
        log::debug!(
            "[path_tree] goal '{}' already available, nothing to do",
            arena.object(goal_node).label
        );
        return Ok(vec![Plan::new(Vec::new())]);
    }

    // one root per (producing unit, goal candidate) pair; candidates at
    // level 3 are matched at level 2 so ingredient variants share roots
    let match_level = level.match_level();
    let mut roots: Vec<(UnitIndex, NodeIndex)> = Vec::new();
    for goal_node in goals {
        let target = arena.object(goal_node);
        for (u, unit) in arena.units.iter().enumerate() {
            let produces_goal = unit
                .outputs
                .iter()
                .any(|&out| arena.object(out).matches(target, match_level));
            if produces_goal && !roots.contains(&(u, goal_node)) {
                roots.push((u, goal_node));
            }
        }
    }
    log::debug!("[path_tree] exploring {} roots for {}", roots.len(), goal.key());

    let per_root: Vec<Vec<Plan>> = roots
        .par_iter()
        .map(|&(unit, goal_node)| {
            explore_root(arena, indices, unit, goal_node, &env, config, options)
        })
        .collect();

    let mut plans: Vec<Plan> = Vec::new();
    for plan in per_root.into_iter().flatten() {
        if !plans.contains(&plan) {
            plans.push(plan);
        }
    }
    log::info!("[path_tree] {} distinct plans for {}", plans.len(), goal.key());
    Ok(plans)
}

/// One node of the search tree over unit combinations.
#[derive(Debug, Clone, Default)]
struct TreeNode {
    /// The functional units this node commits to, kept sorted.
    units: Vec<UnitIndex>,
    /// Units already committed anywhere on a branch through this node;
    /// candidates drawn from this set would close a cycle.
    ancestors: IndexSet<UnitIndex>,
    /// Object nodes whose production is already accounted for.
    items_seen: IndexSet<NodeIndex>,
    children: Vec<usize>,
    depth: usize,
}

fn explore_root(
    arena: &LevelGraph,
    indices: &LevelIndices,
    root_unit: UnitIndex,
    goal_node: NodeIndex,
    env: &[NodeIndex],
    config: &RetrievalConfig,
    options: &PathTreeOptions,
) -> Vec<Plan> {
    // ingredients that pertain to the goal: the goal node's own list plus
    // whatever the root unit's inputs carry
    let goal = arena.object(goal_node);
    let mut relevant_ingredients: IndexSet<String> =
        goal.ingredient_labels().into_iter().collect();
    for &input in &arena.units[root_unit].inputs {
        relevant_ingredients.extend(arena.object(input).ingredient_labels());
    }

    let mut root = TreeNode {
        units: vec![root_unit],
        ..TreeNode::default()
    };
    // the root unit is taken as executed, so its outputs are settled
    root.items_seen
        .extend(arena.units[root_unit].outputs.iter().copied());

    let mut nodes: Vec<TreeNode> = vec![root];
    let mut interned: IndexMap<Vec<UnitIndex>, usize> = IndexMap::new();
    interned.insert(vec![root_unit], 0);

    let mut queue: VecDeque<usize> = VecDeque::from([0]);
    while let Some(head) = queue.pop_front() {
        if let Some(max) = options.max_height {
            if nodes[head].depth > max {
                continue;
            }
        }

        let mut seen = nodes[head].items_seen.clone();
        let mut ancestors = nodes[head].ancestors.clone();
        ancestors.extend(nodes[head].units.iter().copied());

        // one OR-set per unmet input: the units able to produce it
        let mut or_sets: IndexSet<Vec<UnitIndex>> = IndexSet::new();
        for &unit in &nodes[head].units.clone() {
            for &input in &arena.units[unit].inputs {
                let object = arena.object(input);
                if !options.objects_to_keep.is_empty()
                    && !object_is_kept(object, &options.objects_to_keep)
                {
                    continue;
                }
                if indices.is_starting_node(input)
                    || is_base_state(object, config)
                    || env.contains(&input)
                {
                    continue;
                }
                if !seen.insert(input) {
                    continue;
                }

                let mut candidates = indices.outputs_to_units[input].clone();
                if options.check_ingredient_context && !relevant_ingredients.is_empty() {
                    candidates = filter_by_ingredient_context(
                        arena,
                        candidates,
                        &relevant_ingredients,
                        config.ingredient_overlap_slack,
                        &mut ancestors,
                    );
                }

                let mut or_set: Vec<UnitIndex> = candidates
                    .into_iter()
                    .filter(|c| !ancestors.contains(c))
                    .collect();
                or_set.sort_unstable();
                or_set.dedup();
                if !or_set.is_empty() {
                    or_sets.insert(or_set);
                }
            }
        }
        if or_sets.is_empty() {
            continue;
        }

        // one child per way of picking a producer for every unmet input
        let mut combos: IndexSet<Vec<UnitIndex>> = IndexSet::new();
        for picks in or_sets.iter().multi_cartesian_product() {
            let mut combo: Vec<UnitIndex> = picks.into_iter().copied().collect();
            combo.sort_unstable();
            combo.dedup();
            combos.insert(combo);
        }
        let mut combos: Vec<Vec<UnitIndex>> = combos.into_iter().collect();
        combos.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        if let Some(max) = options.max_children {
            combos.truncate(max);
        }

        for combo in combos {
            let (child, is_new) = match interned.get(&combo) {
                Some(&existing) => (existing, false),
                None => {
                    let idx = nodes.len();
                    nodes.push(TreeNode {
                        units: combo.clone(),
                        depth: nodes[head].depth + 1,
                        ..TreeNode::default()
                    });
                    interned.insert(combo.clone(), idx);
                    (idx, true)
                }
            };

            let mut child_seen = seen.clone();
            for &unit in &combo {
                child_seen.extend(arena.units[unit].outputs.iter().copied());
            }

            let node = &mut nodes[child];
            node.items_seen.extend(child_seen);
            node.ancestors.extend(ancestors.iter().copied());
            if !nodes[head].children.contains(&child) {
                nodes[head].children.push(child);
            }
            if is_new {
                queue.push_back(child);
            }
        }
    }

    let mut paths = Vec::new();
    let mut on_path = Vec::new();
    let mut prefix = Vec::new();
    collect_paths(&nodes, 0, &mut on_path, &mut prefix, &mut paths);
    paths.into_iter().map(Plan::new).collect()
}

/// Keeps candidates whose output ingredients overlap the goal-relevant set
/// closely enough; rejected candidates are treated as visited so they are
/// excluded from the whole branch.
fn filter_by_ingredient_context(
    arena: &LevelGraph,
    candidates: Vec<UnitIndex>,
    relevant: &IndexSet<String>,
    slack: f64,
    ancestors: &mut IndexSet<UnitIndex>,
) -> Vec<UnitIndex> {
    let mut kept = Vec::new();
    for c in candidates {
        let mut required: IndexSet<String> = IndexSet::new();
        for &out in &arena.units[c].outputs {
            required.extend(arena.object(out).ingredient_labels());
        }
        if required.is_empty() {
            kept.push(c);
            continue;
        }
        let uncovered = required.iter().filter(|i| !relevant.contains(*i)).count();
        if (uncovered as f64 / required.len() as f64) <= slack && uncovered < required.len() {
            kept.push(c);
        } else {
            ancestors.insert(c);
        }
    }
    kept
}

/// An object whose states all come from the base-state vocabulary counts as
/// raw material; so does a stateless one.
fn is_base_state(object: &ObjectNode, config: &RetrievalConfig) -> bool {
    object.states.iter().all(|s| {
        s.label
            .as_deref()
            .map(|l| config.is_base_state_label(l))
            .unwrap_or(false)
    })
}

/// Walks every root-to-leaf branch, flattening the unit lists along the way;
/// reversing a branch gives execution order (goal-producing unit last). The
/// on-path guard keeps shared subtrees from looping the walk.
fn collect_paths(
    nodes: &[TreeNode],
    current: usize,
    on_path: &mut Vec<usize>,
    prefix: &mut Vec<UnitIndex>,
    out: &mut Vec<Vec<UnitIndex>>,
) {
    on_path.push(current);
    let before = prefix.len();
    prefix.extend(nodes[current].units.iter().copied());

    let mut descended = false;
    for &child in &nodes[current].children {
        if !on_path.contains(&child) {
            descended = true;
            collect_paths(nodes, child, on_path, prefix, out);
        }
    }
    if !descended {
        let mut path = prefix.clone();
        path.reverse();
        out.push(path);
    }

    prefix.truncate(before);
    on_path.pop();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::State;
    use crate::loader::test_support::{bread_graph, raw_unit, states};
    use crate::retrieval::NoSubstitution;

    fn plans_for(
        graph: &FoonGraph,
        goal: GoalSpec,
        env: &[ObjectNode],
        options: &PathTreeOptions,
    ) -> Vec<Plan> {
        retrieve(
            graph,
            Level::Three,
            &goal,
            env,
            &RetrievalConfig::default(),
            options,
            &NoSubstitution,
        )
        .unwrap()
    }

    fn motion_labels(graph: &FoonGraph, plan: &Plan) -> Vec<String> {
        let arena = graph.level(Level::Three);
        plan.units
            .iter()
            .map(|&u| arena.motion(arena.units[u].motion).label.clone())
            .collect()
    }

    #[test]
    fn single_recipe_yields_single_plan_in_execution_order() {
        let mut graph = bread_graph();
        graph.build_indices();
        let plans = plans_for(&graph, GoalSpec::new(3, vec![12]), &[], &PathTreeOptions::default());
        assert_eq!(plans.len(), 1);
        assert_eq!(motion_labels(&graph, &plans[0]), vec!["mix", "bake"]);
    }

    #[test]
    fn alternative_producers_fork_into_separate_plans() {
        let mut graph = bread_graph();
        // a second way of obtaining mixed dough
        graph
            .append_unit(&raw_unit(
                &[(4, "premix", states(&[(11, "mixed")]))],
                (7, "knead"),
                &[(2, "dough", states(&[(11, "mixed")]))],
            ))
            .unwrap();
        graph.build_indices();

        let plans = plans_for(&graph, GoalSpec::new(3, vec![12]), &[], &PathTreeOptions::default());
        let mut all: Vec<Vec<String>> = plans.iter().map(|p| motion_labels(&graph, p)).collect();
        all.sort();
        assert_eq!(all, vec![vec!["knead", "bake"], vec!["mix", "bake"]]);
    }

    #[test]
    fn goal_in_environment_needs_no_plan() {
        let mut graph = bread_graph();
        graph.build_indices();
        let mut bread = ObjectNode::new(3, "bread");
        bread.add_state(State::new(12, "baked"));
        let plans = plans_for(
            &graph,
            GoalSpec::new(3, vec![12]),
            &[bread],
            &PathTreeOptions::default(),
        );
        assert_eq!(plans.len(), 1);
        assert!(plans[0].is_empty());
    }

    #[test]
    fn environment_items_are_not_expanded() {
        let mut graph = bread_graph();
        graph.build_indices();
        let mut dough = ObjectNode::new(2, "dough");
        dough.add_state(State::new(11, "mixed"));
        let plans = plans_for(
            &graph,
            GoalSpec::new(3, vec![12]),
            &[dough],
            &PathTreeOptions::default(),
        );
        assert_eq!(plans.len(), 1);
        assert_eq!(motion_labels(&graph, &plans[0]), vec!["bake"]);
    }

    #[test]
    fn cycles_are_cut_by_ancestor_exclusion() {
        let mut graph = bread_graph();
        // flour in a non-base state, producible from bread: a genuine cycle
        graph
            .append_unit(&raw_unit(
                &[(1, "meal", states(&[(14, "ground")]))],
                (8, "sift"),
                &[(2, "dough", states(&[(11, "mixed")]))],
            ))
            .unwrap();
        graph
            .append_unit(&raw_unit(
                &[(3, "bread", states(&[(12, "baked")]))],
                (9, "grind"),
                &[(1, "meal", states(&[(14, "ground")]))],
            ))
            .unwrap();
        graph.build_indices();

        let plans = plans_for(&graph, GoalSpec::new(3, vec![12]), &[], &PathTreeOptions::default());
        // the sift branch chains to grind, whose only producer is the root
        // unit itself, so every branch terminates
        let mut all: Vec<Vec<String>> = plans.iter().map(|p| motion_labels(&graph, p)).collect();
        all.sort();
        assert_eq!(
            all,
            vec![vec!["grind", "sift", "bake"], vec!["mix", "bake"]]
        );
    }

    #[test]
    fn max_height_limits_expansion_depth() {
        let mut graph = bread_graph();
        graph
            .append_unit(&raw_unit(
                &[(5, "grain", states(&[(15, "milled")]))],
                (4, "refine"),
                &[(2, "dough", states(&[(11, "mixed")]))],
            ))
            .unwrap();
        graph
            .append_unit(&raw_unit(
                &[(6, "seed", states(&[(16, "crushed")]))],
                (2, "mill"),
                &[(5, "grain", states(&[(15, "milled")]))],
            ))
            .unwrap();
        graph.build_indices();

        let shallow = PathTreeOptions {
            max_height: Some(0),
            ..PathTreeOptions::default()
        };
        let plans = plans_for(&graph, GoalSpec::new(3, vec![12]), &[], &shallow);
        // children at depth 1 are recorded but never expanded
        assert!(plans.iter().all(|p| p.len() <= 2));

        let deep = plans_for(&graph, GoalSpec::new(3, vec![12]), &[], &PathTreeOptions::default());
        assert!(deep.iter().any(|p| p.len() == 3));
    }

    #[test]
    fn max_children_keeps_smallest_combinations() {
        let mut graph = bread_graph();
        graph
            .append_unit(&raw_unit(
                &[(4, "premix", states(&[(11, "mixed")]))],
                (7, "knead"),
                &[(2, "dough", states(&[(11, "mixed")]))],
            ))
            .unwrap();
        graph.build_indices();

        let truncated = PathTreeOptions {
            max_children: Some(1),
            ..PathTreeOptions::default()
        };
        let plans = plans_for(&graph, GoalSpec::new(3, vec![12]), &[], &truncated);
        assert_eq!(plans.len(), 1);
    }

    #[test]
    fn irrelevant_ingredient_context_prunes_candidates() {
        // two ways to obtain flour batter; one drags a chocolate byproduct
        // into the branch and is pruned when ingredient context is on
        let mut whip = raw_unit(
            &[(9, "cream", states(&[(18, "raw")]))],
            (3, "whip"),
            &[(4, "batter", states(&[(11, "mixed")]))],
        );
        whip.outputs[0].ingredients = vec!["flour".into()];
        let mut fold = raw_unit(
            &[(8, "cocoa", states(&[(17, "melted")]))],
            (7, "fold"),
            &[
                (4, "batter", states(&[(11, "mixed")])),
                (10, "goo", states(&[(19, "sticky")])),
            ],
        );
        fold.outputs[0].ingredients = vec!["flour".into()];
        fold.outputs[1].ingredients = vec!["chocolate".into()];
        let mut bake = raw_unit(
            &[(4, "batter", states(&[(11, "mixed")]))],
            (6, "bake"),
            &[(7, "cake", states(&[(12, "baked")]))],
        );
        bake.inputs[0].ingredients = vec!["flour".into()];
        bake.outputs[0].ingredients = vec!["flour".into()];

        let mut graph = FoonGraph::new();
        graph.append_unit(&whip).unwrap();
        graph.append_unit(&fold).unwrap();
        graph.append_unit(&bake).unwrap();
        graph.build_indices();

        let plans = plans_for(&graph, GoalSpec::new(7, vec![12]), &[], &PathTreeOptions::default());
        let motions: Vec<Vec<String>> = plans.iter().map(|p| motion_labels(&graph, p)).collect();
        assert_eq!(motions, vec![vec!["whip", "bake"]]);

        let unchecked = PathTreeOptions {
            check_ingredient_context: false,
            ..PathTreeOptions::default()
        };
        let plans = plans_for(&graph, GoalSpec::new(7, vec![12]), &[], &unchecked);
        let mut motions: Vec<Vec<String>> = plans.iter().map(|p| motion_labels(&graph, p)).collect();
        motions.sort();
        assert_eq!(motions, vec![vec!["fold", "bake"], vec!["whip", "bake"]]);
    }

    #[test]
    fn projection_skips_irrelevant_inputs_during_search() {
        let mut graph = bread_graph();
        graph.build_indices();
        let options = PathTreeOptions {
            objects_to_keep: vec!["bread".into(), "flour".into()],
            ..PathTreeOptions::default()
        };
        // dough is not kept, so the root unit has no unmet inputs at all
        let plans = plans_for(&graph, GoalSpec::new(3, vec![12]), &[], &options);
        assert_eq!(plans.len(), 1);
        assert_eq!(motion_labels(&graph, &plans[0]), vec!["bake"]);
    }
}
