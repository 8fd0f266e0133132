//! Plan selection over the output of path-tree retrieval.
//!
//! Two policies: pick the plan whose objects overlap the environment the
//! most, or grade plans by their success probability while offloading the
//! least reliable steps to a human partner.

use serde::Serialize;

use crate::graph::node::ObjectNode;
use crate::graph::unit::UnitSnapshot;
use crate::graph::FoonGraph;
use crate::retrieval::{resolve_environment, Plan, Substituter};
use crate::types::Level;

/// The plan referencing the most objects that are already available. Ties
/// keep the earliest plan; `None` only when `plans` is empty.
pub fn select_by_availability<'a>(
    graph: &FoonGraph,
    level: Level,
    plans: &'a [Plan],
    environment: &[ObjectNode],
    substituter: &dyn Substituter,
) -> Option<&'a Plan> {
    let env = resolve_environment(graph, level, environment, substituter);
    let mut best: Option<&Plan> = plans.first();
    let mut best_count = 0usize;
    for plan in plans {
        let count = plan
            .referenced_objects(graph, level)
            .iter()
            .filter(|n| env.contains(n))
            .count();
        if best_count < count {
            best_count = count;
            best = Some(plan);
        }
    }
    if let Some(plan) = best {
        log::debug!(
            "[selection] best availability overlap {} over {} plans ({} units)",
            best_count,
            plans.len(),
            plan.len()
        );
    }
    best
}

/// The outcome of weighted selection for one value of M (the number of steps
/// handed to a human).
#[derive(Debug, Clone, Serialize)]
pub struct WeightedChoice {
    /// How many steps were reassigned to the human partner.
    pub human_steps: usize,
    /// Index of the winning plan in the input slice.
    pub plan: usize,
    /// The winning plan's steps with the reassignments applied.
    pub steps: Vec<UnitSnapshot>,
    /// Product of the step success rates after reassignment; -1.0 when any
    /// step lacks a rate annotation.
    pub success_probability: f64,
}

/// For every M from 0 to the longest plan's length, reassigns each plan's M
/// least reliable steps to a human (success rate 1.0) and keeps the plan with
/// the highest resulting success product.
///
/// Plans shorter than M are skipped for that M. A step without a success rate
/// poisons its plan's product to -1.0, so annotated plans always win over
/// unannotated ones; among all-invalid candidates the first plan wins.
pub fn select_by_weighting(
    graph: &FoonGraph,
    level: Level,
    plans: &[Plan],
) -> Vec<WeightedChoice> {
    let max_depth = plans.iter().map(Plan::len).max().unwrap_or(0);
    if plans.is_empty() {
        return Vec::new();
    }

    let mut choices = Vec::with_capacity(max_depth + 1);
    for human_steps in 0..=max_depth {
        let mut best: Option<WeightedChoice> = None;
        for (plan_idx, plan) in plans.iter().enumerate() {
            if plan.len() < human_steps {
                continue;
            }
            let steps = reassign_weakest(plan.snapshots(graph, level), human_steps);
            let probability = success_product(&steps);
            let replace = match &best {
                Some(current) => current.success_probability < probability,
                None => true,
            };
            if replace {
                best = Some(WeightedChoice {
                    human_steps,
                    plan: plan_idx,
                    steps,
                    success_probability: probability,
                });
            }
        }
        if let Some(choice) = best {
            log::debug!(
                "[selection] M={}: plan #{} at probability {:.4}",
                human_steps,
                choice.plan,
                choice.success_probability
            );
            choices.push(choice);
        }
    }
    choices
}

/// Marks the M lowest-rated steps as human-performed. The sort is stable,
/// ties resolve to the earliest step, and unrated steps order after every
/// rated one.
fn reassign_weakest(mut steps: Vec<UnitSnapshot>, human_steps: usize) -> Vec<UnitSnapshot> {
    let mut order: Vec<usize> = (0..steps.len()).collect();
    order.sort_by(|&a, &b| match (steps[a].success_rate, steps[b].success_rate) {
        (Some(ra), Some(rb)) => ra.partial_cmp(&rb).unwrap_or(std::cmp::Ordering::Equal),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    for &pos in order.iter().take(human_steps) {
        steps[pos].reassign_to_human();
    }
    steps
}

fn success_product(steps: &[UnitSnapshot]) -> f64 {
    steps
        .iter()
        .try_fold(1.0_f64, |acc, s| s.success_rate.map(|r| acc * r))
        .unwrap_or(-1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::State;
    use crate::loader::test_support::{bread_graph, raw_unit, states};
    use crate::retrieval::NoSubstitution;
    use crate::types::Entity;

    fn rated_graph(rates: &[Option<f64>]) -> FoonGraph {
        // a linear chain long enough for the given rates
        let mut graph = FoonGraph::new();
        for (i, rate) in rates.iter().enumerate() {
            let step = i as i32;
            let mut unit = raw_unit(
                &[(step + 1, "stage", states(&[(20 + step, "st")]))],
                (step + 40, "step"),
                &[(step + 2, "stage", states(&[(21 + step, "st")]))],
            );
            unit.success_rate = *rate;
            unit.entity = Some(Entity::Robot);
            graph.append_unit(&unit).unwrap();
        }
        graph.build_indices();
        graph
    }

    #[test]
    fn availability_prefers_overlapping_plans() {
        let mut graph = bread_graph();
        graph.build_indices();
        let plans = vec![Plan::new(vec![1]), Plan::new(vec![0])];

        let mut flour = ObjectNode::new(1, "flour");
        flour.add_state(State::new(10, "whole"));
        let best = select_by_availability(
            &graph,
            Level::Three,
            &plans,
            &[flour],
            &NoSubstitution,
        )
        .unwrap();
        // only the mix unit references flour
        assert_eq!(best.units, vec![0]);
    }

    #[test]
    fn availability_ties_keep_the_first_plan() {
        let mut graph = bread_graph();
        graph.build_indices();
        let plans = vec![Plan::new(vec![1]), Plan::new(vec![0])];
        let best =
            select_by_availability(&graph, Level::Three, &plans, &[], &NoSubstitution).unwrap();
        assert_eq!(best.units, vec![1]);
    }

    #[test]
    fn no_plans_means_no_selection() {
        let mut graph = bread_graph();
        graph.build_indices();
        assert!(
            select_by_availability(&graph, Level::Three, &[], &[], &NoSubstitution).is_none()
        );
        assert!(select_by_weighting(&graph, Level::Three, &[]).is_empty());
    }

    #[test]
    fn weighting_spans_no_help_to_full_help() {
        let graph = rated_graph(&[Some(0.8), Some(0.5)]);
        let plans = vec![Plan::new(vec![0, 1])];
        let choices = select_by_weighting(&graph, Level::Three, &plans);
        assert_eq!(choices.len(), 3);

        // M = 0 keeps the original rates
        assert!((choices[0].success_probability - 0.4).abs() < 1e-9);
        // M = 1 hands the weakest step (0.5) to the human
        assert!((choices[1].success_probability - 0.8).abs() < 1e-9);
        assert_eq!(choices[1].steps[1].entity, Some(Entity::Human));
        assert_eq!(choices[1].steps[0].entity, Some(Entity::Robot));
        // M = len makes the whole plan human-performed
        assert!((choices[2].success_probability - 1.0).abs() < 1e-9);
        assert!(choices[2]
            .steps
            .iter()
            .all(|s| s.entity == Some(Entity::Human)));
    }

    #[test]
    fn missing_rates_poison_the_product() {
        let graph = rated_graph(&[Some(0.8), None]);
        let plans = vec![Plan::new(vec![0, 1])];
        let choices = select_by_weighting(&graph, Level::Three, &plans);
        assert_eq!(choices[0].success_probability, -1.0);
        // the rated step is handed over first, so the product stays invalid
        assert_eq!(choices[1].success_probability, -1.0);
        assert_eq!(choices[2].success_probability, 1.0);
    }

    #[test]
    fn each_m_picks_the_strongest_eligible_plan() {
        let graph = rated_graph(&[Some(0.9), Some(0.9), Some(0.9)]);
        // a one-step plan and a two-step plan over the same chain
        let plans = vec![Plan::new(vec![0]), Plan::new(vec![1, 2])];
        let choices = select_by_weighting(&graph, Level::Three, &plans);
        assert_eq!(choices.len(), 3);

        // M = 0: 0.9 beats 0.81
        assert_eq!(choices[0].plan, 0);
        // M = 1: the short plan becomes fully human
        assert_eq!(choices[1].plan, 0);
        assert!((choices[1].success_probability - 1.0).abs() < 1e-9);
        // M = 2: only the long plan is eligible
        assert_eq!(choices[2].plan, 1);
        assert!((choices[2].success_probability - 1.0).abs() < 1e-9);
    }
}
