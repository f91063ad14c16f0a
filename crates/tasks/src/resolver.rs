//! Random block resolution
//!
//! A script is a flat list of tasks interleaved with begin/end markers that
//! may nest. Resolution draws a subset (or a sample with replacement) of each
//! block, shuffles it and flattens the resulting tree into the concrete task
//! list for one run.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::trace;

use crate::error::{Imbalance, ResolveError, ResolveResult};
use crate::task::{GroupParams, ScriptEntry, Task};

/// Resolved block member
#[derive(Debug, Clone)]
enum Node {
    Task(Task),
    Group(Group),
}

#[derive(Debug, Clone)]
struct Group {
    items: Vec<Node>,
    mandatory: bool,
}

impl Node {
    fn is_mandatory(&self) -> bool {
        match self {
            Node::Task(task) => task.is_mandatory(),
            Node::Group(group) => group.mandatory,
        }
    }
}

/// Block still waiting for its end marker
struct OpenBlock {
    position: usize,
    params: GroupParams,
    items: Vec<Node>,
}

/// Expand a script into a flat task list
pub fn resolve<R: Rng + ?Sized>(entries: &[ScriptEntry], rng: &mut R) -> ResolveResult<Vec<Task>> {
    let mut roots: Vec<Node> = Vec::new();
    let mut open: Vec<OpenBlock> = Vec::new();

    for (position, entry) in entries.iter().enumerate() {
        let node = match entry {
            ScriptEntry::Task(task) => Node::Task(task.clone()),
            ScriptEntry::BeginRandom(params) => {
                open.push(OpenBlock {
                    position,
                    params: params.clone(),
                    items: Vec::new(),
                });
                continue;
            }
            ScriptEntry::EndRandom => {
                let block = open.pop().ok_or(ResolveError::UnbalancedGroup {
                    position,
                    kind: Imbalance::DanglingEnd,
                })?;
                let items = select(block.items, &block.params, rng);
                trace!(
                    opened_at = block.position,
                    selected = items.len(),
                    "Random block closed"
                );
                Node::Group(Group {
                    items,
                    mandatory: block.params.mandatory,
                })
            }
        };

        match open.last_mut() {
            Some(block) => block.items.push(node),
            None => roots.push(node),
        }
    }

    if let Some(block) = open.last() {
        return Err(ResolveError::UnbalancedGroup {
            position: block.position,
            kind: Imbalance::Unterminated,
        });
    }

    Ok(flatten(roots))
}

/// Apply the block's selection rules and shuffle the result
fn select<R: Rng + ?Sized>(items: Vec<Node>, params: &GroupParams, rng: &mut R) -> Vec<Node> {
    if items.is_empty() {
        return items;
    }

    let mandatory: Vec<usize> = (0..items.len()).filter(|&i| items[i].is_mandatory()).collect();
    let optional: Vec<usize> = (0..items.len()).filter(|&i| !items[i].is_mandatory()).collect();

    let mut picked = if params.repeat {
        pick_with_replacement(items.len(), &mandatory, &optional, params, rng)
    } else {
        pick_subset(items.len(), &mandatory, &optional, params, rng)
    };
    picked.shuffle(rng);

    picked.into_iter().map(|i| items[i].clone()).collect()
}

fn pick_subset<R: Rng + ?Sized>(
    size: usize,
    mandatory: &[usize],
    optional: &[usize],
    params: &GroupParams,
    rng: &mut R,
) -> Vec<usize> {
    let max = params.max_amount.unwrap_or(size).min(size);
    let min = params.min_amount.unwrap_or(0).min(max);
    let amount = rng.gen_range(min..=max).max(mandatory.len());

    let mut picked = mandatory.to_vec();
    let extra = amount - mandatory.len();
    picked.extend(optional.choose_multiple(rng, extra).copied());
    picked
}

fn pick_with_replacement<R: Rng + ?Sized>(
    size: usize,
    mandatory: &[usize],
    optional: &[usize],
    params: &GroupParams,
    rng: &mut R,
) -> Vec<usize> {
    let max = params.max_amount.unwrap_or(size);
    let min = params.min_amount.unwrap_or(0).min(max);
    let amount = rng.gen_range(min..=max);

    let mut picked: Vec<usize> = (0..amount).map(|_| rng.gen_range(0..size)).collect();

    let missing: Vec<usize> = mandatory
        .iter()
        .copied()
        .filter(|i| !picked.contains(i))
        .collect();

    // Only optional entries are replaced; surplus mandatory copies stay
    for item in missing {
        let slots: Vec<usize> = (0..picked.len())
            .filter(|&slot| optional.contains(&picked[slot]))
            .collect();
        let Some(&slot) = slots.choose(rng) else {
            break;
        };
        picked[slot] = item;
    }
    picked
}

/// Depth-first flattening without recursion
fn flatten(roots: Vec<Node>) -> Vec<Task> {
    let mut tasks = Vec::new();
    let mut pending: Vec<Node> = roots.into_iter().rev().collect();

    while let Some(node) = pending.pop() {
        match node {
            Node::Task(task) => tasks.push(task),
            Node::Group(group) => pending.extend(group.items.into_iter().rev()),
        }
    }
    tasks
}
