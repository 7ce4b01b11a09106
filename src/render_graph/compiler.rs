//! Pass culling and resource lifetime computation

use crate::render_graph::pass::{PassId, PassNode};
use crate::render_graph::resource::{ResourceEntry, ResourceNode};

/// Resource lifetime in terms of pass execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLifetime {
    pub first_use: usize,
    pub last_use: usize,
}

impl ResourceLifetime {
    pub fn contains(&self, step: usize) -> bool {
        step >= self.first_use && step <= self.last_use
    }
}

/// Compiled render graph with execution order and resource lifetimes
#[derive(Debug, Clone)]
pub struct CompiledGraph {
    pass_order: Vec<PassId>,
    culled: Vec<PassId>,
    /// Indexed by resource entry
    lifetimes: Vec<Option<ResourceLifetime>>,
    /// Entries to materialize before each execution step
    materialize: Vec<Vec<usize>>,
    /// Entries to release after each execution step
    release: Vec<Vec<usize>>,
}

impl CompiledGraph {
    /// Kept passes in execution order
    pub fn pass_order(&self) -> &[PassId] {
        &self.pass_order
    }

    /// Passes that were culled, in recording order
    pub fn culled_passes(&self) -> &[PassId] {
        &self.culled
    }

    pub fn is_culled(&self, id: PassId) -> bool {
        self.culled.contains(&id)
    }

    /// Execution step of a kept pass
    pub fn step_of(&self, id: PassId) -> Option<usize> {
        self.pass_order.iter().position(|&pass| pass == id)
    }

    /// Number of resources that get materialized at some point
    pub fn live_resource_count(&self) -> usize {
        self.lifetimes.iter().flatten().count()
    }

    pub(crate) fn entry_lifetime(&self, entry: usize) -> Option<ResourceLifetime> {
        self.lifetimes.get(entry).copied().flatten()
    }

    /// Check if a resource is alive at a given execution step
    pub(crate) fn is_resource_alive(&self, entry: usize, step: usize) -> bool {
        self.entry_lifetime(entry)
            .is_some_and(|lifetime| lifetime.contains(step))
    }

    pub(crate) fn materialized_at(&self, step: usize) -> &[usize] {
        &self.materialize[step]
    }

    pub(crate) fn released_at(&self, step: usize) -> &[usize] {
        &self.release[step]
    }
}

pub(crate) fn compile(
    passes: &[PassNode],
    nodes: &[ResourceNode],
    entries: &[ResourceEntry],
) -> CompiledGraph {
    let kept = mark_kept_passes(passes, nodes);

    let mut pass_order: Vec<usize> = (0..passes.len()).filter(|&i| kept[i]).collect();
    let culled: Vec<PassId> = (0..passes.len())
        .filter(|&i| !kept[i])
        .map(PassId::new)
        .collect();

    move_presentation_passes(&mut pass_order, passes, nodes, entries);
    validate_order(&pass_order, passes, nodes, entries);

    // Determine resource lifetimes
    let mut lifetimes: Vec<Option<ResourceLifetime>> = vec![None; entries.len()];
    for (order, &pass) in pass_order.iter().enumerate() {
        for handle in passes[pass].accesses() {
            let entry = nodes[handle.index()].entry;
            let lifetime = lifetimes[entry].get_or_insert(ResourceLifetime {
                first_use: order,
                last_use: order,
            });
            lifetime.last_use = order;
        }
    }

    let mut materialize = vec![Vec::new(); pass_order.len()];
    let mut release = vec![Vec::new(); pass_order.len()];
    for (entry, lifetime) in lifetimes.iter().enumerate() {
        if let Some(lifetime) = lifetime {
            materialize[lifetime.first_use].push(entry);
            release[lifetime.last_use].push(entry);
        }
    }

    log::debug!(
        "FrameGraph compiled: {} passes kept, {} culled, {} of {} resources used",
        pass_order.len(),
        culled.len(),
        lifetimes.iter().flatten().count(),
        entries.len()
    );
    for &id in &culled {
        log::trace!("FrameGraph: culled pass `{}`", passes[id.index()].name);
    }

    CompiledGraph {
        pass_order: pass_order.into_iter().map(PassId::new).collect(),
        culled,
        lifetimes,
        materialize,
        release,
    }
}

/// Walk read lists back from side-effect passes to their producers
fn mark_kept_passes(passes: &[PassNode], nodes: &[ResourceNode]) -> Vec<bool> {
    let mut kept = vec![false; passes.len()];
    let mut stack: Vec<usize> = Vec::new();

    for (index, pass) in passes.iter().enumerate() {
        if pass.side_effect {
            kept[index] = true;
            stack.push(index);
        }
    }

    while let Some(index) = stack.pop() {
        for read in &passes[index].reads {
            if let Some(producer) = nodes[read.index()].producer {
                if !kept[producer] {
                    kept[producer] = true;
                    stack.push(producer);
                }
            }
        }
    }

    kept
}

/// Move terminal side-effect passes writing an imported target behind every
/// other kept pass that references that target.
fn move_presentation_passes(
    order: &mut Vec<usize>,
    passes: &[PassNode],
    nodes: &[ResourceNode],
    entries: &[ResourceEntry],
) {
    let candidates: Vec<usize> = order
        .iter()
        .copied()
        .filter(|&pass| passes[pass].side_effect)
        .collect();

    for pass in candidates {
        let targets: Vec<usize> = passes[pass]
            .writes
            .iter()
            .map(|handle| nodes[handle.index()].entry)
            .filter(|&entry| entries[entry].is_imported())
            .collect();
        if targets.is_empty() {
            continue;
        }

        let consumed = order.iter().any(|&other| {
            other != pass
                && passes[other]
                    .reads
                    .iter()
                    .any(|read| nodes[read.index()].producer == Some(pass))
        });
        if consumed {
            continue;
        }

        let Some(from) = order.iter().position(|&p| p == pass) else {
            continue;
        };
        let last_reference = order
            .iter()
            .enumerate()
            .filter(|&(_, &other)| other != pass)
            .filter(|&(_, &other)| {
                passes[other]
                    .accesses()
                    .any(|handle| targets.contains(&nodes[handle.index()].entry))
            })
            .map(|(position, _)| position)
            .max();

        let Some(to) = last_reference.filter(|&to| to > from) else {
            continue;
        };

        // Entries whose contents the pass depends on must not change under it
        let inputs: Vec<usize> = passes[pass]
            .creates
            .iter()
            .chain(&passes[pass].reads)
            .map(|handle| nodes[handle.index()].entry)
            .filter(|entry| !targets.contains(entry))
            .collect();
        let overwriter = order[from + 1..=to].iter().copied().find(|&other| {
            passes[other]
                .writes
                .iter()
                .any(|handle| inputs.contains(&nodes[handle.index()].entry))
        });
        if let Some(overwriter) = overwriter {
            log::debug!(
                "FrameGraph: `{}` stays in place, `{}` overwrites one of its inputs",
                passes[pass].name,
                passes[overwriter].name
            );
            continue;
        }

        order.remove(from);
        order.insert(to, pass);
        log::debug!(
            "FrameGraph: moved `{}` after `{}` to present last",
            passes[pass].name,
            passes[order[to - 1]].name
        );
    }
}

/// Every read must see the version it names: its producer has run and no
/// kept pass has written a newer version of the same entry yet.
fn validate_order(
    order: &[usize],
    passes: &[PassNode],
    nodes: &[ResourceNode],
    entries: &[ResourceEntry],
) {
    let mut position = vec![usize::MAX; passes.len()];
    for (step, &pass) in order.iter().enumerate() {
        position[pass] = step;
    }

    // Latest version written so far per entry, with its writer
    let mut written: Vec<Option<(u32, usize)>> = vec![None; entries.len()];

    for (step, &pass) in order.iter().enumerate() {
        for read in &passes[pass].reads {
            let node = &nodes[read.index()];
            if let Some(producer) = node.producer {
                assert!(
                    position[producer] <= step,
                    "Pass `{}` reads {:?} before its producer `{}` runs",
                    passes[pass].name,
                    read,
                    passes[producer].name
                );
            }
            if let Some((version, writer)) = written[node.entry] {
                assert!(
                    version <= node.version,
                    "Pass `{}` reads v{} of `{}`, but `{}` already wrote v{}",
                    passes[pass].name,
                    node.version,
                    entries[node.entry].name,
                    passes[writer].name,
                    version
                );
            }
        }
        for write in &passes[pass].writes {
            let node = &nodes[write.index()];
            written[node.entry] = Some((node.version, pass));
        }
    }
}
