//! Render graph executor

use crate::backend::traits::*;
use crate::error::{FrameGraphError, FrameGraphResult};
use crate::render_graph::graph::FrameGraph;
use crate::render_graph::pass::PassResources;
use crate::render_graph::resource::ResourceEntry;
use crate::resources::TransientResources;

impl FrameGraph<'_> {
    /// Execute the compiled graph.
    ///
    /// Kept passes run in execution order. Before a pass runs, every resource
    /// whose lifetime starts there is materialized: imported resources bind
    /// the caller's object, transient ones are taken from `pool`. After the
    /// pass, resources whose lifetime ends there go back to the pool.
    ///
    /// If the device fails to create a resource, everything acquired so far
    /// is released, the remaining passes are skipped and the error is
    /// returned.
    ///
    /// # Panics
    ///
    /// Panics if the graph is not compiled or was already executed.
    pub fn execute(
        &mut self,
        device: &mut dyn Device,
        pool: &mut TransientResources,
    ) -> FrameGraphResult<()> {
        self.begin_execution();

        let FrameGraph {
            passes,
            executes,
            nodes,
            entries,
            compiled,
            ..
        } = self;
        let Some(compiled) = compiled.as_ref() else {
            unreachable!("a graph in the compiled state has a compilation result");
        };

        for (step, &id) in compiled.pass_order().iter().enumerate() {
            let pass = &passes[id.index()];

            for &entry in compiled.materialized_at(step) {
                if let Err(source) = materialize(&mut entries[entry], device, pool) {
                    log::error!(
                        "FrameGraph: failed to materialize `{}` for pass `{}`: {}",
                        entries[entry].name,
                        pass.name,
                        source
                    );
                    let resource = entries[entry].name.clone();
                    release_all(entries, pool);
                    executes.clear();
                    return Err(FrameGraphError::Materialize {
                        resource,
                        pass: pass.name.clone(),
                        source,
                    });
                }
            }

            if let Some(execute) = executes[id.index()].take() {
                log::trace!("FrameGraph: executing pass `{}`", pass.name);
                let resources = PassResources::new(pass, &nodes[..], &entries[..]);
                execute(&resources, &mut *device);
            }

            for &entry in compiled.released_at(step) {
                release(&mut entries[entry], pool);
            }
        }

        // Execute closures of culled passes are dropped without running
        executes.clear();

        log::debug!(
            "FrameGraph executed on `{}`: {} passes, pool holds {} free resources",
            device.name(),
            compiled.pass_order().len(),
            pool.stats().free
        );
        Ok(())
    }
}

fn materialize(
    entry: &mut ResourceEntry,
    device: &mut dyn Device,
    pool: &mut TransientResources,
) -> BackendResult<()> {
    let resource = match entry.imported {
        Some(resource) => resource,
        None => pool.acquire(device, &entry.desc)?,
    };
    log::trace!("FrameGraph: materialized `{}` as {:?}", entry.name, resource);
    entry.physical = Some(resource);
    Ok(())
}

fn release(entry: &mut ResourceEntry, pool: &mut TransientResources) {
    if let Some(resource) = entry.physical.take() {
        if !entry.is_imported() {
            pool.release(&entry.desc, resource);
        }
        log::trace!("FrameGraph: released `{}`", entry.name);
    }
}

fn release_all(entries: &mut [ResourceEntry], pool: &mut TransientResources) {
    for entry in entries {
        release(entry, pool);
    }
}
