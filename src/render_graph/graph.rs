//! Render graph definition and compilation

use crate::backend::{Device, DeviceResource};
use crate::render_graph::compiler::{self, CompiledGraph, ResourceLifetime};
use crate::render_graph::pass::*;
use crate::render_graph::resource::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GraphState {
    Recording,
    Compiled,
    Executed,
}

/// A single frame's worth of passes and virtual resources.
///
/// Build it with [`add_pass`](Self::add_pass), then [`compile`](Self::compile)
/// and [`execute`](Self::execute) it. Graphs hold no cross-frame state and
/// are meant to be rebuilt every frame; execute closures may borrow anything
/// that outlives the graph.
///
/// ```ignore
/// let mut graph = FrameGraph::new();
/// let backbuffer = graph.import("Backbuffer", backbuffer_desc, swapchain_texture);
/// graph.add_pass(
///     "Present",
///     |builder, _: &mut ()| {
///         builder.write(backbuffer);
///     },
///     |_, resources, device| { /* record draws */ },
/// );
/// graph.compile();
/// graph.execute(&mut device, &mut pool)?;
/// ```
pub struct FrameGraph<'a> {
    pub(crate) passes: Vec<PassNode>,
    pub(crate) executes: Vec<Option<ExecuteFn<'a>>>,
    pub(crate) nodes: Vec<ResourceNode>,
    pub(crate) entries: Vec<ResourceEntry>,
    pub(crate) compiled: Option<CompiledGraph>,
    state: GraphState,
}

impl<'a> FrameGraph<'a> {
    pub fn new() -> Self {
        Self {
            passes: Vec::new(),
            executes: Vec::new(),
            nodes: Vec::new(),
            entries: Vec::new(),
            compiled: None,
            state: GraphState::Recording,
        }
    }

    /// Add a pass to the graph.
    ///
    /// `setup` runs immediately and declares what the pass creates, reads
    /// and writes, filling in the pass data. `execute` runs during
    /// [`execute`](Self::execute), and only if the pass survives culling.
    /// Returns a copy of the pass data so later passes can use its handles.
    ///
    /// # Panics
    ///
    /// Panics if the graph was already compiled, or if the pass is marked as
    /// having side effects without declaring any resource.
    pub fn add_pass<D, S, E>(&mut self, name: &str, setup: S, execute: E) -> D
    where
        D: Default + Clone + 'a,
        S: FnOnce(&mut PassBuilder<'_, 'a>, &mut D),
        E: FnOnce(&D, &PassResources<'_>, &mut dyn Device) + 'a,
    {
        self.assert_recording("add pass");

        let index = self.passes.len();
        self.passes.push(PassNode::new(name));
        self.executes.push(None);

        let mut data = D::default();
        {
            let mut builder = PassBuilder {
                graph: self,
                pass: index,
            };
            setup(&mut builder, &mut data);
        }

        let pass = &self.passes[index];
        assert!(
            !(pass.side_effect && pass.declares_nothing()),
            "Side-effect pass `{}` declares no resources",
            name
        );
        log::trace!(
            "FrameGraph: recorded pass `{}` ({} creates, {} reads, {} writes{})",
            name,
            pass.creates.len(),
            pass.reads.len(),
            pass.writes.len(),
            if pass.side_effect { ", side effect" } else { "" }
        );

        let captured = data.clone();
        let execute: ExecuteFn<'a> = Box::new(
            move |resources: &PassResources<'_>, device: &mut dyn Device| {
                execute(&captured, resources, device)
            },
        );
        self.executes[index] = Some(execute);
        data
    }

    /// Import a caller-owned device object outside of any pass.
    pub fn import(
        &mut self,
        name: &str,
        desc: impl Into<ResourceDescriptor>,
        resource: impl Into<DeviceResource>,
    ) -> ResourceHandle {
        self.assert_recording("import");
        self.register_resource(name, desc.into(), None, Some(resource.into()))
    }

    /// Prune passes that don't contribute to a side effect and compute
    /// resource lifetimes.
    ///
    /// # Panics
    ///
    /// Panics if called more than once.
    pub fn compile(&mut self) -> &CompiledGraph {
        self.assert_recording("compile");
        self.state = GraphState::Compiled;
        self.compiled
            .insert(compiler::compile(&self.passes, &self.nodes, &self.entries))
    }

    /// The compilation result, once [`compile`](Self::compile) ran
    pub fn compiled(&self) -> Option<&CompiledGraph> {
        self.compiled.as_ref()
    }

    pub fn is_compiled(&self) -> bool {
        self.state != GraphState::Recording
    }

    pub fn is_executed(&self) -> bool {
        self.state == GraphState::Executed
    }

    /// Whether `handle` names a resource version of this graph
    pub fn is_valid(&self, handle: ResourceHandle) -> bool {
        self.nodes
            .get(handle.index())
            .is_some_and(|node| node.version == handle.version())
    }

    pub fn descriptor(&self, handle: ResourceHandle) -> &ResourceDescriptor {
        &self.entry_of(handle).desc
    }

    pub fn name(&self, handle: ResourceHandle) -> &str {
        &self.entry_of(handle).name
    }

    pub fn is_imported(&self, handle: ResourceHandle) -> bool {
        self.entry_of(handle).is_imported()
    }

    /// Lifetime window of the resource behind `handle`, in execution order
    /// positions. `None` before compilation or if the resource was culled.
    pub fn lifetime(&self, handle: ResourceHandle) -> Option<ResourceLifetime> {
        let entry = self.node(handle).entry;
        self.compiled.as_ref()?.entry_lifetime(entry)
    }

    /// Check if the resource behind `handle` is alive at an execution step
    pub fn is_resource_alive(&self, handle: ResourceHandle, step: usize) -> bool {
        let entry = self.node(handle).entry;
        self.compiled
            .as_ref()
            .is_some_and(|compiled| compiled.is_resource_alive(entry, step))
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// Number of virtual resources (not counting versions)
    pub fn resource_count(&self) -> usize {
        self.entries.len()
    }

    pub fn pass_name(&self, id: PassId) -> &str {
        &self.passes[id.index()].name
    }

    /// First pass recorded under `name`
    pub fn find_pass(&self, name: &str) -> Option<PassId> {
        self.passes
            .iter()
            .position(|pass| pass.name == name)
            .map(PassId::new)
    }

    pub fn has_side_effect(&self, id: PassId) -> bool {
        self.passes[id.index()].side_effect
    }

    pub(crate) fn pass(&self, index: usize) -> &PassNode {
        &self.passes[index]
    }

    pub(crate) fn pass_mut(&mut self, index: usize) -> &mut PassNode {
        &mut self.passes[index]
    }

    /// Validated node lookup
    pub(crate) fn node(&self, handle: ResourceHandle) -> &ResourceNode {
        match self.nodes.get(handle.index()) {
            Some(node) if node.version == handle.version() => node,
            _ => panic!("{:?} was never created in this frame graph", handle),
        }
    }

    fn entry_of(&self, handle: ResourceHandle) -> &ResourceEntry {
        &self.entries[self.node(handle).entry]
    }

    pub(crate) fn register_resource(
        &mut self,
        name: &str,
        desc: ResourceDescriptor,
        creator: Option<usize>,
        imported: Option<DeviceResource>,
    ) -> ResourceHandle {
        if let Some(resource) = &imported {
            assert!(
                desc.matches(resource),
                "Imported `{}` is a {:?} but its descriptor says otherwise",
                name,
                resource
            );
        }

        let entry = self.entries.len();
        self.entries.push(ResourceEntry {
            name: name.to_string(),
            desc,
            creator,
            imported,
            latest_version: 0,
            physical: None,
        });

        let producer = if imported.is_some() { None } else { creator };
        let index = self.nodes.len();
        self.nodes.push(ResourceNode {
            entry,
            version: 0,
            producer,
        });
        ResourceHandle::new(index, 0)
    }

    pub(crate) fn register_version(&mut self, entry: usize, producer: usize) -> ResourceHandle {
        let version = self.entries[entry].latest_version + 1;
        self.entries[entry].latest_version = version;

        let index = self.nodes.len();
        self.nodes.push(ResourceNode {
            entry,
            version,
            producer: Some(producer),
        });
        ResourceHandle::new(index, version)
    }

    pub(crate) fn begin_execution(&mut self) {
        match self.state {
            GraphState::Recording => panic!("FrameGraph must be compiled before execution"),
            GraphState::Executed => panic!("FrameGraph was already executed"),
            GraphState::Compiled => self.state = GraphState::Executed,
        }
    }

    fn assert_recording(&self, what: &str) {
        assert!(
            self.state == GraphState::Recording,
            "Cannot {} after the frame graph was compiled",
            what
        );
    }
}

impl Default for FrameGraph<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FrameGraph<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameGraph")
            .field("passes", &self.passes)
            .field("nodes", &self.nodes)
            .field("entries", &self.entries)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
