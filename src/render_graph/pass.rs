//! Render pass definitions for the render graph

use crate::backend::types::*;
use crate::backend::{BufferHandle, Device, DeviceResource, TextureHandle};
use crate::render_graph::graph::FrameGraph;
use crate::render_graph::resource::*;

/// Unique identifier for a render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassId(pub(crate) u32);

impl PassId {
    pub(crate) fn new(index: usize) -> Self {
        Self(u32::try_from(index).expect("FrameGraph pass count exceeds u32 indices"))
    }

    /// Recording index of the pass
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Deferred execute callback of a pass
pub(crate) type ExecuteFn<'a> = Box<dyn FnOnce(&PassResources<'_>, &mut dyn Device) + 'a>;

/// Metadata about a pass in the graph
#[derive(Debug, Clone)]
pub(crate) struct PassNode {
    pub name: String,
    /// Resources created or imported by the pass
    pub creates: Vec<ResourceHandle>,
    pub reads: Vec<ResourceHandle>,
    /// New versions produced by the pass
    pub writes: Vec<ResourceHandle>,
    pub side_effect: bool,
}

impl PassNode {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            creates: Vec::new(),
            reads: Vec::new(),
            writes: Vec::new(),
            side_effect: false,
        }
    }

    pub fn declares(&self, handle: ResourceHandle) -> bool {
        self.creates.contains(&handle) || self.reads.contains(&handle) || self.writes.contains(&handle)
    }

    pub fn declares_nothing(&self) -> bool {
        self.creates.is_empty() && self.reads.is_empty() && self.writes.is_empty()
    }

    /// Every handle the pass touches: creates, then reads, then writes
    pub fn accesses(&self) -> impl Iterator<Item = &ResourceHandle> {
        self.creates.iter().chain(&self.reads).chain(&self.writes)
    }
}

/// Context for declaring the resources of a pass.
///
/// Handed to the setup closure of [`FrameGraph::add_pass`]. Every handle
/// passed in must come from the same graph.
pub struct PassBuilder<'g, 'a> {
    pub(crate) graph: &'g mut FrameGraph<'a>,
    pub(crate) pass: usize,
}

impl PassBuilder<'_, '_> {
    /// Create a new transient resource produced by this pass
    pub fn create(&mut self, name: &str, desc: impl Into<ResourceDescriptor>) -> ResourceHandle {
        let handle = self
            .graph
            .register_resource(name, desc.into(), Some(self.pass), None);
        self.graph.pass_mut(self.pass).creates.push(handle);
        handle
    }

    /// Import a caller-owned device object.
    ///
    /// The graph binds it for the frame but never allocates, pools or
    /// destroys it.
    pub fn import(
        &mut self,
        name: &str,
        desc: impl Into<ResourceDescriptor>,
        resource: impl Into<DeviceResource>,
    ) -> ResourceHandle {
        let handle = self.graph.register_resource(
            name,
            desc.into(),
            Some(self.pass),
            Some(resource.into()),
        );
        self.graph.pass_mut(self.pass).creates.push(handle);
        handle
    }

    /// Declare that this pass reads `handle`
    pub fn read(&mut self, handle: ResourceHandle) -> ResourceHandle {
        let _ = self.graph.node(handle);
        let pass = self.graph.pass_mut(self.pass);
        if !pass.reads.contains(&handle) {
            pass.reads.push(handle);
        }
        handle
    }

    /// Declare that this pass writes `handle`, returning the new version.
    ///
    /// Writing a resource the pass did not create also reads the incoming
    /// version. Writing an imported resource marks the pass as having side
    /// effects.
    pub fn write(&mut self, handle: ResourceHandle) -> ResourceHandle {
        let node = self.graph.node(handle).clone();
        let (created_here, imported) = {
            let entry = &self.graph.entries[node.entry];
            assert!(
                node.version == entry.latest_version,
                "Pass `{}` writes {:?} of `{}`, but the latest version is v{}",
                self.graph.pass(self.pass).name,
                handle,
                entry.name,
                entry.latest_version
            );
            (entry.creator == Some(self.pass), entry.is_imported())
        };

        if !created_here {
            self.read(handle);
        }
        if imported {
            self.set_side_effect();
        }

        let new_handle = self.graph.register_version(node.entry, self.pass);
        self.graph.pass_mut(self.pass).writes.push(new_handle);
        new_handle
    }

    /// Keep this pass even if nothing reads its outputs
    pub fn set_side_effect(&mut self) {
        self.graph.pass_mut(self.pass).side_effect = true;
    }

    /// Look up the descriptor of a resource
    pub fn descriptor(&self, handle: ResourceHandle) -> &ResourceDescriptor {
        self.graph.descriptor(handle)
    }
}

/// Resolver handed to execute closures.
///
/// Maps the handles a pass declared to the device objects materialized for
/// them. Asking for anything else is a bug and panics.
pub struct PassResources<'g> {
    pass: &'g PassNode,
    nodes: &'g [ResourceNode],
    entries: &'g [ResourceEntry],
}

impl<'g> PassResources<'g> {
    pub(crate) fn new(
        pass: &'g PassNode,
        nodes: &'g [ResourceNode],
        entries: &'g [ResourceEntry],
    ) -> Self {
        Self {
            pass,
            nodes,
            entries,
        }
    }

    /// Name of the pass being executed
    pub fn pass_name(&self) -> &str {
        &self.pass.name
    }

    fn entry(&self, handle: ResourceHandle) -> &'g ResourceEntry {
        let node = match self.nodes.get(handle.index()) {
            Some(node) if node.version == handle.version() => node,
            _ => panic!("{:?} does not belong to this frame graph", handle),
        };
        assert!(
            self.pass.declares(handle),
            "Pass `{}` did not declare {:?}",
            self.pass.name,
            handle
        );
        &self.entries[node.entry]
    }

    /// Device object currently bound to `handle`
    pub fn resource(&self, handle: ResourceHandle) -> DeviceResource {
        let entry = self.entry(handle);
        entry.physical.unwrap_or_else(|| {
            panic!(
                "`{}` ({:?}) is not materialized during pass `{}`",
                entry.name, handle, self.pass.name
            )
        })
    }

    /// Texture bound to `handle`
    pub fn texture(&self, handle: ResourceHandle) -> TextureHandle {
        self.resource(handle).as_texture().unwrap_or_else(|| {
            panic!("`{}` is not a texture", self.entry(handle).name)
        })
    }

    /// Buffer bound to `handle`
    pub fn buffer(&self, handle: ResourceHandle) -> BufferHandle {
        self.resource(handle).as_buffer().unwrap_or_else(|| {
            panic!("`{}` is not a buffer", self.entry(handle).name)
        })
    }

    pub fn descriptor(&self, handle: ResourceHandle) -> &'g ResourceDescriptor {
        &self.entry(handle).desc
    }

    pub fn texture_descriptor(&self, handle: ResourceHandle) -> &'g TextureDescriptor {
        let entry = self.entry(handle);
        entry
            .desc
            .as_texture()
            .unwrap_or_else(|| panic!("`{}` is not a texture", entry.name))
    }

    pub fn buffer_descriptor(&self, handle: ResourceHandle) -> &'g BufferDescriptor {
        let entry = self.entry(handle);
        entry
            .desc
            .as_buffer()
            .unwrap_or_else(|| panic!("`{}` is not a buffer", entry.name))
    }

    pub fn name(&self, handle: ResourceHandle) -> &'g str {
        &self.entry(handle).name
    }
}
