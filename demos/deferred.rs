//! Deferred shading frame built on the frame graph.
//!
//! Records camera and light uploads, a G-buffer pass, deferred lighting,
//! tone-mapping and a final composition into an imported backbuffer, then
//! runs the frame on the dummy device for a few frames. Picking a G-buffer
//! channel as the render target culls lighting and tone-mapping.
//!
//! ```bash
//! RUST_LOG=debug cargo run --example deferred -- --target g-normal --frames 5 --dot frame.dot
//! ```

use std::path::PathBuf;
use std::time::Duration;

use bytemuck::{Pod, Zeroable};
use clap::{Parser, ValueEnum};
use glam::{Mat4, Vec3};

use lilium_framegraph::backend::{
    Attachment, BufferDescriptor, Device, Extent3d, PipelineDescriptor, PipelineHandle,
    RenderPassDescriptor, TextureDescriptor, TextureFormat, TextureUsage,
};
use lilium_framegraph::{
    Blackboard, DummyDevice, FrameGraph, FrameGraphResult, ResourceDescriptor, ResourceHandle,
    TransientResources,
};

/// What the final composition pass shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
enum RenderTarget {
    #[default]
    Final,
    GPosition,
    GNormal,
    GAlbedo,
    GEmissive,
    GMetallicRoughnessAo,
    SceneColorHdr,
}

#[derive(Parser, Debug)]
#[command(name = "deferred", about = "Deferred shading with a frame graph on the dummy device")]
struct Args {
    /// Buffer shown on screen
    #[arg(long, default_value = "final", value_enum)]
    target: RenderTarget,

    /// Number of frames to run
    #[arg(long, default_value = "3")]
    frames: u32,

    #[arg(long, default_value = "1280")]
    width: u32,

    #[arg(long, default_value = "720")]
    height: u32,

    /// Simulated frame time fed to the pool heartbeat, in milliseconds
    #[arg(long, default_value = "16")]
    frame_time_ms: u64,

    /// Write the first frame's graph in Graphviz format
    #[arg(long)]
    dot: Option<PathBuf>,
}

// ============================================================================
// Uniforms
// ============================================================================

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct CameraUniform {
    view: [[f32; 4]; 4],
    projection: [[f32; 4]; 4],
    position: [f32; 4],
}

impl CameraUniform {
    fn new(position: Vec3, yaw_degrees: f32, fov_degrees: f32, aspect: f32) -> Self {
        let yaw = yaw_degrees.to_radians();
        let forward = Vec3::new(yaw.cos(), 0.0, yaw.sin());
        let view = Mat4::look_to_rh(position, forward, Vec3::Y);
        let projection = Mat4::perspective_rh(fov_degrees.to_radians(), aspect, 1.0, 3000.0);
        Self {
            view: view.to_cols_array_2d(),
            projection: projection.to_cols_array_2d(),
            position: position.extend(1.0).to_array(),
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct DirectionalLight {
    direction: [f32; 4],
    color: [f32; 3],
    intensity: f32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: Vec3::new(-0.5, -1.0, -0.3).normalize().extend(0.0).to_array(),
            color: [1.0, 1.0, 1.0],
            intensity: 1.0,
        }
    }
}

// ============================================================================
// Blackboard data
// ============================================================================

#[derive(Debug, Default, Clone, Copy)]
struct CameraData {
    uniform: ResourceHandle,
}

#[derive(Debug, Default, Clone, Copy)]
struct LightData {
    uniform: ResourceHandle,
}

#[derive(Debug, Default, Clone, Copy)]
struct GBufferData {
    position: ResourceHandle,
    normal: ResourceHandle,
    albedo: ResourceHandle,
    emissive: ResourceHandle,
    metallic_roughness_ao: ResourceHandle,
    depth: ResourceHandle,
}

#[derive(Debug, Default, Clone, Copy)]
struct SceneColorData {
    hdr: ResourceHandle,
    ldr: ResourceHandle,
}

// ============================================================================
// Pipelines
// ============================================================================

struct Pipelines {
    gbuffer: PipelineHandle,
    lighting: PipelineHandle,
    tonemapping: PipelineHandle,
    composition: PipelineHandle,
}

impl Pipelines {
    fn new(device: &mut dyn Device) -> FrameGraphResult<Self> {
        let fullscreen = |label: &str, fragment: &str, format: TextureFormat| PipelineDescriptor {
            label: Some(label.to_string()),
            vertex_shader: "shaders/fullscreen.vert".into(),
            fragment_shader: Some(fragment.into()),
            color_formats: vec![format],
            ..Default::default()
        };

        Ok(Self {
            gbuffer: device.create_pipeline(&PipelineDescriptor {
                label: Some("GBuffer".into()),
                vertex_shader: "shaders/geometry.vert".into(),
                fragment_shader: Some("shaders/gbuffer.frag".into()),
                color_formats: vec![
                    TextureFormat::Rgb16Float,
                    TextureFormat::Rgb16Float,
                    TextureFormat::Rgb8Unorm,
                    TextureFormat::Rgb8Unorm,
                    TextureFormat::Rgb8Unorm,
                ],
                depth_format: Some(TextureFormat::Depth32Float),
                depth_compare: Some(lilium_framegraph::backend::CompareFunction::LessEqual),
            })?,
            lighting: device.create_pipeline(&fullscreen(
                "Deferred Lighting",
                "shaders/deferred_lighting.frag",
                TextureFormat::Rgb16Float,
            ))?,
            tonemapping: device.create_pipeline(&fullscreen(
                "Tone-mapping",
                "shaders/tonemapping.frag",
                TextureFormat::Rgb8Unorm,
            ))?,
            composition: device.create_pipeline(&fullscreen(
                "Final Composition",
                "shaders/final.frag",
                TextureFormat::Bgra8Unorm,
            ))?,
        })
    }

    fn destroy(self, device: &mut dyn Device) {
        for pipeline in [self.gbuffer, self.lighting, self.tonemapping, self.composition] {
            device.destroy_pipeline(pipeline);
        }
    }
}

// ============================================================================
// Passes
// ============================================================================

fn upload_camera_uniform<'a>(
    graph: &mut FrameGraph<'a>,
    blackboard: &mut Blackboard,
    camera: &'a CameraUniform,
) {
    let data = graph.add_pass(
        "Upload CameraUniform",
        |builder, data: &mut CameraData| {
            let uniform = builder.create(
                "CameraUniform",
                BufferDescriptor::uniform(std::mem::size_of::<CameraUniform>() as u64),
            );
            data.uniform = builder.write(uniform);
        },
        move |data, resources, device| {
            device.write_buffer(resources.buffer(data.uniform), 0, bytemuck::bytes_of(camera));
        },
    );
    blackboard.add(data);
}

fn upload_light_uniform<'a>(
    graph: &mut FrameGraph<'a>,
    blackboard: &mut Blackboard,
    light: &'a DirectionalLight,
) {
    let data = graph.add_pass(
        "Upload LightUniform",
        |builder, data: &mut LightData| {
            let uniform = builder.create(
                "LightUniform",
                BufferDescriptor::uniform(std::mem::size_of::<DirectionalLight>() as u64),
            );
            data.uniform = builder.write(uniform);
        },
        move |data, resources, device| {
            device.write_buffer(resources.buffer(data.uniform), 0, bytemuck::bytes_of(light));
        },
    );
    blackboard.add(data);
}

fn add_gbuffer_pass(
    graph: &mut FrameGraph<'_>,
    blackboard: &mut Blackboard,
    pipeline: PipelineHandle,
    width: u32,
    height: u32,
    mesh_count: u32,
) {
    let camera = *blackboard.get::<CameraData>();
    let target = |format: TextureFormat| {
        TextureDescriptor::new_2d(width, height, format)
            .with_usage(TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING)
    };

    let data = graph.add_pass(
        "GBuffer Pass",
        |builder, data: &mut GBufferData| {
            builder.read(camera.uniform);

            let mut attachment = |name: &str, format: TextureFormat| {
                let handle = builder.create(name, target(format));
                builder.write(handle)
            };
            data.position = attachment("Position", TextureFormat::Rgb16Float);
            data.normal = attachment("Normal", TextureFormat::Rgb16Float);
            data.albedo = attachment("Albedo", TextureFormat::Rgb8Unorm);
            data.emissive = attachment("Emissive", TextureFormat::Rgb8Unorm);
            data.metallic_roughness_ao = attachment("Metallic Roughness AO", TextureFormat::Rgb8Unorm);
            data.depth = attachment("Depth", TextureFormat::Depth32Float);
        },
        move |data, resources, device| {
            let black = [0.0; 4];
            let token = device.begin_render_pass(&RenderPassDescriptor {
                label: Some(resources.pass_name().to_string()),
                color_attachments: vec![
                    Attachment::clear(resources.texture(data.position), black),
                    Attachment::clear(resources.texture(data.normal), black),
                    Attachment::clear(resources.texture(data.albedo), black),
                    Attachment::clear(resources.texture(data.emissive), black),
                    Attachment::clear(resources.texture(data.metallic_roughness_ao), black),
                ],
                depth_attachment: Some(Attachment::clear(
                    resources.texture(data.depth),
                    [1.0; 4],
                )),
            });
            device.bind_pipeline(pipeline);
            device.bind_uniform_buffer(0, resources.buffer(camera.uniform));
            for _ in 0..mesh_count {
                device.draw(0..36, 0..1);
            }
            device.end_render_pass(token);
        },
    );
    blackboard.add(data);
}

fn texture_extent(graph: &FrameGraph<'_>, handle: ResourceHandle) -> Extent3d {
    match graph.descriptor(handle) {
        ResourceDescriptor::Texture(desc) => desc.extent,
        ResourceDescriptor::Buffer(_) => unreachable!("`{}` is a buffer", graph.name(handle)),
    }
}

fn add_deferred_lighting_pass(
    graph: &mut FrameGraph<'_>,
    blackboard: &Blackboard,
    pipeline: PipelineHandle,
) -> ResourceHandle {
    let camera = *blackboard.get::<CameraData>();
    let light = *blackboard.get::<LightData>();
    let gbuffer = *blackboard.get::<GBufferData>();
    let extent = texture_extent(graph, gbuffer.depth);

    let data = graph.add_pass(
        "Deferred Lighting Pass",
        |builder, data: &mut ResourceHandle| {
            builder.read(camera.uniform);
            builder.read(light.uniform);
            builder.read(gbuffer.position);
            builder.read(gbuffer.normal);
            builder.read(gbuffer.albedo);
            builder.read(gbuffer.emissive);
            builder.read(gbuffer.metallic_roughness_ao);

            let scene_color = builder.create(
                "SceneColorHDR",
                TextureDescriptor::new_2d(extent.width, extent.height, TextureFormat::Rgb16Float),
            );
            *data = builder.write(scene_color);
        },
        move |&scene_color, resources, device| {
            let token = device.begin_render_pass(&RenderPassDescriptor {
                label: Some(resources.pass_name().to_string()),
                color_attachments: vec![Attachment::clear(resources.texture(scene_color), [0.0; 4])],
                depth_attachment: None,
            });
            device.bind_pipeline(pipeline);
            device.bind_uniform_buffer(0, resources.buffer(camera.uniform));
            device.bind_uniform_buffer(1, resources.buffer(light.uniform));
            let inputs = [
                gbuffer.position,
                gbuffer.normal,
                gbuffer.albedo,
                gbuffer.emissive,
                gbuffer.metallic_roughness_ao,
            ];
            for (slot, input) in inputs.into_iter().enumerate() {
                device.bind_texture(slot as u32, resources.texture(input));
            }
            device.draw(0..3, 0..1);
            device.end_render_pass(token);
        },
    );
    data
}

fn add_tonemapping_pass(
    graph: &mut FrameGraph<'_>,
    input: ResourceHandle,
    pipeline: PipelineHandle,
) -> ResourceHandle {
    let extent = texture_extent(graph, input);

    graph.add_pass(
        "Tone-mapping Pass",
        |builder, data: &mut ResourceHandle| {
            builder.read(input);
            let output = builder.create(
                "Tone-mapped SceneColor",
                TextureDescriptor::new_2d(extent.width, extent.height, TextureFormat::Rgb8Unorm),
            );
            *data = builder.write(output);
        },
        move |&output, resources, device| {
            let token = device.begin_render_pass(&RenderPassDescriptor {
                label: Some(resources.pass_name().to_string()),
                color_attachments: vec![Attachment::load(resources.texture(output))],
                depth_attachment: None,
            });
            device.bind_pipeline(pipeline);
            device.bind_texture(0, resources.texture(input));
            device.draw(0..3, 0..1);
            device.end_render_pass(token);
        },
    )
}

fn compose(
    graph: &mut FrameGraph<'_>,
    blackboard: &Blackboard,
    backbuffer: ResourceHandle,
    target: RenderTarget,
    pipeline: PipelineHandle,
) {
    let output = match target {
        RenderTarget::Final => blackboard.get::<SceneColorData>().ldr,
        RenderTarget::GPosition => blackboard.get::<GBufferData>().position,
        RenderTarget::GNormal => blackboard.get::<GBufferData>().normal,
        RenderTarget::GAlbedo => blackboard.get::<GBufferData>().albedo,
        RenderTarget::GEmissive => blackboard.get::<GBufferData>().emissive,
        RenderTarget::GMetallicRoughnessAo => blackboard.get::<GBufferData>().metallic_roughness_ao,
        RenderTarget::SceneColorHdr => blackboard.get::<SceneColorData>().hdr,
    };

    graph.add_pass(
        "Final Composition Pass",
        |builder, data: &mut ResourceHandle| {
            builder.read(output);
            // Writing the imported backbuffer keeps this pass alive
            *data = builder.write(backbuffer);
        },
        move |&presented, resources, device| {
            let extent = resources.texture_descriptor(output).extent;
            log::trace!(
                "Composing `{}` ({}x{}) onto `{}`",
                resources.name(output),
                extent.width,
                extent.height,
                resources.name(presented)
            );
            let token = device.begin_render_pass(&RenderPassDescriptor {
                label: Some(resources.pass_name().to_string()),
                color_attachments: vec![Attachment::clear(resources.texture(presented), [0.0; 4])],
                depth_attachment: None,
            });
            device.bind_pipeline(pipeline);
            device.bind_texture(0, resources.texture(output));
            device.draw(0..3, 0..1);
            device.end_render_pass(token);
        },
    );
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut device = DummyDevice::new();
    let mut pool = TransientResources::new();
    let pipelines = Pipelines::new(&mut device)?;

    let backbuffer_desc = TextureDescriptor::new_2d(args.width, args.height, TextureFormat::Bgra8Unorm)
        .with_usage(TextureUsage::RENDER_ATTACHMENT);
    let backbuffer = device.create_texture(&backbuffer_desc)?;

    let aspect = args.width as f32 / args.height.max(1) as f32;
    let camera = CameraUniform::new(Vec3::new(-1150.0, 200.0, -45.0), 90.0, 60.0, aspect);
    let light = DirectionalLight::default();
    let frame_time = Duration::from_millis(args.frame_time_ms);

    log::info!(
        "Rendering {} frames at {}x{} showing {:?} on the {} device",
        args.frames,
        args.width,
        args.height,
        args.target,
        device.name()
    );

    for frame in 0..args.frames {
        let mut graph = FrameGraph::new();
        let mut blackboard = Blackboard::new();

        let target = graph.import("Backbuffer", backbuffer_desc, backbuffer);

        upload_camera_uniform(&mut graph, &mut blackboard, &camera);
        upload_light_uniform(&mut graph, &mut blackboard, &light);
        add_gbuffer_pass(
            &mut graph,
            &mut blackboard,
            pipelines.gbuffer,
            args.width,
            args.height,
            8,
        );

        let hdr = add_deferred_lighting_pass(&mut graph, &blackboard, pipelines.lighting);
        let ldr = add_tonemapping_pass(&mut graph, hdr, pipelines.tonemapping);
        blackboard.add(SceneColorData { hdr, ldr });

        compose(
            &mut graph,
            &blackboard,
            target,
            args.target,
            pipelines.composition,
        );

        let compiled = graph.compile().clone();
        let culled: Vec<&str> = compiled
            .culled_passes()
            .iter()
            .map(|&id| graph.pass_name(id))
            .collect();
        log::info!(
            "Frame {}: {} passes kept, culled {:?}",
            frame,
            compiled.pass_order().len(),
            culled
        );

        graph.execute(&mut device, &mut pool)?;

        if frame == 0 {
            if let Some(path) = &args.dot {
                std::fs::write(path, graph.to_dot())?;
                log::info!("Wrote frame graph to {}", path.display());
            }
        }

        pool.heartbeat(&mut device, frame_time);

        let stats = pool.stats();
        log::info!(
            "Frame {}: {} device commands, pool has {} free ({} KiB) in {} buckets ({} allocations, {} reuses)",
            frame,
            device.take_commands().len(),
            stats.free,
            stats.free_bytes / 1024,
            stats.buckets,
            stats.allocations,
            stats.reuses
        );
    }

    pool.clear(&mut device);
    pipelines.destroy(&mut device);
    device.destroy_texture(backbuffer);
    log::info!(
        "Shutdown: {} live textures, {} live buffers",
        device.live_texture_count(),
        device.live_buffer_count()
    );

    Ok(())
}
