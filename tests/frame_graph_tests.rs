//! Integration tests for the frame graph and the transient resource pool.
//!
//! Every test drives the graph on the dummy device, which records the calls
//! the graph makes so tests can assert on allocations and destructions.
//!
//! ```bash
//! RUST_LOG=trace cargo test --test frame_graph_tests -- --nocapture
//! ```

mod common;

use std::cell::RefCell;
use std::time::Duration;

use rstest::rstest;

use common::{
    backbuffer, color_target, init_logging, three_pass_graph, uniform_buffer, ExecutionLog,
    TestContext,
};
use lilium_framegraph::backend::{
    AddressMode, CompareFunction, DeviceCommand, FilterMode, TextureDescriptor, TextureFormat,
};
use lilium_framegraph::{
    Blackboard, DeviceResource, DummyDevice, FrameGraph, FrameGraphError, ResourceDescriptor,
    ResourceHandle, TransientResources,
};

// ============================================================================
// Culling
// ============================================================================

#[rstest]
#[case::c_reads_u(true, &["A", "B", "C"])]
#[case::c_ignores_u(false, &["C"])]
fn test_three_pass_culling(#[case] c_reads_u: bool, #[case] expected: &[&str]) {
    let mut ctx = TestContext::new();
    let log = ExecutionLog::default();

    let (graph, _) = three_pass_graph(&log, c_reads_u);
    ctx.run(graph);

    assert_eq!(log.into_inner(), expected);
}

#[test]
fn test_culled_resources_are_never_materialized() {
    let mut ctx = TestContext::new();
    let log = ExecutionLog::default();

    let (mut graph, handles) = three_pass_graph(&log, false);
    let compiled = graph.compile().clone();
    assert_eq!(compiled.culled_passes().len(), 2);
    assert!(graph.lifetime(handles.texture).is_none());
    assert!(graph.lifetime(handles.buffer).is_none());

    graph.execute(&mut ctx.device, &mut ctx.pool).unwrap();
    drop(graph);

    // Only the buffer created by C itself reached the device
    assert_eq!(ctx.device.live_texture_count(), 0);
    assert_eq!(ctx.device.live_buffer_count(), 1);
    assert_eq!(ctx.device.allocation_count(), 1);
}

#[test]
fn test_reading_pre_write_version_does_not_keep_writer() {
    init_logging();
    let mut graph = FrameGraph::new();

    let original = graph.add_pass(
        "Create",
        |builder, out: &mut Option<ResourceHandle>| {
            *out = Some(builder.create("T", color_target(32, 32)));
        },
        |_, _, _| {},
    );
    let original = original.unwrap();

    let modified = graph.add_pass(
        "Modify",
        |builder, out: &mut Option<ResourceHandle>| *out = Some(builder.write(original)),
        |_, _, _| {},
    );
    let modified = modified.unwrap();

    graph.add_pass(
        "Consume Original",
        |builder, _: &mut ()| {
            builder.read(original);
            builder.set_side_effect();
        },
        |_, _, _| {},
    );

    assert_ne!(original, modified);
    assert_eq!(modified.version(), original.version() + 1);
    assert!(graph.is_valid(original) && graph.is_valid(modified));

    let compiled = graph.compile().clone();
    let kept: Vec<&str> = compiled
        .pass_order()
        .iter()
        .map(|&id| graph.pass_name(id))
        .collect();
    assert_eq!(kept, ["Create", "Consume Original"]);
}

#[test]
#[should_panic(expected = "Pass `Consume Original` reads v0 of `T`, but `Modify` already wrote v1")]
fn test_reading_pre_write_version_after_kept_writer_panics() {
    init_logging();
    let mut graph = FrameGraph::new();

    let original = graph.add_pass(
        "Create",
        |builder, out: &mut Option<ResourceHandle>| {
            *out = Some(builder.create("T", color_target(32, 32)));
        },
        |_, _, _| {},
    );
    let original = original.unwrap();

    let modified = graph.add_pass(
        "Modify",
        |builder, out: &mut Option<ResourceHandle>| *out = Some(builder.write(original)),
        |_, _, _| {},
    );
    let modified = modified.unwrap();

    // Both versions share one device object, so v0 is gone once `Modify` ran
    graph.add_pass(
        "Consume Original",
        |builder, _: &mut ()| {
            builder.read(original);
            builder.set_side_effect();
        },
        |_, _, _| {},
    );
    graph.add_pass(
        "Consume Modified",
        |builder, _: &mut ()| {
            builder.read(modified);
            builder.set_side_effect();
        },
        |_, _, _| {},
    );

    graph.compile();
}

// ============================================================================
// Lifetimes
// ============================================================================

#[test]
fn test_lifetimes_follow_kept_passes() {
    let log = ExecutionLog::default();
    let (mut graph, handles) = three_pass_graph(&log, true);
    graph.compile();

    let texture = graph.lifetime(handles.texture).unwrap();
    assert_eq!((texture.first_use, texture.last_use), (0, 1));
    let buffer = graph.lifetime(handles.buffer).unwrap();
    assert_eq!((buffer.first_use, buffer.last_use), (1, 2));

    assert!(graph.is_resource_alive(handles.texture, 0));
    assert!(graph.is_resource_alive(handles.texture, 1));
    assert!(!graph.is_resource_alive(handles.texture, 2));
    assert!(!graph.is_resource_alive(handles.buffer, 0));
}

#[test]
fn test_released_resource_is_reused_later_in_frame() {
    let mut ctx = TestContext::new();
    let seen = RefCell::new(Vec::new());
    let desc = color_target(256, 256);

    let mut graph = FrameGraph::new();
    let first = graph.add_pass(
        "Write First",
        |builder, out: &mut Option<ResourceHandle>| {
            let t = builder.create("First", desc);
            *out = Some(builder.write(t));
        },
        |out, resources, _| seen.borrow_mut().push(resources.texture(out.unwrap())),
    );
    let second = graph.add_pass(
        "Write Second",
        |builder, out: &mut Option<ResourceHandle>| {
            builder.read(first.unwrap());
            let t = builder.create("Second", desc);
            *out = Some(builder.write(t));
        },
        |out, resources, _| seen.borrow_mut().push(resources.texture(out.unwrap())),
    );
    graph.add_pass(
        "Write Third",
        |builder, out: &mut Option<ResourceHandle>| {
            builder.read(second.unwrap());
            let t = builder.create("Third", desc);
            *out = Some(builder.write(t));
            builder.set_side_effect();
        },
        |out, resources, _| seen.borrow_mut().push(resources.texture(out.unwrap())),
    );
    ctx.run(graph);

    let seen = seen.into_inner();
    assert_eq!(seen.len(), 3);
    assert_ne!(seen[0], seen[1], "First and Second overlap at step 1");
    assert_eq!(seen[2], seen[0], "First was released after step 1");
    assert_eq!(ctx.device.allocation_count(), 2);
}

#[test]
#[should_panic(expected = "did not declare")]
fn test_resolving_undeclared_handle_panics() {
    init_logging();
    let mut device = DummyDevice::new();
    let mut pool = TransientResources::new();

    let mut graph = FrameGraph::new();
    let early = graph.add_pass(
        "Early",
        |builder, out: &mut Option<ResourceHandle>| {
            *out = Some(builder.create("Early", color_target(16, 16)));
        },
        |_, _, _| {},
    );
    let middle = graph.add_pass(
        "Middle",
        |builder, out: &mut Option<ResourceHandle>| {
            builder.read(early.unwrap());
            *out = Some(builder.create("Middle", uniform_buffer()));
        },
        |_, _, _| {},
    );
    graph.add_pass(
        "Late",
        |builder, _: &mut ()| {
            builder.read(middle.unwrap());
            builder.set_side_effect();
        },
        // `Early` was released after `Middle`
        move |_, resources, _| {
            resources.texture(early.unwrap());
        },
    );

    graph.compile();
    let _ = graph.execute(&mut device, &mut pool);
}

// ============================================================================
// Pool
// ============================================================================

#[test]
fn test_pool_reuse_across_frames() {
    let mut ctx = TestContext::new();

    for frame in 0..3 {
        let log = ExecutionLog::default();
        let (graph, _) = three_pass_graph(&log, true);
        ctx.run(graph);
        ctx.heartbeat(Duration::from_millis(16));
        assert_eq!(log.into_inner().len(), 3, "frame {frame}");
    }

    let stats = ctx.pool.stats();
    assert_eq!(ctx.device.allocation_count(), 2);
    assert_eq!(stats.allocations, 2);
    assert_eq!(stats.reuses, 4);
    assert_eq!(stats.free, 2);
    assert_eq!(stats.live, 0);
}

#[test]
fn test_pool_never_mixes_descriptors() {
    let mut ctx = TestContext::new();
    let descriptors = [
        color_target(64, 64),
        color_target(128, 64),
        color_target(64, 64).with_mip_levels(2),
        TextureDescriptor::new_2d(64, 64, TextureFormat::Depth32Float).with_shadow_sampler(),
    ];
    let seen = RefCell::new(Vec::new());

    for desc in descriptors {
        let mut graph = FrameGraph::new();
        graph.add_pass(
            "Render",
            |builder, out: &mut Option<ResourceHandle>| {
                let t = builder.create("Target", desc);
                *out = Some(builder.write(t));
                builder.set_side_effect();
            },
            |out, resources, _| seen.borrow_mut().push(resources.texture(out.unwrap())),
        );
        ctx.run(graph);
    }

    let seen = seen.into_inner();
    assert_eq!(ctx.device.allocation_count(), descriptors.len());
    for (texture, desc) in seen.iter().zip(&descriptors) {
        assert_eq!(ctx.device.texture_descriptor(*texture), Some(desc));
        assert_eq!(ctx.pool.free_count(&ResourceDescriptor::from(*desc)), 1);
    }
}

#[test]
fn test_new_textures_get_sampler_from_hints() {
    let mut ctx = TestContext::new();
    let shadow_map = TextureDescriptor::new_2d(1024, 1024, TextureFormat::Depth32Float)
        .with_wrap(AddressMode::ClampToBorder)
        .with_filter(FilterMode::Nearest)
        .with_shadow_sampler();
    let texture = RefCell::new(None);

    let mut graph = FrameGraph::new();
    graph.add_pass(
        "Shadow",
        |builder, out: &mut Option<ResourceHandle>| {
            let t = builder.create("ShadowMap", shadow_map);
            *out = Some(builder.write(t));
            builder.set_side_effect();
        },
        |out, resources, _| *texture.borrow_mut() = Some(resources.texture(out.unwrap())),
    );
    ctx.run(graph);

    let texture = texture.into_inner().unwrap();
    let sampler = ctx.device.texture_sampler(texture).unwrap();
    assert_eq!(sampler.address_mode_u, AddressMode::ClampToBorder);
    assert_eq!(sampler.min_filter, FilterMode::Nearest);
    assert_eq!(sampler.mipmap_filter, None);
    assert_eq!(sampler.compare, Some(CompareFunction::LessEqual));
}

#[rstest]
#[case::never_idle(&[], false)]
#[case::below_threshold(&[300, 300, 300], false)]
#[case::at_threshold(&[500, 500], false)]
#[case::past_threshold(&[600, 600], true)]
#[case::single_long_frame(&[1001], true)]
fn test_pool_eviction(#[case] heartbeats_ms: &[u64], #[case] evicted: bool) {
    let mut ctx = TestContext::new();
    let log = ExecutionLog::default();
    let (graph, _) = three_pass_graph(&log, true);
    ctx.run(graph);
    assert_eq!(ctx.pool.stats().free, 2);

    for &ms in heartbeats_ms {
        ctx.heartbeat(Duration::from_millis(ms));
    }

    let stats = ctx.pool.stats();
    if evicted {
        assert_eq!(stats.free, 0);
        assert_eq!(stats.buckets, 0);
        assert_eq!(stats.evictions, 2);
        assert_eq!(ctx.device.live_texture_count(), 0);
        assert_eq!(ctx.device.live_buffer_count(), 0);
    } else {
        assert_eq!(stats.free, 2);
        assert_eq!(stats.evictions, 0);
        assert_eq!(ctx.device.live_texture_count(), 1);
        assert_eq!(ctx.device.live_buffer_count(), 1);
    }
}

#[test]
fn test_reuse_resets_idle_time() {
    let mut ctx = TestContext::new();

    for _ in 0..4 {
        let log = ExecutionLog::default();
        let (graph, _) = three_pass_graph(&log, true);
        ctx.run(graph);
        ctx.heartbeat(Duration::from_millis(800));
    }

    assert_eq!(ctx.pool.stats().evictions, 0);
    assert_eq!(ctx.device.allocation_count(), 2);
}

#[test]
fn test_custom_idle_threshold() {
    let mut ctx = TestContext::with_max_idle_time(Duration::from_millis(100));
    let log = ExecutionLog::default();
    let (graph, _) = three_pass_graph(&log, true);
    ctx.run(graph);

    ctx.heartbeat(Duration::from_millis(150));
    assert_eq!(ctx.pool.stats().evictions, 2);
}

// ============================================================================
// Imports
// ============================================================================

#[test]
fn test_imported_resource_is_never_pooled_or_destroyed() {
    let mut ctx = TestContext::new();
    let (desc, handle) = backbuffer();

    for _ in 0..3 {
        let mut graph = FrameGraph::new();
        let target = graph.import("Backbuffer", desc, handle);

        let cleared = graph.add_pass(
            "Clear",
            |builder, out: &mut Option<ResourceHandle>| *out = Some(builder.write(target)),
            move |out, resources, _| assert_eq!(resources.texture(out.unwrap()), handle),
        );
        let overlaid = graph.add_pass(
            "Overlay",
            |builder, out: &mut Option<ResourceHandle>| {
                *out = Some(builder.write(cleared.unwrap()));
            },
            move |out, resources, _| assert_eq!(resources.texture(out.unwrap()), handle),
        );
        graph.add_pass(
            "Readback",
            |builder, _: &mut ()| {
                builder.read(overlaid.unwrap());
                builder.set_side_effect();
            },
            |_, _, _| {},
        );

        ctx.run(graph);
        ctx.heartbeat(Duration::from_secs(2));
    }

    assert!(!ctx.pool.is_live(DeviceResource::Texture(handle)));
    assert_eq!(ctx.pool.free_count(&ResourceDescriptor::from(desc)), 0);
    assert_eq!(ctx.pool.stats().allocations, 0);
    assert!(!ctx.device.commands().iter().any(|command| matches!(
        command,
        DeviceCommand::DestroyTexture(texture) | DeviceCommand::SetTextureSampler(texture, _)
            if *texture == handle
    )));
}

#[test]
fn test_presentation_pass_runs_last() {
    let mut ctx = TestContext::new();
    let log = ExecutionLog::default();
    let (desc, handle) = backbuffer();

    let mut graph = FrameGraph::new();
    let target = graph.import("Backbuffer", desc, handle);
    let scene = graph.add_pass(
        "Scene",
        |builder, out: &mut Option<ResourceHandle>| {
            *out = Some(builder.create("SceneColor", color_target(1280, 720)));
        },
        |_, _, _| log.borrow_mut().push("Scene".into()),
    );
    graph.add_pass(
        "Present",
        |builder, _: &mut ()| {
            builder.read(scene.unwrap());
            builder.write(target);
        },
        |_, _, _| log.borrow_mut().push("Present".into()),
    );
    graph.add_pass(
        "Screenshot",
        |builder, _: &mut ()| {
            builder.read(target);
            builder.set_side_effect();
        },
        |_, _, _| log.borrow_mut().push("Screenshot".into()),
    );
    ctx.run(graph);

    assert_eq!(log.into_inner(), ["Scene", "Screenshot", "Present"]);
}

// ============================================================================
// Failures
// ============================================================================

#[rstest]
#[case::first_allocation(0, "T", "A")]
#[case::second_allocation(1, "U", "B")]
fn test_device_failure_returns_held_resources(
    #[case] successful_allocations: usize,
    #[case] resource: &str,
    #[case] pass: &str,
) {
    let mut ctx = TestContext::new();
    ctx.device.fail_allocations_after(successful_allocations);

    let log = ExecutionLog::default();
    let (mut graph, _) = three_pass_graph(&log, true);
    graph.compile();
    let err = graph.execute(&mut ctx.device, &mut ctx.pool).unwrap_err();
    drop(graph);

    match err {
        FrameGraphError::Materialize {
            resource: failed,
            pass: failed_pass,
            ..
        } => {
            assert_eq!(failed, resource);
            assert_eq!(failed_pass, pass);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!log.borrow().contains(&"C".to_string()));
    assert_eq!(ctx.pool.stats().live, 0);
    assert_eq!(ctx.pool.stats().free, successful_allocations);

    // The next frame recovers and reuses what was returned
    ctx.device.clear_allocation_limit();
    let log = ExecutionLog::default();
    let (graph, _) = three_pass_graph(&log, true);
    ctx.run(graph);
    assert_eq!(ctx.pool.stats().reuses, successful_allocations as u64);
}

// ============================================================================
// Diagnostics and blackboard
// ============================================================================

#[test]
fn test_dot_mentions_every_pass_and_resource() {
    let log = ExecutionLog::default();
    let (mut graph, _) = three_pass_graph(&log, false);
    graph.compile();

    let dot = graph.to_dot();
    for name in ["A", "B", "C", "T", "U", "Unrelated"] {
        let pass_label = format!("<B>{name}</B>");
        let resource_label = format!("label=<{name} ");
        assert!(
            dot.contains(&pass_label) || dot.contains(&resource_label),
            "{name} missing"
        );
    }
    assert_eq!(dot.matches("fillcolor=lightgray").count(), 2);
}

#[derive(Debug, Clone, Copy)]
struct GBufferData {
    albedo: ResourceHandle,
    depth: ResourceHandle,
}

#[test]
fn test_blackboard_shares_pass_outputs() {
    let mut ctx = TestContext::new();
    let mut blackboard = Blackboard::new();
    let resolved = RefCell::new(Vec::new());

    let mut graph = FrameGraph::new();
    let gbuffer = graph.add_pass(
        "GBuffer",
        |builder, data: &mut Option<(ResourceHandle, ResourceHandle)>| {
            let albedo = builder.create("Albedo", color_target(64, 64));
            let depth = builder.create(
                "Depth",
                TextureDescriptor::new_2d(64, 64, TextureFormat::Depth24Plus),
            );
            *data = Some((builder.write(albedo), builder.write(depth)));
        },
        |_, _, _| {},
    );
    let (albedo, depth) = gbuffer.unwrap();
    blackboard.add(GBufferData { albedo, depth });

    let data = *blackboard.get::<GBufferData>();
    graph.add_pass(
        "Lighting",
        |builder, _: &mut ()| {
            builder.read(data.albedo);
            builder.read(data.depth);
            builder.set_side_effect();
        },
        |_, resources, _| {
            resolved.borrow_mut().push(resources.name(data.albedo).to_string());
            resolved.borrow_mut().push(resources.name(data.depth).to_string());
        },
    );
    ctx.run(graph);

    assert_eq!(resolved.into_inner(), ["Albedo", "Depth"]);
    assert!(blackboard.contains::<GBufferData>());
}

#[test]
fn test_execute_closure_borrows_caller_state() {
    let mut ctx = TestContext::new();
    let mut draws = 0u32;
    let (desc, handle) = backbuffer();

    {
        let mut graph = FrameGraph::new();
        let target = graph.import("Backbuffer", desc, handle);
        graph.add_pass(
            "Draw",
            |builder, _: &mut ()| {
                builder.write(target);
            },
            |_, _, device| {
                device.draw(0..3, 0..1);
                draws += 1;
            },
        );
        ctx.run(graph);
    }

    assert_eq!(draws, 1);
    assert!(ctx
        .device
        .commands()
        .iter()
        .any(|command| matches!(command, DeviceCommand::Draw { .. })));
}
