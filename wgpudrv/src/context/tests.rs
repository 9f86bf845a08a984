//! Tests for flush ordering, state coalescing and texture residency

use super::*;
use crate::backend::recording::{Call, RecordingBackend};
use crate::render_state::BlendMode;

static PIXELS: [u8; 64] = [0x80; 64];

fn context(vertices: usize, indices: usize) -> RenderContext<RecordingBackend> {
    let mut ctx = RenderContext::new(
        RecordingBackend::new(vertices, indices),
        BlendPolicy::default(),
        7.0,
    )
    .unwrap();
    ctx.backend_mut().clear();
    ctx
}

fn texture(cache_id: u64) -> TextureInfo<'static> {
    TextureInfo {
        cache_id,
        format: 5, // RGBA8
        u_size: 4,
        v_size: 4,
        u_clamp: 4,
        v_clamp: 4,
        u_scale: 1.0,
        v_scale: 1.0,
        pan: [0.0, 0.0],
        mips: vec![wgpudrv_common::MipData {
            u_size: 4,
            v_size: 4,
            data: &PIXELS,
        }],
        palette: None,
        realtime_changed: false,
        realtime: false,
        parametric: false,
        alpha: 1.0,
    }
}

fn emit_fan(ctx: &mut RenderContext<RecordingBackend>, n: usize) {
    ctx.reserve_fan(n).unwrap();
    for i in 0..n {
        ctx.next_vertex().position = [i as f32, 0.0, 1.0];
    }
}

fn draw_count(ctx: &RenderContext<RecordingBackend>) -> usize {
    ctx.backend().count(|c| matches!(c, Call::Draw { .. }))
}

#[test]
fn test_fan_is_drawn_as_one_batch() {
    let mut ctx = context(64, 64);
    emit_fan(&mut ctx, 4);
    emit_fan(&mut ctx, 3);
    ctx.flush();

    assert_eq!(
        ctx.backend().calls,
        vec![
            Call::Draw {
                first_vertex: 0,
                vertices: 7,
                first_index: 0,
                indices: vec![0, 1, 2, 0, 2, 3, 4, 5, 6],
            },
            Call::Map(MapMode::NoOverwrite),
        ]
    );
    assert_eq!(ctx.backend().drawn_vertices[6].position, [2.0, 0.0, 1.0]);
}

#[test]
fn test_flush_without_geometry_does_nothing() {
    let mut ctx = context(64, 64);
    ctx.flush();
    ctx.flush();
    assert!(ctx.backend().calls.is_empty());
}

#[test]
fn test_state_change_flushes_then_appends() {
    let mut ctx = context(64, 64);
    emit_fan(&mut ctx, 3);
    ctx.set_projection_mode(ProjectionMode::ZOnly);
    assert_eq!(
        ctx.backend().calls,
        vec![
            Call::Draw {
                first_vertex: 0,
                vertices: 3,
                first_index: 0,
                indices: vec![0, 1, 2],
            },
            Call::Map(MapMode::NoOverwrite),
            Call::ProjectionMode(ProjectionMode::ZOnly),
        ]
    );

    ctx.backend_mut().clear();
    ctx.reserve_quad().unwrap();
    for _ in 0..4 {
        ctx.next_vertex();
    }
    ctx.flush();
    assert_eq!(
        ctx.backend().calls[0],
        Call::Draw {
            first_vertex: 3,
            vertices: 4,
            first_index: 3,
            indices: vec![3, 4, 5, 5, 6, 3],
        }
    );
}

#[test]
fn test_overflow_flushes_once_and_restarts() {
    let mut ctx = context(12, 12);
    emit_fan(&mut ctx, 5); // 9 indices
    emit_fan(&mut ctx, 4); // 6 more would exceed 12

    assert_eq!(ctx.stats().overflow_flushes, 1);
    assert_eq!(draw_count(&ctx), 1);
    assert_eq!(
        ctx.backend().calls,
        vec![
            Call::Draw {
                first_vertex: 0,
                vertices: 5,
                first_index: 0,
                indices: vec![0, 1, 2, 0, 2, 3, 0, 3, 4],
            },
            Call::Map(MapMode::Discard),
        ]
    );
    assert_eq!(ctx.batch().num_indices(), 6);
    assert_eq!(ctx.batch().num_vertices(), 4);

    ctx.flush();
    assert_eq!(
        ctx.backend().calls[2],
        Call::Draw {
            first_vertex: 0,
            vertices: 4,
            first_index: 0,
            indices: vec![0, 1, 2, 0, 2, 3],
        }
    );
}

#[test]
fn test_reservation_errors() {
    let mut ctx = context(12, 12);
    assert!(matches!(
        ctx.reserve_fan(2),
        Err(DriverError::DegenerateFan(2))
    ));
    assert!(matches!(
        ctx.reserve_fan(20),
        Err(DriverError::BatchTooLarge {
            required: 54,
            capacity: 12
        })
    ));
    assert_eq!(ctx.batch().num_indices(), 0);
    assert!(ctx.backend().calls.is_empty());
}

#[test]
fn test_setters_are_idempotent() {
    let mut ctx = context(64, 64);
    let viewport = Viewport::new(0, 0, 320, 200);
    let fog = FogParams {
        distance: 1000.0,
        color: [0.1, 0.2, 0.3, 1.0],
    };

    ctx.set_viewport(viewport);
    ctx.set_fog(fog);
    ctx.set_brightness(0.7);
    ctx.set_projection_mode(ProjectionMode::Normal);
    ctx.set_projection(Projection {
        aspect: 0.75,
        x_over_z: 1.0,
    });
    ctx.set_flash(Flash::NONE);
    ctx.set_blend_and_depth(PolyFlags::MASKED);
    let applied = ctx.backend().calls.len();

    emit_fan(&mut ctx, 3);
    ctx.set_viewport(viewport);
    ctx.set_fog(fog);
    ctx.set_brightness(0.7);
    ctx.set_projection_mode(ProjectionMode::Normal);
    ctx.set_projection(Projection {
        aspect: 0.75,
        x_over_z: 1.0,
    });
    ctx.set_flash(Flash::NONE);
    ctx.set_blend_and_depth(PolyFlags::MASKED);

    assert_eq!(ctx.backend().calls.len(), applied);
    assert_eq!(draw_count(&ctx), 0);
    assert!(ctx.flush_required());
}

#[test]
fn test_irrelevant_flags_do_not_flush() {
    let mut ctx = context(64, 64);
    ctx.set_blend_and_depth(PolyFlags::MASKED);
    ctx.backend_mut().clear();

    emit_fan(&mut ctx, 3);
    ctx.set_blend_and_depth(PolyFlags::MASKED | PolyFlags::TWO_SIDED | PolyFlags::UNLIT);
    assert!(ctx.backend().calls.is_empty());
}

#[test]
fn test_blend_and_depth_applied_separately() {
    let mut ctx = context(64, 64);
    ctx.set_blend_and_depth(PolyFlags::empty());
    assert_eq!(
        ctx.backend().calls,
        vec![
            Call::BlendMode(BlendMode::Opaque),
            Call::DepthWrite(true),
        ]
    );

    ctx.backend_mut().clear();
    emit_fan(&mut ctx, 3);
    ctx.set_blend_and_depth(PolyFlags::TRANSLUCENT);
    assert_eq!(draw_count(&ctx), 1);
    assert!(ctx.backend().calls.contains(&Call::BlendMode(BlendMode::Translucent)));
    assert!(ctx.backend().calls.contains(&Call::DepthWrite(false)));

    ctx.backend_mut().clear();
    ctx.set_blend_and_depth(PolyFlags::MODULATED);
    assert_eq!(
        ctx.backend().calls,
        vec![Call::BlendMode(BlendMode::Modulated)]
    );

    ctx.backend_mut().clear();
    ctx.set_blend_and_depth(PolyFlags::MODULATED | PolyFlags::OCCLUDE);
    assert_eq!(ctx.backend().calls, vec![Call::DepthWrite(true)]);
}

#[test]
fn test_bind_same_texture_is_skipped() {
    let mut ctx = context(64, 64);
    ctx.cache_texture(&texture(10), PolyFlags::empty()).unwrap();
    let first = ctx.bind_texture(TexturePass::Diffuse, Some(10)).unwrap();
    ctx.backend_mut().clear();

    emit_fan(&mut ctx, 3);
    let second = ctx.bind_texture(TexturePass::Diffuse, Some(10)).unwrap();
    assert_eq!(first, second);
    assert!(ctx.backend().calls.is_empty());
    assert!(ctx.flush_required());
}

#[test]
fn test_bind_change_flushes_first() {
    let mut ctx = context(64, 64);
    ctx.cache_texture(&texture(10), PolyFlags::empty()).unwrap();
    ctx.cache_texture(&texture(11), PolyFlags::empty()).unwrap();
    ctx.bind_texture(TexturePass::Diffuse, Some(10)).unwrap();
    ctx.backend_mut().clear();

    emit_fan(&mut ctx, 3);
    ctx.bind_texture(TexturePass::Diffuse, Some(11)).unwrap();
    let calls = &ctx.backend().calls;
    assert!(matches!(calls[0], Call::Draw { .. }));
    assert_eq!(calls[2], Call::BindTexture(TexturePass::Diffuse, Some(2)));

    ctx.backend_mut().clear();
    assert_eq!(ctx.bind_texture(TexturePass::Diffuse, None).unwrap(), None);
    assert_eq!(
        ctx.backend().calls,
        vec![Call::BindTexture(TexturePass::Diffuse, None)]
    );
}

#[test]
fn test_bind_uncached_texture_fails() {
    let mut ctx = context(64, 64);
    emit_fan(&mut ctx, 3);
    assert!(matches!(
        ctx.bind_texture(TexturePass::Light, Some(99)),
        Err(DriverError::TextureNotFound(99))
    ));
    assert_eq!(ctx.cache().bound(TexturePass::Light), None);
    assert!(ctx.backend().calls.is_empty());
}

#[test]
fn test_masked_recache_recreates_once() {
    let mut ctx = context(64, 64);
    let mut info = texture(20);
    let meta = ctx.precache_texture(&mut info, PolyFlags::empty()).unwrap();
    assert!(!meta.masked);
    ctx.backend_mut().clear();

    let meta = ctx.precache_texture(&mut info, PolyFlags::MASKED).unwrap();
    assert!(meta.masked);
    assert!(ctx.cache().metadata(20).unwrap().masked);
    assert_eq!(
        ctx.backend()
            .count(|c| matches!(c, Call::DestroyTexture(_))),
        1
    );
    assert_eq!(
        ctx.backend()
            .count(|c| matches!(c, Call::CreateTexture { cache_id: 20, .. })),
        1
    );
}

#[test]
fn test_precache_is_idempotent() {
    let mut ctx = context(64, 64);
    let mut info = texture(21);
    ctx.precache_texture(&mut info, PolyFlags::MASKED).unwrap();
    ctx.backend_mut().clear();

    ctx.precache_texture(&mut info, PolyFlags::MASKED).unwrap();
    ctx.precache_texture(&mut info, PolyFlags::empty()).unwrap();
    assert!(ctx.backend().calls.is_empty());
}

#[test]
fn test_realtime_change_updates_in_place() {
    let mut ctx = context(64, 64);
    let mut info = texture(22);
    info.realtime = true;
    ctx.precache_texture(&mut info, PolyFlags::empty()).unwrap();
    ctx.bind_texture(TexturePass::Diffuse, Some(22)).unwrap();
    ctx.backend_mut().clear();

    emit_fan(&mut ctx, 3);
    info.realtime_changed = true;
    ctx.precache_texture(&mut info, PolyFlags::empty()).unwrap();

    assert!(!info.realtime_changed);
    let calls = &ctx.backend().calls;
    assert!(matches!(calls[0], Call::Draw { .. }));
    assert_eq!(calls[2], Call::UpdateTexture { id: 1, level: 0 });
    assert_eq!(ctx.backend().count(|c| matches!(c, Call::CreateTexture { .. })), 0);
    assert_eq!(ctx.stats().textures_updated, 1);
}

#[test]
fn test_changed_static_texture_is_recreated() {
    let mut ctx = context(64, 64);
    let mut info = texture(26);
    let meta = ctx.precache_texture(&mut info, PolyFlags::empty()).unwrap();
    assert!(!meta.dynamic);
    ctx.bind_texture(TexturePass::Diffuse, Some(26)).unwrap();
    ctx.backend_mut().clear();

    info.realtime_changed = true;
    let meta = ctx.precache_texture(&mut info, PolyFlags::empty()).unwrap();

    assert!(!info.realtime_changed);
    assert!(meta.dynamic);
    assert!(ctx.cache().metadata(26).unwrap().dynamic);
    assert_eq!(ctx.backend().count(|c| matches!(c, Call::DestroyTexture(_))), 1);
    assert_eq!(
        ctx.backend()
            .count(|c| matches!(c, Call::CreateTexture { cache_id: 26, .. })),
        1
    );
    assert_eq!(ctx.backend().count(|c| matches!(c, Call::UpdateTexture { .. })), 0);
    assert_eq!(ctx.stats().textures_updated, 0);

    // Further changes now update in place.
    ctx.backend_mut().clear();
    info.realtime_changed = true;
    ctx.precache_texture(&mut info, PolyFlags::empty()).unwrap();
    assert_eq!(ctx.backend().count(|c| matches!(c, Call::CreateTexture { .. })), 0);
    assert_eq!(ctx.stats().textures_updated, 1);
}

#[test]
fn test_update_of_unbound_texture_does_not_flush() {
    let mut ctx = context(64, 64);
    let info = texture(23);
    ctx.cache_texture(&info, PolyFlags::empty()).unwrap();
    ctx.backend_mut().clear();

    emit_fan(&mut ctx, 3);
    let mip = wgpudrv_common::convert_mip(&info, 0, PolyFlags::empty()).unwrap();
    ctx.update_mip(23, 0, &mip).unwrap();
    assert_eq!(
        ctx.backend().calls,
        vec![Call::UpdateTexture { id: 1, level: 0 }]
    );
    assert!(matches!(
        ctx.update_mip(24, 0, &mip),
        Err(DriverError::TextureNotFound(24))
    ));
}

#[test]
fn test_overwriting_bound_texture_rebinds() {
    let mut ctx = context(64, 64);
    let info = texture(25);
    ctx.cache_texture(&info, PolyFlags::empty()).unwrap();
    ctx.bind_texture(TexturePass::Macro, Some(25)).unwrap();
    ctx.backend_mut().clear();

    emit_fan(&mut ctx, 3);
    ctx.cache_texture(&info, PolyFlags::empty()).unwrap();
    let calls = &ctx.backend().calls;
    assert!(matches!(calls[0], Call::CreateTexture { id: 2, .. }));
    assert!(matches!(calls[1], Call::Draw { .. }));
    assert_eq!(calls[3], Call::DestroyTexture(1));
    assert_eq!(calls[4], Call::BindTexture(TexturePass::Macro, Some(2)));
}

#[test]
fn test_remove_bound_texture_unbinds() {
    let mut ctx = context(64, 64);
    ctx.cache_texture(&texture(30), PolyFlags::empty()).unwrap();
    ctx.bind_texture(TexturePass::Detail, Some(30)).unwrap();
    ctx.backend_mut().clear();

    emit_fan(&mut ctx, 3);
    assert!(ctx.remove_texture(30));
    assert!(!ctx.remove_texture(30));
    let calls = &ctx.backend().calls;
    assert!(matches!(calls[0], Call::Draw { .. }));
    assert_eq!(calls[2], Call::BindTexture(TexturePass::Detail, None));
    assert_eq!(calls[3], Call::DestroyTexture(1));
    assert_eq!(ctx.cache().bound(TexturePass::Detail), None);
}

#[test]
fn test_flush_all_clears_cache() {
    let mut ctx = context(64, 64);
    for key in [1u64, 2, 3] {
        ctx.cache_texture(&texture(key), PolyFlags::empty()).unwrap();
    }
    ctx.bind_texture(TexturePass::Diffuse, Some(2)).unwrap();

    ctx.flush_all();
    for key in [1u64, 2, 3] {
        assert!(!ctx.cache().is_cached(key));
    }
    assert!(ctx.backend().live_textures.is_empty());
    assert_eq!(ctx.cache().bound(TexturePass::Diffuse), None);
    assert_eq!(ctx.stats().textures_destroyed, 3);
}

#[test]
fn test_unsupported_texture_is_not_cached() {
    let mut ctx = context(64, 64);
    let mut info = texture(40);
    info.format = 2; // RGB16
    assert!(matches!(
        ctx.precache_texture(&mut info, PolyFlags::empty()),
        Err(DriverError::Convert(_))
    ));
    assert!(!ctx.cache().is_cached(40));
    assert!(ctx.backend().calls.is_empty());
}

#[test]
fn test_frame_bracket() {
    let mut ctx = context(64, 64);
    let flash = Flash::from_host([0.3, 0.5, 0.5], [0.2, 0.0, 0.0]);
    ctx.begin_frame(flash, Some([0.0, 0.0, 0.0, 1.0]));
    assert_eq!(
        ctx.backend().calls,
        vec![
            Call::Map(MapMode::Discard),
            Call::Time(1.0 / 60.0),
            Call::Flash(flash),
            Call::ClearDepth,
            Call::ClearColor([0.0, 0.0, 0.0, 1.0]),
        ]
    );

    emit_fan(&mut ctx, 3);
    ctx.end_frame(true).unwrap();
    assert_eq!(
        ctx.backend().calls[5..],
        [
            Call::Draw {
                first_vertex: 0,
                vertices: 3,
                first_index: 0,
                indices: vec![0, 1, 2],
            },
            Call::Map(MapMode::NoOverwrite),
            Call::Present,
        ]
    );

    ctx.backend_mut().clear();
    ctx.begin_frame(flash, None);
    assert_eq!(
        ctx.backend().calls,
        vec![Call::Map(MapMode::Discard), Call::Time(2.0 / 60.0), Call::ClearDepth]
    );
    assert_eq!(ctx.batch().num_indices(), 0);
    assert_eq!(ctx.stats().frames, 2);
}

#[test]
fn test_mid_frame_depth_clear_flushes() {
    let mut ctx = context(64, 64);
    emit_fan(&mut ctx, 3);
    ctx.clear_depth();
    let calls = &ctx.backend().calls;
    assert!(matches!(calls[0], Call::Draw { .. }));
    assert_eq!(calls[2], Call::ClearDepth);
}

#[test]
fn test_resize_invalidates_state() {
    let mut ctx = context(64, 64);
    let viewport = Viewport::new(0, 0, 640, 480);
    ctx.cache_texture(&texture(50), PolyFlags::empty()).unwrap();
    ctx.bind_texture(TexturePass::Diffuse, Some(50)).unwrap();
    ctx.set_viewport(viewport);
    ctx.set_blend_and_depth(PolyFlags::empty());

    ctx.resize(800, 600).unwrap();
    assert_eq!(ctx.backend().size(), (800, 600));
    assert_eq!(ctx.cache().bound(TexturePass::Diffuse), None);
    assert!(ctx.cache().is_cached(50));

    ctx.backend_mut().clear();
    ctx.set_viewport(viewport);
    ctx.set_blend_and_depth(PolyFlags::empty());
    ctx.bind_texture(TexturePass::Diffuse, Some(50)).unwrap();
    assert_eq!(ctx.backend().calls.len(), 4);
}

#[test]
fn test_shutdown_releases_textures() {
    let mut ctx = context(64, 64);
    ctx.cache_texture(&texture(60), PolyFlags::empty()).unwrap();
    emit_fan(&mut ctx, 3);
    ctx.shutdown();
    assert_eq!(draw_count(&ctx), 1);
    assert!(ctx.cache().is_empty());
    assert!(ctx.backend().live_textures.is_empty());
}
