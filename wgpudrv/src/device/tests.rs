//! Tests for host primitive translation

use glam::Vec3;
use wgpudrv_common::{MipData, TexturePass};

use super::*;
use crate::backend::MapMode;
use crate::backend::recording::{Call, RecordingBackend};
use crate::render_state::BlendMode;
use crate::scene::{MapCoords, SavedPoly};

static PIXELS: [u8; 64] = [0xff; 64];

fn device(variant: EngineVariant) -> RenderDevice<RecordingBackend> {
    let mut device = RenderDevice::new(
        RecordingBackend::default(),
        DriverOptions::for_variant(variant),
        variant,
    )
    .unwrap();
    device.context_mut().backend_mut().clear();
    device
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
        mips: vec![MipData {
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

fn fan(z: f32) -> [TransTexture; 3] {
    let point = |x: f32, y: f32| TransTexture {
        point: Vec3::new(x, y, z),
        light: [0.5, 0.5, 0.5, 1.0],
        ..Default::default()
    };
    [point(0.0, 0.0), point(1.0, 0.0), point(0.0, 1.0)]
}

fn flat_facet(polys: Vec<SavedPoly>) -> Facet {
    Facet {
        map_coords: MapCoords {
            origin: Vec3::ZERO,
            x_axis: Vec3::X,
            y_axis: Vec3::Y,
        },
        polys,
    }
}

fn calls(device: &RenderDevice<RecordingBackend>) -> &[Call] {
    &device.context().backend().calls
}

fn drawn(device: &RenderDevice<RecordingBackend>) -> &[Vertex] {
    &device.context().backend().drawn_vertices
}

fn count(device: &RenderDevice<RecordingBackend>, pred: impl Fn(&Call) -> bool) -> usize {
    device.context().backend().count(pred)
}

#[test]
fn test_init_applies_defaults() {
    let device = RenderDevice::new(
        RecordingBackend::default(),
        DriverOptions::default(),
        EngineVariant::UnrealTournament,
    )
    .unwrap();
    let calls = calls(&device);
    assert!(calls.contains(&Call::Map(MapMode::Discard)));
    assert!(calls.contains(&Call::BlendMode(BlendMode::Opaque)));
    assert!(calls.contains(&Call::DepthWrite(true)));
    assert!(calls.contains(&Call::ProjectionMode(ProjectionMode::Normal)));
    assert!(calls.contains(&Call::Brightness(0.5)));
}

#[test]
fn test_surface_texture_coordinates() {
    let mut device = device(EngineVariant::UnrealTournament);
    let mut diffuse = texture(1);
    diffuse.pan = [1.0, 0.0];
    let mut light = texture(2);
    light.u_scale = 2.0;
    light.v_scale = 2.0;

    let mut surface = SurfaceInfo {
        poly_flags: PolyFlags::empty(),
        texture: &mut diffuse,
        light_map: Some(&mut light),
        detail_texture: None,
        fog_map: None,
        macro_texture: None,
    };
    let facet = flat_facet(vec![SavedPoly::new(vec![
        Vec3::new(5.0, 2.0, 20.0),
        Vec3::new(6.0, 2.0, 20.0),
        Vec3::new(6.0, 3.0, 20.0),
    ])]);
    device.draw_complex_surface(&mut surface, &facet).unwrap();
    device.unlock(false).unwrap();

    let first = drawn(&device)[0];
    assert_eq!(first.position, [5.0, 2.0, 20.0]);
    assert_eq!(first.color, [1.0; 4]);
    // (5 - 1) / 4, 2 / 4
    assert_eq!(first.tex_coords[TexturePass::Diffuse.index()], [1.0, 0.5]);
    // Pan shifted by half a light map texel: (5 + 1) / 8, (2 + 1) / 8
    assert_eq!(first.tex_coords[TexturePass::Light.index()], [0.75, 0.375]);
    assert_eq!(first.tex_coords[TexturePass::Detail.index()], [0.0, 0.0]);
}

#[test]
fn test_surface_binds_and_unbinds_passes() {
    let mut device = device(EngineVariant::UnrealTournament);
    let mut diffuse = texture(1);
    let mut light = texture(2);
    let facet = flat_facet(vec![SavedPoly::new(vec![Vec3::Z, Vec3::X, Vec3::Y])]);

    let mut lit = SurfaceInfo {
        poly_flags: PolyFlags::empty(),
        texture: &mut diffuse,
        light_map: Some(&mut light),
        detail_texture: None,
        fog_map: None,
        macro_texture: None,
    };
    device.draw_complex_surface(&mut lit, &facet).unwrap();
    assert_eq!(device.context().cache().bound(TexturePass::Light), Some(2));

    let mut unlit = SurfaceInfo {
        poly_flags: PolyFlags::empty(),
        texture: &mut diffuse,
        light_map: None,
        detail_texture: None,
        fog_map: None,
        macro_texture: None,
    };
    device.draw_complex_surface(&mut unlit, &facet).unwrap();
    assert_eq!(device.context().cache().bound(TexturePass::Light), None);
    // Unbinding the light map drew the first surface
    assert_eq!(count(&device, |c| matches!(c, Call::Draw { .. })), 1);
}

#[test]
fn test_surface_skips_degenerate_polys() {
    let mut device = device(EngineVariant::UnrealTournament);
    let mut diffuse = texture(1);
    let mut surface = SurfaceInfo {
        poly_flags: PolyFlags::empty(),
        texture: &mut diffuse,
        light_map: None,
        detail_texture: None,
        fog_map: None,
        macro_texture: None,
    };
    let facet = flat_facet(vec![
        SavedPoly::new(vec![Vec3::Z, Vec3::X]),
        SavedPoly::new(vec![Vec3::Z, Vec3::X, Vec3::Y]),
    ]);
    device.draw_complex_surface(&mut surface, &facet).unwrap();
    device.unlock(false).unwrap();

    let draws = device.context().backend().draws();
    assert_eq!(draws.len(), 1);
    let Call::Draw { indices, .. } = draws[0] else {
        unreachable!()
    };
    assert_eq!(indices, &vec![0, 1, 2]);
}

#[test]
fn test_surface_with_unsupported_texture_is_skipped() {
    let mut device = device(EngineVariant::UnrealTournament);
    let mut diffuse = texture(1);
    diffuse.format = 4; // RGB8
    let mut surface = SurfaceInfo {
        poly_flags: PolyFlags::empty(),
        texture: &mut diffuse,
        light_map: None,
        detail_texture: None,
        fog_map: None,
        macro_texture: None,
    };
    let facet = flat_facet(vec![SavedPoly::new(vec![Vec3::Z, Vec3::X, Vec3::Y])]);

    let err = device.draw_complex_surface(&mut surface, &facet).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DataIntegrity);
    assert_eq!(device.context().batch().num_indices(), 0);
}

#[test]
fn test_weapon_clears_depth_once_per_frame() {
    let mut device = device(EngineVariant::UnrealTournament);
    let mut info = texture(1);

    device.lock([0.5; 3], [0.0; 3], [0.0; 4], LockFlags::empty());
    device.context_mut().backend_mut().clear();

    device
        .draw_gouraud_polygon(&mut info, &fan(100.0), PolyFlags::empty())
        .unwrap();
    assert_eq!(count(&device, |c| *c == Call::ClearDepth), 0);

    device
        .draw_gouraud_polygon(&mut info, &fan(5.0), PolyFlags::empty())
        .unwrap();
    device
        .draw_gouraud_polygon(&mut info, &fan(5.0), PolyFlags::empty())
        .unwrap();
    assert_eq!(count(&device, |c| *c == Call::ClearDepth), 1);
    assert!(calls(&device).contains(&Call::ProjectionMode(ProjectionMode::CompensateZNear)));

    // A new frame re-arms the detection
    device.lock([0.5; 3], [0.0; 3], [0.0; 4], LockFlags::empty());
    device.context_mut().backend_mut().clear();
    device
        .draw_gouraud_polygon(&mut info, &fan(5.0), PolyFlags::empty())
        .unwrap();
    assert_eq!(count(&device, |c| *c == Call::ClearDepth), 1);
}

#[test]
fn test_weapon_workaround_is_variant_specific() {
    let mut device = device(EngineVariant::DeusEx);
    let mut info = texture(1);
    device
        .draw_gouraud_polygon(&mut info, &fan(5.0), PolyFlags::empty())
        .unwrap();
    assert_eq!(count(&device, |c| *c == Call::ClearDepth), 0);
    assert!(!calls(&device).contains(&Call::ProjectionMode(ProjectionMode::CompensateZNear)));
}

#[test]
fn test_gouraud_vertices() {
    let mut device = device(EngineVariant::UnrealTournament);
    let mut info = texture(1);
    let mut points = fan(50.0);
    points[1].u = 2.0;
    points[1].v = 1.0;
    points[1].fog = [0.1, 0.2, 0.3, 0.4];
    points[1].normal = Vec3::Y;

    device
        .draw_gouraud_polygon(&mut info, &points, PolyFlags::empty())
        .unwrap();
    device.unlock(false).unwrap();

    let v = drawn(&device)[1];
    assert_eq!(v.tex_coords[TexturePass::Diffuse.index()], [0.5, 0.25]);
    assert_eq!(v.fog, [0.1, 0.2, 0.3, 0.4]);
    assert_eq!(v.normal, [0.0, 1.0, 0.0]);
    assert_eq!(v.color, [0.5, 0.5, 0.5, 1.0]);
}

#[test]
fn test_gouraud_short_fan_is_ignored() {
    let mut device = device(EngineVariant::UnrealTournament);
    let mut info = texture(1);
    let points = fan(50.0);
    device
        .draw_gouraud_polygon(&mut info, &points[..2], PolyFlags::empty())
        .unwrap();
    assert_eq!(device.context().batch().num_indices(), 0);
    assert_eq!(device.context().cache().len(), 0);
}

#[test]
fn test_alpha_blend_uses_texture_alpha_on_rune() {
    let mut rune = device(EngineVariant::Rune);
    let mut info = texture(1);
    info.alpha = 0.25;
    rune.draw_gouraud_polygon(&mut info, &fan(50.0), PolyFlags::ALPHA_BLEND)
        .unwrap();
    rune.unlock(false).unwrap();
    assert_eq!(drawn(&rune)[0].color[3], 0.25);
    assert!(calls(&rune).contains(&Call::BlendMode(BlendMode::AlphaBlend)));

    let mut ut = device(EngineVariant::UnrealTournament);
    ut.draw_gouraud_polygon(&mut info, &fan(50.0), PolyFlags::ALPHA_BLEND)
        .unwrap();
    ut.unlock(false).unwrap();
    assert_eq!(drawn(&ut)[0].color[3], 1.0);
}

#[test]
fn test_tile_quad() {
    let mut device = device(EngineVariant::UnrealTournament);
    let mut info = texture(1);
    let frame = SceneNode::new(0, 0, 640, 480, 90.0);
    let tile = Tile {
        x: 10.0,
        y: 20.0,
        xl: 30.0,
        yl: 40.0,
        u: 0.0,
        v: 0.0,
        ul: 4.0,
        vl: 2.0,
        z: 1.0,
        color: [1.0, 0.0, 0.0, 1.0],
        fog: [0.0; 4],
    };
    device
        .draw_tile(&frame, &mut info, &tile, PolyFlags::MASKED)
        .unwrap();
    device.unlock(false).unwrap();

    assert!(calls(&device).contains(&Call::ProjectionMode(ProjectionMode::ZOnly)));
    assert!(calls(&device).contains(&Call::Viewport(Viewport::new(0, 0, 640, 480))));

    let positions: Vec<[f32; 3]> = drawn(&device).iter().map(|v| v.position).collect();
    assert_eq!(
        positions,
        vec![
            [10.0, 20.0, 1.0],
            [40.0, 20.0, 1.0],
            [40.0, 60.0, 1.0],
            [10.0, 60.0, 1.0],
        ]
    );
    let uvs: Vec<[f32; 2]> = drawn(&device)
        .iter()
        .map(|v| v.tex_coords[TexturePass::Diffuse.index()])
        .collect();
    assert_eq!(uvs, vec![[0.0, 0.0], [1.0, 0.0], [1.0, 0.5], [0.0, 0.5]]);

    let draws = device.context().backend().draws();
    let Call::Draw { indices, .. } = draws[0] else {
        unreachable!()
    };
    assert_eq!(indices, &vec![0, 1, 2, 2, 3, 0]);
    assert!(device.context().cache().get(1).unwrap().metadata.masked);
}

#[test]
fn test_fog_surface_alpha_follows_depth() {
    let mut device = device(EngineVariant::Rune);
    let surface = FogSurface {
        poly_flags: PolyFlags::empty(),
        fog_color: [0.2, 0.3, 0.4, 1.0],
        fog_distance: 64.0,
        polys: vec![SavedPoly::new(vec![
            Vec3::new(0.0, 0.0, 16.0),
            Vec3::new(1.0, 0.0, 32.0),
            Vec3::new(0.0, 1.0, 64.0),
        ])],
    };
    device.draw_fog_surface(&surface).unwrap();
    device.unlock(false).unwrap();

    let alphas: Vec<f32> = drawn(&device).iter().map(|v| v.color[3]).collect();
    assert_eq!(alphas, vec![0.25, 0.5, 1.0]);
    assert!(drawn(&device)
        .iter()
        .all(|v| v.flags == PolyFlags::ALPHA_BLEND.bits()));
    assert!(calls(&device).contains(&Call::BlendMode(BlendMode::AlphaBlend)));
}

#[test]
fn test_fog_surface_ignored_without_alpha_blend() {
    let mut device = device(EngineVariant::UnrealTournament);
    let surface = FogSurface {
        poly_flags: PolyFlags::empty(),
        fog_color: [0.0; 4],
        fog_distance: 100.0,
        polys: vec![SavedPoly::new(vec![Vec3::Z, Vec3::X, Vec3::Y])],
    };
    device.draw_fog_surface(&surface).unwrap();
    assert_eq!(device.context().batch().num_indices(), 0);
}

#[test]
fn test_lock_clears_screen_on_request() {
    let mut device = device(EngineVariant::UnrealTournament);
    device.lock([0.5; 3], [0.0; 3], [0.1, 0.2, 0.3, 1.0], LockFlags::empty());
    assert_eq!(count(&device, |c| matches!(c, Call::ClearColor(_))), 0);
    assert_eq!(count(&device, |c| *c == Call::ClearDepth), 1);

    device.lock([0.5; 3], [0.0; 3], [0.1, 0.2, 0.3, 1.0], LockFlags::CLEAR_SCREEN);
    assert!(calls(&device).contains(&Call::ClearColor([0.1, 0.2, 0.3, 1.0])));
}

#[test]
fn test_lock_applies_flash() {
    let mut device = device(EngineVariant::UnrealTournament);
    device.lock([0.25; 3], [0.0, 0.0, 0.5], [0.0; 4], LockFlags::empty());
    assert!(calls(&device).contains(&Call::Flash(Flash {
        enabled: true,
        color: [0.0, 0.0, 0.5, 0.5],
    })));
}

#[test]
fn test_unlock_presents_only_on_blit() {
    let mut device = device(EngineVariant::UnrealTournament);
    device.unlock(false).unwrap();
    assert_eq!(count(&device, |c| *c == Call::Present), 0);
    device.unlock(true).unwrap();
    assert_eq!(count(&device, |c| *c == Call::Present), 1);
}

#[test]
fn test_scene_node_projection() {
    let mut device = device(EngineVariant::UnrealTournament);
    let frame = SceneNode::new(8, 16, 320, 240, 90.0);
    device.set_scene_node(&frame);

    let expected = Projection {
        aspect: 240.0 / 320.0,
        x_over_z: (90.0f32 * PI / 360.0).tan(),
    }
    .matrix(device.options().z_near);
    assert!(calls(&device).contains(&Call::Viewport(Viewport::new(8, 16, 320, 240))));
    assert!(calls(&device).contains(&Call::Projection(expected)));

    device.context_mut().backend_mut().clear();
    device.set_scene_node(&frame);
    assert!(calls(&device).is_empty());
}

#[test]
fn test_gouraud_fog_bracket() {
    let mut device = device(EngineVariant::Rune);
    device.pre_draw_gouraud(500.0, [0.5, 0.5, 0.5, 1.0]);
    device.post_draw_gouraud(500.0);
    device.pre_draw_gouraud(0.0, [0.5, 0.5, 0.5, 1.0]);
    assert_eq!(
        calls(&device),
        &[
            Call::Fog(FogParams {
                distance: 500.0,
                color: [0.5, 0.5, 0.5, 1.0],
            }),
            Call::Fog(FogParams::default()),
        ]
    );
}

#[test]
fn test_exec_brightness() {
    let mut device = device(EngineVariant::UnrealTournament);
    assert_eq!(device.exec("Brightness 0.75"), None);
    assert_eq!(device.options().brightness, 0.75);
    assert!(calls(&device).contains(&Call::Brightness(0.75)));

    device.context_mut().backend_mut().clear();
    device.exec("brightness banana");
    device.exec("brightness 3");
    assert_eq!(calls(&device), &[Call::Brightness(1.0)]);
}

#[test]
fn test_exec_get_res() {
    let mut device = device(EngineVariant::DeusEx);
    let modes: Vec<(u32, u32)> = (1..=20).map(|i| (i * 100, i * 75)).collect();
    device.set_display_modes(modes);

    let list = device.exec("GETRES").unwrap();
    let entries: Vec<&str> = list.split(' ').collect();
    assert_eq!(entries.len(), 16);
    assert_eq!(entries[0], "500x375");
    assert_eq!(entries[15], "2000x1500");

    assert_eq!(device.exec("stat fps"), None);
}

#[test]
fn test_set_res_reapplies_state() {
    let mut device = device(EngineVariant::UnrealTournament);
    let mut info = texture(1);
    device
        .draw_gouraud_polygon(&mut info, &fan(50.0), PolyFlags::empty())
        .unwrap();
    device.context_mut().backend_mut().clear();

    device.set_res(800, 600, false).unwrap();
    assert_eq!(calls(&device)[0], Call::Draw {
        first_vertex: 0,
        vertices: 3,
        first_index: 0,
        indices: vec![0, 1, 2],
    });
    assert!(calls(&device).contains(&Call::Resize(800, 600)));
    assert!(calls(&device).contains(&Call::BlendMode(BlendMode::Opaque)));
    assert_eq!(device.size(), (800, 600));
    assert_eq!(device.context().cache().bound(TexturePass::Diffuse), None);
}

#[test]
fn test_flush_releases_textures() {
    let mut device = device(EngineVariant::UnrealTournament);
    let mut info = texture(1);
    device.precache_texture(&mut info, PolyFlags::empty()).unwrap();
    assert!(device.context().cache().is_cached(1));

    assert!(!device.flush(true));
    assert!(!device.context().cache().is_cached(1));

    let options = DriverOptions {
        precache: true,
        ..Default::default()
    };
    let mut precaching = RenderDevice::new(
        RecordingBackend::default(),
        options,
        EngineVariant::UnrealTournament,
    )
    .unwrap();
    assert!(precaching.flush(true));
    assert!(!precaching.flush(false));
}

#[test]
fn test_exit_releases_everything() {
    let mut device = device(EngineVariant::UnrealTournament);
    let mut info = texture(1);
    device
        .draw_gouraud_polygon(&mut info, &fan(50.0), PolyFlags::empty())
        .unwrap();
    device.exit();
    assert!(device.context().backend().live_textures.is_empty());
    assert_eq!(count(&device, |c| matches!(c, Call::Draw { .. })), 1);
}
