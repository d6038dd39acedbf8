//! Integration tests for batch2d over the command recorder.

use batch2d::config::DEFAULT_MAX_QUADS;
use batch2d::recorder::BackendCommand;
use batch2d::slots::WHITE_SLOT;
use batch2d::{
    BatchConfig, BufferUsage, Camera, Color, CommandRecorder, GraphicsBackend, OrthoCamera,
    SpriteRenderer, TextureHandle, UvRect,
};

const EPS: f32 = 1e-4;

fn renderer_with(config: BatchConfig) -> SpriteRenderer<CommandRecorder> {
    SpriteRenderer::initialize(CommandRecorder::new(), config).unwrap()
}

fn renderer() -> SpriteRenderer<CommandRecorder> {
    renderer_with(BatchConfig::default())
}

fn camera() -> OrthoCamera {
    OrthoCamera::new(1280.0, 720.0)
}

fn textures(r: &mut SpriteRenderer<CommandRecorder>, count: usize) -> Vec<TextureHandle> {
    (0..count)
        .map(|_| r.backend_mut().register_texture(16, 16))
        .collect()
}

fn assert_close(actual: [f32; 2], expected: [f32; 2]) {
    assert!(
        (actual[0] - expected[0]).abs() < EPS && (actual[1] - expected[1]).abs() < EPS,
        "expected {expected:?}, got {actual:?}"
    );
}

/// Quads reach the GPU in emission order.
#[test]
fn test_order_preservation() {
    let mut r = renderer();
    let tex = textures(&mut r, 3);
    r.begin_batch(&camera());
    for i in 0..30 {
        let center = [i as f32 * 10.0, 0.0];
        if i % 4 == 0 {
            r.draw_quad(center, [2.0, 2.0], 0.0, Color::WHITE);
        } else {
            r.draw_textured_quad(center, [2.0, 2.0], 0.0, tex[i % 3], UvRect::FULL, Color::WHITE);
        }
    }
    r.end_batch();

    let draws = r.backend().draws();
    assert_eq!(draws.len(), 1);
    for i in 0..30 {
        // Corner 0 sits at center - half extents.
        let corner = draws[0].vertices[i * 4].position;
        assert_close(corner, [i as f32 * 10.0 - 1.0, -1.0]);
    }
}

/// After a reset, a colored quad samples the white texture in slot 0.
#[test]
fn test_slot_zero_is_white_after_reset() {
    let mut r = renderer();
    let tex = textures(&mut r, 1)[0];
    let white = r.white_texture();
    r.begin_batch(&camera());
    r.draw_textured_quad([0.0, 0.0], [1.0, 1.0], 0.0, tex, UvRect::FULL, Color::WHITE);
    r.flush();
    r.draw_quad([0.0, 0.0], [1.0, 1.0], 0.0, Color::BLACK);
    r.end_batch();

    let draws = r.backend().draws();
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[0].units, vec![(0, white), (1, tex)]);
    assert_eq!(draws[1].units, vec![(0, white)]);
    assert_eq!(draws[1].vertices[0].slot(), WHITE_SLOT);
    assert_eq!(draws[1].texture_of_quad(0), Some(white));
}

#[test]
fn test_geometry_capacity_flush() {
    let mut r = renderer();
    r.begin_batch(&camera());
    for _ in 0..DEFAULT_MAX_QUADS + 1 {
        r.draw_quad([5.0, 5.0], [1.0, 1.0], 0.0, Color::WHITE);
    }
    r.end_batch();

    let draws = r.backend().draws();
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[0].quad_count(), DEFAULT_MAX_QUADS);
    assert_eq!(draws[1].quad_count(), 1);

    let stats = r.stats();
    assert_eq!(stats.draw_calls, 2);
    assert_eq!(stats.quads_drawn as usize, DEFAULT_MAX_QUADS + 1);
    assert_eq!(stats.flushes_by_cause.geometry_full, 1);
    assert_eq!(stats.flushes_by_cause.end_of_batch, 1);
}

/// Slot 0 is reserved, so 31 distinct textures fit in one batch and the
/// 32nd forces the flush.
#[test]
fn test_texture_slot_exhaustion_flush() {
    let mut r = renderer();
    let tex = textures(&mut r, 33);
    r.begin_batch(&camera());
    for &t in &tex {
        r.draw_textured_quad([0.0, 0.0], [1.0, 1.0], 0.0, t, UvRect::FULL, Color::WHITE);
    }
    r.end_batch();

    let draws = r.backend().draws();
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[0].quad_count(), 31);
    assert_eq!(draws[0].units.len(), 32);
    assert_eq!(draws[1].quad_count(), 2);
    assert_eq!(draws[1].texture_of_quad(0), Some(tex[31]));
    assert_eq!(draws[1].texture_of_quad(1), Some(tex[32]));
    assert_eq!(r.stats().flushes_by_cause.slots_full, 1);
}

#[test]
fn test_configured_slot_limit() {
    let mut r = renderer_with(BatchConfig {
        max_texture_slots: 4,
        ..Default::default()
    });
    let tex = textures(&mut r, 7);
    r.begin_batch(&camera());
    for &t in &tex {
        r.draw_textured_quad([0.0, 0.0], [1.0, 1.0], 0.0, t, UvRect::FULL, Color::WHITE);
    }
    r.end_batch();

    let counts: Vec<usize> = r.backend().draws().iter().map(|d| d.quad_count()).collect();
    assert_eq!(counts, vec![3, 3, 1]);
}

#[test]
fn test_rotation_places_corners() {
    let mut r = renderer();
    r.begin_batch(&camera());
    r.draw_quad([100.0, 100.0], [10.0, 10.0], 90.0, Color::WHITE);
    r.end_batch();

    let v = &r.backend().draws()[0].vertices;
    assert_close(v[0].position, [105.0, 95.0]);
    assert_close(v[1].position, [105.0, 105.0]);
    assert_close(v[2].position, [95.0, 105.0]);
    assert_close(v[3].position, [95.0, 95.0]);
}

#[test]
fn test_uv_rect_maps_to_corners() {
    let mut r = renderer();
    let tex = textures(&mut r, 1)[0];
    let tint = Color::new(1.0, 0.5, 0.25, 1.0);
    r.begin_batch(&camera());
    r.draw_textured_quad(
        [0.0, 0.0],
        [4.0, 4.0],
        30.0,
        tex,
        UvRect::new(0.25, 0.5, 0.5, 0.25),
        tint,
    );
    r.end_batch();

    let v = &r.backend().draws()[0].vertices;
    assert_eq!(v[0].tex_coord, [0.25, 0.5]);
    assert_eq!(v[1].tex_coord, [0.75, 0.5]);
    assert_eq!(v[2].tex_coord, [0.75, 0.75]);
    assert_eq!(v[3].tex_coord, [0.25, 0.75]);
    assert!(v.iter().all(|vertex| vertex.color == tint.to_array()));
    assert!(v.iter().all(|vertex| vertex.slot() == 1));
}

#[test]
fn test_empty_flush_is_idempotent() {
    let mut r = renderer();
    r.begin_batch(&camera());
    r.draw_quad([0.0, 0.0], [1.0, 1.0], 0.0, Color::WHITE);
    r.flush();
    let commands = r.backend().commands().len();
    let stats = r.stats();

    r.flush();
    r.flush();
    assert_eq!(r.backend().commands().len(), commands);
    assert_eq!(r.stats(), stats);
    assert_eq!(stats.draw_calls, 1);
    r.end_batch();
    assert_eq!(r.stats(), stats);
}

#[test]
fn test_end_of_frame_completeness() {
    let mut r = renderer_with(BatchConfig {
        max_quads: 50,
        ..Default::default()
    });
    let tex = textures(&mut r, 40);
    let white = r.white_texture();
    r.begin_batch(&camera());
    for i in 0..500 {
        if i % 3 == 0 {
            r.draw_quad([0.0, 0.0], [1.0, 1.0], i as f32, Color::WHITE);
        } else {
            r.draw_textured_quad([0.0, 0.0], [1.0, 1.0], 0.0, tex[i % 40], UvRect::FULL, Color::WHITE);
        }
    }
    r.end_batch();

    assert_eq!(r.queued_quads(), 0);
    assert_eq!(r.slots().len(), 1);
    assert_eq!(r.slots().iter().collect::<Vec<_>>(), vec![(0, white)]);
    assert_eq!(r.stats().quads_drawn, 500);
}

#[test]
fn test_frames_reuse_buffers() {
    let mut r = renderer();
    let cam = camera();
    r.backend_mut().clear_commands();
    for _ in 0..3 {
        r.reset_stats();
        r.begin_batch(&cam);
        r.draw_quad([0.0, 0.0], [1.0, 1.0], 0.0, Color::WHITE);
        r.end_batch();
        assert_eq!(r.stats().draw_calls, 1);
    }

    let commands = r.backend().commands();
    assert!(!commands.iter().any(|c| matches!(
        c,
        BackendCommand::CreateVertexBuffer { .. } | BackendCommand::CreateIndexBuffer { .. }
    )));
    assert!(commands.iter().all(|c| match c {
        BackendCommand::UploadVertices { usage, .. } => *usage == BufferUsage::Stream,
        _ => true,
    }));
}

#[test]
fn test_camera_matrix_per_batch() {
    let mut r = renderer();
    let mut cam = camera();
    r.begin_batch(&cam);
    r.draw_quad([0.0, 0.0], [1.0, 1.0], 0.0, Color::WHITE);
    r.end_batch();

    cam.position = [200.0, 50.0];
    cam.zoom = 2.0;
    r.begin_batch(&cam);
    r.draw_quad([0.0, 0.0], [1.0, 1.0], 0.0, Color::WHITE);
    r.end_batch();

    let draws = r.backend().draws();
    assert_ne!(draws[0].view_projection, draws[1].view_projection);
    assert_eq!(draws[1].view_projection, cam.view_projection());
}

#[test]
fn test_inert_batch_recovers_after_reload() {
    let mut backend = CommandRecorder::new();
    backend.fail_compiles("error: expected expression, found `}`");
    let mut r = SpriteRenderer::initialize(backend, BatchConfig::default()).unwrap();
    assert!(r.is_inert());

    r.begin_batch(&camera());
    r.draw_quad([0.0, 0.0], [1.0, 1.0], 0.0, Color::WHITE);
    r.end_batch();
    assert!(r.backend().draws().is_empty());
    assert_eq!(r.stats().quads_dropped, 1);

    r.backend_mut().clear_compile_failure();
    let shader = r.backend().batch_shader();
    r.reload_shader(shader.vertex, shader.fragment).unwrap();
    r.reset_stats();

    r.begin_batch(&camera());
    r.draw_quad([0.0, 0.0], [1.0, 1.0], 0.0, Color::WHITE);
    r.end_batch();
    assert_eq!(r.backend().draws().len(), 1);
    assert_eq!(r.stats().quads_dropped, 0);
}

#[test]
fn test_backend_failure_skips_batch() {
    let mut r = renderer();
    r.begin_batch(&camera());
    r.draw_quad([0.0, 0.0], [1.0, 1.0], 0.0, Color::WHITE);
    r.backend_mut().fail_draws(true);
    r.end_batch();
    assert_eq!(r.queued_quads(), 0);
    assert_eq!(r.stats().draw_calls, 0);

    r.backend_mut().fail_draws(false);
    r.begin_batch(&camera());
    r.draw_quad([0.0, 0.0], [1.0, 1.0], 0.0, Color::WHITE);
    r.end_batch();
    assert_eq!(r.stats().draw_calls, 1);
}

#[test]
fn test_shutdown_releases_owned_resources_only() {
    let mut r = renderer();
    let tex = textures(&mut r, 2);
    r.begin_batch(&camera());
    r.draw_textured_quad([0.0, 0.0], [1.0, 1.0], 0.0, tex[0], UvRect::FULL, Color::WHITE);
    r.end_batch();

    let backend = r.shutdown();
    assert_eq!(backend.live_programs(), 0);
    assert_eq!(backend.live_buffers(), 0);
    assert_eq!(backend.live_textures(), 2);
    assert!(!backend.commands().iter().any(|c| matches!(
        c,
        BackendCommand::DeleteTexture(t) if tex.contains(t)
    )));
}

#[test]
fn test_invalid_config_fails_initialize() {
    let result = SpriteRenderer::initialize(
        CommandRecorder::new(),
        BatchConfig {
            max_quads: 0,
            ..Default::default()
        },
    );
    assert!(result.is_err());
}
