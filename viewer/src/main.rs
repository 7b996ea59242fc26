//! Viewer entry point
//!
//! Loads a mesh and a shader pair, then orbits an orthographic camera around
//! the mesh once per frame. Rendering goes to the headless context; each
//! second of frames is summarized in the log. Assets are read on a tokio
//! runtime; the built-in shaders are used unless the config names files.

use engine::config::ViewerConfig;
use engine::graphics::{Command, HeadlessContext};
use engine::prelude::*;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

fn main() {
    // Initialize logging
    engine::init_logging();
    info!("Starting viewer");

    let mut config = load_config();
    config.assets.asset_root = resolve_asset_root(&config.assets.asset_root);
    info!(asset_root = ?config.assets.asset_root, "Using assets");

    let mut renderer = Renderer::new(HeadlessContext::new());
    let [red, green, blue] = config.clear_color;
    renderer.set_clear_color(red, green, blue);

    let meshes = load_scene(&mut renderer, &config);
    run(&mut renderer, &config, &meshes);

    // Tear down in reverse order of creation
    let mut gl = renderer.shutdown();
    for mesh in meshes {
        if let Ok(texture) = Rc::try_unwrap(mesh.destroy(&mut gl)) {
            texture.destroy(&mut gl);
        }
    }
    info!(
        buffers = gl.live_buffers(),
        textures = gl.live_textures(),
        programs = gl.live_programs(),
        "Viewer stopped"
    );
}

/// Config from the first argument, or defaults
fn load_config() -> ViewerConfig {
    let Some(path) = std::env::args_os().nth(1) else {
        info!("No config given, using defaults");
        return ViewerConfig::default();
    };
    match ViewerConfig::load(&path) {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "Failed to load config, using defaults");
            ViewerConfig::default()
        }
    }
}

/// Relative roots that don't exist from the working directory are looked up
/// next to the viewer's manifest instead
fn resolve_asset_root(root: &Path) -> PathBuf {
    if root.is_absolute() || root.exists() {
        return root.to_path_buf();
    }
    Path::new(env!("CARGO_MANIFEST_DIR")).join(root)
}

/// Fetch mesh and shader assets concurrently and upload whatever loaded
///
/// A failed shader leaves the renderer Idle; a failed mesh leaves the scene
/// empty. Either way the frame loop still runs.
fn load_scene(renderer: &mut Renderer<HeadlessContext>, config: &ViewerConfig) -> Vec<Mesh> {
    let assets = &config.assets;
    let reader = FileAssetReader::new(&assets.asset_root);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(error = %err, "Failed to start asset runtime");
            return Vec::new();
        }
    };
    let (mesh_assets, shader_sources) = runtime.block_on(async {
        futures::join!(
            MeshAssets::fetch(&reader, &assets.geometry, &assets.texture),
            ShaderSources::fetch_or_builtin(
                &reader,
                assets.vertex_shader.as_deref(),
                assets.fragment_shader.as_deref()
            )
        )
    });

    match shader_sources.and_then(|sources| sources.compile(renderer.context_mut())) {
        Ok(shader) => renderer.set_shader(shader),
        Err(err) => error!(error = %err, "Failed to load shader"),
    }

    match mesh_assets.and_then(|mesh_assets| mesh_assets.upload(renderer.context_mut())) {
        Ok(mesh) => vec![mesh],
        Err(err) => {
            error!(error = %err, "Failed to load mesh");
            Vec::new()
        }
    }
}

fn run(renderer: &mut Renderer<HeadlessContext>, config: &ViewerConfig, meshes: &[Mesh]) {
    let mut camera = config.camera();
    let light = config.light();
    let fps = config.target_fps.max(1);
    let frame_time = Duration::from_secs_f64(1.0 / f64::from(fps));

    let mut frame: u64 = 0;
    let mut draw_calls: u64 = 0;
    let mut idle_frames: u64 = 0;

    while config.frame_limit.map_or(true, |limit| frame < limit) {
        let started = Instant::now();

        match renderer.render(&camera, &light, meshes) {
            Some(stats) => draw_calls += u64::from(stats.draw_calls),
            None => idle_frames += 1,
        }
        camera.rotate_y(config.rotation_step);

        let gl = renderer.context_mut();
        let commands = gl.take_commands();
        for err in gl.take_errors() {
            warn!(call = err.call, code = ?err.code, message = %err.message, "Graphics error");
        }

        frame += 1;
        if frame % u64::from(fps) == 0 {
            let clears = commands
                .iter()
                .filter(|c| matches!(c, Command::Clear { .. }))
                .count();
            info!(
                frame,
                draw_calls,
                idle_frames,
                clears_last_frame = clears,
                camera = ?camera.position,
                "Frame summary"
            );
            draw_calls = 0;
            idle_frames = 0;
        }

        std::thread::sleep(frame_time.saturating_sub(started.elapsed()));
    }
}
