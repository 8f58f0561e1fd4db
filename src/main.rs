pub mod config;
pub mod error;
pub mod input;
pub mod render_system;
pub mod scenes;
pub mod shaders;

use std::time::Instant;

use log::{error, info, warn};
use winit::{
    event::{ElementState, Event, VirtualKeyCode, WindowEvent},
    event_loop::EventLoop,
};

use crate::{
    config::DemoConfig,
    error::Result,
    input::KeyState,
    render_system::RenderSystem,
    scenes::{cube::CubeScene, model_viewer::ModelViewerScene, SceneManager},
};

fn init(event_loop: &EventLoop<()>, config: &DemoConfig) -> Result<(RenderSystem, SceneManager)> {
    let mut render_system = RenderSystem::new(event_loop, config)?;
    let mut scenes = SceneManager::new();

    if let Some(path) = &config.model_path {
        scenes.add_scene(Box::new(ModelViewerScene::new(&mut render_system, config, path)?));
    }
    scenes.add_scene(Box::new(CubeScene::new(&mut render_system, config)?));

    info!("{} scene(s) loaded; number keys switch between them", scenes.len());
    Ok((render_system, scenes))
}

fn main() {
    let (config, warnings) = DemoConfig::from_args(std::env::args().skip(1));
    if let Err(e) = fast_log::init(fast_log::Config::new().console().level(config.log_level)) {
        eprintln!("Failed to start logger: {e}");
    }
    for warning in &warnings {
        warn!("{warning}");
    }

    let event_loop = EventLoop::new();

    let (mut render_system, mut scenes) = match init(&event_loop, &config) {
        Ok(r) => r,
        Err(e) => {
            error!("Initialisation failed: {e}");
            log::logger().flush();
            std::process::exit(-1);
        }
    };

    let mut keys = KeyState::default();
    let mut last_frame = Instant::now();

    event_loop.run(move |event, _, control_flow| {
        control_flow.set_poll();

        match event {
            Event::WindowEvent {
                event: WindowEvent::CloseRequested,
                ..
            } => control_flow.set_exit(),
            Event::WindowEvent {
                event: WindowEvent::Resized(_),
                ..
            } => render_system.request_redraw(),
            Event::WindowEvent {
                event: WindowEvent::Focused(false),
                ..
            } => keys.release_all(),
            Event::WindowEvent {
                event: WindowEvent::KeyboardInput { input, .. },
                ..
            } => {
                if input.virtual_keycode == Some(VirtualKeyCode::Escape)
                    && input.state == ElementState::Pressed
                {
                    control_flow.set_exit();
                    return;
                }
                keys.handle(input);
                scenes.switch_scene_by_key(input);
            }
            Event::RedrawEventsCleared => {
                let now = Instant::now();
                let delta = now.duration_since(last_frame).as_secs_f32();
                last_frame = now;

                if let Some(scene) = scenes.active_scene() {
                    scene.update(&keys, now, delta);
                    let frame = scene.frame();
                    if let Err(e) = render_system.draw_frame(frame.camera, frame.light, frame.objects) {
                        error!("Frame failed: {e}");
                        control_flow.set_exit_with_code(-1);
                    }
                }
                keys.end_frame();
            }
            Event::LoopDestroyed => {
                render_system.clear_textures();
                info!("Shutting down");
                log::logger().flush();
            }
            _ => {}
        }
    });
}
