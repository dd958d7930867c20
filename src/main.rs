use std::process::ExitCode;

use glam::Vec4;
use glow::HasContext;
use sdl2::event::{Event, WindowEvent};

use pedon::abs::*;
use pedon::config::{Config, LoggingConfig};
use pedon::logging;

fn main() -> ExitCode {
    let config = Config::load();

    let logging_config = config
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_else(|_| LoggingConfig::default());
    if let Err(e) = logging::init(&logging_config) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut app = App::new(&config.window)?;

    unsafe {
        let [r, g, b, a] = config.clear_color;
        app.gl.clear_color(r, g, b, a);
        app.gl.enable(glow::DEPTH_TEST);
    }

    let loader = ShaderLoader::new(config.load_policy);
    let handle = loader.load(
        app.gl.as_ref(),
        &config.shaders.vertex,
        &config.shaders.fragment,
    );
    let program = ShaderProgram::from_handle(&app.gl, handle)
        .ok_or("could not load the quad shader program")?;

    let quad = quad_mesh(&app.gl)?;
    let quad_color = Vec4::from_array(config.quad_color);

    let (width, height) = app.fit_viewport();
    let mut transform = quad_transform(width, height);

    'running: loop {
        let mut resized = false;
        for event in app.event_pump.poll_iter() {
            match event {
                Event::Quit { .. } => break 'running,
                Event::Window {
                    win_event: WindowEvent::SizeChanged(..),
                    ..
                } => resized = true,
                _ => {}
            }
        }

        if resized {
            let (width, height) = app.fit_viewport();
            transform = quad_transform(width, height);
            log::debug!("Viewport resized to {}x{}", width, height);
        }

        unsafe {
            app.gl
                .clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);
        }

        program.use_program();
        program.set_uniform("transform", transform);
        program.set_uniform("color", quad_color);
        quad.draw();

        app.window.gl_swap_window();
    }

    Ok(())
}
