//! SDL2 and OpenGL application management.
//!
//! This module defines the [`App`] struct which encapsulates the SDL2
//! window and the OpenGL context the renderer draws with.

use std::fmt;
use std::sync::Arc;

use glow::HasContext;

use crate::config::WindowConfig;

/// Errors raised while opening the window or creating the GL context.
#[derive(Debug)]
pub enum AppError {
    /// SDL reported an error while setting up a subsystem or the context.
    Sdl(String),
    /// The window could not be built.
    Window(sdl2::video::WindowBuildError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Sdl(msg) => write!(f, "SDL error: {}", msg),
            AppError::Window(e) => write!(f, "failed to create window: {}", e),
        }
    }
}

impl std::error::Error for AppError {}

/// The [`App`] struct encapsulates the SDL2 and OpenGL context.
pub struct App {
    pub sdl: sdl2::Sdl,
    pub video_subsystem: sdl2::VideoSubsystem,
    pub window: sdl2::video::Window,
    pub gl_context: sdl2::video::GLContext,
    pub gl: Arc<glow::Context>,
    pub event_pump: sdl2::EventPump,
}

impl App {
    /// Opens a resizable window with an OpenGL 3.3 core, forward-compatible
    /// context and makes it current on the calling thread.
    pub fn new(config: &WindowConfig) -> Result<Self, AppError> {
        let sdl = sdl2::init().map_err(AppError::Sdl)?;
        let video_subsystem = sdl.video().map_err(AppError::Sdl)?;

        let gl_attr = video_subsystem.gl_attr();
        gl_attr.set_context_profile(sdl2::video::GLProfile::Core);
        gl_attr.set_context_version(3, 3);
        gl_attr.set_context_flags().forward_compatible().set();

        let window = video_subsystem
            .window(&config.title, config.width, config.height)
            .opengl()
            .resizable()
            .build()
            .map_err(AppError::Window)?;

        let gl_context = window.gl_create_context().map_err(AppError::Sdl)?;
        window.gl_make_current(&gl_context).map_err(AppError::Sdl)?;

        let interval = if config.vsync {
            sdl2::video::SwapInterval::VSync
        } else {
            sdl2::video::SwapInterval::Immediate
        };
        if let Err(e) = video_subsystem.gl_set_swap_interval(interval) {
            log::warn!("Could not set swap interval: {}", e);
        }

        let gl = unsafe {
            glow::Context::from_loader_function(|s| {
                video_subsystem.gl_get_proc_address(s) as *const _
            })
        };
        let event_pump = sdl.event_pump().map_err(AppError::Sdl)?;

        let version = gl.version();
        log::info!(
            "OpenGL {}.{} context created ({}x{})",
            version.major,
            version.minor,
            config.width,
            config.height
        );

        Ok(Self {
            sdl,
            video_subsystem,
            window,
            gl_context,
            gl: Arc::new(gl),
            event_pump,
        })
    }

    /// Size of the drawable area in pixels, which can differ from the window
    /// size on high-DPI displays.
    pub fn drawable_size(&self) -> (u32, u32) {
        self.window.drawable_size()
    }

    /// Resizes the GL viewport to cover the whole drawable area.
    pub fn fit_viewport(&self) -> (u32, u32) {
        let (width, height) = self.drawable_size();
        unsafe {
            self.gl.viewport(0, 0, width as i32, height as i32);
        }
        (width, height)
    }
}
