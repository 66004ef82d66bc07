use anyhow::{anyhow, Context, Result};
use glutin::{
    config::{ConfigTemplateBuilder, GlConfig},
    context::{
        ContextApi, ContextAttributesBuilder, GlProfile, NotCurrentGlContext,
        PossiblyCurrentContext, Version,
    },
    display::{GetGlDisplay, GlDisplay},
    surface::{GlSurface, Surface, SwapInterval, WindowSurface},
};
use glutin_winit::{DisplayBuilder, GlWindow};
use log::{debug, error, info, warn};
use raw_window_handle::HasRawWindowHandle;
use simple_logger::SimpleLogger;
use std::{ffi::CString, num::NonZeroU32, path::PathBuf, ptr, rc::Rc};
use winit::{
    dpi::{LogicalSize, PhysicalSize},
    event::{Event, WindowEvent},
    event_loop::{EventLoop, EventLoopBuilder},
    window::{Window, WindowBuilder},
};

use shaderkit::{
    config::core::default_config_path,
    scene::{self, DemoScene},
    DemoConfig, GlContext, ShaderBuilder, ShaderError,
};

// Fields drop top to bottom: GL objects go while the context is still alive.
struct App {
    scene: DemoScene,
    gl: Rc<GlContext>,
    gl_surface: Surface<WindowSurface>,
    gl_context: PossiblyCurrentContext,
    window: Window,
    clear_color: [f32; 4],
}

impl App {
    fn new(config: &DemoConfig, event_loop: &EventLoop<()>) -> Result<Self> {
        let window_builder = WindowBuilder::new()
            .with_title(&config.window.title)
            .with_inner_size(LogicalSize::new(config.window.width, config.window.height));

        let template = ConfigTemplateBuilder::new()
            .with_alpha_size(8)
            .with_depth_size(24)
            .with_stencil_size(8);

        let display_builder = DisplayBuilder::new().with_window_builder(Some(window_builder));

        let (window, gl_config) = display_builder
            .build(event_loop, template, |configs| {
                configs
                    .reduce(|accum, config| {
                        if config.num_samples() > accum.num_samples() {
                            config
                        } else {
                            accum
                        }
                    })
                    .expect("display offered no GL configs")
            })
            .map_err(|e| anyhow!("Failed to create window: {e}"))?;

        let window = window.context("Display builder returned no window")?;
        let raw_window_handle = window.raw_window_handle();

        let context_attributes = ContextAttributesBuilder::new()
            .with_context_api(ContextApi::OpenGl(Some(Version::new(3, 3))))
            .with_profile(GlProfile::Core)
            .build(Some(raw_window_handle));

        let gl_display = gl_config.display();

        let not_current = unsafe { gl_display.create_context(&gl_config, &context_attributes) }
            .context("Failed to create OpenGL context")?;

        let attrs = window.build_surface_attributes(Default::default());
        let gl_surface = unsafe { gl_display.create_window_surface(&gl_config, &attrs) }
            .context("Failed to create GL surface")?;

        let gl_context = not_current
            .make_current(&gl_surface)
            .context("Failed to make context current")?;

        let interval = if config.window.vsync {
            SwapInterval::Wait(NonZeroU32::MIN)
        } else {
            SwapInterval::DontWait
        };
        if let Err(e) = gl_surface.set_swap_interval(&gl_context, interval) {
            warn!("Failed to set swap interval: {}", e);
        }

        // Load OpenGL functions
        let gl = Rc::new(unsafe {
            GlContext::load_with(|symbol| {
                CString::new(symbol)
                    .map(|symbol| gl_display.get_proc_address(&symbol))
                    .unwrap_or(ptr::null())
            })
        });
        info!("OpenGL {} on {}", gl.version_string(), gl.renderer_string());

        let registry =
            scene::registry_for(config).context("Failed to assemble shader registry")?;
        info!(
            "Shaders: {}",
            registry.shader_names().collect::<Vec<_>>().join(", ")
        );
        info!(
            "Programs: {}",
            registry.program_names().collect::<Vec<_>>().join(", ")
        );
        for unused in registry.unused_shaders() {
            debug!("Shader '{}' is not used by any program", unused);
        }

        let builder = ShaderBuilder::new(Rc::clone(&gl));
        // Logged in full here, so the returned error only names the program.
        let program = match builder.build_named(&registry, &config.render.program) {
            Ok(program) => program,
            Err(e) => {
                report_shader_error(&e);
                return Err(anyhow!("Failed to build program '{}'", config.render.program));
            }
        };

        let scene = DemoScene::new(&gl, program, &config.render)
            .context("Failed to upload scene mesh")?;

        let size = window.inner_size();
        gl.enable_depth_test();
        gl.set_viewport(size.width, size.height);

        Ok(Self {
            scene,
            gl,
            gl_surface,
            gl_context,
            window,
            clear_color: config.render.clear_color,
        })
    }

    fn resize(&self, size: PhysicalSize<u32>) {
        if let (Some(width), Some(height)) =
            (NonZeroU32::new(size.width), NonZeroU32::new(size.height))
        {
            self.gl_surface.resize(&self.gl_context, width, height);
            self.gl.set_viewport(size.width, size.height);
        }
    }

    fn redraw(&mut self) -> Result<()> {
        let size = self.window.inner_size();
        let aspect = size.width as f32 / size.height.max(1) as f32;

        self.gl.clear(self.clear_color);
        self.scene.draw(aspect);

        self.gl_surface
            .swap_buffers(&self.gl_context)
            .context("Failed to swap buffers")
    }
}

fn report_shader_error(err: &ShaderError) {
    match err {
        ShaderError::Compile { stage, log } => {
            error!("{} stage failed to compile:\n{}", stage, log)
        }
        ShaderError::Link { log } => error!("Program failed to link:\n{}", log),
        other => error!("{}", other),
    }
}

fn main() -> Result<()> {
    let (config_path, config) = match std::env::args_os().nth(1) {
        Some(path) => {
            let path = PathBuf::from(path);
            let config = DemoConfig::load(&path)?;
            (path, config)
        }
        None => {
            let path = default_config_path()?;
            let config = DemoConfig::load_or_create(&path)?;
            (path, config)
        }
    };

    SimpleLogger::new().with_level(config.log_level()?).init()?;
    info!("Using config {}", config_path.display());

    let event_loop = EventLoopBuilder::new()
        .build()
        .map_err(|e| anyhow!("Failed to create event loop: {e}"))?;
    let mut app = App::new(&config, &event_loop)?;

    event_loop
        .run(move |event, elwt| match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => elwt.exit(),
                WindowEvent::Resized(size) => app.resize(size),
                WindowEvent::RedrawRequested => {
                    if let Err(e) = app.redraw() {
                        error!("{:#}", e);
                        elwt.exit();
                    }
                }
                _ => (),
            },
            Event::AboutToWait => app.window.request_redraw(),
            _ => (),
        })
        .map_err(|e| anyhow!("Event loop failed: {e}"))?;

    Ok(())
}
