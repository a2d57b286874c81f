// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
mod config;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use ember_core::init_tracing;
use ember_platform::WindowDesc;
use ember_render::{GraphicsContext, RenderSize};
use ember_render_vk::{VkConfig, VkContext};
use tracing::{debug, error, info};

use ember_platform::winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use config::{load_cfg, DEFAULT_CONFIG_PATH};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path of the TOML config file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Enable Vulkan validation layers regardless of the config file
    #[arg(long)]
    validation: bool,
}

struct App {
    window_desc: WindowDesc,
    vk_cfg: VkConfig,

    // Dropped before the window it was created against.
    context: Option<VkContext>,
    window: Option<Window>,

    init_error: Option<anyhow::Error>,
}

impl App {
    fn new(window_desc: WindowDesc, vk_cfg: VkConfig) -> Self {
        Self {
            window_desc,
            vk_cfg,
            context: None,
            window: None,
            init_error: None,
        }
    }

    fn open(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = event_loop
            .create_window(self.window_desc.attributes())
            .context("create_window")?;

        let inner = window.inner_size();
        let size = RenderSize {
            width: inner.width,
            height: inner.height,
        };
        if size.is_empty() {
            bail!("window has no drawable area ({}x{})", size.width, size.height);
        }

        let context = VkContext::new(&window, &window, size, &self.vk_cfg)
            .context("vulkan init")?;

        let extent = context.surface_size();
        let settings = context.settings();
        info!(
            "device = {}, swapchain {}x{} {:?} with {} images",
            context.device_name(),
            extent.width,
            extent.height,
            settings.present_mode,
            context.image_count()
        );
        let (graphics, present) = context.queues();
        debug!(?graphics, ?present, shared = graphics == present, "queues");

        self.context = Some(context);
        self.window = Some(window);
        Ok(())
    }

    fn close(&mut self) {
        if self.context.take().is_some() {
            info!("vulkan cleaned up");
        }
        self.window = None;
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.open(event_loop) {
            self.init_error = Some(e);
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(window) = &self.window {
            if window_id != window.id() {
                return;
            }
        }

        if let WindowEvent::CloseRequested = event {
            info!("CloseRequested");
            self.close();
            event_loop.exit();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.close();
    }
}

fn run(args: Args) -> Result<()> {
    let cfg = load_cfg(&args.config);
    let mut vk_cfg = cfg.vk_config();
    if args.validation {
        vk_cfg.validation = true;
    }

    let event_loop: EventLoop<()> = EventLoop::new()?;
    // Nothing is drawn; sleep until the window system has something for us.
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new(cfg.window_desc(), vk_cfg);
    event_loop.run_app(&mut app)?;

    outcome(app.init_error.take())
}

/// The single error `main` reports, if the context never came up.
fn outcome(init_error: Option<anyhow::Error>) -> Result<()> {
    match init_error {
        Some(err) => Err(err.context("initialization failed")),
        None => Ok(()),
    }
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    match run(args) {
        Ok(()) => {
            info!("ran successfully");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
