// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
mod config;
mod stats;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use config::{AppConfig, DEFAULT_CONFIG};
use floe_core::{init_tracing, Event, LayerStack, Timestep};
use floe_platform::{Window, WinitWindow};
use floe_render::{RenderApi, RenderConfig, RenderSize, Renderer};
use floe_render_vk::VkRenderer;
use stats::FrameStats;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info};

const QUIT_KEY: &str = "Escape";

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ApiArg {
    Vulkan,
}

impl From<ApiArg> for RenderApi {
    fn from(api: ApiArg) -> Self {
        match api {
            ApiArg::Vulkan => RenderApi::Vulkan,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file; missing means defaults
    #[arg(long, default_value = DEFAULT_CONFIG)]
    config: PathBuf,
    /// Rendering backend
    #[arg(long, value_enum)]
    api: Option<ApiArg>,
    #[arg(long)]
    width: Option<u32>,
    #[arg(long)]
    height: Option<u32>,
    /// Enable (or with `--validation=false`, disable) the validation layer
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    validation: Option<bool>,
}

impl Args {
    fn apply(&self, cfg: &mut AppConfig) {
        if let Some(api) = self.api {
            cfg.render.api = api.into();
        }
        if let Some(w) = self.width {
            cfg.window.width = w;
        }
        if let Some(h) = self.height {
            cfg.window.height = h;
        }
        if let Some(v) = self.validation {
            cfg.render.validation = v;
        }
    }
}

fn create_renderer(
    window: &WinitWindow,
    size: RenderSize,
    cfg: &RenderConfig,
) -> Result<Box<dyn Renderer>> {
    match cfg.api {
        RenderApi::Vulkan => Ok(Box::new(VkRenderer::new(window, window, size, cfg)?)),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut cfg = AppConfig::load(&args.config)?;
    args.apply(&mut cfg);

    init_tracing(&cfg.log.filter)?;
    cfg.log_summary(&args.config);

    let mut window = WinitWindow::create(cfg.window.width, cfg.window.height, &cfg.window.title)
        .context("failed to create window")?;
    let (w, h) = window.size();
    let mut renderer = create_renderer(&window, RenderSize::new(w, h), &cfg.render)?;
    info!("backend = {:?}", cfg.render.api);

    let mut layers = LayerStack::new();
    layers.push_overlay(Box::new(FrameStats::default()));

    let mut last = Instant::now();
    while !window.should_close() {
        window.poll_events();
        for event in window.drain_events() {
            if let Event::WindowResize { width, height } = event {
                renderer.resize(RenderSize::new(width, height))?;
            }
            layers.dispatch(&event);
        }
        if window.input().is_key_pressed(QUIT_KEY) {
            info!("{QUIT_KEY} pressed");
            break;
        }

        let now = Instant::now();
        layers.update(Timestep::from_seconds((now - last).as_secs_f32()));
        last = now;

        if let Err(e) = renderer.render() {
            error!("render error: {e:#}");
            return Err(e);
        }
    }

    info!("window closed, shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_config() {
        let args = Args::parse_from([
            "floe",
            "--width",
            "1024",
            "--validation=false",
            "--api",
            "vulkan",
        ]);
        let mut cfg = AppConfig::default();
        cfg.render.validation = true;
        args.apply(&mut cfg);
        assert_eq!(cfg.window.width, 1024);
        assert_eq!(cfg.window.height, 600);
        assert!(!cfg.render.validation);
        assert_eq!(cfg.render.api, RenderApi::Vulkan);
    }

    #[test]
    fn bare_validation_flag_turns_it_on() {
        let args = Args::parse_from(["floe", "--validation"]);
        let mut cfg = AppConfig::default();
        cfg.render.validation = false;
        args.apply(&mut cfg);
        assert!(cfg.render.validation);
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG));
    }
}
