//! Entry point for the viewer application.

use anyhow::Result;
use clap::Parser;
use vol_viewer::{app::Viewer, config::Config};
use winit::event_loop::{ControlFlow, EventLoop};

fn main() -> Result<()> {
    // Initialize logging; default to "info" if RUST_LOG is unset.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut viewer = Viewer::new(config.flow);
    event_loop.run_app(&mut viewer)?;

    // A bootstrap failure exits the loop; report it as the process result.
    if let Some(err) = viewer.take_error() {
        return Err(err);
    }

    Ok(())
}
