//! Vitrine Demo Viewer
//!
//! Composes each frame in an offscreen image, blits it to the swapchain,
//! and presents it. The clear color sweeps through a palette over time,
//! which makes swapchain recreation visible: resizing the window must
//! never stall or tear the animation.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p vitrine-viewer
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

mod app;
mod target;

use vitrine_app::{run_app, AppConfig};

use crate::app::Viewer;

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;

fn main() -> anyhow::Result<()> {
    run_app::<Viewer>(AppConfig::new("Vitrine Viewer").with_size(WIDTH, HEIGHT))
}
