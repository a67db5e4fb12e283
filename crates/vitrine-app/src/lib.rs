//! Application framework for Vitrine.
//!
//! This crate provides a trait-based application framework that handles
//! common boilerplate like:
//! - Window creation and management
//! - Device context initialization
//! - Swapchain creation and recreation
//! - Frame synchronization
//! - Event loop handling
//!
//! # Example
//!
//! ```no_run
//! use vitrine_app::{run_app, AppConfig, AppContext, FrameContext, VitrineApp};
//!
//! struct MyApp {
//!     // Application state
//! }
//!
//! impl VitrineApp for MyApp {
//!     fn init(ctx: &mut AppContext) -> anyhow::Result<Self> {
//!         Ok(MyApp {})
//!     }
//!
//!     fn update(&mut self, ctx: &AppContext, dt: f32) {
//!         // Update logic
//!     }
//!
//!     fn render(&mut self, ctx: &AppContext, frame: &mut FrameContext) -> anyhow::Result<()> {
//!         // Record rendering commands
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     run_app::<MyApp>(AppConfig::default())
//! }
//! ```

mod app;
mod context;
mod frame;
mod runner;

pub use app::VitrineApp;
pub use context::AppContext;
pub use frame::FrameContext;
pub use runner::{run_app, AppConfig};

// Re-export commonly used types for convenience
pub use vitrine_gpu::{DeviceContext, DeviceContextBuilder, Presenter, Regenerable};
pub use winit::event::WindowEvent;
