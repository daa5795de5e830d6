//! Test harness utilities for the behavioural suites.

mod app;
mod broker;
mod config_loader;
mod reporter;
mod world;

pub use app::RecordingApp;
pub use broker::FakeBroker;
pub use config_loader::TestConfigLoader;
pub use reporter::{HealthEvent, RecordingHealthReporter};
pub use world::{TestWorld, frame_of, persistent, request, world};
