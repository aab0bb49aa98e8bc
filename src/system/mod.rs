pub mod collector;
pub mod control;
pub mod metrics;
pub mod normalize;
pub mod platform;
pub mod poll;
pub mod process;
pub mod runner;
pub mod sampler;
pub mod snapshot;
pub mod state;
pub mod tracked;
