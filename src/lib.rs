pub mod action;
pub mod config;
pub mod event;
pub mod format;
pub mod logging;
pub mod protocol;
pub mod system;
