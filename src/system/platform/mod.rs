//! Per-OS best-effort lookups. Nothing here may fail a sample: callers treat
//! an error the same as "not available".

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use crate::system::process::Process;

pub trait PlatformExtensions {
    /// Icon file for a process, derived from its display name and command.
    fn icon_path(name: &str, command: &str) -> io::Result<Option<PathBuf>>;
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "windows")]
mod windows;

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
use linux as platform_impl;
#[cfg(target_os = "macos")]
use macos as platform_impl;
#[cfg(target_os = "windows")]
use windows as platform_impl;

pub fn icon_path(name: &str, command: &str) -> io::Result<Option<PathBuf>> {
    platform_impl::Platform::icon_path(name, command)
}

/// Optional enrichment capability used by the sampler.
pub trait IconResolver: Send + Sync {
    fn resolve(&self, process: &Process) -> io::Result<Option<PathBuf>>;
}

/// Platform icon lookup, cached per display name since the same executables
/// show up every cycle.
#[derive(Default)]
pub struct PlatformIcons {
    cache: Mutex<HashMap<String, Option<PathBuf>>>,
}

impl IconResolver for PlatformIcons {
    fn resolve(&self, process: &Process) -> io::Result<Option<PathBuf>> {
        if let Some(hit) = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&process.name)
        {
            return Ok(hit.clone());
        }
        let found = icon_path(&process.name, &process.command)?;
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(process.name.clone(), found.clone());
        Ok(found)
    }
}

/// The resolver for this platform, if it has one.
pub fn icon_resolver() -> Option<Arc<dyn IconResolver>> {
    if cfg!(target_os = "windows") {
        None
    } else {
        Some(Arc::new(PlatformIcons::default()))
    }
}
