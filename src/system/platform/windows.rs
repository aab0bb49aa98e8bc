use std::io;
use std::path::PathBuf;

use super::PlatformExtensions;

pub struct Platform;

impl PlatformExtensions for Platform {
    fn icon_path(_name: &str, _command: &str) -> io::Result<Option<PathBuf>> {
        // Icons live inside the executable's resources; no file to point at.
        Ok(None)
    }
}
