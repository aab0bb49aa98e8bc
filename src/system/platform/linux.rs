use std::io;
use std::path::PathBuf;

use super::PlatformExtensions;

pub struct Platform;

const ICON_DIRS: [&str; 4] = [
    "/usr/share/icons/hicolor/48x48/apps",
    "/usr/share/icons/hicolor/scalable/apps",
    "/usr/share/pixmaps",
    "/usr/local/share/pixmaps",
];
const ICON_EXTENSIONS: [&str; 3] = ["png", "svg", "xpm"];

impl PlatformExtensions for Platform {
    fn icon_path(name: &str, _command: &str) -> io::Result<Option<PathBuf>> {
        // Names become file names here; anything path-like is not an icon key.
        if name.is_empty() || name.contains('/') || name.starts_with('.') {
            return Ok(None);
        }
        let stem = name.to_lowercase();
        for dir in ICON_DIRS {
            for ext in ICON_EXTENSIONS {
                let candidate = PathBuf::from(dir).join(format!("{stem}.{ext}"));
                if candidate.try_exists()? {
                    return Ok(Some(candidate));
                }
            }
        }
        Ok(None)
    }
}
