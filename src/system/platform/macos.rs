use std::io;
use std::path::{Path, PathBuf};

use super::PlatformExtensions;

pub struct Platform;

impl PlatformExtensions for Platform {
    fn icon_path(_name: &str, command: &str) -> io::Result<Option<PathBuf>> {
        // Executables inside a bundle: /Applications/Foo.app/Contents/MacOS/Foo
        let Some(end) = command.find(".app/") else {
            return Ok(None);
        };
        let bundle = Path::new(&command[..end + ".app".len()]);
        let resources = bundle.join("Contents").join("Resources");

        let entries = match std::fs::read_dir(&resources) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err),
        };

        let mut icons: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("icns"))
            .collect();
        icons.sort();

        let preferred = icons
            .iter()
            .position(|p| p.file_stem().and_then(|s| s.to_str()) == Some("AppIcon"))
            .unwrap_or(0);
        Ok(icons.into_iter().nth(preferred))
    }
}
