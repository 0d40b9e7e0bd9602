//! Locate `forgepipe.toml` by walking upward from a starting directory,
//! mirroring how a shell finds `.git`.

use camino::{Utf8Path, Utf8PathBuf};

pub const CONFIG_FILE_NAME: &str = "forgepipe.toml";

/// Walk upward from `start` looking for `forgepipe.toml`. Returns `None` if
/// none is found before the filesystem root.
#[must_use]
pub fn discover(start: &Utf8Path) -> Option<Utf8PathBuf> {
    let mut dir = Some(start.to_path_buf());
    while let Some(current) = dir {
        let candidate = current.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        dir = current.parent().map(Utf8Path::to_path_buf);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn finds_config_in_an_ancestor_directory() {
        let root = TempDir::new().unwrap();
        let root_path = Utf8PathBuf::try_from(root.path().to_path_buf()).unwrap();
        fs::write(root_path.join(CONFIG_FILE_NAME), "").unwrap();

        let nested = root_path.join("a").join("b");
        fs::create_dir_all(&nested).unwrap();

        let found = discover(&nested).expect("should find config in ancestor");
        assert_eq!(found, root_path.join(CONFIG_FILE_NAME));
    }

    #[test]
    fn returns_none_when_absent() {
        let root = TempDir::new().unwrap();
        let root_path = Utf8PathBuf::try_from(root.path().to_path_buf()).unwrap();
        assert!(discover(&root_path).is_none());
    }
}
