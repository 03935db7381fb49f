use crate::error::GetError;
use anyhow::Result;
use log::{debug, info};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[cfg(target_family = "unix")]
use std::{
    fs::{set_permissions, DirBuilder, OpenOptions, Permissions},
    io::Write,
    os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt},
};

const TOOL_DIR: [&str; 2] = [".ds", "bin"];

#[cfg(target_family = "unix")]
const OWNER_ONLY: u32 = 0o700;

/// Copies executables into the user's tool directory.
#[derive(Debug)]
pub(crate) struct Installer {
    tool_dir: PathBuf,
}

impl Installer {
    pub(crate) fn new(tool_dir: PathBuf) -> Self {
        Installer { tool_dir }
    }

    /// Copies `source` to `<tool dir>/<tool_name>`, replacing any earlier install, and makes it
    /// executable by its owner. The copy is not atomic. If it fails partway through, a partial
    /// file may be left behind.
    pub(crate) fn install(&self, source: &Path, tool_name: &str) -> Result<PathBuf> {
        self.create_tool_dir()?;

        let dest = local_binary(&self.tool_dir, tool_name, None);
        debug!("copying {} to {}", source.display(), dest.display());
        let content = fs::read(source).map_err(|e| GetError::io(source, e))?;
        write_executable(&dest, &content)?;

        info!("Installed {tool_name} into {}", dest.display());
        Ok(dest)
    }

    fn create_tool_dir(&self) -> Result<()> {
        if self.tool_dir.is_dir() {
            return Ok(());
        }
        debug!("creating tool directory at {}", self.tool_dir.display());

        #[cfg(target_family = "unix")]
        let res = DirBuilder::new()
            .recursive(true)
            .mode(OWNER_ONLY)
            .create(&self.tool_dir);
        #[cfg(target_family = "windows")]
        let res = fs::create_dir_all(&self.tool_dir);

        res.map_err(|e| GetError::io(&self.tool_dir, e).into())
    }
}

#[cfg(target_family = "unix")]
fn write_executable(dest: &Path, content: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(OWNER_ONLY)
        .open(dest)
        .map_err(|e| GetError::io(dest, e))?;
    file.write_all(content).map_err(|e| GetError::io(dest, e))?;
    // The mode passed to `open` only applies to newly created files.
    set_permissions(dest, Permissions::from_mode(OWNER_ONLY)).map_err(|e| GetError::io(dest, e))?;
    Ok(())
}

#[cfg(target_family = "windows")]
fn write_executable(dest: &Path, content: &[u8]) -> Result<()> {
    fs::write(dest, content).map_err(|e| GetError::io(dest, e).into())
}

/// The default tool directory, `$HOME/.ds/bin`.
///
/// # Errors
///
/// Returns [`GetError::HomeNotSet`] if the home directory cannot be determined.
pub fn default_tool_dir() -> Result<PathBuf> {
    tool_dir_under(dirs::home_dir())
}

fn tool_dir_under(home: Option<PathBuf>) -> Result<PathBuf> {
    match home.filter(|h| !h.as_os_str().is_empty()) {
        Some(home) => Ok(TOOL_DIR.iter().fold(home, |path, p| path.join(p))),
        None => Err(GetError::HomeNotSet.into()),
    }
}

/// The path of an installed tool, optionally inside a subdirectory of the tool directory.
#[must_use]
pub fn local_binary(tool_dir: &Path, name: &str, subdir: Option<&str>) -> PathBuf {
    let mut path = tool_dir.to_path_buf();
    if let Some(subdir) = subdir.filter(|s| !s.is_empty()) {
        path.push(subdir);
    }
    path.push(name);
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::tempdir;
    use test_log::test;

    #[test]
    fn install_creates_tool_dir() -> Result<()> {
        let td = tempdir()?;
        let source = td.path().join("demo-download");
        fs::write(&source, b"a binary")?;

        let tool_dir = td.path().join("home").join(".ds").join("bin");
        let installed = Installer::new(tool_dir.clone()).install(&source, "demo")?;
        assert_eq!(installed, tool_dir.join("demo"));
        assert_eq!(fs::read(&installed)?, b"a binary");
        assert!(source.exists(), "the source is copied, not moved");

        #[cfg(target_family = "unix")]
        {
            assert_eq!(fs::metadata(&tool_dir)?.permissions().mode() & 0o777, 0o700);
            assert_eq!(fs::metadata(&installed)?.permissions().mode() & 0o777, 0o700);
        }

        Ok(())
    }

    #[test]
    fn install_overwrites() -> Result<()> {
        let td = tempdir()?;
        let tool_dir = td.path().join("bin");
        let existing = tool_dir.join("demo");
        fs::create_dir_all(&tool_dir)?;
        fs::write(&existing, b"an old version with more bytes")?;
        #[cfg(target_family = "unix")]
        set_permissions(&existing, Permissions::from_mode(0o644))?;

        let source = td.path().join("new");
        fs::write(&source, b"new version")?;

        let installed = Installer::new(tool_dir).install(&source, "demo")?;
        assert_eq!(installed, existing);
        assert_eq!(fs::read(&installed)?, b"new version");
        #[cfg(target_family = "unix")]
        assert_eq!(fs::metadata(&installed)?.permissions().mode() & 0o777, 0o700);

        Ok(())
    }

    #[test]
    fn missing_source_is_an_io_error() -> Result<()> {
        let td = tempdir()?;
        let source = td.path().join("does-not-exist");

        let err = Installer::new(td.path().join("bin"))
            .install(&source, "demo")
            .unwrap_err();
        match err.downcast_ref::<GetError>() {
            Some(GetError::Io { path, .. }) => assert_eq!(path, &source),
            _ => panic!("expected an Io error, got {err:?}"),
        }

        Ok(())
    }

    #[test]
    fn tool_dir_requires_home() {
        let err = tool_dir_under(None).unwrap_err();
        assert!(
            matches!(err.downcast_ref::<GetError>(), Some(GetError::HomeNotSet)),
            "{err:?}",
        );
        assert!(tool_dir_under(Some(PathBuf::new())).is_err());
    }

    #[test]
    fn tool_dir_is_under_home() -> Result<()> {
        assert_eq!(
            tool_dir_under(Some(PathBuf::from("/home/someone")))?,
            PathBuf::from("/home/someone/.ds/bin"),
        );
        Ok(())
    }

    #[rstest]
    #[case(None, "/opt/tools/k9s")]
    #[case(Some(""), "/opt/tools/k9s")]
    #[case(Some("extra"), "/opt/tools/extra/k9s")]
    #[test_log::test]
    fn local_binary_path(#[case] subdir: Option<&str>, #[case] expect: &str) {
        assert_eq!(
            local_binary(Path::new("/opt/tools"), "k9s", subdir),
            PathBuf::from(expect),
        );
    }
}
