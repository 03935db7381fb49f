use crate::{error::GetError, tool::ToolDescriptor};
use anyhow::{Context, Result};
use binstall_tar::Archive;
use flate2::read::GzDecoder;
use log::{debug, info, warn};
use std::{
    fs::{self, File},
    io::{self, Read},
    path::{Path, PathBuf},
};
use url::Url;
use zip::ZipArchive;

#[cfg(target_family = "unix")]
use std::fs::{set_permissions, Permissions};
#[cfg(target_family = "unix")]
use std::os::unix::fs::PermissionsExt;

// Compressed formats that show up in release assets but which we don't unpack. Downloads with one
// of these suffixes are passed through as-is, like any other bare file.
const UNSUPPORTED_SUFFIXES: &[&str] = &[
    ".tar.bz", ".tar.bz2", ".tar.xz", ".tar.zst", ".tbz", ".txz", ".tar", ".bz", ".bz2", ".gz",
    ".xz", ".zst", ".7z", ".rar",
];

/// How a download is unpacked, decided purely by the suffix of its URL.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGzip,
    Zip,
    /// Not an archive we know how to extract. The download is used as-is.
    Bare,
}

impl ArchiveFormat {
    #[must_use]
    pub fn from_url(url: &Url) -> ArchiveFormat {
        ArchiveFormat::from_name(url.path())
    }

    #[must_use]
    pub fn from_name(name: &str) -> ArchiveFormat {
        let name = name.to_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            ArchiveFormat::TarGzip
        } else if name.ends_with(".zip") {
            ArchiveFormat::Zip
        } else {
            ArchiveFormat::Bare
        }
    }
}

/// Extracts `local_path` into `target_dir` if `url` names an archive, and returns the path where
/// the tool's executable should be. For archives that's `target_dir/<tool name>`, which is not
/// checked here. Bare downloads are returned unchanged.
///
/// Every regular file in an archive is written directly into `target_dir` under its base name,
/// with the permission bits recorded in the archive. Directories, links and other special entries
/// are skipped.
pub(crate) fn maybe_extract(
    tool: &ToolDescriptor,
    url: &Url,
    local_path: &Path,
    target_dir: &Path,
) -> Result<PathBuf> {
    match ArchiveFormat::from_url(url) {
        ArchiveFormat::TarGzip => {
            create_target_dir(target_dir)?;
            extract_tarball(local_path, target_dir)?;
        }
        ArchiveFormat::Zip => {
            create_target_dir(target_dir)?;
            extract_zip(local_path, target_dir)?;
        }
        ArchiveFormat::Bare => {
            warn_if_unsupported(tool, url);
            debug!("{} is not an archive, using it as-is", local_path.display());
            return Ok(local_path.to_path_buf());
        }
    }

    info!("Extracted {} into {}", local_path.display(), target_dir.display());
    Ok(target_dir.join(&tool.name))
}

fn warn_if_unsupported(tool: &ToolDescriptor, url: &Url) {
    let path = url.path().to_lowercase();
    let Some(suffix) = UNSUPPORTED_SUFFIXES.iter().find(|s| path.ends_with(*s)) else {
        return;
    };

    if tool.non_binary {
        info!("{url} has the unsupported archive suffix {suffix}, installing the download unchanged");
    } else {
        warn!("{url} has the unsupported archive suffix {suffix}, installing the download unchanged");
    }
}

fn create_target_dir(target_dir: &Path) -> Result<()> {
    fs::create_dir_all(target_dir).map_err(|e| GetError::io(target_dir, e).into())
}

fn extract_tarball(downloaded_file: &Path, target_dir: &Path) -> Result<()> {
    debug!("extracting tarball at {}", downloaded_file.display());

    let mut arch = Archive::new(GzDecoder::new(open_file(downloaded_file)?));
    let entries = arch
        .entries()
        .map_err(|e| GetError::io(downloaded_file, e))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| GetError::io(downloaded_file, e))?;
        let path = entry
            .path()
            .map_err(|e| GetError::io(downloaded_file, e))?
            .into_owned();
        if !entry.header().entry_type().is_file() {
            debug!("skipping tarball entry {}", path.display());
            continue;
        }
        let mode = entry.header().mode().ok();
        write_entry(&path, &mut entry, mode, target_dir)?;
    }

    Ok(())
}

fn extract_zip(downloaded_file: &Path, target_dir: &Path) -> Result<()> {
    debug!("extracting zip file at {}", downloaded_file.display());

    let mut zip = ZipArchive::new(open_file(downloaded_file)?)
        .with_context(|| format!("failed to read zip file at {}", downloaded_file.display()))?;
    for i in 0..zip.len() {
        let mut zf = zip
            .by_index(i)
            .with_context(|| format!("failed to read entry {i} of {}", downloaded_file.display()))?;
        if !zf.is_file() || zf.is_symlink() {
            debug!("skipping zip entry {}", zf.name());
            continue;
        }
        let Some(path) = zf.enclosed_name() else {
            debug!("skipping zip entry with an unsafe path: {}", zf.name());
            continue;
        };
        let mode = zf.unix_mode();
        write_entry(&path, &mut zf, mode, target_dir)?;
    }

    Ok(())
}

fn write_entry(
    entry_path: &Path,
    reader: &mut impl Read,
    mode: Option<u32>,
    target_dir: &Path,
) -> Result<()> {
    let Some(name) = entry_path.file_name() else {
        debug!("skipping entry with no file name: {}", entry_path.display());
        return Ok(());
    };
    let dest = target_dir.join(name);
    debug!("extracting {} to {}", entry_path.display(), dest.display());

    let mut file = File::create(&dest).map_err(|e| GetError::io(&dest, e))?;
    io::copy(reader, &mut file).map_err(|e| GetError::io(&dest, e))?;
    set_mode(&dest, mode)
}

#[cfg(target_family = "unix")]
fn set_mode(path: &Path, mode: Option<u32>) -> Result<()> {
    let Some(mode) = mode else {
        return Ok(());
    };
    set_permissions(path, Permissions::from_mode(mode & 0o7777))
        .map_err(|e| GetError::io(path, e).into())
}

#[cfg(target_family = "windows")]
#[allow(clippy::unnecessary_wraps)]
fn set_mode(_path: &Path, _mode: Option<u32>) -> Result<()> {
    Ok(())
}

fn open_file(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| GetError::io(path, e).into())
}
