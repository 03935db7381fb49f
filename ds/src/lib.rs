//! A library for installing tools from their GitHub releases into a per-user tool directory.
//!
//! This is the engine behind `ds get`. Each tool it knows about is described by a
//! [`ToolDescriptor`], which says where the tool's releases live and how its release assets are
//! named. Given a tool name, `ds` works out the exact asset for the current platform, downloads
//! it, unpacks it if needed, and copies the executable into `$HOME/.ds/bin`.
//!
//! The main entry point for programmatic use is the [`GetterBuilder`] struct. Here is an example of
//! its usage:
//!
//! ```ignore
//! use ds::GetterBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let getter = GetterBuilder::new()
//!         .tool("k9s")
//!         .version("v0.32.4")
//!         .build()?;
//!
//!     let installation = getter.install().await?;
//!     println!("{}", installation.message);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Asset Name Templates
//!
//! Release assets are named differently by every project, so each tool carries a small template
//! which renders the asset's file name. The template language supports `{{.Field}}` output,
//! `{{if}}`/`{{else if}}`/`{{else}}`/`{{end}}`, local variables (`{{$x := ...}}` and
//! `{{$x = ...}}`), comments, `{{-`/`-}}` whitespace trimming and the
//! functions `eq`, `ne`, `not`, `and`, `or`, `HasPrefix`, `HasSuffix`, `ToLower` and `ToUpper`.
//!
//! Templates see these fields:
//!
//! - `.OS` - `linux`, `darwin`, `mingw64_nt` on Windows, or the lowercased OS name elsewhere.
//! - `.Arch` - `x86_64`, `aarch64`, `armv7l`, `armv6l`, `i386`, or the lowercased architecture
//!   name for anything else.
//! - `.Name` - the tool's name.
//! - `.Version` - the release tag, like `v1.2.0`.
//! - `.VersionNumber` - the version with a leading non-digit character removed, like `1.2.0`.
//!
//! Surrounding whitespace is trimmed from the rendered name, so templates can be laid out over
//! several lines. For example:
//!
//! ```text
//! {{$arch := .Arch}}
//! {{- if eq .Arch "x86_64" -}}{{$arch = "amd64"}}{{- end -}}
//! {{.Name}}_{{.VersionNumber}}_{{.OS}}_{{$arch}}.tar.gz
//! ```
//!
//! ## Archives
//!
//! The format of a download is decided by the suffix of its URL. `.tar.gz` and `.tgz` files are
//! unpacked as gzipped tarballs, and `.zip` files as zip archives. Every regular file in the
//! archive is written to one directory, ignoring the directories it was stored under, and the
//! executable is expected to be named after the tool. Anything else is installed as-is.
//!
//! ## Features
//!
//! This crate offers several features to control the TLS dependency used by `reqwest`:
//!
#![doc = document_features::document_features!()]

mod archive;
mod builder;
mod download;
mod error;
mod getter;
mod github;
mod installer;
mod message;
mod platform;
mod release;
mod resolver;
mod template;
mod tool;

pub use crate::{
    archive::ArchiveFormat,
    builder::GetterBuilder,
    error::{CatalogError, GetError},
    getter::{Getter, Installation},
    installer::{default_tool_dir, local_binary},
    message::{post_install_message, ToolLocal},
    platform::PlatformInfo,
    release::{Asset, Release, ReleaseClient},
    resolver::{AssetResolver, ResolvedAsset},
    template::{Context, Template},
    tool::{ToolCatalog, ToolDescriptor},
};

// The version of the `ds` crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(feature = "logging")]
use fern::{
    colors::{Color, ColoredLevelConfig},
    Dispatch,
};

/// This function initializes logging for the application. It's public for the sake of the `ds`
/// binary, but it lives in the library crate so that test code can also enable logging.
///
/// # Errors
///
/// This can return a `log::SetLoggerError` error.
#[cfg(feature = "logging")]
pub fn init_logger(level: log::LevelFilter) -> Result<(), log::SetLoggerError> {
    let line_colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::BrightBlack)
        .debug(Color::BrightBlack)
        .trace(Color::BrightBlack);
    let level_colors = line_colors.info(Color::Green).debug(Color::Black);

    Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{color_line}[{target}][{level}{color_line}] {message}\x1B[0m",
                color_line = format_args!(
                    "\x1B[{}m",
                    line_colors.get_color(&record.level()).to_fg_str()
                ),
                target = record.target(),
                level = level_colors.color(record.level()),
                message = message,
            ));
        })
        .level(level)
        // These are very noisy.
        .level_for("hyper", log::LevelFilter::Error)
        .level_for("hyper_util", log::LevelFilter::Error)
        .level_for("reqwest", log::LevelFilter::Error)
        .chain(std::io::stderr())
        .apply()
}
