use crate::template::{Context, Template};
use anyhow::Result;
use std::{collections::HashMap, path::PathBuf};

const POST_INSTALL_TEMPLATE: &str = r"# Add the ds tool directory to your PATH variable
export PATH=$PATH:{{.BinPath}}

# Test {{.Name}}:
{{.Path}}

# Or install with:
sudo mv {{.Path}} /usr/local/bin/
";

/// Where a tool ended up, as shown to the user after installing it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolLocal {
    pub name: String,
    pub path: PathBuf,
    /// The tool directory as it should appear in a shell profile, like `$HOME/.ds/bin`.
    pub bin_path: String,
}

/// Renders the instructions printed after a tool is installed.
///
/// # Errors
///
/// Fails only if the message template is malformed.
pub fn post_install_message(local: &ToolLocal) -> Result<String> {
    let template = Template::parse("post-install", POST_INSTALL_TEMPLATE)?;
    let context: Context<'_> = HashMap::from([
        ("Name", local.name.clone()),
        ("Path", local.path.display().to_string()),
        ("BinPath", local.bin_path.clone()),
    ]);
    template.render(&context)
}
