use crate::{
    error::CatalogError,
    platform::PlatformInfo,
    template::{Context, Template},
};
use anyhow::Result;
use itertools::Itertools;
use lazy_regex::regex_replace;
use std::collections::HashMap;

/// Describes one tool that `ds get` knows how to install from an upstream release.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[allow(clippy::module_name_repetitions)]
pub struct ToolDescriptor {
    /// The tool's name. This is also the name of the installed executable.
    pub name: String,
    pub owner: String,
    pub repo: String,
    /// The version to install. An empty string means the latest release.
    pub version: String,
    pub description: String,
    /// Set for tools that are shipped as scripts rather than native binaries.
    pub non_binary: bool,
    /// A [`Template`] which renders the exact file name of the release asset for a platform. It
    /// sees `.OS`, `.Arch`, `.Name`, `.Version` and `.VersionNumber`.
    pub asset_name_template: String,
}

impl ToolDescriptor {
    /// Renders the name of the release asset for this tool on the given platform. A non-empty
    /// `version` overrides the tool's pinned version. Surrounding whitespace is trimmed from the
    /// result.
    ///
    /// # Errors
    ///
    /// Returns a [`GetError::Template`](crate::GetError::Template) if the template cannot be
    /// parsed or rendered.
    pub fn asset_name(&self, platform: &PlatformInfo, version: &str) -> Result<String> {
        let version = if version.is_empty() {
            self.version.as_str()
        } else {
            version
        };

        let template = Template::parse(
            &format!("{}-asset-name", self.name),
            &self.asset_name_template,
        )?;
        let context: Context<'_> = HashMap::from([
            ("OS", platform.os.clone()),
            ("Arch", platform.arch.clone()),
            ("Name", self.name.clone()),
            ("Version", version.to_string()),
            ("VersionNumber", version_number(version)),
        ]);

        Ok(template.render(&context)?.trim().to_string())
    }
}

/// Strips a single leading non-digit prefix character, like the "v" in "v1.2.0".
pub(crate) fn version_number(version: &str) -> String {
    regex_replace!(r"^[^0-9]([0-9])", version, |_, digit: &str| digit.to_string()).into_owned()
}

/// The set of tools that can be installed. Tool names are unique without regard to case.
#[derive(Clone, Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct ToolCatalog {
    tools: Vec<ToolDescriptor>,
}

impl ToolCatalog {
    /// Builds a catalog, checking that no name is used twice and that every tool has an asset
    /// name template which parses.
    ///
    /// # Errors
    ///
    /// Returns a [`CatalogError`] describing the first problem found.
    pub fn new(tools: Vec<ToolDescriptor>) -> Result<ToolCatalog, CatalogError> {
        if let Some(dupe) = tools
            .iter()
            .map(|t| t.name.to_lowercase())
            .duplicates()
            .next()
        {
            return Err(CatalogError::DuplicateName(dupe));
        }

        for tool in &tools {
            if tool.asset_name_template.trim().is_empty() {
                return Err(CatalogError::MissingTemplate(tool.name.clone()));
            }
            if let Err(e) = Template::parse(&tool.name, &tool.asset_name_template) {
                return Err(CatalogError::InvalidTemplate {
                    name: tool.name.clone(),
                    message: e.to_string(),
                });
            }
        }

        Ok(ToolCatalog { tools })
    }

    /// The tools that ship with `ds`.
    ///
    /// # Panics
    ///
    /// This panics if the built-in tool list is invalid, which the tests check for.
    #[must_use]
    pub fn builtin() -> ToolCatalog {
        ToolCatalog::new(builtin_tools()).expect("the built-in tool catalog is valid")
    }

    /// Finds a tool by name, ignoring case.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        let name = name.to_lowercase();
        self.tools.iter().find(|t| t.name.to_lowercase() == name)
    }

    /// Returns the tools sorted by name without regard to case, with the exact name breaking
    /// ties.
    #[must_use]
    pub fn sorted(&self) -> Vec<&ToolDescriptor> {
        self.tools
            .iter()
            .sorted_by(|a, b| {
                a.name
                    .to_lowercase()
                    .cmp(&b.name.to_lowercase())
                    .then_with(|| a.name.cmp(&b.name))
            })
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

fn tool(
    name: &str,
    owner: &str,
    repo: &str,
    version: &str,
    description: &str,
    template: &str,
) -> ToolDescriptor {
    ToolDescriptor {
        name: name.to_string(),
        owner: owner.to_string(),
        repo: repo.to_string(),
        version: version.to_string(),
        description: description.to_string(),
        non_binary: false,
        asset_name_template: template.to_string(),
    }
}

fn builtin_tools() -> Vec<ToolDescriptor> {
    vec![
        tool(
            "ds",
            "danielmichaels",
            "ds",
            "v0.1.7",
            "A command box for all of danielmichaels' things.",
            r#"
            {{$os := ""}}
            {{- if HasPrefix .OS "ming" -}}
            {{$os = "Windows"}}
            {{- else if eq .OS "linux" -}}
            {{$os = "Linux"}}
            {{- else if eq .OS "darwin" -}}
            {{$os = "Darwin"}}
            {{- end -}}

            {{$arch := .Arch}}
            {{- if eq .Arch "armv7l" -}}
            {{$arch = "arm"}}
            {{- else if eq .Arch "aarch64" -}}
            {{$arch = "arm64"}}
            {{- end -}}

            {{.Name}}_{{.VersionNumber}}_{{$os}}_{{$arch}}.tar.gz"#,
        ),
        tool(
            "k9s",
            "derailed",
            "k9s",
            "",
            "A terminal UI for Kubernetes clusters.",
            r#"
            {{$os := ""}}
            {{- if HasPrefix .OS "ming" -}}
            {{$os = "Windows"}}
            {{- else if eq .OS "linux" -}}
            {{$os = "Linux"}}
            {{- else if eq .OS "darwin" -}}
            {{$os = "Darwin"}}
            {{- end -}}

            {{$arch := .Arch}}
            {{- if eq .Arch "x86_64" -}}
            {{$arch = "amd64"}}
            {{- else if eq .Arch "armv7l" -}}
            {{$arch = "arm"}}
            {{- else if eq .Arch "aarch64" -}}
            {{$arch = "arm64"}}
            {{- end -}}

            {{.Name}}_{{$os}}_{{$arch}}.tar.gz"#,
        ),
        tool(
            "arkade",
            "alexellis",
            "arkade",
            "",
            "Portable marketplace for downloading devops CLIs and installing helm charts.",
            r#"
            {{- if HasPrefix .OS "ming" -}}
            {{.Name}}.exe
            {{- else if eq .OS "darwin" -}}
              {{- if eq .Arch "aarch64" -}}
              {{.Name}}-darwin-arm64
              {{- else -}}
              {{.Name}}-darwin
              {{- end -}}
            {{- else if eq .Arch "armv6l" "armv7l" -}}
            {{.Name}}-armhf
            {{- else if eq .Arch "aarch64" -}}
            {{.Name}}-arm64
            {{- else -}}
            {{.Name}}
            {{- end -}}"#,
        ),
        tool(
            "gh",
            "cli",
            "cli",
            "",
            "GitHub's official command line tool.",
            r#"
            {{$ext := "tar.gz"}}
            {{- if HasPrefix .OS "ming" -}}
            {{$ext = "zip"}}
            {{- end -}}

            {{$os := ""}}
            {{- if HasPrefix .OS "ming" -}}
            {{$os = "windows"}}
            {{- else if eq .OS "linux" -}}
            {{$os = "linux"}}
            {{- else if eq .OS "darwin" -}}
            {{$os = "macOS"}}
            {{- end -}}

            {{$arch := .Arch}}
            {{- if eq .Arch "aarch64" -}}
            {{$arch = "arm64"}}
            {{- else if eq .Arch "x86_64" -}}
            {{$arch = "amd64"}}
            {{- else if eq .Arch "armv6l" "armv7l" -}}
            {{$arch = "armv6"}}
            {{- else if eq .Arch "i386" -}}
            {{$arch = "386"}}
            {{- end -}}

            gh_{{.VersionNumber}}_{{$os}}_{{$arch}}.{{$ext}}"#,
        ),
    ]
}
