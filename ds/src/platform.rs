use log::debug;
use platforms::{Arch, Platform};
use std::fmt;

const TARGET: &str = env!("TARGET");

/// The host's OS and CPU architecture, spelled the way release asset names usually spell them.
/// This is what naming templates see as `.OS` and `.Arch`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(clippy::module_name_repetitions)]
pub struct PlatformInfo {
    pub os: String,
    pub arch: String,
}

impl PlatformInfo {
    /// Returns the platform this binary was built for. This never fails. If the target triple
    /// is unknown to the `platforms` crate, the values from [`std::env::consts`] are used
    /// instead.
    #[must_use]
    pub fn current() -> PlatformInfo {
        PlatformInfo::from_target(TARGET)
    }

    /// Returns the platform for a Rust target triple like `aarch64-apple-darwin`.
    #[must_use]
    pub fn from_target(triple: &str) -> PlatformInfo {
        let info = match Platform::find(triple) {
            Some(p) => {
                // The `platforms` crate reports every 32-bit ARM target as plain "arm", but
                // asset names distinguish between v6 and v7.
                let raw_arch = if p.target_arch == Arch::Arm {
                    triple.split('-').next().unwrap_or(triple)
                } else {
                    p.target_arch.as_str()
                };
                PlatformInfo::normalize(p.target_os.as_str(), raw_arch)
            }
            None => {
                debug!("unknown target triple {triple:?}, using the compiled-in OS and architecture");
                PlatformInfo::normalize(std::env::consts::OS, std::env::consts::ARCH)
            }
        };
        debug!("platform for {triple} is {info}");
        info
    }

    /// Maps raw OS and architecture names onto the vocabulary used by naming templates. Names
    /// without a special case are lowercased and passed through.
    #[must_use]
    pub fn normalize(raw_os: &str, raw_arch: &str) -> PlatformInfo {
        PlatformInfo {
            os: normalize_os(raw_os),
            arch: normalize_arch(raw_arch),
        }
    }

    #[must_use]
    pub fn is_windows(&self) -> bool {
        self.os.starts_with("mingw")
    }
}

impl fmt::Display for PlatformInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

// Windows is reported the way `uname -s` reports it under Git Bash and MSYS2, which is what most
// naming tables test for with `HasPrefix .OS "ming"`.
fn normalize_os(raw: &str) -> String {
    let os = raw.to_lowercase();
    match os.as_str() {
        "linux" => os,
        "macos" | "darwin" | "osx" => "darwin".to_string(),
        "windows" | "win32" | "win64" => "mingw64_nt".to_string(),
        o if o.starts_with("mingw") || o.starts_with("msys") || o.starts_with("cygwin") => {
            "mingw64_nt".to_string()
        }
        _ => os,
    }
}

fn normalize_arch(raw: &str) -> String {
    let arch = raw.to_lowercase();
    match arch.as_str() {
        "x86_64" | "amd64" | "x64" | "x86-64" => "x86_64",
        "aarch64" | "arm64" | "arm64e" | "aarch_64" => "aarch64",
        "armv7" | "armv7l" | "armv7hf" | "armhf" | "thumbv7neon" => "armv7l",
        "arm" | "armv6" | "armv6l" => "armv6l",
        "x86" | "386" | "i386" | "i586" | "i686" => "i386",
        _ => return arch,
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("linux", "amd64", "linux", "x86_64")]
    #[case("linux", "x86_64", "linux", "x86_64")]
    #[case("Linux", "AMD64", "linux", "x86_64")]
    #[case("linux", "arm64", "linux", "aarch64")]
    #[case("linux", "aarch64", "linux", "aarch64")]
    #[case("darwin", "arm64", "darwin", "aarch64")]
    #[case("macos", "arm64e", "darwin", "aarch64")]
    #[case("linux", "armv7", "linux", "armv7l")]
    #[case("linux", "armhf", "linux", "armv7l")]
    #[case("linux", "arm", "linux", "armv6l")]
    #[case("linux", "i686", "linux", "i386")]
    #[case("windows", "x86_64", "mingw64_nt", "x86_64")]
    #[case("MINGW64_NT-10.0", "amd64", "mingw64_nt", "x86_64")]
    #[case("freebsd", "riscv64", "freebsd", "riscv64")]
    #[case("illumos", "sparcv9", "illumos", "sparcv9")]
    fn normalize(
        #[case] raw_os: &str,
        #[case] raw_arch: &str,
        #[case] os: &str,
        #[case] arch: &str,
    ) {
        let info = PlatformInfo::normalize(raw_os, raw_arch);
        assert_eq!(info.os, os);
        assert_eq!(info.arch, arch);
        assert_eq!(info, PlatformInfo::normalize(raw_os, raw_arch), "deterministic");
    }

    #[test]
    fn arm64_aliases_collapse() {
        let spellings = ["arm64", "aarch64", "ARM64", "arm64e", "aarch_64"]
            .iter()
            .map(|a| PlatformInfo::normalize("linux", a).arch)
            .collect::<Vec<_>>();
        assert!(spellings.iter().all(|a| a == "aarch64"), "{spellings:?}");
    }

    #[rstest]
    #[case("x86_64-unknown-linux-gnu", "linux", "x86_64")]
    #[case("x86_64-unknown-linux-musl", "linux", "x86_64")]
    #[case("aarch64-apple-darwin", "darwin", "aarch64")]
    #[case("x86_64-pc-windows-msvc", "mingw64_nt", "x86_64")]
    #[case("armv7-unknown-linux-gnueabihf", "linux", "armv7l")]
    #[case("arm-unknown-linux-gnueabihf", "linux", "armv6l")]
    #[case("i686-unknown-linux-gnu", "linux", "i386")]
    fn from_target(#[case] triple: &str, #[case] os: &str, #[case] arch: &str) {
        let info = PlatformInfo::from_target(triple);
        assert_eq!(info.os, os, "OS for {triple}");
        assert_eq!(info.arch, arch, "arch for {triple}");
    }

    #[test]
    fn unknown_target_falls_back() {
        let info = PlatformInfo::from_target("not-a-real-triple");
        assert!(!info.os.is_empty());
        assert!(!info.arch.is_empty());
    }

    #[test]
    fn is_windows() {
        assert!(PlatformInfo::normalize("windows", "x86_64").is_windows());
        assert!(!PlatformInfo::normalize("darwin", "x86_64").is_windows());
    }
}
