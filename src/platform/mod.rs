//! Platform resolution
//!
//! Maps the raw operating system and architecture identifiers reported by the
//! host to a normalized [`PlatformKey`]. Only the Windows family is supported,
//! because that is the only family payloads are packaged for.

use crate::error::BootstrapError;
use crate::runtime::Runtime;
use log::debug;
use serde::Serialize;
use std::fmt;

/// Supported operating system families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Windows,
}

impl Os {
    /// Recognize an OS name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        // "Windows 10", "windows", "win32"; "darwin" must not match
        if name.starts_with("win") {
            Some(Os::Windows)
        } else {
            None
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Os::Windows => write!(f, "windows"),
        }
    }
}

/// Supported CPU architectures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    X86,
    X64,
    Arm64,
}

/// Alias table: every spelling a host may report, merged into one [`Arch`].
const ARCH_ALIASES: &[(&str, Arch)] = &[
    ("x8664", Arch::X64),
    ("x86-64", Arch::X64),
    ("x86_64", Arch::X64),
    ("amd64", Arch::X64),
    ("ia32e", Arch::X64),
    ("em64t", Arch::X64),
    ("x64", Arch::X64),
    ("x8632", Arch::X86),
    ("x86-32", Arch::X86),
    ("x86_32", Arch::X86),
    ("x86", Arch::X86),
    ("i86pc", Arch::X86),
    ("i386", Arch::X86),
    ("i486", Arch::X86),
    ("i586", Arch::X86),
    ("i686", Arch::X86),
    ("ia32", Arch::X86),
    ("x32", Arch::X86),
    ("aarch64", Arch::Arm64),
    ("arm64", Arch::Arm64),
    ("armv9", Arch::Arm64),
    ("armv8", Arch::Arm64),
];

impl Arch {
    /// Recognize an architecture alias (case-insensitive).
    pub fn from_alias(alias: &str) -> Option<Self> {
        let alias = alias.trim().to_lowercase();
        ARCH_ALIASES
            .iter()
            .find(|(name, _)| *name == alias)
            .map(|(_, arch)| *arch)
    }

    /// Directory name used for this architecture in resources and the cache.
    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::X86 => "x86",
            Arch::X64 => "x64",
            Arch::Arm64 => "arm64",
        }
    }

    /// All aliases recognized for this architecture.
    pub fn aliases(&self) -> impl Iterator<Item = &'static str> + '_ {
        ARCH_ALIASES
            .iter()
            .filter(move |(_, arch)| arch == self)
            .map(|(name, _)| *name)
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Normalized platform identity; constructing one proves the host is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PlatformKey {
    pub os: Os,
    pub arch: Arch,
}

impl PlatformKey {
    /// Resolve raw OS and architecture names.
    pub fn resolve(os_name: &str, arch_name: &str) -> Result<Self, BootstrapError> {
        let unsupported = || BootstrapError::UnsupportedPlatform {
            os: os_name.to_string(),
            arch: arch_name.to_string(),
        };

        let os = Os::from_name(os_name).ok_or_else(unsupported)?;
        let arch = Arch::from_alias(arch_name).ok_or_else(unsupported)?;

        debug!("Resolved platform {}/{} from ({}, {})", os, arch, os_name, arch_name);
        Ok(Self { os, arch })
    }

    /// Resolve the platform the runtime reports.
    #[tracing::instrument(skip(runtime))]
    pub fn detect<R: Runtime>(runtime: &R) -> Result<Self, BootstrapError> {
        Self::resolve(&runtime.os_name(), &runtime.arch_name())
    }
}

impl fmt::Display for PlatformKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}
