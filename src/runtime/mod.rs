//! Runtime abstraction for system operations.
//!
//! This module provides a trait-based abstraction over the host operations the
//! bootstrap needs, enabling dependency injection and testability.
//!
//! # Structure
//!
//! - `env` - Environment variables and host identification (OS, architecture, temp dir)
//! - `fs` - File system operations (probe, create, rename, remove)

mod env;
mod fs;

use anyhow::Result;
use std::env as std_env;
use std::path::{Path, PathBuf};

#[cfg_attr(test, mockall::automock)]
pub trait Runtime: Send + Sync {
    // Environment
    fn env_var(&self, key: &str) -> Result<String, std_env::VarError>;

    /// Raw operating system name of the host, as reported by the platform.
    fn os_name(&self) -> String;

    /// Raw CPU architecture name of the host, as reported by the platform.
    fn arch_name(&self) -> String;

    fn temp_dir(&self) -> PathBuf;

    // File System
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Size in bytes of a regular file, or `None` if it does not exist.
    fn file_size(&self, path: &Path) -> Option<u64>;

    fn create_file(&self, path: &Path) -> Result<Box<dyn std::io::Write + Send>>;
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;
    fn remove_file(&self, path: &Path) -> Result<()>;
    fn remove_dir_all(&self, path: &Path) -> Result<()>;
    fn exists(&self, path: &Path) -> bool;

    /// Make a path absolute against the current directory without touching the file system.
    fn absolute(&self, path: &Path) -> Result<PathBuf>;
}

/// Runtime backed by the real host.
///
/// `os` and `arch` replace the identifiers the host reports.
#[derive(Debug, Default, Clone)]
pub struct RealRuntime {
    pub os: Option<String>,
    pub arch: Option<String>,
}

impl Runtime for RealRuntime {
    fn env_var(&self, key: &str) -> Result<String, std_env::VarError> {
        self.env_var_impl(key)
    }

    fn os_name(&self) -> String {
        self.os_name_impl()
    }

    fn arch_name(&self) -> String {
        self.arch_name_impl()
    }

    fn temp_dir(&self) -> PathBuf {
        self.temp_dir_impl()
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.create_dir_all_impl(path)
    }

    fn file_size(&self, path: &Path) -> Option<u64> {
        self.file_size_impl(path)
    }

    fn create_file(&self, path: &Path) -> Result<Box<dyn std::io::Write + Send>> {
        self.create_file_impl(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        self.rename_impl(from, to)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.remove_file_impl(path)
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        self.remove_dir_all_impl(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.exists_impl(path)
    }

    fn absolute(&self, path: &Path) -> Result<PathBuf> {
        self.absolute_impl(path)
    }
}
