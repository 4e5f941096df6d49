//! mesaboot - extract and load native Mesa payloads at process startup
//!
//! Resolves the host platform and requested variant, materializes the
//! variant's payloads into a versioned cache directory shared by concurrent
//! processes (guarded by a file lock), and loads them into the process in
//! dependency order.
//!
//! ```no_run
//! use mesaboot::resource::DirSource;
//!
//! let report = mesaboot::bootstrap(DirSource::new("resources"), Some("d3d12"))?;
//! for (payload, failure) in report.failures() {
//!     eprintln!("{}: {}", payload, failure.message);
//! }
//! # Ok::<(), mesaboot::BootstrapError>(())
//! ```

pub mod bootstrap;
pub mod cache;
pub mod cleanup;
pub mod error;
pub mod extract;
pub mod loader;
pub mod platform;
pub mod report;
pub mod resource;
pub mod runtime;
pub mod variant;
pub mod version;

pub use bootstrap::{BootstrapConfig, Bootstrapper, bootstrap, bootstrap_async};
pub use error::{BootstrapError, LoadError, PayloadError, PayloadErrorKind};
pub use report::BootstrapReport;
