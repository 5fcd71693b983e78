pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliConfig;

pub use config::WorkshopConfig;
pub use core::workshop::{GetOptions, Workshop};
pub use domain::model::{DownloadOutcome, ModuleState, Requirement};
pub use domain::ports::{RemoteHost, RemoteTag, RepoRef};
pub use domain::version::Version;
pub use utils::error::{RemoteError, Result, WorkshopError};
