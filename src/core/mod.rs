pub mod address;
pub mod fetch;
pub mod manifest;
pub mod mapping;
pub mod replace;
pub mod resolver;
pub mod workshop;

pub use crate::domain::model::{ModuleState, Requirement};
pub use crate::domain::ports::RemoteHost;
pub use crate::utils::error::Result;
