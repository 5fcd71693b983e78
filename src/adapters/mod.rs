// Adapters layer: concrete implementations for external systems (remote hosts, module cache).

pub mod cache;
pub mod github;
