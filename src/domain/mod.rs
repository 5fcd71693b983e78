// Domain layer: models, version grammar and ports (interfaces).

pub mod model;
pub mod ports;
pub mod version;
