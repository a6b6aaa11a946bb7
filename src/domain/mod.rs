// Domain layer: records, run reports and the ports the pipelines depend on.

pub mod model;
pub mod ports;
