// Domain layer: note and settlement models plus the ports the core talks through.

pub mod model;
pub mod ports;
