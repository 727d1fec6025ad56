// Concrete implementations of the domain ports and file outputs.

pub mod alias;
pub mod memory_store;
pub mod rejected_log;
