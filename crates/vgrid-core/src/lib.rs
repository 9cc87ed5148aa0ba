pub mod config;
pub mod types;

pub use config::{DispatchMode, NodeConfig};
pub use types::*;
