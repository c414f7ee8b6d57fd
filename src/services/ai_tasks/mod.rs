pub mod http;
pub mod provider;
pub mod registry;
pub mod types;

mod fan_in;
mod tasks;

pub use fan_in::*;
pub use tasks::*;
