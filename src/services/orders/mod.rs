pub mod guards;
pub mod hooks;
pub mod types;

mod lifecycle;
mod transition;

pub use lifecycle::*;
pub use transition::*;
pub use types::*;
