mod ai;
mod common;
mod orders;
mod payment;
mod selection;

pub use ai::*;
pub use common::*;
pub use orders::*;
pub use payment::*;
pub use selection::*;
