pub mod ai_tasks;
pub mod billing;
pub mod clock;
pub mod events;
pub mod orders;
pub mod printer;
pub mod scheduler;
pub mod selection;
