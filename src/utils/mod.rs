pub mod backoff;
pub mod security;
pub mod server;
