// Library exports for testing and reuse

pub mod config;
pub mod error;
pub mod handlers;
pub mod proxy;
pub mod session;
