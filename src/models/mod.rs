// Request/Response models
pub mod common;
pub mod tickets;
