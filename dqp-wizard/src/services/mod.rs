//! Backend access for the processing wizard

pub mod backend;
pub mod http_backend;

pub use backend::{DqBackend, MockBackend};
pub use http_backend::HttpBackend;
