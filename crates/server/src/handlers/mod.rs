//! HTTP request handlers.

pub mod common;
pub mod requests;
pub mod status;
pub mod webhook;

pub use requests::*;
pub use status::*;
pub use webhook::*;
