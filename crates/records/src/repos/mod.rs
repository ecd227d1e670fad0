//! Repository traits for the record store.

pub mod requests;

pub use requests::SignatureRequestRepo;
