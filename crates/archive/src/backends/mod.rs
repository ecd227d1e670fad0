//! Archive backend implementations.

pub mod cloudinary;
pub mod filesystem;
pub mod s3;
