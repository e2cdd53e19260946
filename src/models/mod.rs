//! Data models for contact photos

mod key;
mod photo;

pub use key::PhotoKey;
pub use photo::Photo;
