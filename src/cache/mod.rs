//! Two-tier photo cache: encoded bytes bounded by size, decoded images
//! bounded by count.

mod bytes;
mod decoded;

pub use bytes::{ByteCache, ByteEntry};
pub use decoded::DecodedCache;
