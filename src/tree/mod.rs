//! Tree algorithms: deep merge and mask intersection.
//!
//! Both operate on `serde_json::Value` trees. Objects recurse; arrays and
//! primitives are leaves. The same intersection routine drives notification
//! filtering, persistence filtering, and last-changes projection.

mod mask;
mod merge;

pub use mask::{overlap, should_update, InterestMask};
pub use merge::merge;
