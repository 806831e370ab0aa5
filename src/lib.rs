#![doc = include_str!("../README.md")]

mod error;
pub mod geometry;
pub mod rtree;
mod r#type;

pub use error::{BoxError, RTreeError, Result};
pub use r#type::{CoordType, IndexableNum};

#[cfg(test)]
pub(crate) mod test;
