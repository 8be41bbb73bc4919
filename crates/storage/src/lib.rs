//! Filesystem primitives for chest storage.
//!
//! A chest is a single blob file named `<key><extension>`. This crate knows
//! how to list, move and verify such files inside a directory, and nothing
//! about what the files contain.

mod directory;
pub mod error;
mod models;
mod path;

pub use crate::directory::{ChestDirectory, move_file, stat};
pub use crate::models::{FileInfo, TreeScan};
pub use crate::path::validate_key;
