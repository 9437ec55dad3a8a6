//! MediaShrink Media Model
//!
//! Defines the data contracts shared by the re-encoding engines:
//! - **Source:** The immutable input file and what is known about it
//! - **Target:** The caller's byte budget
//! - **Artifact:** The encoded output handed back to the caller
//! - **Progress:** Stage/fraction reports streamed while an operation runs
//!
//! Nothing in this crate touches the filesystem except
//! [`SourceMedia::from_path`]; artifacts live only in memory.

pub mod artifact;
pub mod mime;
pub mod progress;
pub mod source;

pub use artifact::*;
pub use mime::*;
pub use progress::*;
pub use source::*;
