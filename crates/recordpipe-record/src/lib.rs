//! Student record model shared by producers and consumers.
//!
//! A [`Record`] is immutable once built. The [`markup`] module turns it into
//! the `<ITStudent>` document carried as a frame body and back again.

pub mod error;
pub mod markup;
pub mod model;

pub use error::{RecordError, Result};
pub use markup::{from_markup, from_markup_bytes, to_markup};
pub use model::{CourseMark, Record, RecordBuilder, MAX_MARK, PASS_MARK};
