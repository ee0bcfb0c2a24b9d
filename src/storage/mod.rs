mod error;
mod handle;
mod rows;
mod segment;

pub use error::{OutOfBoundsErr, Result};
pub use handle::{RemoteHandle, SegmentHandle};
pub use rows::{RowFactors, ShardSnapshot};
pub use segment::ColumnSegment;

/// The process that hosts the column factors for the whole run.
pub const COLUMN_HOME: usize = 0;
