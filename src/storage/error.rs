use std::{
    error::Error,
    fmt::{self, Display},
};

/// The specific result type for bound checks inside the storage module.
pub type Result<T> = std::result::Result<T, OutOfBoundsErr>;

/// Error returned by a `ColumnSegment` whenever an access falls outside of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfBoundsErr {
    pub offset: usize,
    pub len: usize,
    pub capacity: usize,
}

impl Display for OutOfBoundsErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "access of {} values at offset {} exceeds a segment of {}",
            self.len, self.offset, self.capacity
        )
    }
}

impl Error for OutOfBoundsErr {}
