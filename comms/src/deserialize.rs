use std::io;

/// Types that can be read back from a frame body, possibly borrowing from it.
pub trait Deserialize<'a>: Sized {
    /// Parses a value out of `buf`.
    ///
    /// # Arguments
    /// * `buf` - The full frame body, without the length prefix.
    ///
    /// # Returns
    /// The parsed value or an `io::ErrorKind::InvalidData` error.
    fn deserialize(buf: &'a [u8]) -> io::Result<Self>;
}
