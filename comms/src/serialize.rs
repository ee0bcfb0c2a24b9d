/// Types that can be written into a frame.
pub trait Serialize<'a> {
    /// Writes the owned part of `self` into `buf` and optionally hands back a
    /// borrowed tail that is written right after it without being copied.
    ///
    /// # Arguments
    /// * `buf` - The frame buffer, may already contain bytes that must be kept.
    ///
    /// # Returns
    /// The zero-copy tail of the frame, if any.
    fn serialize(&'a self, buf: &mut Vec<u8>) -> Option<&'a [u8]>;
}
