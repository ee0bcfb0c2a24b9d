// Element types whose alignment is at least 8 bytes, frame buffers built
// from them can be reinterpreted as `f64` and `u64` slices.
pub trait Align8: bytemuck::Pod {}

impl Align8 for u64 {}
