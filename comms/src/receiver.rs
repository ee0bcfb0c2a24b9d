use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{Align8, Deserialize, LEN_TYPE_SIZE, LenType, MAX_FRAME_LEN};

/// The receiving end of a connection.
pub struct OnoReceiver<R: AsyncRead + Unpin> {
    rx: R,
}

impl<R: AsyncRead + Unpin> OnoReceiver<R> {
    pub(super) fn new(rx: R) -> Self {
        Self { rx }
    }

    /// Waits for the next frame and deserializes it out of `buf`.
    ///
    /// `buf` only ever grows, so a long-lived buffer stops allocating once it
    /// fits the largest frame of the connection.
    ///
    /// # Arguments
    /// * `buf` - The buffer to read the body into, the returned `T` borrows
    ///           from it. Its element type fixes the body's alignment.
    ///
    /// # Returns
    /// The message, `UnexpectedEof` if the stream ends before a whole frame
    /// arrives, or `InvalidData` if the frame is too long or malformed.
    pub async fn recv_into<'buf, T, B>(&mut self, buf: &'buf mut Vec<B>) -> io::Result<T>
    where
        T: Deserialize<'buf>,
        B: Align8,
    {
        let mut len = [0; LEN_TYPE_SIZE];
        self.rx.read_exact(&mut len).await?;
        let len = LenType::from_be_bytes(len) as usize;

        if len > MAX_FRAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame of {len} bytes exceeds the {MAX_FRAME_LEN} bytes limit"),
            ));
        }

        let words = len.div_ceil(size_of::<B>());
        if buf.len() < words {
            buf.resize(words, B::zeroed());
        }

        let body = &mut bytemuck::cast_slice_mut::<B, u8>(buf)[..len];
        self.rx.read_exact(body).await?;

        T::deserialize(body)
    }
}
