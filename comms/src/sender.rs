use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::{LEN_TYPE_SIZE, LenType, MAX_FRAME_LEN, Serialize};

/// The sending end of a connection.
///
/// The frame head (length, kind and any fixed fields) is built in a buffer
/// reused across sends, the numeric tail is written straight from the
/// caller's slice.
pub struct OnoSender<W: AsyncWrite + Unpin> {
    tx: W,
    head: Vec<u8>,
}

impl<W: AsyncWrite + Unpin> OnoSender<W> {
    pub(super) fn new(tx: W) -> Self {
        Self {
            tx,
            head: Vec::new(),
        }
    }

    /// Frames `msg` and writes it out, flushing afterwards.
    ///
    /// # Arguments
    /// * `msg` - A serializable message.
    ///
    /// # Returns
    /// An `InvalidInput` error if the body exceeds `MAX_FRAME_LEN`, or the
    /// error of the underlying writer.
    pub async fn send<'a, T: Serialize<'a>>(&mut self, msg: &'a T) -> io::Result<()> {
        let Self { tx, head } = self;

        head.clear();
        head.extend_from_slice(&[0; LEN_TYPE_SIZE]);

        let tail = msg.serialize(head).unwrap_or_default();
        let body_len = head.len() - LEN_TYPE_SIZE + tail.len();

        if body_len > MAX_FRAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("frame of {body_len} bytes exceeds the {MAX_FRAME_LEN} bytes limit"),
            ));
        }

        head[..LEN_TYPE_SIZE].copy_from_slice(&(body_len as LenType).to_be_bytes());
        tx.write_all(head).await?;

        if !tail.is_empty() {
            tx.write_all(tail).await?;
        }

        tx.flush().await
    }
}
