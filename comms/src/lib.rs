//! Length-prefixed framing for the messages processes exchange.
//!
//! A frame is a big endian `u64` body length followed by the body. Numeric
//! payloads travel as raw native-endian slices and are read back in place.

mod align;
mod deserialize;
pub mod msg;
mod receiver;
mod sender;
mod serialize;

use tokio::io::{AsyncRead, AsyncWrite};

pub use align::Align8;
pub use deserialize::Deserialize;
pub use receiver::OnoReceiver;
pub use sender::OnoSender;
pub use serialize::Serialize;

type LenType = u64;
const LEN_TYPE_SIZE: usize = size_of::<LenType>();

/// The largest body either end accepts, 1 GiB.
pub const MAX_FRAME_LEN: usize = 1 << 30;

/// Creates both `OnoReceiver` and `OnoSender` network channel parts.
///
/// # Arguments
/// * `rx` - An async readable.
/// * `tx` - An async writable.
///
/// # Returns
/// The receiving and sending ends of a connection.
pub fn channel<R, W>(rx: R, tx: W) -> (OnoReceiver<R>, OnoSender<W>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    (OnoReceiver::new(rx), OnoSender::new(tx))
}
