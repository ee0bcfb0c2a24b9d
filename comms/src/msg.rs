use std::{borrow::Cow, io};

use crate::{Deserialize, Serialize};

type Header = u64;
const HEADER_SIZE: usize = size_of::<Header>();

const ERR: Header = 0;
const CONTROL: Header = 1;
const VALUES: Header = 2;
const SHARD: Header = 3;

/// The payload data for the `Data` variant of the `Msg` enum.
#[derive(Debug, PartialEq)]
pub enum Payload<'a> {
    /// A run of column-factor values starting at `offset`, either the body of a
    /// put request or the reply to a get request.
    Values { offset: u64, values: &'a [f64] },
    /// A row-factor shard together with the global index of each of its rows.
    Shard { rows: &'a [u64], factors: &'a [f64] },
}

/// The command for the `Control` variant of the `Msg` enum.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Hello { rank: usize },
    Resolve,
    Segment { len: usize },
    Get { offset: u64, len: usize },
    QueueDepth,
    Depth { depth: usize },
    Transfer { item: usize },
    Barrier,
    FetchShard,
    Ack,
    Disconnect,
}

/// The application layer message for the entire system.
#[derive(Debug, PartialEq)]
pub enum Msg<'a> {
    Control(Command),
    Data(Payload<'a>),
    Err(Cow<'a, str>),
}

impl Msg<'_> {
    fn buf_is_too_small<T>(size: usize, needed: usize) -> io::Result<T> {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("The given buffer is too small {size}, must at least be {needed} bytes"),
        ))
    }

    fn invalid_kind<T>(kind: Header) -> io::Result<T> {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Received an invalid kind header {kind}"),
        ))
    }

    fn misaligned<T>(err: bytemuck::PodCastError) -> io::Result<T> {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Numeric payload can't be viewed in place: {err:?}"),
        ))
    }
}

/// Splits a big endian `u64` off the front of `buf`.
fn split_u64(buf: &[u8]) -> Option<(u64, &[u8])> {
    let (head, rest) = buf.split_first_chunk::<HEADER_SIZE>()?;
    Some((u64::from_be_bytes(*head), rest))
}

impl<'a> Serialize<'a> for Msg<'a> {
    fn serialize(&'a self, buf: &mut Vec<u8>) -> Option<&'a [u8]> {
        match self {
            Msg::Err(e) => {
                buf.extend_from_slice(&ERR.to_be_bytes());
                Some(e.as_bytes())
            }
            Msg::Control(cmd) => {
                buf.extend_from_slice(&CONTROL.to_be_bytes());

                // SAFETY: Serialize impl for `Command` is derived and not implemented
                //         by hand. Nor has a non string-key map inside.
                serde_json::to_writer(buf, cmd).unwrap();
                None
            }
            Msg::Data(Payload::Values { offset, values }) => {
                buf.extend_from_slice(&VALUES.to_be_bytes());
                buf.extend_from_slice(&offset.to_be_bytes());
                Some(bytemuck::cast_slice(values))
            }
            Msg::Data(Payload::Shard { rows, factors }) => {
                buf.extend_from_slice(&SHARD.to_be_bytes());
                buf.extend_from_slice(&(rows.len() as u64).to_be_bytes());
                buf.extend_from_slice(bytemuck::cast_slice(rows));
                Some(bytemuck::cast_slice(factors))
            }
        }
    }
}

impl<'a> Deserialize<'a> for Msg<'a> {
    fn deserialize(buf: &'a [u8]) -> io::Result<Self> {
        let Some((kind, rest)) = split_u64(buf) else {
            return Self::buf_is_too_small(buf.len(), HEADER_SIZE);
        };

        match kind {
            ERR => {
                let string = str::from_utf8(rest)
                    .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

                Ok(Self::Err(Cow::Borrowed(string)))
            }
            CONTROL => {
                let cmd = serde_json::from_slice(rest)?;
                Ok(Self::Control(cmd))
            }
            VALUES => {
                let Some((offset, rest)) = split_u64(rest) else {
                    return Self::buf_is_too_small(buf.len(), 2 * HEADER_SIZE);
                };

                let values = bytemuck::try_cast_slice(rest).or_else(Self::misaligned)?;
                Ok(Self::Data(Payload::Values { offset, values }))
            }
            SHARD => {
                let Some((nrows, rest)) = split_u64(rest) else {
                    return Self::buf_is_too_small(buf.len(), 2 * HEADER_SIZE);
                };

                let Some(rows_len) = usize::try_from(nrows)
                    .ok()
                    .and_then(|n| n.checked_mul(size_of::<u64>()))
                else {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("Shard row count {nrows} doesn't fit in memory"),
                    ));
                };

                if rest.len() < rows_len {
                    return Self::buf_is_too_small(buf.len(), 2 * HEADER_SIZE + rows_len);
                }

                let (rows, factors) = rest.split_at(rows_len);
                let rows = bytemuck::try_cast_slice(rows).or_else(Self::misaligned)?;
                let factors = bytemuck::try_cast_slice(factors).or_else(Self::misaligned)?;
                Ok(Self::Data(Payload::Shard { rows, factors }))
            }
            kind => Self::invalid_kind(kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Serializes `msg` into a `u64` backed buffer, the way a receiver lays it out.
    fn frame(msg: &Msg) -> (Vec<u64>, usize) {
        let mut buf = Vec::new();
        if let Some(tail) = msg.serialize(&mut buf) {
            let tail = tail.to_vec();
            buf.extend_from_slice(&tail);
        }

        let len = buf.len();
        let mut aligned = vec![0u64; len.div_ceil(8)];
        bytemuck::cast_slice_mut::<u64, u8>(&mut aligned)[..len].copy_from_slice(&buf);
        (aligned, len)
    }

    fn bytes(buf: &[u64], len: usize) -> &[u8] {
        &bytemuck::cast_slice::<u64, u8>(buf)[..len]
    }

    #[test]
    fn control_survives_framing() {
        let msg = Msg::Control(Command::Get { offset: 6, len: 3 });
        let (buf, len) = frame(&msg);
        let parsed = Msg::deserialize(bytes(&buf, len)).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn values_are_read_in_place() {
        let values = [0.5, -1.25, 3.0];
        let msg = Msg::Data(Payload::Values { offset: 9, values: &values });
        let (buf, len) = frame(&msg);

        let Msg::Data(Payload::Values { offset, values: got }) =
            Msg::deserialize(bytes(&buf, len)).unwrap()
        else {
            panic!("expected a values payload");
        };

        assert_eq!(offset, 9);
        assert_eq!(got, values);
    }

    #[test]
    fn shard_keeps_rows_and_factors_apart() {
        let rows = [4, 0, 7];
        let factors = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let msg = Msg::Data(Payload::Shard { rows: &rows, factors: &factors });
        let (buf, len) = frame(&msg);

        let parsed = Msg::deserialize(bytes(&buf, len)).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn short_buffer_is_rejected() {
        let err = Msg::deserialize(&[0, 1, 2]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let buf = [0u64, 0].map(|_| 42u64.to_be());
        let err = Msg::deserialize(bytemuck::cast_slice(&buf)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn truncated_shard_is_rejected() {
        let buf = [SHARD.to_be(), 5u64.to_be(), 1];
        let err = Msg::deserialize(bytemuck::cast_slice(&buf)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn overflowing_shard_row_count_is_rejected() {
        for nrows in [u64::MAX / 4, u64::MAX] {
            let buf = [SHARD.to_be(), nrows.to_be(), 1];
            let err = Msg::deserialize(bytemuck::cast_slice(&buf)).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        }
    }
}
