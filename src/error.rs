use std::{error::Error, fmt, io};

/// The crate's result type.
pub type Result<T> = std::result::Result<T, NomadErr>;

/// Every way a training run can fail. None of them are recoverable, the
/// process that hits one aborts the run.
#[derive(Debug)]
pub enum NomadErr {
    /// Invalid run parameters, caught before training starts.
    Configuration(String),
    /// The column-factor segment of `rank` couldn't be turned into a usable handle.
    AddressResolution { rank: usize, reason: String },
    /// A remote get/put or procedure call on `rank` failed after being issued.
    RemoteAccess {
        rank: usize,
        op: &'static str,
        reason: String,
    },
    /// A loaded matrix disagrees with its declared dimensions.
    MatrixShape {
        expected: (usize, usize),
        got: (usize, usize),
    },
    /// An underlying I/O error not covered by the above variants.
    Io(io::Error),
}

impl NomadErr {
    /// Builds a `RemoteAccess` error out of anything displayable.
    ///
    /// # Arguments
    /// * `rank` - The process the operation was addressed to.
    /// * `op` - The name of the failed operation.
    /// * `reason` - What went wrong.
    pub fn remote(rank: usize, op: &'static str, reason: impl fmt::Display) -> Self {
        Self::RemoteAccess {
            rank,
            op,
            reason: reason.to_string(),
        }
    }

    /// Returns the name of the operation that failed, used for diagnostics.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configure",
            Self::AddressResolution { .. } => "resolve",
            Self::RemoteAccess { op, .. } => op,
            Self::MatrixShape { .. } => "load",
            Self::Io(_) => "io",
        }
    }
}

impl fmt::Display for NomadErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "invalid configuration: {msg}"),
            Self::AddressResolution { rank, reason } => {
                write!(f, "couldn't resolve the segment of rank {rank}: {reason}")
            }
            Self::RemoteAccess { rank, op, reason } => {
                write!(f, "remote {op} on rank {rank} failed: {reason}")
            }
            Self::MatrixShape { expected, got } => write!(
                f,
                "matrix shape mismatch: declared {}x{}, got {}x{}",
                expected.0, expected.1, got.0, got.1
            ),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for NomadErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for NomadErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<NomadErr> for io::Error {
    fn from(value: NomadErr) -> Self {
        match value {
            NomadErr::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
