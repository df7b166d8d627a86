pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("out of range: {0}")]
    OutOfRange(String),
    #[error("image format not supported: {0}")]
    ImageFormatNotSupported(String),
    #[error("image format interpretation error: {0}")]
    ImageFormatInterpretationError(String),
    #[error("buffer too small: {required} bytes required, {actual} bytes available")]
    BufferTooSmall { required: usize, actual: usize },
    #[error("invalid cast: {0}")]
    InvalidCast(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("busy: {0}")]
    Busy(String),
    #[error("not permitted: {0}")]
    NotPermitted(String),
    #[error("timeout: {0}")]
    Timeout(String),
    #[error("invalid handle: {0}")]
    InvalidHandle(String),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Classification of an [Error] without its context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    OutOfRange,
    ImageFormatNotSupported,
    ImageFormatInterpretationError,
    BufferTooSmall,
    InvalidCast,
    Io,
    Busy,
    NotPermitted,
    Timeout,
    InvalidHandle,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::OutOfRange(_) => ErrorKind::OutOfRange,
            Error::ImageFormatNotSupported(_) => ErrorKind::ImageFormatNotSupported,
            Error::ImageFormatInterpretationError(_) => ErrorKind::ImageFormatInterpretationError,
            Error::BufferTooSmall { .. } => ErrorKind::BufferTooSmall,
            Error::InvalidCast(_) => ErrorKind::InvalidCast,
            Error::Io(_) => ErrorKind::Io,
            Error::Busy(_) => ErrorKind::Busy,
            Error::NotPermitted(_) => ErrorKind::NotPermitted,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::InvalidHandle(_) => ErrorKind::InvalidHandle,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Surface a backend status code as a `Result`.
    ///
    /// [StatusCode::Success] yields `Ok(())`, every other code becomes the
    /// matching error kind carrying `description`.
    pub fn from_status(code: StatusCode, description: impl Into<String>) -> Result<()> {
        let msg = description.into();
        let err = match code {
            StatusCode::Success => return Ok(()),
            StatusCode::Error => Error::Internal(msg),
            StatusCode::InvalidHandle => Error::InvalidHandle(msg),
            StatusCode::IoError => Error::Io(std::io::Error::other(msg)),
            StatusCode::BufferTooSmall => Error::BufferTooSmall {
                required: 0,
                actual: 0,
            },
            StatusCode::InvalidArgument => Error::InvalidArgument(msg),
            StatusCode::OutOfRange => Error::OutOfRange(msg),
            StatusCode::ImageFormatNotSupported | StatusCode::NotSupported => {
                Error::ImageFormatNotSupported(msg)
            }
            StatusCode::FormatInterpretationError => Error::ImageFormatInterpretationError(msg),
            StatusCode::NotPermitted => Error::NotPermitted(msg),
            StatusCode::Busy => Error::Busy(msg),
            StatusCode::Timeout => Error::Timeout(msg),
        };
        Err(err)
    }

    /// Like [Error::from_status] for a raw code as returned over a C ABI.
    ///
    /// Unknown codes become [Error::Internal].
    pub fn from_raw_status(code: i32, description: impl Into<String>) -> Result<()> {
        Self::from_status(StatusCode::try_from(code)?, description)
    }
}

/// Status codes reported by a native imaging backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum StatusCode {
    Success = 0,
    Error = 1,
    InvalidHandle = 2,
    IoError = 3,
    BufferTooSmall = 4,
    InvalidArgument = 5,
    OutOfRange = 6,
    ImageFormatNotSupported = 7,
    FormatInterpretationError = 8,
    NotSupported = 9,
    NotPermitted = 10,
    Busy = 11,
    Timeout = 12,
}

impl TryFrom<i32> for StatusCode {
    type Error = Error;
    fn try_from(value: i32) -> Result<Self> {
        let code = match value {
            0 => StatusCode::Success,
            1 => StatusCode::Error,
            2 => StatusCode::InvalidHandle,
            3 => StatusCode::IoError,
            4 => StatusCode::BufferTooSmall,
            5 => StatusCode::InvalidArgument,
            6 => StatusCode::OutOfRange,
            7 => StatusCode::ImageFormatNotSupported,
            8 => StatusCode::FormatInterpretationError,
            9 => StatusCode::NotSupported,
            10 => StatusCode::NotPermitted,
            11 => StatusCode::Busy,
            12 => StatusCode::Timeout,
            other => {
                return Err(Error::Internal(format!(
                    "unknown backend status code {other}"
                )));
            }
        };
        Ok(code)
    }
}
