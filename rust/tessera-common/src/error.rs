use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    pub fn invalid_arg(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidArgument {
                name: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    /// Out-of-range access at logical position `pos`, resolved to `page:offset`.
    pub fn out_of_bounds(pos: u64, size: u64, page: usize, offset: u64) -> Error {
        Error(
            ErrorKind::IndexOutOfBounds {
                pos,
                size,
                page,
                offset,
            }
            .into(),
        )
    }

    pub fn not_sorted(start: u64, end: u64) -> Error {
        Error(ErrorKind::NotSorted { start, end }.into())
    }

    pub fn stride_mismatch(len: u64, stride: usize) -> Error {
        Error(ErrorKind::StrideMismatch { len, stride }.into())
    }

    pub fn dest_too_small(required: u64, available: u64) -> Error {
        Error(
            ErrorKind::DestBufferTooSmall {
                required,
                available,
            }
            .into(),
        )
    }

    pub fn read_only(context: impl Into<String>) -> Error {
        Error(
            ErrorKind::ReadOnly {
                context: context.into(),
            }
            .into(),
        )
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Error {
        Error(
            ErrorKind::Io {
                context: context.into(),
                source,
            }
            .into(),
        )
    }

    /// Returns `true` if this error originates from the operating system or
    /// the file system.
    pub fn is_io(&self) -> bool {
        matches!(self.kind(), ErrorKind::Io { .. })
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("index out of bounds for {pos} (size {size}) => ({page}:{offset})")]
    IndexOutOfBounds {
        pos: u64,
        size: u64,
        page: usize,
        offset: u64,
    },

    #[error("range {start}..{end} is not sorted")]
    NotSorted { start: u64, end: u64 },

    #[error("range length {len} is not a multiple of the record stride {stride}")]
    StrideMismatch { len: u64, stride: usize },

    #[error("destination buffer is too small: {required} words required, {available} available")]
    DestBufferTooSmall { required: u64, available: u64 },

    #[error("write to read-only storage: {context}")]
    ReadOnly { context: String },

    #[error("IO error for '{context}': {source}'")]
    Io {
        context: String,
        source: std::io::Error,
    },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::io("", e)
    }
}
