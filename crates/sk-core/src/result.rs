use thiserror::Error;

/// Failure codes surfaced at every public API boundary.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkError {
    #[error("host allocator refused an allocation")]
    OutOfHostMemory,
    #[error("initialization failed")]
    InitializationFailed,
    #[error("requested object was not found")]
    NotFound,
    #[error("invalid argument or malformed input")]
    Invalid,
    #[error("operation is not supported at this point in the chain")]
    NotSupported,
    #[error("internal invariant violated")]
    SystemInternal,
}

pub type SkResult<T> = Result<T, SkError>;

/// Non-error completion states of enumeration calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkStatus {
    Success,
    /// The caller's buffer was too small; the entries written are valid.
    Incomplete,
}

/// Raw result codes, mirroring the C ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum SkResultCode {
    Success = 0,
    Incomplete = 1,
    ErrorOutOfHostMemory = -1,
    ErrorInitializationFailed = -2,
    ErrorNotFound = -3,
    ErrorInvalid = -4,
    ErrorNotSupported = -5,
    ErrorSystemInternal = -6,
}

impl SkResultCode {
    pub fn as_raw(self) -> i32 {
        self as i32
    }

    pub fn from_raw(raw: i32) -> Option<Self> {
        Some(match raw {
            0 => Self::Success,
            1 => Self::Incomplete,
            -1 => Self::ErrorOutOfHostMemory,
            -2 => Self::ErrorInitializationFailed,
            -3 => Self::ErrorNotFound,
            -4 => Self::ErrorInvalid,
            -5 => Self::ErrorNotSupported,
            -6 => Self::ErrorSystemInternal,
            _ => return None,
        })
    }

    pub fn is_error(self) -> bool {
        self.as_raw() < 0
    }
}

impl From<SkError> for SkResultCode {
    fn from(err: SkError) -> Self {
        match err {
            SkError::OutOfHostMemory => Self::ErrorOutOfHostMemory,
            SkError::InitializationFailed => Self::ErrorInitializationFailed,
            SkError::NotFound => Self::ErrorNotFound,
            SkError::Invalid => Self::ErrorInvalid,
            SkError::NotSupported => Self::ErrorNotSupported,
            SkError::SystemInternal => Self::ErrorSystemInternal,
        }
    }
}

impl From<SkStatus> for SkResultCode {
    fn from(status: SkStatus) -> Self {
        match status {
            SkStatus::Success => Self::Success,
            SkStatus::Incomplete => Self::Incomplete,
        }
    }
}

impl<T> From<&SkResult<T>> for SkResultCode {
    fn from(result: &SkResult<T>) -> Self {
        match result {
            Ok(_) => Self::Success,
            Err(err) => (*err).into(),
        }
    }
}

/// Copy `items` into `out`, reporting how many entries were written.
///
/// Without a buffer only the total is reported.
pub fn fill_buffer<T: Clone>(items: &[T], out: Option<&mut [T]>) -> (usize, SkStatus) {
    let Some(out) = out else {
        return (items.len(), SkStatus::Success);
    };
    let written = items.len().min(out.len());
    out[..written].clone_from_slice(&items[..written]);
    let status = if written < items.len() {
        SkStatus::Incomplete
    } else {
        SkStatus::Success
    };
    (written, status)
}
