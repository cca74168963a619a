use std::io;
use thiserror::Error;

/// Every failure a credential operation can surface. All variants are
/// terminal for the operation that produced them; nothing is retried.
#[derive(Debug, Error)]
pub enum Error {
    #[error("a service named '{0}' is already registered")]
    DuplicateService(String),

    #[error("no service named '{0}' is registered")]
    ServiceNotFound(String),

    /// Capture failures are deliberately opaque: the user-facing text never
    /// changes, the underlying cause is kept only for diagnostics.
    #[error("the image capture failed or the user canceled")]
    Capture { cause: Option<String> },

    #[error("cannot read image file '{path}'")]
    ImageRead {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid QR image, try again")]
    Decode,

    #[error("invalid otpauth URI: bad or missing '{param}'")]
    InvalidUri { param: String },

    #[error("invalid credential: {0}")]
    InvalidCredential(&'static str),

    #[error("cannot access the service store")]
    Store(#[source] io::Error),

    #[error("the service store is corrupt")]
    StoreFormat(#[source] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid_uri(param: &str) -> Self {
        Error::InvalidUri {
            param: param.to_string(),
        }
    }
}
