use rabj_core::{AddressError, ErrorDetail};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] rabj_core::Error),

    #[error(transparent)]
    Http(#[from] rabj_http::Error),

    #[error("response from {url} is missing '{field}'")]
    MissingField { url: String, field: String },

    #[error("unexpected response from {url}: expected {expected}")]
    UnexpectedShape { url: String, expected: &'static str },
}

impl Error {
    /// The application error detail, when the server reported one.
    pub fn application(&self) -> Option<&ErrorDetail> {
        match self {
            Error::Core(e) => e.application(),
            Error::Http(e) => e.application(),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        match self {
            Error::Core(e) => e.is_transport(),
            Error::Http(e) => e.is_transport(),
            _ => false,
        }
    }

    pub(crate) fn missing(url: impl Into<String>, field: impl Into<String>) -> Self {
        Error::MissingField {
            url: url.into(),
            field: field.into(),
        }
    }

    pub(crate) fn shape(url: impl Into<String>, expected: &'static str) -> Self {
        Error::UnexpectedShape {
            url: url.into(),
            expected,
        }
    }
}

impl From<AddressError> for Error {
    fn from(error: AddressError) -> Self {
        Error::Core(error.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Core(error.into())
    }
}
