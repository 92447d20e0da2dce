use rabj_core::{AddressError, Error as CoreError};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("configuration error: {message}")]
    Config { message: String },
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    /// True for failures to reach the server or read its reply.
    pub fn is_transport(&self) -> bool {
        match self {
            Error::Core(e) => e.is_transport(),
            Error::Http(_) => true,
            _ => false,
        }
    }

    /// The application error detail, when the server reported one.
    pub fn application(&self) -> Option<&rabj_core::ErrorDetail> {
        match self {
            Error::Core(e) => e.application(),
            _ => None,
        }
    }
}

impl From<AddressError> for Error {
    fn from(error: AddressError) -> Self {
        Error::Core(error.into())
    }
}

impl From<Error> for CoreError {
    fn from(error: Error) -> Self {
        match error {
            Error::Core(e) => e,
            other => CoreError::Transport {
                status: None,
                message: other.to_string(),
                body: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_pass_through_unchanged() {
        let error: Error = CoreError::connection("refused").into();
        assert!(error.is_transport());
        assert_eq!(error.to_string(), "transport error: refused");

        let core: CoreError = error.into();
        assert!(matches!(core, CoreError::Transport { status: None, .. }));
    }

    #[test]
    fn config_errors_become_core_transport_errors() {
        let core: CoreError = Error::config("bad workers").into();
        assert!(core.is_transport());
        assert!(core.to_string().contains("bad workers"));
    }

    #[test]
    fn address_errors_convert() {
        let error: Error = AddressError::EmptySegment { position: 2 }.into();
        assert!(matches!(error, Error::Core(CoreError::Address(_))));
        assert!(!error.is_transport());
    }
}
