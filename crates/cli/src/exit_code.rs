// Consistent exit codes for the marginalia CLI.
//
//   0  = success
//   1  = general error
//   2  = configuration error
//   11 = authentication error
//   12 = more than one notes document for the collection
//   13 = network error

use marginalia_store::transport::TransportError;
use marginalia_store::StoreError;

/// Named exit codes for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    Error = 1,
    Config = 2,
    Auth = 11,
    Conflict = 12,
    Network = 13,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Map an anyhow error to an exit code by inspecting the error chain.
    pub fn from_error(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if let Some(store_err) = cause.downcast_ref::<StoreError>() {
                return Self::from_store_error(store_err);
            }
            if let Some(transport_err) = cause.downcast_ref::<TransportError>() {
                return Self::from_transport_error(transport_err);
            }
        }
        Self::Error
    }

    fn from_store_error(err: &StoreError) -> Self {
        match err {
            StoreError::Transport(transport_err) => Self::from_transport_error(transport_err),
            StoreError::TooManyDocuments(_) => Self::Conflict,
            StoreError::Config(_) => Self::Config,
            StoreError::NoBackingDocument | StoreError::Discarded => Self::Error,
        }
    }

    fn from_transport_error(err: &TransportError) -> Self {
        match err {
            TransportError::Auth(_) => Self::Auth,
            TransportError::Network(_) => Self::Network,
            _ => Self::Error,
        }
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code.code() as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn exit_code_values() {
        assert_eq!(ExitCode::Success.code(), 0);
        assert_eq!(ExitCode::Error.code(), 1);
        assert_eq!(ExitCode::Config.code(), 2);
        assert_eq!(ExitCode::Auth.code(), 11);
        assert_eq!(ExitCode::Conflict.code(), 12);
        assert_eq!(ExitCode::Network.code(), 13);
    }

    #[test]
    fn too_many_documents_is_a_conflict() {
        let err = anyhow::Error::new(StoreError::TooManyDocuments(2));
        assert_eq!(ExitCode::from_error(&err), ExitCode::Conflict);
    }

    #[test]
    fn store_error_behind_context_is_found() {
        let auth = TransportError::Auth("expired".into());
        let result: Result<(), StoreError> = Err(StoreError::Transport(auth));
        let err = result.context("notes document unreachable").unwrap_err();
        assert_eq!(ExitCode::from_error(&err), ExitCode::Auth);
    }

    #[test]
    fn bare_transport_errors_are_mapped() {
        let err = anyhow::Error::new(TransportError::Network("connection reset".into()));
        assert_eq!(ExitCode::from_error(&err), ExitCode::Network);
    }

    #[test]
    fn generic_error_is_error() {
        let err = anyhow::anyhow!("something went wrong");
        assert_eq!(ExitCode::from_error(&err), ExitCode::Error);
    }
}
