// Error taxonomy for the crate. Only `Authentication` aborts the process;
// remote failures are reported at the call site and batch flows continue,
// input problems re-prompt, and persistence problems are logged and skipped.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// No usable credential could be produced by any path. Fatal at startup.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Reading or writing the persisted token failed. Callers log this and
    /// fall through to the next credential source.
    #[error("credential persistence ({}): {message}", path.display())]
    CredentialPersistence { path: PathBuf, message: String },

    /// A remote call failed, either in transport or with a non-success
    /// status. Upload drivers report it and move on to the next item.
    #[error("remote operation failed: {0}")]
    RemoteOperation(String),

    /// A required interactive field was missing or unusable.
    #[error("{0}")]
    UserInput(String),

    /// The file-picker worker did not answer within the wait window.
    #[error("file picker did not respond within {0} seconds")]
    DialogTimeout(u64),
}

pub type Result<T> = std::result::Result<T, Error>;
