use es4c_core::error::Es4cError;
use thiserror::Error;

/// Failures talking to the directory.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("LDAP connect failed: {0}")]
    Connect(String),

    #[error("LDAP bind failed: {0}")]
    Bind(String),

    /// The request never got a response (connection dropped, protocol error).
    #[error("LDAP {op} failed: {message}")]
    Transport { op: &'static str, message: String },

    /// The server answered with a non-success result code.
    #[error("LDAP {op} rejected: {message}")]
    Rejected { op: &'static str, message: String },

    #[error("no such user: {0}")]
    NoSuchUser(String),

    #[error("unexpected directory data: {0}")]
    InvalidData(String),
}

pub type DirectoryResult<T> = std::result::Result<T, DirectoryError>;

impl From<DirectoryError> for Es4cError {
    fn from(e: DirectoryError) -> Self {
        Es4cError::Directory(e.to_string())
    }
}
