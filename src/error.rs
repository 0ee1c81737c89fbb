//! Crate-wide error taxonomy.

use thiserror::Error;

/// Errors surfaced by configuration, acquisition, and fatal worker paths.
///
/// Parse and encoding failures from the command parser are *not* routed
/// through this type: they are reported directly to the local sink and the
/// offending command is dropped, per the parser's own contract.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to acquire {endpoint}: {source}")]
    Acquire {
        endpoint: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type HexResult<T> = std::result::Result<T, Error>;
