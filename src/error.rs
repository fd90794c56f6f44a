//! Error taxonomy shared by the catalog, selector, and service layers.
//!
//! A query that is valid but finds nothing above the horizon threshold is *not*
//! an error; see [`crate::Selection::NoneVisible`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SkyguideError {
    /// Malformed coordinates or timestamp. The caller can fix these.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The star catalog is missing, unreadable, or empty.
    #[error("star catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// The observation store could not record or read audit entries.
    #[error("observation store error: {0}")]
    Store(String),
}

impl SkyguideError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub(crate) fn catalog(msg: impl Into<String>) -> Self {
        Self::CatalogUnavailable(msg.into())
    }

    pub(crate) fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, SkyguideError>;
