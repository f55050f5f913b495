pub mod catalog;
pub mod discovery;
pub mod enrichment;
pub mod entities;
pub mod environments;
pub mod infrastructure;
pub mod manifest;
pub mod normalizer;
pub mod relations;
pub mod remote;
pub mod store;
#[cfg(test)]
mod test_support;

use std::io;

use thiserror::Error;

use crate::remote::RemoteError;
use crate::store::StoreError;

#[remain::sorted]
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("entity `{0}` already exists in the catalog")]
    DuplicateEntity(String),

    /// Error that may occur while I/O operations.
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("failed to list projects in group {group}: {source}")]
    ListProjects {
        group: String,
        #[source]
        source: RemoteError,
    },

    #[error("failed to decode manifest document {index}: {source}")]
    ManifestDocument {
        index: usize,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("manifest syntax error in document {index}: {message}")]
    ManifestSyntax { index: usize, message: String },

    #[error("GitLab group to scan is not configured")]
    MissingGroupToScan,

    #[error("failed to decode {kind} spec for {name}: {source}")]
    SpecDecode {
        kind: String,
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type CatalogResult<T> = Result<T, CatalogError>;
