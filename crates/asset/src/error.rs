use loadstone_core::ResourceUrn;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetError {
    /// Reload or copy requested on a disposed asset. This is a programmer
    /// error: disposed means unusable.
    #[error("asset {urn} is disposed")]
    Disposed { urn: ResourceUrn },
    #[error("asset type {type_name} is closed")]
    TypeClosed { type_name: &'static str },
    #[error("no asset type registered for {type_name}")]
    UnknownAssetType { type_name: &'static str },
    #[error("failed to build asset {urn}: {message}")]
    Build { urn: ResourceUrn, message: String },
    #[error("invalid asset filename: '{filename}'")]
    InvalidFilename { filename: String },
}

pub type Result<T> = std::result::Result<T, AssetError>;
