use loadstone_core::Name;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("no module metadata at {path}")]
    MissingMetadata { path: PathBuf },
    #[error("failed to parse module metadata at {path}: {source}")]
    MetadataParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cyclic dependency involving module '{module}'")]
    CyclicDependency { module: Name },
}

pub type Result<T> = std::result::Result<T, ModuleError>;

impl ModuleError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
