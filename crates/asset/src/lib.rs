pub mod asset;
pub mod asset_type;
pub mod error;
pub mod manager;
pub mod producer;
pub mod resolve;
pub mod source_producer;

pub use asset::{Asset, AssetData, AssetFactory};
pub use asset_type::{AssetRef, AssetType};
pub use error::{AssetError, Result};
pub use manager::AssetManager;
pub use producer::AssetDataProducer;
pub use resolve::{ContextPreferredStrategy, ResolutionStrategy};
pub use source_producer::{AssetFileFormat, FileSourceProducer};
