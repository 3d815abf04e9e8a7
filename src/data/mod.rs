pub mod feature_store;
pub mod pipeline;
pub mod schema;
pub mod store;
pub mod version;
pub mod version_registry;

pub use schema::CandleRecord;
pub use store::ParquetStore;
pub use version::DatasetVersion;
