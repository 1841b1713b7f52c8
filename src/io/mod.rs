mod fs_store;
mod s3_store;
mod store;

pub use fs_store::FsStore;
pub use s3_store::{create_s3_client, S3Store};
pub use store::{MemoryStore, TileStore};
