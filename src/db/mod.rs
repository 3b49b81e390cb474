pub mod storage;

pub use storage::FileStorage;
pub use storage::MemoryStorage;
pub use storage::Storage;
pub use storage::StorageExt;
pub use storage::StorageKey;
