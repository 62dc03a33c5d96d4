pub mod error;
pub mod file;
pub mod memory;
pub mod store;

pub use error::StorageError;
pub use file::JsonDirStore;
pub use memory::MemoryStore;
pub use store::{validate_user_name, ProfileStore, GUEST};
