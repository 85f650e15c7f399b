//! 基础设施层
//!
//! 存储与上传协作方的边界及其本地实现

pub mod memory_store;
pub mod store;
pub mod uploader;

pub use memory_store::MemoryStore;
pub use store::{load_typed, ChangeSet, ResponseTarget, Store, StoreError, Versioned};
pub use uploader::{LocalUploader, PendingUpload, Uploader};
