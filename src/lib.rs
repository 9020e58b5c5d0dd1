// Sovereign Start Page Library Entry Point
// This file exposes all modules so they can be imported by main.rs
// and tested independently.

// Errors shared by every layer
pub mod error;

// Shared state
pub mod state;
pub mod settings;

// Persistence
pub mod storage;
pub mod store;

// Runtime configuration
pub mod config;

// Pure logic modules (no storage or UI state)
pub mod modules;

// View binder tying the store to the document
pub mod page;

pub use error::{ReorderError, StorageError, StoreError};
pub use page::StartPage;
pub use state::{CollectionId, Entity, SearchEngine, Site, StoreChange};
pub use store::Store;
