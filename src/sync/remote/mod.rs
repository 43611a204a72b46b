//! Server-side collaborators of the syncer.

pub mod api;
pub mod memory;
pub mod store;

pub use api::{BatchResponse, Credentials, GetEventsRequest, Persistence, RemoteError, RemoteStore};
pub use memory::MemoryPersistence;
pub use store::PersistenceRemoteStore;
