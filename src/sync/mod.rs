//! Optimistic replication of models against a remote store.
//!
//! Commands are applied to a local [`Replica`] at once and queued. A
//! [`Syncer`] round sends the queue to the server together with a request
//! for every event since the last confirmed revision, then rewrites the
//! replica to the server's history and settles each queued command.

pub mod engine;
pub mod remote;
pub mod runtime;

pub use engine::{ChangeNotification, CommandCallback, SyncOutcome, SyncReport};
pub use remote::{MemoryPersistence, PersistenceRemoteStore, RemoteError, RemoteStore};
pub use runtime::{Replica, SyncCallback, SyncError, SyncListener, Syncer};
