pub mod replica;
pub mod syncer;


pub use replica::Replica;
pub use syncer::{SyncCallback, SyncError, SyncListener, Syncer};
