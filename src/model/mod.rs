//! Addressable entities, the commands that change them and the events they produce.

pub mod address;
pub mod command;
pub mod event;
pub mod snapshot;

pub use address::{AddressError, AddressType, XAddress, XId};
pub use command::{CommandResult, Intent, Revision, XCommand};
pub use event::{EventKind, XEvent};
pub use snapshot::{FieldSnapshot, ModelSnapshot, ObjectSnapshot};
