//! Access control and optimistic model synchronization for Xydra-style
//! repositories of models, objects and fields.

pub mod authorisation;
pub mod config;
pub mod listeners;
pub mod model;
pub mod sync;
