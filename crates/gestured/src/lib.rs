//! Gesture-switch daemon library - exposes modules for testing.

pub mod bus;
pub mod classifier;
pub mod debounce;
pub mod decoder;
pub mod dispatcher;
pub mod feed;
pub mod ledger;
pub mod pipeline;
pub mod store;
pub mod sync;
