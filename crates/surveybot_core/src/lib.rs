pub mod api;
pub mod classify;
pub mod config;
pub mod content;
pub mod context;
pub mod editor;
#[cfg(any(test, feature = "testing"))]
pub mod fake;
pub mod logging;
pub mod reconcile;
pub mod replica;
pub mod runtime;
pub mod stream;
pub mod title;
