pub mod archive;
pub mod attempt;
pub mod backup;
pub mod client;
pub mod config;
pub mod fallback;
pub mod model;
pub mod pipeline;
pub mod reconcile;
pub mod restore;

#[cfg(test)]
mod mock;
