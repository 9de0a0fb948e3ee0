pub mod aggregate;
pub mod config;
pub mod github;
pub mod model;
pub mod query;
pub mod refresh;
pub mod render;
pub mod snapshot;
pub mod state;
