pub mod action_registry;
pub mod actions;
pub mod approval;
pub mod catalog;
pub mod config;
pub mod error;
pub mod persistence;
pub mod reducer;
pub mod render;
pub mod schema;
pub mod session;
pub mod state;
pub mod store;

pub use action_registry::*;
pub use actions::*;
pub use approval::*;
pub use config::*;
pub use error::*;
pub use reducer::*;
pub use render::*;
pub use schema::*;
pub use session::*;
pub use state::*;
pub use store::*;

pub use persistence::*;
