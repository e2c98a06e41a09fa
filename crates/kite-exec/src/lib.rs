pub mod agent;
pub mod contracts;
pub mod driver;
pub mod error;
pub mod identity;
pub mod transport;

pub use agent::*;
pub use contracts::*;
pub use driver::*;
pub use error::*;
pub use identity::*;
pub use transport::*;
