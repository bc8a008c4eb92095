//! Shared types for the relieflink client: operations, wire protocol,
//! domain rows and errors.

pub mod error;
pub mod models;
pub mod operation;
pub mod protocol;

pub use error::*;
pub use models::*;
pub use operation::*;
pub use protocol::*;
