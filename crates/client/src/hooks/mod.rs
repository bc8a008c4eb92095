//! Hooks binding the data-access core to components.

pub mod use_connection_state;
pub mod use_dependent_selection;
pub mod use_query;

pub use use_connection_state::use_connection_state;
pub use use_dependent_selection::{use_dependent_selection, SelectionHandle};
pub use use_query::{use_query, use_subscription, QueryHandle};
