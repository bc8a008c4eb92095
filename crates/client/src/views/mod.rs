//! Pages.

pub mod create_request;
pub mod home;
pub mod layout;
pub mod terms;

pub use create_request::CreateRequest;
pub use home::Home;
pub use layout::AppLayout;
pub use terms::Terms;
