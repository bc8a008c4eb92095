//! Reusable components.

pub mod area_selection;
pub mod ui;

pub use area_selection::AreaSelection;
