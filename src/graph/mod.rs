//! Relationship graph: construction, force layout and the live view.

pub mod model;
pub mod render;
pub mod simulation;
pub mod view;

pub use model::Category;
pub use view::{GraphSession, GraphSettings};
