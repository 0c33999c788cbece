/// View subsystem - rendering kept apart from editor internals
/// through the ViewModel trait.
pub mod renderer;
pub mod view_model;

pub use renderer::{View, parse_color};
pub use view_model::{CaretPosition, EditorViewModel, StyledRun, ViewModel};
