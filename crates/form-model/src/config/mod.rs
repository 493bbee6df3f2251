pub mod control;
pub mod form;

pub use control::{ControlConfig, ControlType};
pub use form::{FormConfig, TabConfig, VisibilityGroupConfig};
