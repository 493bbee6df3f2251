#![allow(missing_docs)]

pub mod config;
pub mod control;
pub mod dialog;
pub mod error;
pub mod expr;
pub mod function;
pub mod listener;
pub mod model;
pub mod snapshot;
pub mod validate;
pub mod values;
pub mod visibility;

pub use config::{ControlConfig, ControlType, FormConfig, TabConfig, VisibilityGroupConfig};
pub use control::{Control, GroupMembership};
pub use dialog::{Dialog, DialogLibrary, StaticDialog};
pub use error::{ExprError, FormModelError, SnapshotError};
pub use expr::{Comparison, Expr};
pub use function::{AlwaysTrue, ERROR_SENTINEL, Function, FunctionLibrary};
pub use listener::{EventLog, FormEvent, FormValueChangedListener, VisibilityChangedListener};
pub use model::FormModel;
pub use snapshot::{ControlState, FormSnapshot, GroupState};
pub use validate::{ValidationResult, validate};
pub use values::{SimpleValues, Values};
pub use visibility::VisibilityGroup;
