//! Background task entities.

pub mod args;
pub mod model;
pub mod status;

pub use args::{ENTITY_MARKER, EntityRef, TaskArg, TaskArgs};
pub use model::{NewTask, Task};
pub use status::TaskStatus;
