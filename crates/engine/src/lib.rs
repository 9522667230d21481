pub mod dispatcher;
pub mod taskgen;

pub use dispatcher::{DispatchError, DispatchOptions, NotificationDispatcher};
pub use taskgen::{FollowUp, TaskGenerator};
