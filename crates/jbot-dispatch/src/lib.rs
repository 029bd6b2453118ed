pub mod autoreply;
pub mod builtin_commands;
pub mod chatter;
pub mod classify;
pub mod commands;
pub mod error;
pub mod fonts;
pub mod pipeline;
pub mod reply;
pub mod shellout;

pub use commands::{CommandRegistry, Outcome};
pub use error::{DispatchError, Result};
pub use pipeline::DispatchKernel;
