pub mod args;
pub mod channel_state;
pub mod config;
pub mod counters;
pub mod error;
pub mod store;
pub mod throttle;
pub mod types;

pub use channel_state::{AutoReplyEntry, ChannelState, UserInfo};
pub use config::JbotConfig;
pub use counters::Counters;
pub use error::{JbotError, Result};
pub use store::ChannelStore;
pub use types::{ChatType, Command, CommandFn, Recipient};
