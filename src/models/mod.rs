pub mod conversation;
pub mod message;

use chrono::{DateTime, SubsecRound, Utc};

pub use conversation::Conversation;
pub use message::{Message, Role};

/// Current time truncated to the millisecond precision used on disk, so
/// timestamps survive a save/load cycle unchanged.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}
