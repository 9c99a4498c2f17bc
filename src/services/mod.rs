pub mod chat;
pub mod conversation;
pub mod database;
pub mod export;
pub mod session;
pub mod settings;
pub mod simple_chat;
pub mod store;

pub use database::Database;
pub use session::{ChatController, ChatState};
pub use settings::SettingsService;
pub use simple_chat::SimpleChat;
pub use store::ConversationStore;
