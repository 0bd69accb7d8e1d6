pub mod conversation;
pub mod persistence;

pub use conversation::ConversationState;
pub use persistence::{ConversationStore, SavedConversation, SavedMessage};
