//! Assistant runtime: the Azure OpenAI assistants client, the conversation
//! flow that turns a Slack message into a detected action, and the mapping
//! from that action to the next Slack form.
//!
//! ```text
//! Slack message → ConversationService → thread/run (Azure) → detect_action
//!                                                      ↓
//!                                   ActionRouter → Form → Slack
//! ```

pub mod assistant;
pub mod conversation;
pub mod router;

pub use assistant::{AssistantApi, AssistantClient, AssistantError};
pub use conversation::{AddMessageOutcome, ConversationError, ConversationService, ConversationSettings};
pub use router::{confirm_close_thread_message, ActionRouter};
