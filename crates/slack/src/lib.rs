//! Slack interface for hyperbot.
//!
//! - **Socket Mode** (`socket`): websocket event loop with reconnection and reply delivery
//! - **Payloads** (`payload`): decoding of Socket Mode frames and interaction bodies
//! - **Events** (`events`): typed events, dispatcher and per-event service traits
//! - **Slash commands** (`commands`): `/hello`, `/was-chatbot-useful` and the mention reply
//! - **Block Kit** (`blocks`) and the interactive **forms** (`forms`)
//! - **Web API** (`web`): `chat.postMessage`, `users.info`, `apps.connections.open`
//!
//! ```text
//! Slack → SocketModeRunner → EventDispatcher → Services (server::bot)
//!                 ↑                                   ↓
//!           SlackPoster  ←──────── MessageTemplate ───┘
//! ```

pub mod blocks;
pub mod commands;
pub mod events;
pub mod forms;
pub mod payload;
pub mod socket;
pub mod web;

pub use blocks::MessageTemplate;
pub use events::{EventContext, EventDispatcher, SlackEnvelope, SlackEvent};
pub use web::{SlackApiError, SlackPoster, SlackWebClient};
