//! Outbound message formatting and per-recipient delivery ordering for
//! channel adapters (Telegram, Discord, WebChat, …).
//!
//! [`format::format_for_channel`] strips markdown for targets that don't
//! render it and chunks content to a transport's length limit.
//! [`queue::DeliveryQueue`] guarantees at most one in-flight delivery per
//! `(channel, recipient)` pair, queuing the rest FIFO. [`manager::ChannelManager`]
//! ties both together with the registered [`channel::Channel`] adapters.
//!
//! Real transports (Telegram, Discord, Twilio, WhatsApp, …) are out of
//! scope; [`adapters::LoggingChannel`] and [`adapters::LoopbackChannel`]
//! ship as reference adapters for local development and tests.

pub mod adapters;
pub mod channel;
pub mod error;
pub mod format;
pub mod manager;
pub mod queue;
pub mod types;

pub use adapters::{LoggingChannel, LoopbackChannel};
pub use channel::Channel;
pub use error::ChannelError;
pub use format::format_for_channel;
pub use manager::ChannelManager;
pub use queue::DeliveryQueue;
pub use types::{
    ChannelCapabilities, ChannelStatus, InboundMessage, MessageFormat, OutboundMessage,
};
