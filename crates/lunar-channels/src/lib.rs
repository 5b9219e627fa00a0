// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Channel connectors normalize per-channel message shapes into a common
//! [`Envelope`] and deliver the agent loop's reply back in the channel's
//! own shape.

mod channel;
pub mod cli;
pub mod http;
pub mod telegram;
pub mod websocket;

pub use channel::{Attachment, AttachmentKind, BoxFuture, ChatType, Channel, Envelope, InboundHandler, split_reply};
pub use cli::CliChannel;
pub use telegram::TelegramChannel;
