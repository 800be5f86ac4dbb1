//! # AA Chat
//!
//! A retrieval-grounded chat front end for Alcoholics Anonymous literature.
//!
//! Every question goes to a hosted retrieval pipeline for passages, then to
//! a hosted chat-completion model together with those passages. Nothing
//! about search or generation happens locally; this crate owns the chat
//! sessions, the prompt, and the surfaces.
//!
//! ## Architecture
//!
//! ```text
//!  ┌──────────┐  ┌──────────┐  ┌──────────┐
//!  │ Web page │  │   chat   │  │   ask    │
//!  │ (axum)   │  │ (stdin)  │  │ (1-shot) │
//!  └────┬─────┘  └────┬─────┘  └────┬─────┘
//!       └─────────────┼─────────────┘
//!                     ▼
//!            ┌─────────────────┐      ┌────────────┐
//!            │ ChatController  │─────▶│ Retriever  │ LlamaCloud
//!            │ + ChatSession   │      └────────────┘
//!            │                 │      ┌────────────┐
//!            │                 │─────▶│ Completer  │ OpenRouter
//!            └─────────────────┘      └────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment secrets |
//! | [`models`] | Turns, transcript, retrieved passages |
//! | [`prompt`] | Context block and persona for each variant |
//! | [`gate`] | Shared-password visibility gate |
//! | [`session`] | Per-session state and the session store |
//! | [`retrieval`] | Retrieval service client |
//! | [`completion`] | Completion service client |
//! | [`controller`] | One chat turn, end to end |
//! | [`server`] | HTTP server and JSON API |
//! | [`page`] | Chat page and copy |
//! | [`terminal`] | `chat` and `ask` commands |

pub mod completion;
pub mod config;
pub mod controller;
pub mod gate;
pub mod models;
pub mod page;
pub mod prompt;
pub mod retrieval;
pub mod server;
pub mod session;
pub mod terminal;
