//! Symbolic code-intelligence core for an AI coding-agent toolkit.
//!
//! This crate is a language-agnostic wrapper over the Language Server
//! Protocol: it starts, multiplexes, and recovers per-language LSP servers
//! ([`lsp_handler`]); normalizes their heterogeneous responses into a single
//! symbol model ([`symbol`]); exposes a name-path-addressed query façade
//! over that model ([`retriever`]); offers a symbol-aware editor that
//! performs structural insertions, replacements, and deletions safely
//! ([`editor`]); caches expensive document-symbol queries on disk
//! ([`host::cache`]); and schedules tool invocations over this core on a
//! single-worker executor with strict ordering, timeout, and cancellation
//! semantics ([`executor`]).
//!
//! The MCP transport, prompt templates, CLI surface beyond a thin
//! convenience binary, web dashboard, and per-language LSP runtime-dependency
//! downloaders are external collaborators to this core and are not
//! implemented here — see [`config`] for the one CLI surface this crate does
//! own (enough to exercise the core directly).
//!
//! # Components
//!
//! | Component | Module |
//! |---|---|
//! | JSON-RPC framer | [`rpc`] |
//! | LSP handler (process lifecycle, request/response correlation) | [`lsp_handler`] |
//! | Language-server host (the public façade) | [`host`] |
//! | Symbol model & name-path resolution | [`symbol`] |
//! | Symbol retriever | [`retriever`] |
//! | Symbol-aware editor | [`editor`] |
//! | Agent executor (serial scheduling, tool activation) | [`executor`] |
//! | Error taxonomy | [`error`] |
//! | Language detection & ignore-rule support | [`language`] |

pub mod config;
pub mod editor;
pub mod error;
pub mod executor;
pub mod host;
pub mod language;
pub mod lsp_handler;
pub mod retriever;
pub mod rpc;
pub mod symbol;

pub use error::CoreError;
pub use executor::{AgentExecutor, LinesRead};
pub use host::project_config::ProjectConfig;
pub use host::Host;
pub use retriever::{LanguageServerRetriever, SymbolRetriever};
pub use symbol::{Location, Position, Range, UnifiedSymbol};
