//! Themis - retrieval-augmented legal assistant backend
//!
//! Two independent paths share one process:
//! - Case search: an immutable in-memory embedding index ranked by cosine
//!   similarity against a freshly embedded query.
//! - Chat: per-question retrieval (keyword extraction -> web search, optional
//!   RAG), grounded prompt assembly, streaming generation with per-session
//!   continuity tokens, durable persistence, and background summarization.

pub mod config;
pub mod corpus;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod generation;
pub mod llm;
pub mod prompt;
pub mod recommend;
pub mod retrieval;
pub mod search;
pub mod server;
pub mod store;
pub mod stream;
pub mod summary;
