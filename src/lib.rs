//! flashdeck: flashcard deck backend in Rust
//!
//! Users register and log in with bearer tokens, create decks and manage the
//! two-sided cards inside them. Storage is Sled (JSON records per tree),
//! the HTTP surface is Axum.

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
// Credential and deck stores over Sled
pub mod storage;
// Registration, login and token validation
pub mod auth;
// Ownership, limits and card mutations
pub mod decks;
// REST API module: Axum handlers, CORS, OpenAPI
pub mod rest;
