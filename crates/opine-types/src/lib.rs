//! Wire and domain types shared by the Opine client crates.
//!
//! `models` holds the server-shaped records the client mirrors locally;
//! `api` holds request bodies and response envelopes.

pub mod api;
pub mod models;
