//! Route handlers for the HTTP API.

pub mod admin;
pub mod artifacts;
pub mod config;
pub mod health;
pub mod upload;
