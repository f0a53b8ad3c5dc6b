//! Core Quill library (API client, session, token store, config).

pub mod api;
pub mod auth;
pub mod config;
