#![deny(unsafe_code)]

/// Application shell and window-level actions.
pub mod app;
/// Chat domain contracts and UI components.
pub mod chat;
/// Load-only backend settings.
pub mod settings;
