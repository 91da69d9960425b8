//! Session domain services used by the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own the authentication state machine so route handlers
//! can stay focused on protocol translation.

pub mod callback;
pub mod session;
pub mod status;
