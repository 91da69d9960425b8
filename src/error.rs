//! Stable error codes shared by every error type that can reach a caller.

/// Machine-readable classification for errors surfaced over HTTP.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}
