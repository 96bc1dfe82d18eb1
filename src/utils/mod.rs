//! Utility modules.

pub mod file;
pub mod retry;
pub mod text;

pub use file::{calculate_checksum, file_extension, sanitize_filename, write_temp_upload};
pub use retry::{RetryConfig, RetryResult, Retryable, retry, with_retry};
pub use text::{has_meaningful_content, normalize_extracted};
