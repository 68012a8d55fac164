//! Shared key generation for storage providers.
//!
//! Key format: `{yyyy}/{mm}/{dd}/{uuid-v4}{ext}`, using the local calendar date.

use chrono::{DateTime, Datelike, Local, TimeZone};
use uuid::Uuid;

/// Generate a fresh object key for `filename`.
///
/// The extension (with its leading dot) is taken from the last path component;
/// names without one, and dotfiles such as `.env`, get no suffix. All providers
/// must use this so keys look the same regardless of vendor.
pub fn generate_key(filename: &str) -> String {
    generate_key_at(&Local::now(), filename)
}

pub(crate) fn generate_key_at<Tz: TimeZone>(now: &DateTime<Tz>, filename: &str) -> String {
    format!(
        "{}/{:02}/{:02}/{}{}",
        now.year(),
        now.month(),
        now.day(),
        Uuid::new_v4(),
        extension(filename)
    )
}

/// Extension of the last path component, including the dot, or `""`.
pub fn extension(filename: &str) -> &str {
    let base = filename
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(filename);

    match base.rfind('.') {
        Some(0) | None => "",
        Some(idx) => &base[idx..],
    }
}
