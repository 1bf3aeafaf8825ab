//! Channel names and their mapping onto request paths.

/// Punctuation allowed in a channel name besides ASCII letters and digits.
const ALLOWED_PUNCTUATION: &[char] = &['-', '.', '_', '~', '/', ':', '@'];

/// A channel name that cannot be carried in a request path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid channel name {channel:?}: {reason}")]
pub struct InvalidChannel {
    pub channel: String,
    pub reason: &'static str,
}

/// Check that `channel` is non-empty and path-safe.
pub fn validate_channel(channel: &str) -> Result<(), InvalidChannel> {
    let reason = if channel.is_empty() {
        "must not be empty"
    } else if channel.starts_with('/') {
        "must not start with '/'"
    } else if !channel
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || ALLOWED_PUNCTUATION.contains(&c))
    {
        "only ASCII letters, digits and -._~/:@ are allowed"
    } else {
        return Ok(());
    };

    Err(InvalidChannel {
        channel: channel.to_string(),
        reason,
    })
}

/// Request path for `channel`: `/<channel>`.
pub(crate) fn channel_path(channel: &str) -> String {
    format!("/{channel}")
}

/// Channel named by a request path, or `None` when the path is malformed.
pub(crate) fn channel_from_path(path: &str) -> Option<&str> {
    path.strip_prefix('/')
        .filter(|channel| validate_channel(channel).is_ok())
}
