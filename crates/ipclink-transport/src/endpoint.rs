use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{Result, TransportError};

/// Number of hex characters of the SHA-256 digest kept in an endpoint name.
pub const HASH_LEN: usize = 10;

/// Bytes of OS entropy hashed when no context string is supplied.
pub const RANDOM_CONTEXT_BYTES: usize = 20;

/// Environment variable consulted by [`EndpointOptions::from_env`].
pub const RUNTIME_DIR_VAR: &str = "XDG_RUNTIME_DIR";

/// Placement hints for filesystem-backed endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointOptions {
    /// Directory for socket files. Falls back to the system temp dir when unset.
    pub runtime_dir: Option<PathBuf>,
}

impl EndpointOptions {
    /// Build options from `XDG_RUNTIME_DIR`. Empty values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var_os(key))
    }

    /// Build options from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<OsString>) -> Self {
        let runtime_dir = lookup(RUNTIME_DIR_VAR)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        Self { runtime_dir }
    }

    /// Override the runtime directory.
    pub fn with_runtime_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.runtime_dir = Some(dir.into());
        self
    }
}

/// Address of a local endpoint: a socket file on Unix, a named pipe on Windows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint(PathBuf);

impl Endpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }

    /// Whether the endpoint lives on the filesystem and needs unlinking.
    pub fn is_filesystem_backed(&self) -> bool {
        cfg!(unix)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl AsRef<Path> for Endpoint {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl From<PathBuf> for Endpoint {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

impl From<&Path> for Endpoint {
    fn from(path: &Path) -> Self {
        Self(path.to_path_buf())
    }
}

impl From<String> for Endpoint {
    fn from(path: String) -> Self {
        Self(PathBuf::from(path))
    }
}

impl From<&str> for Endpoint {
    fn from(path: &str) -> Self {
        Self(PathBuf::from(path))
    }
}

/// Derive the endpoint for a server.
///
/// The same non-empty `context` always yields the same endpoint, so
/// cooperating processes can agree on an address ahead of time. Without a
/// context, 20 bytes of OS entropy are hashed instead and every call yields a
/// fresh address. No filesystem access happens here.
pub fn resolve_endpoint(context: Option<&str>, options: &EndpointOptions) -> Result<Endpoint> {
    let hash = match context.filter(|context| !context.is_empty()) {
        Some(context) => endpoint_hash(context.as_bytes()),
        None => {
            let mut entropy = [0u8; RANDOM_CONTEXT_BYTES];
            rand::rngs::OsRng
                .try_fill_bytes(&mut entropy)
                .map_err(TransportError::RandomnessUnavailable)?;
            endpoint_hash(&entropy)
        }
    };

    let endpoint = Endpoint(endpoint_path(&hash, options.runtime_dir.as_deref()));
    debug!(path = %endpoint, "resolved endpoint");
    Ok(endpoint)
}

/// First [`HASH_LEN`] lowercase hex characters of `SHA-256(input)`.
pub fn endpoint_hash(input: &[u8]) -> String {
    let mut digest = hex::encode(Sha256::digest(input));
    digest.truncate(HASH_LEN);
    digest
}

/// Platform endpoint path for `hash`.
#[cfg(windows)]
pub fn endpoint_path(hash: &str, _runtime_dir: Option<&Path>) -> PathBuf {
    pipe_path(hash)
}

/// Platform endpoint path for `hash`.
#[cfg(not(windows))]
pub fn endpoint_path(hash: &str, runtime_dir: Option<&Path>) -> PathBuf {
    socket_path(hash, runtime_dir)
}

/// `\\.\pipe\ipc-<hash>-sock`
pub fn pipe_path(hash: &str) -> PathBuf {
    PathBuf::from(format!(r"\\.\pipe\ipc-{hash}-sock"))
}

/// `<runtime_dir or temp dir>/ipc-<hash>.sock`
pub fn socket_path(hash: &str, runtime_dir: Option<&Path>) -> PathBuf {
    let dir = runtime_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(std::env::temp_dir);
    dir.join(format!("ipc-{hash}.sock"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_ten_lowercase_hex_chars() {
        let hash = endpoint_hash(b"/home/user/project");
        assert_eq!(hash.len(), HASH_LEN);
        assert!(hash
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn hash_matches_sha256_prefix() {
        // sha256("abc") = ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad
        assert_eq!(endpoint_hash(b"abc"), "ba7816bf8f");
    }

    #[test]
    fn same_context_resolves_to_same_endpoint() {
        let options = EndpointOptions::default();
        let first = resolve_endpoint(Some("ctx"), &options).expect("resolve should succeed");
        let second = resolve_endpoint(Some("ctx"), &options).expect("resolve should succeed");
        assert_eq!(first, second);
    }

    #[test]
    fn different_contexts_resolve_differently() {
        let options = EndpointOptions::default();
        let a = resolve_endpoint(Some("ctx-a"), &options).expect("resolve should succeed");
        let b = resolve_endpoint(Some("ctx-b"), &options).expect("resolve should succeed");
        assert_ne!(a, b);
    }

    #[test]
    fn missing_context_resolves_to_fresh_endpoints() {
        let options = EndpointOptions::default();
        let a = resolve_endpoint(None, &options).expect("resolve should succeed");
        let b = resolve_endpoint(None, &options).expect("resolve should succeed");
        assert_ne!(a, b);
    }

    #[test]
    fn empty_context_is_treated_as_missing() {
        let options = EndpointOptions::default();
        let a = resolve_endpoint(Some(""), &options).expect("resolve should succeed");
        let b = resolve_endpoint(Some(""), &options).expect("resolve should succeed");
        assert_ne!(a, b);
    }

    #[test]
    fn socket_path_uses_runtime_dir_when_given() {
        let path = socket_path("0123456789", Some(Path::new("/run/user/1000")));
        assert_eq!(path, PathBuf::from("/run/user/1000/ipc-0123456789.sock"));
    }

    #[test]
    fn socket_path_falls_back_to_temp_dir() {
        let path = socket_path("0123456789", None);
        assert_eq!(path, std::env::temp_dir().join("ipc-0123456789.sock"));
    }

    #[test]
    fn pipe_path_format() {
        assert_eq!(
            pipe_path("0123456789"),
            PathBuf::from(r"\\.\pipe\ipc-0123456789-sock")
        );
    }

    #[cfg(unix)]
    #[test]
    fn resolved_endpoint_lands_in_runtime_dir() {
        let options = EndpointOptions::default().with_runtime_dir("/run/user/42");
        let endpoint = resolve_endpoint(Some("abc"), &options).expect("resolve should succeed");
        assert_eq!(
            endpoint.as_path(),
            Path::new("/run/user/42/ipc-ba7816bf8f.sock")
        );
        assert!(endpoint.is_filesystem_backed());
    }

    #[test]
    fn options_from_lookup_ignores_empty_runtime_dir() {
        let options = EndpointOptions::from_lookup(|_| Some(OsString::new()));
        assert_eq!(options.runtime_dir, None);

        let options = EndpointOptions::from_lookup(|key| {
            (key == RUNTIME_DIR_VAR).then(|| OsString::from("/run/user/7"))
        });
        assert_eq!(options.runtime_dir, Some(PathBuf::from("/run/user/7")));
    }
}
