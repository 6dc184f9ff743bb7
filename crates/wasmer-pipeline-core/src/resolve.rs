//! Source and credential resolution.

use tracing::debug;

use crate::directory::{Directory, DirectoryId};
use crate::secret::{Secret, SecretId};
use crate::session::Session;

/// Name the deploy credential is registered under.
pub const WASMER_TOKEN: &str = "WASMER_TOKEN";

/// What a job was told to build or deploy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRef {
    /// A host path, or the textual id of a directory registered earlier.
    Path(String),
    /// A directory handle produced earlier in the run.
    Directory(Directory),
}

impl Default for SourceRef {
    fn default() -> Self {
        Self::Path(".".to_string())
    }
}

impl From<&str> for SourceRef {
    fn from(value: &str) -> Self {
        Self::Path(value.to_string())
    }
}

impl From<String> for SourceRef {
    fn from(value: String) -> Self {
        Self::Path(value)
    }
}

impl From<Directory> for SourceRef {
    fn from(value: Directory) -> Self {
        Self::Directory(value)
    }
}

/// An explicitly passed deploy credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenRef {
    /// A raw token, or the textual id of a secret registered earlier.
    Raw(String),
    /// A secret handle.
    Secret(Secret),
}

impl From<&str> for TokenRef {
    fn from(value: &str) -> Self {
        Self::Raw(value.to_string())
    }
}

impl From<String> for TokenRef {
    fn from(value: String) -> Self {
        Self::Raw(value)
    }
}

impl From<Secret> for TokenRef {
    fn from(value: Secret) -> Self {
        Self::Secret(value)
    }
}

/// Resolve a source reference to a directory.
///
/// A string is first looked up as a directory id; anything that is not a
/// known id is treated as a host path. This never fails.
pub fn resolve_directory(session: &Session, src: &SourceRef) -> Directory {
    match src {
        SourceRef::Directory(directory) => directory.clone(),
        SourceRef::Path(value) => {
            if let Some(directory) = value
                .parse::<DirectoryId>()
                .ok()
                .and_then(|id| session.load_directory(&id))
            {
                debug!(id = %directory.id(), "Resolved source from directory id");
                return directory;
            }
            session.host_directory(value.as_str())
        }
    }
}

/// Resolve the deploy credential.
///
/// `env_token` is the value of `WASMER_TOKEN` read at the process boundary;
/// when present it takes precedence over `token`. Empty strings count as
/// absent.
pub fn resolve_credential(
    session: &Session,
    env_token: Option<&str>,
    token: Option<&TokenRef>,
) -> Option<Secret> {
    if let Some(value) = env_token.filter(|v| !v.is_empty()) {
        debug!("Using deploy credential from the environment");
        return Some(session.set_secret(WASMER_TOKEN, value));
    }

    match token? {
        TokenRef::Raw(value) if value.is_empty() => None,
        TokenRef::Raw(value) => {
            if let Some(secret) = value
                .parse::<SecretId>()
                .ok()
                .and_then(|id| session.load_secret(&id))
            {
                return Some(secret);
            }
            Some(session.set_secret(WASMER_TOKEN, value.as_str()))
        }
        TokenRef::Secret(secret) => Some(secret.clone()),
    }
}

/// Whether [`resolve_credential`] would find a credential, without
/// registering anything.
pub fn has_credential(env_token: Option<&str>, token: Option<&TokenRef>) -> bool {
    if env_token.is_some_and(|v| !v.is_empty()) {
        return true;
    }
    match token {
        Some(TokenRef::Raw(value)) => !value.is_empty(),
        Some(TokenRef::Secret(_)) => true,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_plain_path_falls_back_to_host_directory() {
        let session = Session::new();
        let dir = resolve_directory(&session, &SourceRef::from("./my-app"));
        assert_eq!(dir.path(), Path::new("./my-app"));
    }

    #[test]
    fn test_same_path_resolves_to_same_directory() {
        let session = Session::new();
        let a = resolve_directory(&session, &SourceRef::from("."));
        let b = resolve_directory(&session, &SourceRef::from("."));
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn test_directory_id_string_resolves_to_registered_directory() {
        let session = Session::new();
        let output = session.register_directory("/tmp/wasm32-wasmer-wasi");
        let dir = resolve_directory(&session, &SourceRef::from(output.id().to_string()));
        assert_eq!(dir, output);
    }

    #[test]
    fn test_unknown_directory_id_is_treated_as_path() {
        let session = Session::new();
        let stale = DirectoryId::new().to_string();
        let dir = resolve_directory(&session, &SourceRef::from(stale.clone()));
        assert_eq!(dir.path(), Path::new(&stale));
    }

    #[test]
    fn test_directory_handle_is_returned_unchanged() {
        let session = Session::new();
        let other = Session::new().register_directory("/elsewhere");
        let dir = resolve_directory(&session, &SourceRef::Directory(other.clone()));
        assert_eq!(dir, other);
    }

    #[test]
    fn test_environment_token_takes_precedence() {
        let session = Session::new();
        let explicit = TokenRef::from("explicit");
        let secret = resolve_credential(&session, Some("from-env"), Some(&explicit)).unwrap();
        assert_eq!(secret.expose(), "from-env");
        assert_eq!(secret.name(), WASMER_TOKEN);
    }

    #[test]
    fn test_raw_token_is_wrapped() {
        let session = Session::new();
        let secret = resolve_credential(&session, None, Some(&TokenRef::from("raw"))).unwrap();
        assert_eq!(secret.expose(), "raw");
    }

    #[test]
    fn test_secret_id_string_resolves_to_registered_secret() {
        let session = Session::new();
        let stored = session.set_secret(WASMER_TOKEN, "stored");
        let token = TokenRef::from(stored.id().to_string());
        let secret = resolve_credential(&session, None, Some(&token)).unwrap();
        assert_eq!(secret.id(), stored.id());
        assert_eq!(secret.expose(), "stored");
    }

    #[test]
    fn test_secret_handle_is_returned_unchanged() {
        let session = Session::new();
        let stored = session.set_secret(WASMER_TOKEN, "handle");
        let secret =
            resolve_credential(&session, None, Some(&TokenRef::Secret(stored.clone()))).unwrap();
        assert_eq!(secret, stored);
    }

    #[test]
    fn test_absent_credential() {
        let session = Session::new();
        assert!(resolve_credential(&session, None, None).is_none());
        assert!(resolve_credential(&session, Some(""), Some(&TokenRef::from(""))).is_none());
    }

    #[test]
    fn test_has_credential_agrees_with_resolution() {
        let session = Session::new();
        let stored = session.set_secret(WASMER_TOKEN, "stored");
        let cases = [
            (None, None),
            (Some(""), None),
            (Some(""), Some(TokenRef::from(""))),
            (Some("env"), None),
            (None, Some(TokenRef::from("raw"))),
            (None, Some(TokenRef::Secret(stored))),
        ];

        for (env, token) in &cases {
            assert_eq!(
                has_credential(*env, token.as_ref()),
                resolve_credential(&session, *env, token.as_ref()).is_some(),
                "env={:?} token={:?}",
                env,
                token
            );
        }
    }
}
