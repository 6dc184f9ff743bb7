//! Secret handles.

use std::fmt;

use crate::id::handle_id;

handle_id!(
    /// Opaque identifier of a secret registered in a [`crate::Session`].
    SecretId,
    "secret"
);

/// A named secret value.
///
/// The value is only reachable through [`Secret::expose`]; formatting a
/// secret never prints it.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret {
    id: SecretId,
    name: String,
    value: String,
}

impl Secret {
    pub(crate) fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: SecretId::new(),
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn id(&self) -> SecretId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the plaintext value.
    pub fn expose(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("value", &"***")
            .finish()
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=***", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_value_is_redacted() {
        let secret = Secret::new("WASMER_TOKEN", "hunter2");
        assert!(!format!("{:?}", secret).contains("hunter2"));
        assert!(!secret.to_string().contains("hunter2"));
        assert_eq!(secret.expose(), "hunter2");
    }

    #[test]
    fn test_secret_id_parsing() {
        let secret = Secret::new("WASMER_TOKEN", "x");
        let parsed: SecretId = secret.id().to_string().parse().unwrap();
        assert_eq!(parsed, secret.id());
        assert!("wasmer-token-value".parse::<SecretId>().is_err());
    }
}
