//! Environment read at the process boundary.
//!
//! The pipeline reads its environment once, when the binary starts, and
//! passes the values down explicitly.

/// Variable holding the Wasmer Edge deploy token.
pub const WASMER_TOKEN: &str = "WASMER_TOKEN";
/// Variable overriding the cargo-wasix release.
pub const CARGO_WASIX_VERSION: &str = "CARGO_WASIX_VERSION";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineEnv {
    /// Deploy token; takes precedence over any token passed explicitly.
    pub wasmer_token: Option<String>,
    pub cargo_wasix_version: Option<String>,
}

impl PipelineEnv {
    /// Read the current process environment.
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Build from an iterator of variables. Empty values count as unset.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut env = Self::default();
        for (key, value) in vars {
            let slot = match key.as_ref() {
                WASMER_TOKEN => &mut env.wasmer_token,
                CARGO_WASIX_VERSION => &mut env.cargo_wasix_version,
                _ => continue,
            };
            let value = value.into();
            if !value.is_empty() {
                *slot = Some(value);
            }
        }
        env
    }
}

impl std::fmt::Display for PipelineEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}={} {}={}",
            WASMER_TOKEN,
            if self.wasmer_token.is_some() { "set" } else { "unset" },
            CARGO_WASIX_VERSION,
            self.cargo_wasix_version.as_deref().unwrap_or("unset"),
        )
    }
}
