//! Host triple selection for the wasix toolchain.

use crate::{ConfigError, ConfigResult};

/// Map an OS and architecture to the triple wasix toolchain archives are
/// published for.
///
/// Accepts both Rust-style names (`x86_64`, `aarch64`, `macos`) and the
/// names the Docker daemon reports (`amd64`, `arm64`, `darwin`).
pub fn host_triple(os: &str, arch: &str) -> ConfigResult<&'static str> {
    let arch = match arch {
        "amd64" => "x86_64",
        "arm64" => "aarch64",
        other => other,
    };

    match os {
        "linux" => match arch {
            "x86_64" => Ok("x86_64-unknown-linux-gnu"),
            _ => Err(ConfigError::UnsupportedArchitecture(arch.to_string())),
        },
        "macos" | "darwin" => match arch {
            "x86_64" => Ok("x86_64-apple-darwin"),
            "aarch64" => Ok("aarch64-apple-darwin"),
            _ => Err(ConfigError::UnsupportedArchitecture(arch.to_string())),
        },
        _ => Err(ConfigError::UnsupportedOs(os.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_triples() {
        assert_eq!(host_triple("linux", "x86_64").unwrap(), "x86_64-unknown-linux-gnu");
        assert_eq!(host_triple("linux", "amd64").unwrap(), "x86_64-unknown-linux-gnu");
        assert_eq!(host_triple("macos", "x86_64").unwrap(), "x86_64-apple-darwin");
        assert_eq!(host_triple("darwin", "arm64").unwrap(), "aarch64-apple-darwin");
    }

    #[test]
    fn test_unsupported_platforms() {
        assert!(matches!(
            host_triple("linux", "arm64"),
            Err(ConfigError::UnsupportedArchitecture(arch)) if arch == "aarch64"
        ));
        assert!(matches!(
            host_triple("windows", "x86_64"),
            Err(ConfigError::UnsupportedOs(_))
        ));
    }
}
