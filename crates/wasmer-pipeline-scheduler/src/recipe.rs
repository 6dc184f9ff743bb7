//! Container plans for the build and deploy jobs.

use wasmer_pipeline_config::{BuildConfig, DeployConfig};
use wasmer_pipeline_core::{Container, Directory, Job, Secret};

/// Cache volume shared by the build output and the deploy step.
pub const TARGET_CACHE: &str = "wasmer-target-cache";
/// Directory the compiled output is copied to before export.
pub const BUILD_OUTPUT: &str = "/tmp/wasm32-wasmer-wasi";
/// Where sources are copied to in both containers.
pub const APP_DIR: &str = "/app";

const WASIX_TARGET_DIR: &str = "/app/target/wasm32-wasmer-wasi";

/// Plan compiling `source` for wasix.
///
/// Installs cargo-wasix and the wasix toolchain for `triple`, links the
/// toolchain into rustup, then builds in release mode with `extra_args` and
/// copies the output to [`BUILD_OUTPUT`].
pub fn build_container(
    config: &BuildConfig,
    triple: &str,
    source: &Directory,
    exclude: &[String],
    extra_args: &[String],
) -> Container {
    let release_base = format!(
        "https://github.com/wasix-org/rust/releases/download/{}",
        config.wasix_release
    );
    let cargo_wasix = format!("cargo-wasix-{}", triple);
    let toolchain = format!("rust-toolchain-{}", triple);
    let toolchain_home = format!(
        "/root/.local/share/cargo-wasix/{}_{}",
        triple, config.wasix_release
    );

    Container::new(Job::Build.name())
        .from(config.image.as_str())
        .with_exec(["apt", "update"])
        .with_exec(["apt", "install", "-y", "build-essential", "wget"])
        .with_mounted_cache("/root/.cargo/registry", "cargo-registry")
        .with_mounted_cache("/root/.cargo/git", "cargo-git-cache")
        .with_mounted_cache("/app/target", TARGET_CACHE)
        .with_exec([
            "wget".to_string(),
            format!(
                "https://github.com/wasix-org/cargo-wasix/releases/download/{}/{}.tar.xz",
                config.cargo_wasix_version, cargo_wasix
            ),
        ])
        .with_exec(["tar".to_string(), "-xvf".to_string(), format!("{}.tar.xz", cargo_wasix)])
        .with_exec([
            "mv".to_string(),
            format!("{}/cargo-wasix", cargo_wasix),
            "/usr/local/cargo/bin".to_string(),
        ])
        .with_exec(["wget".to_string(), format!("{}/{}.tar.gz", release_base, toolchain)])
        .with_exec([
            "sh".to_string(),
            "-c".to_string(),
            format!(
                "mkdir {t} && cd {t} && tar -xvf ../{t}.tar.gz",
                t = toolchain
            ),
        ])
        .with_exec(["wget".to_string(), format!("{}/wasix-libc.tar.gz", release_base)])
        .with_exec([
            "sh",
            "-c",
            "mkdir wasix-libc && cd wasix-libc && tar -xvf ../wasix-libc.tar.gz",
        ])
        .with_exec(["mkdir".to_string(), "-p".to_string(), toolchain_home.clone()])
        .with_exec(["mv".to_string(), toolchain, format!("{}/rust", toolchain_home)])
        .with_exec([
            "mv".to_string(),
            "wasix-libc".to_string(),
            format!("{}/sysroot", toolchain_home),
        ])
        .with_exec([
            "rustup".to_string(),
            "toolchain".to_string(),
            "link".to_string(),
            "wasix".to_string(),
            format!("{}/rust", toolchain_home),
        ])
        .with_exec([
            "sh".to_string(),
            "-c".to_string(),
            format!(
                "chmod a+x {h}/rust/bin/* {h}/rust/lib/rustlib/{t}/bin/*",
                h = toolchain_home,
                t = triple
            ),
        ])
        .with_exec([
            "cp".to_string(),
            format!(
                "/usr/local/rustup/toolchains/{}-{}/bin/cargo",
                config.rust_version, triple
            ),
            "/usr/local/rustup/toolchains/wasix/bin".to_string(),
        ])
        .with_mounted_cache("/usr/local/cargo/registry", "cargo_registry")
        .with_mounted_cache("/usr/local/cargo/git", "cargo_git_cache")
        .with_directory(APP_DIR, source, exclude)
        .with_workdir(APP_DIR)
        .with_exec(
            ["cargo", "wasix", "build", "--release"]
                .into_iter()
                .map(String::from)
                .chain(extra_args.iter().cloned()),
        )
        .with_exec(["cp", "-r", WASIX_TARGET_DIR, "/tmp"])
        .with_exec(["ls".to_string(), "-la".to_string(), format!("{}/release/", WASIX_TARGET_DIR)])
}

/// Plan running `wasmer deploy` against `source`.
///
/// With `cache`, the target cache volume is mounted over `/app/target` and
/// the source's own `target` directory is left out of the copy.
pub fn deploy_container(
    config: &DeployConfig,
    source: &Directory,
    token: &Secret,
    cache: bool,
    extra_args: &[String],
) -> Container {
    let mut ctr = Container::new(Job::Deploy.name())
        .from(config.image.as_str())
        .with_exec(["apt", "update"])
        .with_exec(["apt", "install", "-y", "curl"])
        .with_exec([
            "sh".to_string(),
            "-c".to_string(),
            format!("curl {} -sSfL | sh", config.installer_url),
        ])
        .with_secret_variable("WASMER_TOKEN", token)
        .with_env_variable("WASMER_DIR", config.wasmer_dir.as_str())
        .with_env_variable("WASMER_CACHE_DIR", format!("{}/cache", config.wasmer_dir))
        .with_expanded_env_variable("PATH", format!("{}/bin:$PATH", config.wasmer_dir));

    if cache {
        ctr = ctr.with_mounted_cache("/app/target", TARGET_CACHE);
    }

    let exclude: &[&str] = if cache { &["target"] } else { &[] };

    ctr.with_directory(APP_DIR, source, exclude)
        .with_workdir(APP_DIR)
        .with_exec(
            ["wasmer", "deploy", "--non-interactive"]
                .into_iter()
                .map(String::from)
                .chain(extra_args.iter().cloned()),
        )
}
