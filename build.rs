//! Build script: version stamping and libvosk link setup.
//!
//! The `vosk` crate links against the prebuilt `libvosk` shared library but
//! does not search for it. When the `vosk` feature is on we forward
//! `VOSK_LIB_DIR` to the linker, or fail early with install instructions.

use std::path::{Path, PathBuf};
use std::process::Command;

fn main() {
    // Embed git short hash for version string
    if let Ok(output) = Command::new("git")
        .args(["rev-parse", "--short=7", "HEAD"])
        .output()
        && output.status.success()
    {
        let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
        println!("cargo:rustc-env=GIT_HASH={}", hash);
    }
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/");
    println!("cargo:rerun-if-env-changed=VOSK_LIB_DIR");

    if std::env::var_os("CARGO_FEATURE_VOSK").is_some() {
        check_vosk();
    }
}

fn check_vosk() {
    if let Some(dir) = std::env::var_os("VOSK_LIB_DIR") {
        let dir = PathBuf::from(dir);
        if !has_libvosk(&dir) {
            println!(
                "cargo::warning=VOSK_LIB_DIR={} does not contain libvosk",
                dir.display()
            );
        }
        println!("cargo:rustc-link-search=native={}", dir.display());
        return;
    }

    let system_dirs = ["/usr/lib", "/usr/local/lib", "/usr/lib/x86_64-linux-gnu"];
    if system_dirs.iter().any(|d| has_libvosk(Path::new(d))) {
        return;
    }

    panic!(
        "\n\n\
        ╔══════════════════════════════════════════════════════════╗\n\
        ║  libvosk not found.                                      ║\n\
        ║                                                          ║\n\
        ║  Download: https://github.com/alphacep/vosk-api/releases ║\n\
        ║  Then set VOSK_LIB_DIR to the unpacked directory.        ║\n\
        ║  Or build without Vosk: cargo build --release            ║\n\
        ╚══════════════════════════════════════════════════════════╝\n",
    );
}

fn has_libvosk(dir: &Path) -> bool {
    ["libvosk.so", "libvosk.dylib", "libvosk.lib", "vosk.lib"]
        .iter()
        .any(|name| dir.join(name).exists())
}
