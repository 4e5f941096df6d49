use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");

    let pkg_version = std::env::var("CARGO_PKG_VERSION").unwrap_or_default();

    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output();

    let version = match output {
        Ok(o) if o.status.success() => {
            let git_output = String::from_utf8(o.stdout)
                .unwrap_or_default()
                .trim()
                .to_string();

            if git_output.is_empty() {
                pkg_version
            } else {
                // Strip 'v' prefix if present (e.g., "v1.0.0" -> "1.0.0")
                let described = git_output.strip_prefix('v').unwrap_or(&git_output);
                format!("{} ({})", pkg_version, described)
            }
        }
        // Not a git checkout (e.g. a packaged source tarball)
        _ => pkg_version,
    };

    println!("cargo:rustc-env=MESABOOT_VERSION={}", version);
}
