fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");
    println!("cargo:rerun-if-changed=build.rs");

    let describe = std::process::Command::new("git")
        .args(["describe", "--always", "--dirty", "--tags"])
        .output();

    // git が無いとき（tarball からのビルド）はパッケージ版数
    let version = match describe {
        Ok(o) if o.status.success() => String::from_utf8_lossy(&o.stdout).trim().to_string(),
        _ => format!("v{}", std::env::var("CARGO_PKG_VERSION").unwrap_or_default()),
    };

    println!("cargo:rustc-env=GIT_VERSION={}", version);
}
