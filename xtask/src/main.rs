//! Development tasks for holdtype
//!
//! Usage:
//!   cargo xtask install [--gpu]   Install release binary and systemd units (requires sudo)
//!   cargo xtask uninstall         Remove binary and units (requires sudo)
//!   cargo xtask dist [--gpu]      Build release binary for distribution

use std::env;
use std::path::PathBuf;
use std::process::{Command, ExitCode};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();

    if args.is_empty() {
        print_help();
        return ExitCode::SUCCESS;
    }

    let gpu = args.iter().any(|a| a == "--gpu" || a == "--vulkan");

    let result = match args[0].as_str() {
        "install" => install(gpu),
        "uninstall" => uninstall(),
        "dist" => dist(gpu),
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        cmd => {
            eprintln!("Unknown command: {}", cmd);
            print_help();
            Err(anyhow::anyhow!("Unknown command"))
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_help() {
    eprintln!(
        r#"
holdtype development tasks

Usage: cargo xtask <COMMAND> [OPTIONS]

Commands:
  install    Build release binary, install to /usr/local/bin plus the
             systemd unit to /etc/systemd/system (requires sudo)
  uninstall  Remove binary and unit (requires sudo)
  dist       Build optimized release binary for distribution

Options:
  --gpu      Build with Vulkan GPU acceleration (alias: --vulkan)

Examples:
  cargo xtask install          # CPU-only build, install binary + unit
  cargo xtask install --gpu    # Vulkan build
  cargo xtask uninstall
"#
    );
}

/// Get the project root directory
fn project_root() -> PathBuf {
    let dir = env::var("CARGO_MANIFEST_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::current_dir().unwrap());

    // xtask is in a subdirectory, go up one level
    dir.parent().unwrap_or(&dir).to_path_buf()
}

fn build_release(gpu: bool) -> anyhow::Result<PathBuf> {
    let root = project_root();

    let mut args = vec!["build", "--release"];
    if gpu {
        println!("==> Building release binary with Vulkan GPU support...");
        args.push("--features");
        args.push("gpu-vulkan");
    } else {
        println!("==> Building release binary...");
    }

    let status = Command::new("cargo").args(&args).current_dir(&root).status()?;
    if !status.success() {
        anyhow::bail!("Build failed");
    }

    let binary = root.join("target/release/holdtype");
    if !binary.exists() {
        anyhow::bail!("Binary not found at {:?}", binary);
    }
    Ok(binary)
}

/// Build release binary and install binary + systemd unit
fn install(gpu: bool) -> anyhow::Result<()> {
    let root = project_root();
    let binary = build_release(gpu)?;

    println!("==> Installing to /usr/local/bin/holdtype...");
    let status = Command::new("sudo")
        .args([
            "install",
            "-Dm755",
            binary.to_str().unwrap(),
            "/usr/local/bin/holdtype",
        ])
        .status()?;
    if !status.success() {
        anyhow::bail!("Install failed (sudo required)");
    }

    let unit = root.join("systemd/holdtype.service");
    println!("==> Installing systemd unit...");
    let status = Command::new("sudo")
        .args([
            "install",
            "-Dm644",
            unit.to_str().unwrap(),
            "/etc/systemd/system/holdtype.service",
        ])
        .status()?;
    if !status.success() {
        anyhow::bail!("Unit install failed");
    }

    println!("==> Installed successfully!");
    println!();
    println!("Next: edit /etc/holdtype/config.toml, then:");
    println!("  sudo systemctl daemon-reload");
    println!("  sudo systemctl enable --now holdtype");

    Ok(())
}

/// Remove holdtype binary and unit
fn uninstall() -> anyhow::Result<()> {
    println!("==> Removing /usr/local/bin/holdtype and the systemd unit...");

    let status = Command::new("sudo")
        .args([
            "rm",
            "-f",
            "/usr/local/bin/holdtype",
            "/etc/systemd/system/holdtype.service",
        ])
        .status()?;
    if !status.success() {
        anyhow::bail!("Uninstall failed (sudo required)");
    }

    println!("==> Uninstalled successfully!");
    Ok(())
}

/// Build optimized release binary for distribution
fn dist(gpu: bool) -> anyhow::Result<()> {
    let binary = build_release(gpu)?;
    println!("==> Built: {:?}", binary);

    let _ = Command::new("ls")
        .args(["-lh", binary.to_str().unwrap()])
        .status();

    Ok(())
}
