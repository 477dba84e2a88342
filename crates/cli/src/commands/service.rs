// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host service registration: a thin shell around the core. On Linux this
//! renders a systemd user unit; other platforms report the limitation.

use std::path::Path;

use anyhow::Result;

#[cfg(target_os = "linux")]
const UNIT_NAME: &str = "ptc.service";

/// Write the service unit pointing at the installed `ptcd`.
#[cfg(target_os = "linux")]
pub fn install(config_path: &Path) -> Result<()> {
    use anyhow::Context;

    let unit_dir = dirs::config_dir()
        .context("cannot determine the user config directory")?
        .join("systemd")
        .join("user");
    std::fs::create_dir_all(&unit_dir)
        .with_context(|| format!("creating {}", unit_dir.display()))?;

    let daemon = daemon_binary()?;
    let unit = format!(
        "[Unit]\n\
         Description=Pattern Trigger Command - folder watcher service\n\
         After=network.target\n\
         \n\
         [Service]\n\
         ExecStart={} --config {}\n\
         Restart=on-failure\n\
         \n\
         [Install]\n\
         WantedBy=default.target\n",
        daemon,
        config_path.display(),
    );

    let unit_path = unit_dir.join(UNIT_NAME);
    std::fs::write(&unit_path, unit).with_context(|| format!("writing {}", unit_path.display()))?;

    println!("Wrote {}", unit_path.display());
    println!("Enable with:");
    println!("  systemctl --user daemon-reload");
    println!("  systemctl --user enable --now {UNIT_NAME}");
    Ok(())
}

/// Remove the service unit.
#[cfg(target_os = "linux")]
pub fn uninstall() -> Result<()> {
    use anyhow::Context;

    let unit_path = dirs::config_dir()
        .context("cannot determine the user config directory")?
        .join("systemd")
        .join("user")
        .join(UNIT_NAME);

    match std::fs::remove_file(&unit_path) {
        Ok(()) => {
            println!("Removed {}", unit_path.display());
            println!("Run `systemctl --user daemon-reload` to finish.");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            println!("Not installed ({} absent)", unit_path.display());
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Locate `ptcd`: next to the current executable if present, otherwise
/// rely on PATH.
#[cfg(target_os = "linux")]
fn daemon_binary() -> Result<String> {
    if let Ok(current) = std::env::current_exe() {
        if let Some(dir) = current.parent() {
            let sibling = dir.join("ptcd");
            if sibling.is_file() {
                return Ok(sibling.display().to_string());
            }
        }
    }
    Ok("ptcd".to_string())
}

#[cfg(not(target_os = "linux"))]
pub fn install(_config_path: &Path) -> Result<()> {
    anyhow::bail!("service registration is only supported on Linux (systemd)");
}

#[cfg(not(target_os = "linux"))]
pub fn uninstall() -> Result<()> {
    anyhow::bail!("service registration is only supported on Linux (systemd)");
}
