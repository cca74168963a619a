use anyhow::{Result, anyhow};

#[cfg(target_os = "linux")]
use anyhow::bail;
#[cfg(not(target_os = "linux"))]
use copypasta::{ClipboardContext, ClipboardProvider};

/// Linux: pipe the code through wl-copy (Wayland) or xclip (X11).
#[cfg(target_os = "linux")]
pub fn copy(value: &str) -> Result<()> {
    let wayland = std::env::var("WAYLAND_DISPLAY").is_ok();
    let x11 = std::env::var("DISPLAY").is_ok();

    if !wayland && !x11 {
        bail!(
            "no GUI clipboard available (no DISPLAY or WAYLAND_DISPLAY); \
             copy the printed code instead"
        );
    }
    if wayland && pipe_to("wl-copy", &[], value).is_ok() {
        return Ok(());
    }
    if x11 && pipe_to("xclip", &["-selection", "clipboard"], value).is_ok() {
        return Ok(());
    }
    bail!("failed to copy to clipboard: install wl-clipboard or xclip")
}

#[cfg(target_os = "linux")]
fn pipe_to(cmd: &str, args: &[&str], value: &str) -> Result<()> {
    use std::io::Write;
    use std::process::{Command, Stdio};

    let mut child = Command::new(cmd)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| anyhow!("failed to spawn {cmd}: {e}"))?;
    if let Some(stdin) = child.stdin.as_mut() {
        stdin.write_all(value.as_bytes())?;
    }
    let status = child.wait()?;
    if !status.success() {
        bail!("{cmd} exited with status {status}");
    }
    Ok(())
}

/// Everything else goes through copypasta.
#[cfg(not(target_os = "linux"))]
pub fn copy(value: &str) -> Result<()> {
    let mut ctx =
        ClipboardContext::new().map_err(|e| anyhow!("failed to initialize clipboard: {e}"))?;
    ctx.set_contents(value.to_string())
        .map_err(|e| anyhow!("failed to copy to clipboard: {e}"))?;
    Ok(())
}
