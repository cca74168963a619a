//! Credential acquisition pipeline: obtain raw image bytes (file or
//! interactive screen capture), then locate and decode a QR payload.

use std::fs;
use std::path::Path;

use crate::error::Error;

/// Read a provisioning payload from a QR code stored in an image file.
pub fn from_image_file(path: &Path) -> Result<String, Error> {
    let bytes = fs::read(path).map_err(|source| Error::ImageRead {
        path: path.display().to_string(),
        source,
    })?;
    decode_qr(&bytes)
}

/// Capture a region of the screen interactively and decode the QR code in
/// it. Whatever goes wrong (missing tool, cancel, empty capture), the
/// caller sees one opaque `Capture` error; the cause rides along for
/// diagnostics only.
pub fn from_screen_capture() -> Result<String, Error> {
    let bytes = capture_screen().map_err(|e| Error::Capture {
        cause: Some(e.to_string()),
    })?;
    decode_qr(&bytes)
}

fn decode_qr(bytes: &[u8]) -> Result<String, Error> {
    let pixels = image::load_from_memory(bytes)
        .map_err(|_| Error::Decode)?
        .to_luma8();
    let (width, height) = pixels.dimensions();
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        width as usize,
        height as usize,
        |x, y| pixels.get_pixel(x as u32, y as u32).0[0],
    );
    let grids = prepared.detect_grids();
    let grid = grids.first().ok_or(Error::Decode)?;
    let (_meta, payload) = grid.decode().map_err(|_| Error::Decode)?;
    Ok(payload)
}

#[cfg(target_os = "macos")]
fn capture_screen() -> anyhow::Result<Vec<u8>> {
    let shot = tempfile::Builder::new()
        .prefix("twofa-")
        .suffix(".png")
        .tempfile()?;
    let path = shot.path().to_string_lossy().into_owned();
    run_capture_tool("screencapture", &["-i", &path])?;
    read_capture(shot.path())
}

/// Linux has no single screenshot tool; try the common interactive ones in
/// order. A tool that is absent falls through to the next; a tool that ran
/// and failed means the user canceled, so stop there.
#[cfg(target_os = "linux")]
fn capture_screen() -> anyhow::Result<Vec<u8>> {
    use std::io;

    let shot = tempfile::Builder::new()
        .prefix("twofa-")
        .suffix(".png")
        .tempfile()?;
    let path = shot.path().to_string_lossy().into_owned();

    let candidates: &[(&str, &[&str])] = &[
        ("gnome-screenshot", &["-a", "-f", &path]),
        ("spectacle", &["-r", "-b", "-n", "-o", &path]),
    ];

    for &(tool, args) in candidates {
        match try_capture_tool(tool, args) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(anyhow::anyhow!("failed to run {tool}: {e}")),
            Ok(false) => return Err(anyhow::anyhow!("{tool} exited with an error")),
            Ok(true) => return read_capture(shot.path()),
        }
    }
    anyhow::bail!("no interactive screenshot tool found (install gnome-screenshot or spectacle)")
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
fn capture_screen() -> anyhow::Result<Vec<u8>> {
    anyhow::bail!("screen capture is not supported on this platform")
}

#[cfg(target_os = "linux")]
fn try_capture_tool(tool: &str, args: &[&str]) -> std::io::Result<bool> {
    use std::process::{Command, Stdio};

    let status = Command::new(tool)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()?;
    Ok(status.success())
}

#[cfg(target_os = "macos")]
fn run_capture_tool(tool: &str, args: &[&str]) -> anyhow::Result<()> {
    use std::process::{Command, Stdio};

    let status = Command::new(tool)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| anyhow::anyhow!("failed to run {tool}: {e}"))?;
    if !status.success() {
        anyhow::bail!("{tool} exited with an error");
    }
    Ok(())
}

#[cfg(any(target_os = "macos", target_os = "linux"))]
fn read_capture(path: &Path) -> anyhow::Result<Vec<u8>> {
    let bytes = fs::read(path)?;
    if bytes.is_empty() {
        anyhow::bail!("capture produced no image");
    }
    Ok(bytes)
}
