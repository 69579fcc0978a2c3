//! Open a URL in the default browser.
//!
//! Cross-platform: Windows, macOS, Linux. Only the local desktop is
//! supported; remote shells get the URL printed instead.

use std::process::Command;

/// Open `url` in the default browser.
///
/// Returns `true` if the launcher started, `false` otherwise:
/// - **Linux**: `xdg-open`
/// - **macOS**: `open`
/// - **Windows**: `cmd /c start`
pub fn open_browser(url: &str) -> bool {
    #[cfg(target_os = "windows")]
    {
        Command::new("cmd")
            .args(["/c", "start", "", url])
            .spawn()
            .is_ok()
    }

    #[cfg(target_os = "macos")]
    {
        Command::new("open").arg(url).spawn().is_ok()
    }

    #[cfg(target_os = "linux")]
    {
        Command::new("xdg-open").arg(url).spawn().is_ok()
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        let _ = url;
        false
    }
}
