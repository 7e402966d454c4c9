//! Operating system information for `client_info`
//!
//! Non-identifying only: never hostname or username.

use serde::{Deserialize, Serialize};

/// OS name, version and CPU architecture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub os_version: String,
    pub architecture: String,
}

impl SystemInfo {
    /// Collect OS information from the current system.
    pub fn collect() -> Self {
        Self {
            os: os_display_name(std::env::consts::OS),
            os_version: read_os_version(),
            architecture: std::env::consts::ARCH.to_string(),
        }
    }
}

fn os_display_name(os: &str) -> String {
    match os {
        "linux" => "Linux",
        "macos" => "Darwin",
        "windows" => "Windows",
        "android" => "Android",
        "ios" => "iOS",
        "freebsd" => "FreeBSD",
        other => other,
    }
    .to_string()
}

fn read_os_version() -> String {
    std::fs::read_to_string("/proc/version")
        .ok()
        .and_then(|v| v.split_whitespace().nth(2).map(String::from))
        .unwrap_or_else(|| "Unknown".to_string())
}
