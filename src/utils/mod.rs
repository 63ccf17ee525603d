use crate::config::ToolsConfig;

/// `HH:MM:SS<sep>mmm`, as used by SRT (`,`) and WebVTT (`.`)
pub fn format_timestamp(seconds: f64, separator: char) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;

    format!("{:02}:{:02}:{:02}{}{:03}", hours, minutes, secs, separator, millis)
}

/// Format duration in human-readable format
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds.max(0.0) as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Shorten to `max_chars` characters, appending `...` when cut
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", cut)
}

/// Check if the current environment has the external tools
pub async fn check_dependencies(tools: &ToolsConfig) -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available(&tools.yt_dlp, "--version").await {
        missing.push("yt-dlp - required for Bilibili and YouTube links".to_string());
    }

    if !check_command_available(&tools.ffmpeg, "-version").await {
        missing.push("ffmpeg - required for speech recognition".to_string());
    }

    if !check_command_available(&tools.whisper, "--help").await {
        missing.push("whisper - speech recognition is skipped without it".to_string());
    }

    missing
}

/// Check if a command is available in PATH
async fn check_command_available(command: &str, probe_arg: &str) -> bool {
    use std::process::Stdio;
    use tokio::process::Command;

    Command::new(command)
        .arg(probe_arg)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}
