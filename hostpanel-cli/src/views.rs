//! Plain-text panels. Nothing in here touches the network.

use hostpanel::api::model_label;
use hostpanel::{ApiError, DownloadState, Liveness, PollState};
use shared_http::api::{MessageResponse, ScriptCatalog, VramUsage};

const BAR_WIDTH: usize = 20;

pub fn liveness_line(value: Liveness) -> String {
    format!("Status: {}", value)
}

pub fn status_line(state: &PollState) -> String {
    match state.last_updated {
        Some(at) => format!(
            "{} (check #{} at {})",
            liveness_line(state.value),
            state.checks,
            at.format("%H:%M:%S UTC")
        ),
        None => format!("{} (not checked yet)", liveness_line(state.value)),
    }
}

pub fn hostname_line(result: &Result<String, ApiError>) -> String {
    match result {
        Ok(hostname) => format!("Hostname: {}", hostname),
        Err(e) => format!("Error fetching hostname: {}", e),
    }
}

pub fn os_line(result: &Result<String, ApiError>) -> String {
    match result {
        Ok(os) => format!("OS: {}", os),
        Err(e) => format!("Error fetching OS: {}", e),
    }
}

pub fn vram_line(result: &Result<VramUsage, ApiError>) -> String {
    match result {
        Ok(usage) => format!(
            "VRAM: {} / {} {}",
            usage.used_vram,
            usage.total_vram,
            progress_bar(usage.used_percent())
        ),
        Err(e) => format!("Error fetching VRAM usage: {}", e),
    }
}

/// `[#####---------------]  25%`
pub fn progress_bar(percent: u8) -> String {
    let percent = percent.min(100);
    let filled = usize::from(percent) * BAR_WIDTH / 100;
    format!(
        "[{}{}] {:>3}%",
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled),
        percent
    )
}

pub fn scripts_panel(catalog: &ScriptCatalog) -> Vec<String> {
    if catalog.values().all(Vec::is_empty) {
        return vec!["No scripts found".to_string()];
    }

    let mut lines = Vec::new();
    for (folder, scripts) in catalog {
        lines.push(format!("[{}]", folder));
        lines.extend(scripts.iter().map(|script| format!("  {}", script)));
    }
    lines
}

pub fn models_panel(models: &[String]) -> Vec<String> {
    if models.is_empty() {
        return vec!["No models found".to_string()];
    }
    models
        .iter()
        .map(|path| format!("{}  ({})", model_label(path), path))
        .collect()
}

pub fn message_line(action: &str, response: &MessageResponse) -> String {
    format!("{}: {}", action, response.summary())
}

pub fn download_line(state: &DownloadState) -> String {
    match state {
        DownloadState::Pending => "Download pending".to_string(),
        DownloadState::Running { filename, percent } => match filename {
            Some(name) => format!("Downloading {} {}", name, progress_bar(*percent)),
            None => format!("Downloading {}", progress_bar(*percent)),
        },
        DownloadState::Done { filename: Some(name) } => format!("Download complete: {}", name),
        DownloadState::Done { filename: None } => "Download complete".to_string(),
        DownloadState::Failed { message } => format!("Download failed: {}", message),
    }
}

/// Panels that only make sense while the host is up
pub struct HostPanels {
    pub hostname: Result<String, ApiError>,
    pub vram: Result<VramUsage, ApiError>,
    pub scripts: Result<ScriptCatalog, ApiError>,
}

pub fn dashboard(state: &PollState, panels: Option<&HostPanels>) -> Vec<String> {
    let mut lines = vec![status_line(state)];

    match (state.value, panels) {
        (Liveness::Online, Some(panels)) => {
            lines.push(hostname_line(&panels.hostname));
            lines.push(vram_line(&panels.vram));
            match &panels.scripts {
                Ok(catalog) => lines.extend(scripts_panel(catalog)),
                Err(e) => lines.push(format!("Error fetching scripts: {}", e)),
            }
        }
        (Liveness::Online, None) => lines.push("Loading host panels...".to_string()),
        (Liveness::Unknown, _) => lines.push("Waiting for the host to report in".to_string()),
        (Liveness::Offline, _) => lines.push("Host is offline".to_string()),
    }
    lines
}
