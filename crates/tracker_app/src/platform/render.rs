use tracker_core::{TrackerStatus, TrackerView};

/// Turns views into terminal lines, skipping repeats.
#[derive(Debug, Default)]
pub struct Renderer {
    last: Option<String>,
    celebrated: bool,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines to print for `view`, possibly none.
    pub fn render(&mut self, view: &TrackerView) -> Vec<String> {
        let mut lines = Vec::new();
        if view.snapshot.is_none() {
            return lines;
        }
        let line = status_line(view);
        if self.last.as_deref() != Some(line.as_str()) {
            lines.push(line.clone());
            self.last = Some(line);
        }
        if view.is_celebrating() && !self.celebrated {
            self.celebrated = true;
            lines.push(success_banner(view));
        }
        if view.status.is_active() {
            self.celebrated = false;
        }
        lines
    }
}

pub fn status_line(view: &TrackerView) -> String {
    let Some(snapshot) = view.snapshot.as_ref() else {
        return "idle".to_string();
    };
    let elapsed = clock(snapshot.elapsed_seconds);

    match view.status {
        TrackerStatus::Idle => "idle".to_string(),
        TrackerStatus::Failed => format!(
            "[{:>3}%] failed after {elapsed}: {}",
            snapshot.progress_percent,
            view.error_message().unwrap_or("unknown error")
        ),
        TrackerStatus::Cancelled => format!("cancelled after {elapsed}"),
        TrackerStatus::Starting | TrackerStatus::Processing | TrackerStatus::Completed => {
            let mut line = format!("[{:>3}%]", snapshot.progress_percent);
            if let Some(milestone) = view.milestone.as_ref() {
                line.push(' ');
                line.push_str(&milestone.label);
            }
            if let Some(step) = snapshot.current_step_label.as_deref() {
                let repeats_milestone = view.milestone.as_ref().is_some_and(|m| m.label == step);
                if !repeats_milestone {
                    line.push_str(" | ");
                    line.push_str(step);
                }
            }
            line.push_str(" | ");
            line.push_str(&elapsed);
            if !snapshot.connection_healthy {
                line.push_str(" (live updates lost, polling)");
            }
            if view.is_long_running {
                line.push_str(" (taking longer than usual)");
            }
            line
        }
    }
}

fn success_banner(view: &TrackerView) -> String {
    let (job_id, elapsed) = view
        .snapshot
        .as_ref()
        .map_or(("job", 0), |s| (s.job_id.as_str(), s.elapsed_seconds));
    format!(
        "*** {job_id} finished in {} (at {}) ***",
        clock(elapsed),
        chrono::Local::now().format("%H:%M:%S")
    )
}

/// `mm:ss`, or `h:mm:ss` past the hour.
fn clock(seconds: u64) -> String {
    let (hours, minutes, seconds) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}
