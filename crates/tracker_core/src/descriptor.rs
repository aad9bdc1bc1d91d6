use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::milestone::{Milestone, MilestoneTable};

pub type JobId = String;

/// Which channels feed progress for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Transport {
    PollOnly,
    StreamOnly,
    PollAndStream,
}

impl Transport {
    pub fn polls(self) -> bool {
        matches!(self, Transport::PollOnly | Transport::PollAndStream)
    }

    pub fn streams(self) -> bool {
        matches!(self, Transport::StreamOnly | Transport::PollAndStream)
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::PollOnly => write!(f, "poll-only"),
            Transport::StreamOnly => write!(f, "stream-only"),
            Transport::PollAndStream => write!(f, "poll-and-stream"),
        }
    }
}

impl FromStr for Transport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "poll-only" | "poll" => Ok(Transport::PollOnly),
            "stream-only" | "stream" => Ok(Transport::StreamOnly),
            "poll-and-stream" | "both" => Ok(Transport::PollAndStream),
            other => Err(format!("unknown transport {other:?}")),
        }
    }
}

/// How an opaque remote status string is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Starting,
    Processing,
    Completed,
    Failed,
}

/// Remote status vocabulary for one job type. Anything not listed is
/// treated as in-progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusMapping {
    pub starting: BTreeSet<String>,
    pub completed: BTreeSet<String>,
    pub failed: BTreeSet<String>,
    /// Percentage to assume when a status response omits one.
    pub progress_hints: BTreeMap<String, u8>,
}

impl Default for StatusMapping {
    fn default() -> Self {
        Self {
            starting: ["pending", "queued"].into_iter().map(String::from).collect(),
            completed: ["completed", "complete", "succeeded"]
                .into_iter()
                .map(String::from)
                .collect(),
            failed: ["failed", "error"].into_iter().map(String::from).collect(),
            progress_hints: BTreeMap::new(),
        }
    }
}

impl StatusMapping {
    pub fn with_hint(mut self, status: impl Into<String>, percent: u8) -> Self {
        self.progress_hints
            .insert(normalize(&status.into()), percent.min(100));
        self
    }

    pub fn classify(&self, status: &str) -> StatusClass {
        let status = normalize(status);
        if self.failed.iter().any(|s| normalize(s) == status) {
            StatusClass::Failed
        } else if self.completed.iter().any(|s| normalize(s) == status) {
            StatusClass::Completed
        } else if self.starting.iter().any(|s| normalize(s) == status) {
            StatusClass::Starting
        } else {
            StatusClass::Processing
        }
    }

    pub fn is_terminal(&self, status: &str) -> bool {
        matches!(
            self.classify(status),
            StatusClass::Completed | StatusClass::Failed
        )
    }

    pub fn progress_hint(&self, status: &str) -> Option<u8> {
        let status = normalize(status);
        self.progress_hints
            .iter()
            .find(|(key, _)| normalize(key) == status)
            .map(|(_, percent)| *percent)
    }
}

fn normalize(status: &str) -> String {
    status.trim().to_ascii_lowercase()
}

/// Immutable description of the job a tracker follows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescriptor {
    pub job_id: JobId,
    pub transport: Transport,
    pub poll_interval: Duration,
    pub milestones: MilestoneTable,
    pub status_mapping: StatusMapping,
}

impl JobDescriptor {
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
    /// Shorter intervals, zero included, are raised to this.
    pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

    pub fn new(job_id: impl Into<JobId>, milestones: MilestoneTable) -> Self {
        Self {
            job_id: job_id.into(),
            transport: Transport::PollOnly,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            milestones,
            status_mapping: StatusMapping::default(),
        }
    }

    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Self::MIN_POLL_INTERVAL);
        self
    }

    pub fn with_status_mapping(mut self, mapping: StatusMapping) -> Self {
        self.status_mapping = mapping;
        self
    }
}

/// Remote job types the dashboard launches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    CompetitorAnalysis,
    MenuParsing,
    InvoiceIngestion,
}

impl JobKind {
    pub fn milestones(self) -> MilestoneTable {
        let entries = match self {
            JobKind::CompetitorAnalysis => vec![
                Milestone::new(0, "Queued").with_tag("queued"),
                Milestone::new(10, "Discovering competitors").with_tag("discovery"),
                Milestone::new(35, "Parsing competitor menus").with_tag("parsing"),
                Milestone::new(70, "Running comparative analysis").with_tag("analysis"),
                Milestone::new(90, "Compiling report").with_tag("report"),
                Milestone::new(100, "Complete").with_tag("done"),
            ],
            JobKind::MenuParsing => vec![
                Milestone::new(0, "Uploading").with_tag("upload"),
                Milestone::new(20, "Extracting text").with_tag("ocr"),
                Milestone::new(50, "Parsing menu items").with_tag("parsing"),
                Milestone::new(85, "Categorizing").with_tag("categorize"),
                Milestone::new(100, "Complete").with_tag("done"),
            ],
            JobKind::InvoiceIngestion => vec![
                Milestone::new(0, "Uploading").with_tag("upload"),
                Milestone::new(25, "Reading invoice").with_tag("ocr"),
                Milestone::new(60, "Matching line items").with_tag("matching"),
                Milestone::new(90, "Updating costs").with_tag("costs"),
                Milestone::new(100, "Complete").with_tag("done"),
            ],
        };
        MilestoneTable::from_sorted(entries)
    }

    pub fn transport(self) -> Transport {
        match self {
            JobKind::CompetitorAnalysis | JobKind::MenuParsing => Transport::PollAndStream,
            JobKind::InvoiceIngestion => Transport::PollOnly,
        }
    }

    pub fn poll_interval(self) -> Duration {
        match self {
            JobKind::MenuParsing => Duration::from_millis(1500),
            JobKind::CompetitorAnalysis | JobKind::InvoiceIngestion => Duration::from_secs(2),
        }
    }

    pub fn status_mapping(self) -> StatusMapping {
        let mapping = StatusMapping::default();
        match self {
            JobKind::CompetitorAnalysis => mapping
                .with_hint("discovering", 10)
                .with_hint("parsing", 35)
                .with_hint("analyzing", 70)
                .with_hint("reporting", 90),
            JobKind::MenuParsing => mapping
                .with_hint("uploading", 5)
                .with_hint("extracting", 20)
                .with_hint("parsing", 50)
                .with_hint("categorizing", 85),
            JobKind::InvoiceIngestion => mapping
                .with_hint("processing", 25)
                .with_hint("matching", 60)
                .with_hint("updating", 90),
        }
    }

    pub fn descriptor(self, job_id: impl Into<JobId>) -> JobDescriptor {
        JobDescriptor::new(job_id, self.milestones())
            .with_transport(self.transport())
            .with_poll_interval(self.poll_interval())
            .with_status_mapping(self.status_mapping())
    }
}

impl FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "competitor-analysis" | "competitors" => Ok(JobKind::CompetitorAnalysis),
            "menu-parsing" | "menu" => Ok(JobKind::MenuParsing),
            "invoice-ingestion" | "invoice" => Ok(JobKind::InvoiceIngestion),
            other => Err(format!("unknown job kind {other:?}")),
        }
    }
}
