//! Secondary activity source: the latest log line of a co-located container

use std::{sync::Mutex, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tokio::{process::Command, time::timeout};
use tracing::debug;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Best-effort activity source consulted when the inactivity timer expires.
///
/// `None` covers every failure mode; a probe never blocks the decision.
#[async_trait]
pub trait ActivityProbe: Send + Sync {
    async fn last_activity(&self) -> Option<DateTime<Utc>>;
}

/// Probe used when no fallback workload is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProbe;

#[async_trait]
impl ActivityProbe for NoProbe {
    async fn last_activity(&self) -> Option<DateTime<Utc>> {
        None
    }
}

/// Reads `docker logs --tail 1 <container>` and parses the leading timestamp
#[derive(Debug, Clone)]
pub struct DockerLogProbe {
    container: String,
    program: String,
}

impl DockerLogProbe {
    pub fn new(container: &str) -> Self {
        Self::with_program(container, "docker")
    }

    /// Use a different docker-compatible executable
    pub fn with_program(container: &str, program: &str) -> Self {
        Self {
            container: container.to_string(),
            program: program.to_string(),
        }
    }

    async fn tail(&self) -> Option<String> {
        let output = timeout(
            PROBE_TIMEOUT,
            Command::new(&self.program)
                .args(["logs", "--tail", "1", self.container.as_str()])
                .kill_on_drop(true)
                .output(),
        )
        .await;

        let output = match output {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                debug!("No {} logs: {}", self.container, e);
                return None;
            }
            Err(_) => {
                debug!("Timed out reading {} logs", self.container);
                return None;
            }
        };

        if !output.status.success() {
            debug!(
                "{} logs exited with {:?}",
                self.container,
                output.status.code()
            );
            return None;
        }

        // Containers may log to either stream
        let stdout = String::from_utf8_lossy(&output.stdout);
        let text = if stdout.trim().is_empty() {
            String::from_utf8_lossy(&output.stderr).into_owned()
        } else {
            stdout.into_owned()
        };

        last_line(&text).map(str::to_string)
    }
}

#[async_trait]
impl ActivityProbe for DockerLogProbe {
    async fn last_activity(&self) -> Option<DateTime<Utc>> {
        let line = self.tail().await?;
        let parsed = parse_log_timestamp(&line, Utc::now().date_naive());
        if parsed.is_none() {
            debug!("Could not parse {} timestamp from {:?}", self.container, line);
        }
        parsed
    }
}

/// Probe returning a fixed answer, for tests and embedders
#[derive(Debug, Default)]
pub struct StaticProbe {
    answer: Mutex<Option<ProbeAnswer>>,
}

#[derive(Debug, Clone, Copy)]
enum ProbeAnswer {
    At(DateTime<Utc>),
    /// Always this far in the past, relative to the moment of the query
    Age(chrono::Duration),
}

impl StaticProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report_at(&self, at: DateTime<Utc>) {
        self.set(Some(ProbeAnswer::At(at)));
    }

    /// Report activity that is always `age` old when queried
    pub fn report_fresh(&self, age: Duration) {
        let age = chrono::Duration::from_std(age).unwrap_or_else(|_| chrono::Duration::zero());
        self.set(Some(ProbeAnswer::Age(age)));
    }

    pub fn report_nothing(&self) {
        self.set(None);
    }

    fn set(&self, answer: Option<ProbeAnswer>) {
        *self.answer.lock().unwrap_or_else(|e| e.into_inner()) = answer;
    }
}

#[async_trait]
impl ActivityProbe for StaticProbe {
    async fn last_activity(&self) -> Option<DateTime<Utc>> {
        let answer = *self.answer.lock().unwrap_or_else(|e| e.into_inner());
        match answer? {
            ProbeAnswer::At(at) => Some(at),
            ProbeAnswer::Age(age) => Some(Utc::now() - age),
        }
    }
}

fn last_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).rfind(|line| !line.is_empty())
}

/// Parse the timestamp a log line starts with.
///
/// Accepts a leading RFC 3339 timestamp, or a bare `HH:MM:SS` time of day
/// (optionally followed by fractional seconds, `Z` or `:`), which is taken
/// to be on `today` in UTC.
pub fn parse_log_timestamp(line: &str, today: NaiveDate) -> Option<DateTime<Utc>> {
    let line = line.trim();
    let first = line.split_whitespace().next()?;

    if let Ok(ts) = DateTime::parse_from_rfc3339(first) {
        return Some(ts.with_timezone(&Utc));
    }

    let mut parts = line.splitn(4, ':');
    let hour = parse_field(parts.next()?, 2)?;
    let minute = parse_field(parts.next()?, 2)?;
    let seconds = parts.next()?;
    let digits = seconds.len() - seconds.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits != 2 {
        return None;
    }
    let second = seconds[..digits].parse().ok()?;

    let time = NaiveTime::from_hms_opt(hour, minute, second)?;
    Some(today.and_time(time).and_utc())
}

fn parse_field(field: &str, max_len: usize) -> Option<u32> {
    if field.is_empty()
        || field.len() > max_len
        || !field.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }
    field.parse().ok()
}
