//! The session gallery: generated results, newest first.
//!
//! Results are only ever referenced by their remote URL until the user downloads them. A bulk
//! download fetches each selected item in gallery order with a short pause in between, logs
//! per-item failures and keeps going.

use crate::drape::error::StudioError;
use crate::drape::http_client_pool::get_or_create_client;
use chrono::{DateTime, TimeZone, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

/// One generated try-on image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    /// Stable id within the session.
    pub id: String,
    /// Where the service left the image.
    pub result_url: String,
    /// `{STYLE}-{COLOR}-{sequence}.jpg`
    pub filename: String,
    /// Completion time.
    pub created_at: DateTime<Utc>,
}

impl GenerationResult {
    /// New result stamped with the current time.
    pub fn new(result_url: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            id: format!("result-{}", Uuid::new_v4()),
            result_url: result_url.into(),
            filename: filename.into(),
            created_at: Utc::now(),
        }
    }
}

/// Ordered collection of results, most recent first.
#[derive(Debug, Clone, Default)]
pub struct Gallery {
    items: Vec<GenerationResult>,
}

impl Gallery {
    /// Empty gallery.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a result at the front.
    pub fn push(&mut self, result: GenerationResult) {
        self.items.insert(0, result);
    }

    /// Remove every item whose id is in `ids`. Unknown ids are ignored.
    /// Returns how many items were removed.
    pub fn delete<S: AsRef<str>>(&mut self, ids: &[S]) -> usize {
        let before = self.items.len();
        self.items
            .retain(|item| !ids.iter().any(|id| id.as_ref() == item.id));
        before - self.items.len()
    }

    /// Ids in display order.
    pub fn ids(&self) -> Vec<String> {
        self.items.iter().map(|item| item.id.clone()).collect()
    }

    /// Look up one result.
    pub fn get(&self, id: &str) -> Option<&GenerationResult> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Number of results.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// `true` when no results are stored.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate newest first.
    pub fn iter(&self) -> impl Iterator<Item = &GenerationResult> {
        self.items.iter()
    }

    /// Download the items named in `ids` into `dir`, in gallery order, pausing `delay`
    /// between files. Failures are collected, not propagated.
    pub async fn download_many<S: AsRef<str>>(
        &self,
        ids: &[S],
        dir: &Path,
        delay: Duration,
    ) -> DownloadReport {
        let selected: Vec<&GenerationResult> = self
            .items
            .iter()
            .filter(|item| ids.iter().any(|id| id.as_ref() == item.id))
            .collect();

        let mut report = DownloadReport::default();
        for (i, item) in selected.iter().enumerate() {
            if i > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match download_one(item, dir).await {
                Ok(path) => report.saved.push(path),
                Err(e) => {
                    log::error!(
                        "drape::gallery::download_many(...): failed to download {}: {}",
                        item.filename,
                        e
                    );
                    report.failed.push((item.id.clone(), e.to_string()));
                }
            }
        }
        report
    }
}

/// Outcome of a bulk download.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadReport {
    /// Files written, in download order.
    pub saved: Vec<PathBuf>,
    /// `(result id, reason)` for every item that could not be saved.
    pub failed: Vec<(String, String)>,
}

impl DownloadReport {
    /// `true` when nothing failed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Fetch one result and save it under its filename in `dir`. An existing file is never
/// overwritten; a ` (n)` suffix is added instead.
pub async fn download_one(item: &GenerationResult, dir: &Path) -> Result<PathBuf, StudioError> {
    let client = get_or_create_client(origin(&item.result_url));
    let response = client
        .get(&item.result_url)
        .send()
        .await
        .map_err(|e| StudioError::Io(format!("fetching {}: {}", item.result_url, e)))?;
    let status = response.status();
    if !status.is_success() {
        return Err(StudioError::Io(format!(
            "fetching {}: status {}",
            item.result_url, status
        )));
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|e| StudioError::Io(format!("reading {}: {}", item.result_url, e)))?;

    tokio::fs::create_dir_all(dir).await?;
    let path = unused_path(dir, &item.filename).await;
    tokio::fs::write(&path, &bytes).await?;
    log::info!(
        "drape::gallery::download_one(...): saved {} ({} bytes)",
        path.display(),
        bytes.len()
    );
    Ok(path)
}

/// Scheme and authority of `url`, used as the connection-pool key.
fn origin(url: &str) -> &str {
    let after_scheme = url.find("://").map(|i| i + 3).unwrap_or(0);
    match url[after_scheme..].find('/') {
        Some(i) => &url[..after_scheme + i],
        None => url,
    }
}

async fn unused_path(dir: &Path, filename: &str) -> PathBuf {
    let candidate = dir.join(filename);
    if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
        return candidate;
    }
    let (stem, ext) = match filename.rfind('.') {
        Some(i) => (&filename[..i], &filename[i..]),
        None => (filename, ""),
    };
    let mut n = 1;
    loop {
        let candidate = dir.join(format!("{} ({}){}", stem, n, ext));
        if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            return candidate;
        }
        n += 1;
    }
}

/// Relative label for a gallery timestamp, as seen at `now`.
///
/// `"Just now"` under a minute, `"Nm ago"` under an hour, then `"Today at HH:MM"`,
/// `"Yesterday at HH:MM"` or `"Mon D at HH:MM"` in `now`'s time zone.
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use drape::gallery::describe_age;
///
/// let made = Utc.with_ymd_and_hms(2026, 3, 4, 9, 0, 0).unwrap();
/// let now = Utc.with_ymd_and_hms(2026, 3, 4, 9, 5, 30).unwrap();
/// assert_eq!(describe_age(made, now), "5m ago");
/// ```
pub fn describe_age<Tz>(created_at: DateTime<Utc>, now: DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let elapsed = now.clone().with_timezone(&Utc) - created_at;
    let minutes = elapsed.num_minutes();
    if minutes < 1 {
        return "Just now".to_string();
    }
    if minutes < 60 {
        return format!("{}m ago", minutes);
    }

    let local = created_at.with_timezone(&now.timezone());
    let today = now.date_naive();
    let time = local.format("%H:%M");
    if local.date_naive() == today {
        format!("Today at {}", time)
    } else if today.pred_opt() == Some(local.date_naive()) {
        format!("Yesterday at {}", time)
    } else {
        format!("{} at {}", local.format("%b %-d"), time)
    }
}
