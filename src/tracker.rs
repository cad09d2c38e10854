use std::collections::HashMap;

use chrono::{Duration, Utc};

use crate::batch::{self, DownloadedFile};
use crate::canvas::{Course, FetchError, FileRecord, FileSource};
use crate::config::Config;
use crate::filter;
use crate::ledger::Ledger;
use crate::mailer::Notifier;

const NEW_FILE_WINDOW_HOURS: i64 = 24;

/// What a run produced: the aggregated non-fatal errors (reported by email,
/// not exit code) and whether anything critical happened.
pub struct RunReport {
    pub errors: Vec<String>,
    pub critical: bool,
}

pub struct Tracker<'a> {
    config: &'a Config,
    source: &'a dyn FileSource,
    notifier: &'a dyn Notifier,
}

impl<'a> Tracker<'a> {
    pub fn new(
        config: &'a Config,
        source: &'a dyn FileSource,
        notifier: &'a dyn Notifier,
    ) -> Self {
        Self {
            config,
            source,
            notifier,
        }
    }

    /// Check every monitored course for new files and email them.
    ///
    /// Courses are processed independently; a course's new file ids reach the
    /// ledger only if every batch email for that course went out. Failed
    /// courses are redelivered on the next run rather than silently lost.
    pub async fn run(&self, selected: Option<&[String]>) -> RunReport {
        tracing::info!("Starting Canvas file check");

        let mut ledger = Ledger::load(&self.config.seen_files_path());
        let mut errors = Vec::new();

        let courses = match self.source.active_courses().await {
            Ok(courses) => courses,
            Err(e) => {
                tracing::error!("Cannot reach Canvas API: {e:#}");
                errors.push(format!("CRITICAL - Cannot reach Canvas API: {e:#}"));
                return RunReport {
                    errors,
                    critical: true,
                };
            }
        };

        if courses.is_empty() {
            tracing::warn!(
                "No active courses found - enrollment may have changed or the API token lost access"
            );
            errors.push(
                "Canvas returned zero active courses. This may indicate enrollment changes or API token issues."
                    .to_string(),
            );
            return RunReport {
                errors,
                critical: false,
            };
        }
        tracing::info!("Found {} active courses", courses.len());

        let courses: Vec<Course> = match selected {
            Some(ids) => {
                let filtered: Vec<Course> = courses
                    .into_iter()
                    .filter(|c| ids.contains(&c.id))
                    .collect();
                tracing::info!("Filtered to {} configured courses", filtered.len());
                filtered
            }
            None => courses,
        };

        let mut new_files_found = false;
        let mut committed: HashMap<String, Vec<String>> = HashMap::new();
        let cutoff = Utc::now() - Duration::hours(NEW_FILE_WINDOW_HOURS);

        for course in &courses {
            tracing::info!("Checking course: {}", course.name);

            let files = match self.source.course_files(&course.id).await {
                Ok(files) => files,
                Err(FetchError::Forbidden) => {
                    tracing::debug!("Skipping course {} - file access forbidden", course.name);
                    continue;
                }
                Err(FetchError::Other(e)) => {
                    tracing::error!("Failed to fetch files for course {}: {e:#}", course.name);
                    errors.push(format!("Failed to fetch files for '{}': {e:#}", course.name));
                    continue;
                }
            };

            let new_files = filter::select_new_files(files, ledger.seen_for(&course.id), cutoff);
            if new_files.is_empty() {
                tracing::debug!("No new files in {}", course.name);
                continue;
            }
            tracing::info!("Found {} new files in {}", new_files.len(), course.name);
            new_files_found = true;

            if let Some(file_ids) = self.deliver_course(course, new_files, &mut errors).await {
                committed.insert(course.id.clone(), file_ids);
            }
        }

        for (course_id, file_ids) in committed {
            ledger.record(&course_id, file_ids);
        }

        let mut critical = false;
        if let Err(e) = ledger.save(&self.config.seen_files_path()) {
            tracing::error!("Failed to save seen-files ledger: {e:#}");
            errors.push(format!("CRITICAL - Failed to save seen-files ledger: {e:#}"));
            critical = true;
        }

        if new_files_found {
            tracing::info!("Check complete - new files found and emailed");
        } else {
            tracing::info!("Check complete - no new files found");
            if let Err(e) = self.notifier.send_no_updates(courses.len()).await {
                tracing::error!("Failed to send no-updates summary: {e:#}");
            }
        }

        RunReport { errors, critical }
    }

    /// Download a course's new files into a scoped temp directory, batch them
    /// by size, and send one email per batch. Returns the file ids to commit,
    /// or `None` when any batch failed (so nothing gets marked seen). The
    /// temp directory is removed when this returns, success or not.
    async fn deliver_course(
        &self,
        course: &Course,
        new_files: Vec<FileRecord>,
        errors: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        let temp_dir = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                tracing::error!("Failed to create download directory for {}: {e}", course.name);
                errors.push(format!(
                    "Failed to create download directory for '{}': {e}",
                    course.name
                ));
                return None;
            }
        };

        let mut downloaded = Vec::with_capacity(new_files.len());
        for file in new_files {
            let local_path = match self.source.download(&file.url).await {
                Ok(bytes) => {
                    let path = temp_dir.path().join(attachment_file_name(&file.display_name));
                    match std::fs::write(&path, &bytes) {
                        Ok(()) => Some(path),
                        Err(e) => {
                            tracing::warn!("Failed to store download {}: {e}", file.display_name);
                            None
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("Error downloading file {}: {e:#}", file.display_name);
                    None
                }
            };
            let size = local_path
                .as_deref()
                .and_then(|p| std::fs::metadata(p).ok())
                .map(|m| m.len())
                .unwrap_or(0);
            downloaded.push(DownloadedFile {
                id: file.id,
                display_name: file.display_name,
                created_at: file.created_at,
                local_path,
                size,
            });
        }

        let batches = batch::split_by_size(downloaded, self.config.max_email_size);
        let total = batches.len();
        let mut all_sent = true;
        let mut file_ids = Vec::new();

        for (idx, files) in batches.iter().enumerate() {
            let part = (total > 1).then_some((idx + 1, total));
            if let Err(e) = self
                .notifier
                .send_course_batch(&course.name, files, part)
                .await
            {
                tracing::error!(
                    "Failed to send email for {} (batch {}/{total}): {e:#}",
                    course.name,
                    idx + 1
                );
                errors.push(format!(
                    "Failed to send email for '{}' (batch {}/{total})",
                    course.name,
                    idx + 1
                ));
                all_sent = false;
            }
            file_ids.extend(files.iter().map(|f| f.id.clone()));
        }

        if all_sent {
            Some(file_ids)
        } else {
            tracing::warn!(
                "Not marking files as seen for {} due to email failures",
                course.name
            );
            None
        }
    }
}

// Display names come from the remote listing; keep them out of parent dirs.
fn attachment_file_name(display_name: &str) -> String {
    display_name.replace(['/', '\\'], "_")
}
