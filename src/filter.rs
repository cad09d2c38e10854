use chrono::{DateTime, Utc};

use crate::canvas::FileRecord;

/// Select the files worth reporting: not yet in the seen-set and uploaded at
/// or after the cutoff. A missing or unparseable upload timestamp selects the
/// file anyway, so malformed upstream data can over-notify but never hide a
/// new file. Source order is preserved.
pub fn select_new_files(
    files: Vec<FileRecord>,
    seen: &[String],
    cutoff: DateTime<Utc>,
) -> Vec<FileRecord> {
    files
        .into_iter()
        .filter(|file| {
            if seen.iter().any(|id| id == &file.id) {
                return false;
            }
            match file.created_at.as_deref().map(DateTime::parse_from_rfc3339) {
                Some(Ok(created)) => created.with_timezone(&Utc) >= cutoff,
                Some(Err(_)) => {
                    tracing::warn!(
                        "Unparseable upload timestamp on {} - including it to be safe",
                        file.display_name
                    );
                    true
                }
                None => {
                    tracing::warn!(
                        "No upload timestamp on {} - including it to be safe",
                        file.display_name
                    );
                    true
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn file(id: &str, created_at: Option<&str>) -> FileRecord {
        FileRecord {
            id: id.to_string(),
            display_name: format!("{id}.pdf"),
            created_at: created_at.map(str::to_string),
            url: format!("https://files/{id}"),
        }
    }

    fn cutoff() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 7, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_seen_files_never_reselected() {
        let files = vec![
            file("1", Some("2026-08-07T10:00:00Z")),
            file("2", Some("2026-08-07T10:00:00Z")),
        ];
        let seen = vec!["1".to_string()];
        let selected = select_new_files(files, &seen, cutoff());
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, "2");
    }

    #[test]
    fn test_old_files_excluded() {
        let files = vec![
            file("1", Some("2026-08-06T23:59:59Z")),
            file("2", Some("2026-08-07T00:00:00Z")),
        ];
        let selected = select_new_files(files, &[], cutoff());
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, "2");
    }

    #[test]
    fn test_unparseable_timestamp_included() {
        let files = vec![file("1", Some("yesterday-ish"))];
        let selected = select_new_files(files, &[], cutoff());
        assert_eq!(selected.len(), 1);
    }

    #[test]
    fn test_missing_timestamp_included() {
        let files = vec![file("1", None)];
        let selected = select_new_files(files, &[], cutoff());
        assert_eq!(selected.len(), 1);
    }

    #[test]
    fn test_seen_wins_over_unparseable_timestamp() {
        let files = vec![file("1", Some("garbage"))];
        let seen = vec!["1".to_string()];
        assert!(select_new_files(files, &seen, cutoff()).is_empty());
    }

    #[test]
    fn test_source_order_preserved() {
        let files = vec![
            file("3", Some("2026-08-07T12:00:00Z")),
            file("1", None),
            file("2", Some("2026-08-07T09:00:00Z")),
        ];
        let selected = select_new_files(files, &[], cutoff());
        let ids: Vec<_> = selected.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "1", "2"]);
    }
}
