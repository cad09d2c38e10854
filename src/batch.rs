use std::path::PathBuf;

/// A new file after the download step. `local_path` is `None` when the
/// download failed; the file is then listed in the email body but carries no
/// attachment and counts as zero bytes for batching.
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub id: String,
    pub display_name: String,
    pub created_at: Option<String>,
    pub local_path: Option<PathBuf>,
    pub size: u64,
}

/// Greedy split into consecutive batches whose cumulative size stays at or
/// under `max_bytes`. A single file over the limit still gets its own batch
/// instead of being dropped. Concatenating the batches in order reproduces
/// the input.
pub fn split_by_size(files: Vec<DownloadedFile>, max_bytes: u64) -> Vec<Vec<DownloadedFile>> {
    let mut batches = Vec::new();
    let mut current: Vec<DownloadedFile> = Vec::new();
    let mut current_size: u64 = 0;

    for file in files {
        if current_size + file.size > max_bytes && !current.is_empty() {
            batches.push(std::mem::take(&mut current));
            current_size = 0;
        }
        current_size += file.size;
        current.push(file);
    }
    if !current.is_empty() {
        batches.push(current);
    }

    batches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(id: &str, size: u64) -> DownloadedFile {
        DownloadedFile {
            id: id.to_string(),
            display_name: format!("{id}.pdf"),
            created_at: None,
            local_path: None,
            size,
        }
    }

    fn ids(batch: &[DownloadedFile]) -> Vec<&str> {
        batch.iter().map(|f| f.id.as_str()).collect()
    }

    #[test]
    fn test_empty_input_no_batches() {
        assert!(split_by_size(Vec::new(), 10).is_empty());
    }

    #[test]
    fn test_all_fit_one_batch() {
        let batches = split_by_size(vec![file("a", 3), file("b", 4)], 10);
        assert_eq!(batches.len(), 1);
        assert_eq!(ids(&batches[0]), vec!["a", "b"]);
    }

    #[test]
    fn test_exact_fit_stays_in_batch() {
        let batches = split_by_size(vec![file("a", 6), file("b", 4)], 10);
        assert_eq!(batches.len(), 1);
    }

    #[test]
    fn test_split_preserves_order_and_content() {
        let input = vec![file("a", 6), file("b", 6), file("c", 6), file("d", 6)];
        let batches = split_by_size(input, 10);
        assert_eq!(batches.len(), 4);
        let concatenated: Vec<&str> = batches.iter().flat_map(|b| ids(b)).collect();
        assert_eq!(concatenated, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_oversized_file_gets_own_batch() {
        let batches = split_by_size(vec![file("a", 4), file("big", 25), file("b", 4)], 10);
        assert_eq!(batches.len(), 3);
        assert_eq!(ids(&batches[0]), vec!["a"]);
        assert_eq!(ids(&batches[1]), vec!["big"]);
        assert_eq!(ids(&batches[2]), vec!["b"]);
    }

    #[test]
    fn test_oversized_file_first_in_input() {
        let batches = split_by_size(vec![file("big", 25), file("a", 4)], 10);
        assert_eq!(batches.len(), 2);
        assert_eq!(ids(&batches[0]), vec!["big"]);
        assert_eq!(ids(&batches[1]), vec!["a"]);
    }

    #[test]
    fn test_zero_size_files_ride_along() {
        let batches = split_by_size(
            vec![file("a", 10), file("missing", 0), file("b", 10)],
            10,
        );
        assert_eq!(batches.len(), 2);
        assert_eq!(ids(&batches[0]), vec!["a", "missing"]);
        assert_eq!(ids(&batches[1]), vec!["b"]);
    }
}
