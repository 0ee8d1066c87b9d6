//! File Output Buffer Tests

#[cfg(test)]
mod tests {
    use crate::filebuf::{FileOutputBuffer, FileOutputBufferOptions};
    use std::fs;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::Arc;

    // ============================================================
    // TEST 1: Buffering below the limit, flushing at it
    // ============================================================

    #[test]
    fn test_append_buffers_until_bulk_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("records.txt");

        let buffer = FileOutputBuffer::new(FileOutputBufferOptions {
            bulk_output_limit: 1024,
            file_path: path.clone(),
            ..Default::default()
        });

        buffer.append("one").unwrap();
        buffer.append("two").unwrap();

        // Nothing written yet, the buffer is below the limit
        assert!(!path.exists());

        buffer.flush().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn test_size_triggered_flush_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zone").join("com").join("records.txt");

        let buffer = FileOutputBuffer::new(FileOutputBufferOptions {
            bulk_output_limit: 4,
            file_path: path.clone(),
            ..Default::default()
        });

        buffer.append("abcdef").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "abcdef\n");
    }

    // ============================================================
    // TEST 2: Callbacks
    // ============================================================

    #[test]
    fn test_on_append_fires_once_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let appends = Arc::new(AtomicUsize::new(0));
        let appends_seen = appends.clone();

        let buffer = FileOutputBuffer::new(FileOutputBufferOptions {
            bulk_output_limit: 1024,
            file_path: dir.path().join("records.txt"),
            on_append: Some(Box::new(move || {
                appends_seen.fetch_add(1, Ordering::SeqCst);
            })),
            ..Default::default()
        });

        for _ in 0..5 {
            buffer.append("line").unwrap();
        }

        assert_eq!(appends.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_on_flush_reports_cumulative_append_count() {
        let dir = tempfile::tempdir().unwrap();
        let last_reported = Arc::new(AtomicU64::new(0));
        let reported = last_reported.clone();

        let buffer = FileOutputBuffer::new(FileOutputBufferOptions {
            bulk_output_limit: 8,
            file_path: dir.path().join("records.txt"),
            on_flush: Some(Box::new(move |appended| {
                reported.store(appended, Ordering::SeqCst);
            })),
            ..Default::default()
        });

        buffer.append("0123456789").unwrap(); // size-triggered flush
        assert_eq!(last_reported.load(Ordering::SeqCst), 1);

        buffer.append("a").unwrap();
        buffer.append("b").unwrap();
        buffer.flush().unwrap();

        // The count is cumulative since construction, not per flush
        assert_eq!(last_reported.load(Ordering::SeqCst), 3);
        assert_eq!(buffer.appended_lines(), 3);
    }

    // ============================================================
    // TEST 3: Appends only count once on disk
    // ============================================================

    #[test]
    fn test_flush_is_idempotent_for_written_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.txt");

        let buffer = FileOutputBuffer::new(FileOutputBufferOptions {
            bulk_output_limit: 1024,
            file_path: path.clone(),
            ..Default::default()
        });

        buffer.append("only").unwrap();
        buffer.flush().unwrap();
        buffer.flush().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "only\n");
    }
}
