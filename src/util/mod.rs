//! Filesystem Helpers
//!
//! Small helpers shared by the stage runners and the query path: line counting
//! for work-item estimates, random access to a single line of a cache file, and
//! folder management.

use anyhow::Context;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Counts the lines of `path`. A missing file counts as empty so stages can
/// treat zones that never produced output uniformly.
pub fn count_lines(path: &Path) -> io::Result<u64> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(error) => return Err(error),
    };

    let mut reader = BufReader::new(file);
    let mut chunk = Vec::new();
    let mut line_count = 0u64;
    loop {
        chunk.clear();
        let read = reader.read_until(b'\n', &mut chunk)?;
        if read == 0 {
            break;
        }
        line_count += 1;
    }
    Ok(line_count)
}

/// Reads line `line_number` (zero-based) of `path` by scanning from the start.
pub fn read_line(path: &Path, line_number: u64) -> anyhow::Result<String> {
    let file = File::open(path)
        .with_context(|| format!("unable to open {} for line read", path.display()))?;

    for (current_line, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if current_line as u64 == line_number {
            return Ok(line);
        }
    }

    anyhow::bail!("line {} not found in {}", line_number, path.display())
}

pub fn create_folder(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)
}

/// Deletes a folder tree. Missing folders are fine.
pub fn delete_folder(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(error) => Err(error),
    }
}
