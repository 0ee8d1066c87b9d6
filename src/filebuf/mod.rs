//! Line-Appending Output Buffer
//!
//! Wraps appending to a single cache file. Lines accumulate in memory and are
//! flushed in bulk once the buffer reaches the configured size, keeping the
//! multi-gigabyte stage outputs from turning into one syscall per record.
//!
//! Two callbacks drive the surrounding bookkeeping: `on_append` fires once per
//! appended line (under the buffer lock) and `on_flush` fires after every
//! flush with the cumulative number of appends since construction. The flush
//! count is the value checkpoint writers persist: a line only counts once it
//! has hit the disk.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Mutex;

pub type AppendCallback = Box<dyn Fn() + Send + Sync>;
pub type FlushCallback = Box<dyn Fn(u64) + Send + Sync>;

#[derive(Default)]
pub struct FileOutputBufferOptions {
    pub bulk_output_limit: usize,
    pub file_path: PathBuf,
    pub on_append: Option<AppendCallback>,
    pub on_flush: Option<FlushCallback>,
}

pub struct FileOutputBuffer {
    opts: FileOutputBufferOptions,
    state: Mutex<BufferState>,
}

#[derive(Default)]
struct BufferState {
    buffer: String,
    appended_lines: u64,
}

impl FileOutputBuffer {
    pub fn new(opts: FileOutputBufferOptions) -> Self {
        Self {
            opts,
            state: Mutex::new(BufferState::default()),
        }
    }

    /// Appends `line + "\n"` to the buffer, flushing to disk when the buffer
    /// reaches the bulk output limit. Concurrent appends are serialized.
    pub fn append(&self, line: &str) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.appended_lines += 1;
        state.buffer.push_str(line);
        state.buffer.push('\n');

        if state.buffer.len() >= self.opts.bulk_output_limit {
            self.flush_locked(&mut state)?;
        }

        if let Some(on_append) = &self.opts.on_append {
            on_append();
        }

        Ok(())
    }

    pub fn flush(&self) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        self.flush_locked(&mut state)
    }

    pub fn appended_lines(&self) -> u64 {
        self.state.lock().unwrap().appended_lines
    }

    fn flush_locked(&self, state: &mut BufferState) -> io::Result<()> {
        if !state.buffer.is_empty() {
            if let Some(parent) = self.opts.file_path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let mut file = OpenOptions::new()
                .append(true)
                .create(true)
                .open(&self.opts.file_path)?;
            file.write_all(state.buffer.as_bytes())?;
            state.buffer.clear();
        }

        if let Some(on_flush) = &self.opts.on_flush {
            on_flush(state.appended_lines);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
