/// The durable, ordered command log backing the state machine. Modeled
/// on the teacher's write-ahead log: JSON-line segments, a crc32 checksum
/// per entry, size-based rotation, and in-order recovery on startup.
use crate::compatibility::CompatibilityPolicy;
use crate::error::{RegistryError, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// A command appended only by the primary, replayed by every node
/// (including the primary itself) to derive Store state. No derived
/// fields (schema ids, version numbers) are ever encoded here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Command {
    RegisterSchema { subject: String, canonical_text: String },
    SetConfig { scope: ConfigScopeOwned, policy: CompatibilityPolicy },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConfigScopeOwned {
    Global,
    Subject(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LogEntry {
    offset: u64,
    command: Command,
    checksum: u32,
}

fn checksum_of(offset: u64, command: &Command) -> Result<u32> {
    let bytes = serde_json::to_vec(command)
        .map_err(|e| RegistryError::Fatal(format!("failed to serialize command: {}", e)))?;
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&offset.to_le_bytes());
    hasher.update(&bytes);
    Ok(hasher.finalize())
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub dir: PathBuf,
    pub max_segment_bytes: usize,
    pub sync_on_write: bool,
}

struct ActiveSegment {
    path: PathBuf,
    writer: BufWriter<File>,
    bytes_written: usize,
}

pub struct CommandLog {
    config: LogConfig,
    active: parking_lot::Mutex<ActiveSegment>,
    next_offset: std::sync::atomic::AtomicU64,
}

impl CommandLog {
    /// Open (creating if absent) the log directory, and position the
    /// writer at a fresh segment appended after the existing ones.
    pub fn open(config: LogConfig) -> Result<Self> {
        fs::create_dir_all(&config.dir)
            .map_err(|e| RegistryError::LogUnavailable(format!("cannot create log dir: {}", e)))?;

        let next_offset = Self::recover_max_offset(&config.dir)?
            .map(|o| o + 1)
            .unwrap_or(0);

        let segment_path = config.dir.join(format!("segment-{:020}.log", next_offset));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&segment_path)
            .map_err(|e| RegistryError::LogUnavailable(format!("cannot open segment: {}", e)))?;

        Ok(Self {
            active: parking_lot::Mutex::new(ActiveSegment {
                path: segment_path,
                writer: BufWriter::new(file),
                bytes_written: 0,
            }),
            config,
            next_offset: std::sync::atomic::AtomicU64::new(next_offset),
        })
    }

    fn segment_paths(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(|e| RegistryError::LogUnavailable(format!("cannot list log dir: {}", e)))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.extension().map(|e| e == "log").unwrap_or(false))
            .collect();
        paths.sort();
        Ok(paths)
    }

    fn recover_max_offset(dir: &Path) -> Result<Option<u64>> {
        let mut max_offset = None;
        for path in Self::segment_paths(dir)? {
            for entry in Self::read_segment(&path)? {
                max_offset = Some(entry.offset);
            }
        }
        Ok(max_offset)
    }

    fn read_segment(path: &Path) -> Result<Vec<LogEntry>> {
        let file = File::open(path)
            .map_err(|e| RegistryError::LogUnavailable(format!("cannot open segment {}: {}", path.display(), e)))?;
        let reader = BufReader::new(file);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line.map_err(|e| RegistryError::LogUnavailable(format!("read error: {}", e)))?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: LogEntry = serde_json::from_str(&line)
                .map_err(|e| RegistryError::Fatal(format!("corrupt log entry in {}: {}", path.display(), e)))?;
            let expected = checksum_of(entry.offset, &entry.command)?;
            if expected != entry.checksum {
                return Err(RegistryError::Fatal(format!(
                    "checksum mismatch at offset {} in {}",
                    entry.offset,
                    path.display()
                )));
            }
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Replay every committed command in log order, invoking `apply` for
    /// each. Used both at bootstrap and by a catching-up replica.
    pub fn replay(&self, mut apply: impl FnMut(u64, &Command)) -> Result<()> {
        for path in Self::segment_paths(&self.config.dir)? {
            for entry in Self::read_segment(&path)? {
                apply(entry.offset, &entry.command);
            }
        }
        Ok(())
    }

    /// Append a command, fsync if configured, and rotate the segment if
    /// it has grown past the configured threshold. Returns the committed
    /// offset.
    pub fn append(&self, command: Command) -> Result<u64> {
        let offset = self.next_offset.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let checksum = checksum_of(offset, &command)?;
        let entry = LogEntry { offset, command, checksum };
        let line = serde_json::to_string(&entry)
            .map_err(|e| RegistryError::Fatal(format!("failed to serialize log entry: {}", e)))?;

        let mut active = self.active.lock();
        writeln!(active.writer, "{}", line)
            .map_err(|e| RegistryError::LogUnavailable(format!("append failed: {}", e)))?;
        active.writer.flush()
            .map_err(|e| RegistryError::LogUnavailable(format!("flush failed: {}", e)))?;
        if self.config.sync_on_write {
            active.writer.get_ref().sync_data()
                .map_err(|e| RegistryError::LogUnavailable(format!("sync failed: {}", e)))?;
        }
        active.bytes_written += line.len() + 1;

        if active.bytes_written >= self.config.max_segment_bytes {
            self.rotate(&mut active, offset + 1)?;
        }

        tracing::debug!(offset, "appended command to log");
        Ok(offset)
    }

    fn rotate(&self, active: &mut ActiveSegment, next_offset: u64) -> Result<()> {
        active.writer.flush()
            .map_err(|e| RegistryError::LogUnavailable(format!("flush before rotate failed: {}", e)))?;
        let new_path = self.config.dir.join(format!("segment-{:020}.log", next_offset));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&new_path)
            .map_err(|e| RegistryError::LogUnavailable(format!("cannot open new segment: {}", e)))?;
        tracing::info!(from = %active.path.display(), to = %new_path.display(), "rotated command log segment");
        active.path = new_path;
        active.writer = BufWriter::new(file);
        active.bytes_written = 0;
        Ok(())
    }

    pub fn current_offset(&self) -> u64 {
        self.next_offset.load(std::sync::atomic::Ordering::SeqCst)
    }
}
