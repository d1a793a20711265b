//! Files queued in the composer and the readers used to upload them.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parlor_shared::SendableAttachment;
use tracing::{debug, warn};

use crate::error::InputError;

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

/// Attachments of the message being composed, with unique display names.
#[derive(Debug, Clone, Default)]
pub struct Files {
    files: Vec<SendableAttachment>,
}

impl Files {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.name.as_str())
    }

    /// Add `attachment`, prefixing `_` to its name until it is unique.
    /// Returns the name it was stored under.
    pub fn add(&mut self, mut attachment: SendableAttachment) -> &str {
        while self.files.iter().any(|f| f.name == attachment.name) {
            attachment.name.insert(0, '_');
        }
        self.files.push(attachment);
        &self.files[self.files.len() - 1].name
    }

    pub fn add_path(&mut self, path: &Path) -> Result<&str, InputError> {
        let invalid = |reason: String| InputError::InvalidAttachment {
            path: path.to_path_buf(),
            reason,
        };

        let meta = std::fs::metadata(path).map_err(|e| invalid(e.to_string()))?;
        if !meta.is_file() {
            return Err(invalid("not a regular file".into()));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| invalid("no file name".into()))?;

        let owned = path.to_path_buf();
        let size = i64::try_from(meta.len()).unwrap_or(-1);
        debug!(path = %path.display(), size, "Attachment added");
        Ok(self.add(SendableAttachment::new(name, size, move || {
            Ok(Box::new(File::open(&owned)?) as Box<dyn Read + Send>)
        })))
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.files.len();
        self.files.retain(|f| f.name != name);
        self.files.len() != before
    }

    pub fn take(&mut self) -> Vec<SendableAttachment> {
        std::mem::take(&mut self.files)
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }
}

// ---------------------------------------------------------------------------
// Readers
// ---------------------------------------------------------------------------

/// Reads an attachment, re-opening it from the start after a failed read so
/// the next upload attempt streams the whole file again.
pub struct ReusableReader {
    attachment: SendableAttachment,
    current: Option<Box<dyn Read + Send>>,
}

impl ReusableReader {
    pub fn new(attachment: SendableAttachment) -> Self {
        Self {
            attachment,
            current: None,
        }
    }

    /// Start over on the next read.
    pub fn rewind(&mut self) {
        self.current = None;
    }
}

impl Read for ReusableReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let reader = match self.current.take() {
            Some(reader) => reader,
            None => self.attachment.open()?,
        };
        let reader = self.current.insert(reader);
        match reader.read(buf) {
            Ok(n) => Ok(n),
            Err(e) => {
                warn!(name = %self.attachment.name, error = %e, "Attachment read failed");
                self.current = None;
                Err(e)
            }
        }
    }
}

impl fmt::Debug for ReusableReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReusableReader")
            .field("attachment", &self.attachment)
            .field("open", &self.current.is_some())
            .finish()
    }
}

/// Shared upload progress of one attachment, readable from any thread.
#[derive(Debug, Clone)]
pub struct Progress {
    read: Arc<AtomicU64>,
    total: i64,
}

impl Progress {
    pub fn new(total: i64) -> Self {
        Self {
            read: Arc::new(AtomicU64::new(0)),
            total,
        }
    }

    /// Fraction read in `[0, 1]`, or `-1` when the total is unknown.
    pub fn fraction(&self) -> f64 {
        if self.total <= 0 {
            return -1.0;
        }
        let read = self.read.load(Ordering::Relaxed) as f64;
        (read / self.total as f64).min(1.0)
    }

    fn add(&self, n: usize) {
        self.read.fetch_add(n as u64, Ordering::Relaxed);
    }

    fn reset(&self) {
        self.read.store(0, Ordering::Relaxed);
    }
}

/// Counts the bytes read through it into a [`Progress`].
pub struct ProgressReader<R> {
    inner: R,
    progress: Progress,
}

impl<R: Read> ProgressReader<R> {
    pub fn new(inner: R, progress: Progress) -> Self {
        Self { inner, progress }
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.progress.add(n);
        Ok(n)
    }
}

/// Wrap `attachment` so every `open` reports into a fresh [`Progress`].
pub fn with_progress(attachment: SendableAttachment) -> (SendableAttachment, Progress) {
    let progress = Progress::new(attachment.size);
    let shared = progress.clone();
    let name = attachment.name.clone();
    let size = attachment.size;
    let wrapped = SendableAttachment::new(name, size, move || {
        shared.reset();
        let inner = attachment.open()?;
        Ok(Box::new(ProgressReader::new(inner, shared.clone())) as Box<dyn Read + Send>)
    });
    (wrapped, progress)
}
