//! On-disk index snapshot: content file plus a `.properties` sidecar holding the ETag

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::de::IgnoredAny;
use tracing::{debug, info, warn};

use crate::config::INDEX_RELATIVE_PATH;
use crate::index::error::IndexError;

/// Index copy shipped with the binary, served until the first successful download.
pub static BUNDLED_INDEX: &[u8] = include_bytes!("../../resources/offline-index.json");

const ETAG_KEY: &str = "etag";

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

pub struct IndexStore {
    content_path: PathBuf,
    sidecar_path: PathBuf,
    fallback: Option<&'static [u8]>,
}

impl IndexStore {
    /// Store rooted at `cache_dir`, falling back to the bundled index.
    pub fn new(cache_dir: &Path) -> Self {
        let content_path = cache_dir.join(INDEX_RELATIVE_PATH);
        let mut sidecar_name = content_path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        sidecar_name.push(".properties");
        let sidecar_path = content_path.with_file_name(sidecar_name);

        Self {
            content_path,
            sidecar_path,
            fallback: Some(BUNDLED_INDEX),
        }
    }

    /// Replaces the offline copy served when nothing has been cached yet.
    pub fn with_fallback(mut self, fallback: Option<&'static [u8]>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn content_path(&self) -> &Path {
        &self.content_path
    }

    pub fn sidecar_path(&self) -> &Path {
        &self.sidecar_path
    }

    /// Returns the cached index, or the bundled copy if the cache is absent or unusable.
    pub fn load(&self) -> Result<Vec<u8>, IndexError> {
        let err = match fs::read(&self.content_path) {
            Ok(bytes) if bytes.is_empty() => {
                warn!("Cached index {:?} is empty", self.content_path);
                None
            }
            Ok(bytes) => match validate(&bytes) {
                Ok(()) => return Ok(bytes),
                Err(e) => {
                    warn!("Cached index {:?} is corrupt: {}", self.content_path, e);
                    None
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No cached index at {:?}", self.content_path);
                None
            }
            Err(e) => {
                warn!("Failed to read cached index {:?}: {}", self.content_path, e);
                Some(e)
            }
        };

        match (self.fallback, err) {
            (Some(bundled), _) => {
                debug!("Serving bundled offline index");
                Ok(bundled.to_vec())
            }
            (None, Some(e)) => Err(IndexError::Io(e)),
            (None, None) => Err(IndexError::NoIndexAvailable(
                self.content_path.display().to_string(),
            )),
        }
    }

    /// Validator of the cached content. `None` unless both the content file and a
    /// readable sidecar with a non-empty `etag` are present.
    pub fn etag(&self) -> Option<String> {
        if !self.content_path.is_file() {
            return None;
        }

        let text = fs::read_to_string(&self.sidecar_path)
            .inspect_err(|e| {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!("Failed to read index metadata {:?}: {}", self.sidecar_path, e);
                }
            })
            .ok()?;

        read_property(&text, ETAG_KEY).filter(|etag| !etag.is_empty())
    }

    /// Replaces content and sidecar. Each file is swapped in with a rename so readers
    /// never see a partial write.
    ///
    /// The old sidecar is removed before the content is touched, so an interrupted
    /// store leaves either the previous snapshot or new content without a validator.
    /// An error means the content file was not replaced.
    pub fn store(&self, content: &[u8], etag: Option<&str>) -> Result<(), IndexError> {
        match fs::remove_file(&self.sidecar_path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        write_atomic(&self.content_path, content)?;

        if let Some(etag) = etag {
            let properties = format!(
                "#{}\n{}={}\n",
                chrono::Utc::now().to_rfc2822(),
                ETAG_KEY,
                etag
            );
            if let Err(e) = write_atomic(&self.sidecar_path, properties.as_bytes()) {
                warn!(
                    "Stored index without validator, failed to write {:?}: {}",
                    self.sidecar_path, e
                );
            }
        }

        info!(
            "Stored index ({} bytes, etag {:?}) at {:?}",
            content.len(),
            etag,
            self.content_path
        );
        Ok(())
    }
}

/// Checks that `content` is one complete JSON document.
pub fn validate(content: &[u8]) -> Result<(), serde_json::Error> {
    serde_json::from_slice::<IgnoredAny>(content).map(|_| ())
}

/// Looks up `key` in java-properties style `key=value` text.
fn read_property(text: &str, key: &str) -> Option<String> {
    text.lines()
        .map(str::trim_start)
        .filter(|line| !line.starts_with('#') && !line.starts_with('!'))
        .filter_map(|line| line.split_once('='))
        .find(|(k, _)| k.trim() == key)
        .map(|(_, v)| v.trim().to_string())
}

fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(format!(
        ".tmp.{}.{}",
        std::process::id(),
        TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    let tmp_path = parent.join(tmp_name);

    let write_result = (|| -> io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()
    })();

    if let Err(e) = write_result.and_then(|()| fs::rename(&tmp_path, path)) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    Ok(())
}
