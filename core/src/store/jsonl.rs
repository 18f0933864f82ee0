use crate::prelude::{Point, PointFields, ScanError, ScanResult};
use crate::store::PointStore;
use crate::telemetry::LogManager;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tempfile::NamedTempFile;

/// Append-only JSON-lines store, one point per line, mirrored in memory.
pub struct JsonlStore {
    path: PathBuf,
    inner: Mutex<Inner>,
    logger: LogManager,
}

struct Inner {
    file: File,
    points: Vec<Point>,
}

impl JsonlStore {
    /// Opens the store at `path`, replaying any points already on disk.
    pub fn open<P: AsRef<Path>>(path: P) -> ScanResult<Self> {
        let path = path.as_ref().to_path_buf();
        let logger = LogManager::new("jsonl-store");

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let points = if path.exists() {
            Self::replay(&path, &logger)?
        } else {
            Vec::new()
        };
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;
        if Self::ends_mid_line(&mut file)? {
            logger.warn(&format!("terminating partial last line in {}", path.display()));
            file.write_all(b"\n")?;
        }

        logger.record(&format!(
            "opened {} with {} points",
            path.display(),
            points.len()
        ));

        Ok(Self {
            path,
            inner: Mutex::new(Inner { file, points }),
            logger,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn replay(path: &Path, logger: &LogManager) -> ScanResult<Vec<Point>> {
        let reader = BufReader::new(File::open(path)?);
        let mut points = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Point>(&line) {
                Ok(point) => points.push(point),
                Err(err) => logger.warn(&format!(
                    "skipping corrupt line {} in {}: {}",
                    index + 1,
                    path.display(),
                    err
                )),
            }
        }
        Ok(points)
    }

    fn ends_mid_line(file: &mut File) -> ScanResult<bool> {
        if file.metadata()?.len() == 0 {
            return Ok(false);
        }
        file.seek(SeekFrom::End(-1))?;
        let mut last = [0u8; 1];
        file.read_exact(&mut last)?;
        Ok(last[0] != b'\n')
    }

    fn append(file: &mut File, point: &Point) -> ScanResult<()> {
        if ![point.intensity, point.x, point.y, point.z]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(ScanError::Storage(format!(
                "point {} has a non-finite field",
                point.id
            )));
        }
        let mut line = serde_json::to_string(point)?;
        line.push('\n');

        let start = file.metadata()?.len();
        if let Err(err) = file.write_all(line.as_bytes()) {
            // Drop the partial line so the next append starts clean.
            file.set_len(start)?;
            return Err(err.into());
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PointStore for JsonlStore {
    fn insert_batch(&self, batch: Vec<PointFields>) -> Vec<Point> {
        let mut inner = self.lock();
        let mut stored = Vec::with_capacity(batch.len());

        for fields in batch {
            let point = Point::new(fields);
            match Self::append(&mut inner.file, &point) {
                Ok(()) => stored.push(point),
                Err(err) => self
                    .logger
                    .warn(&format!("failed to persist point {}: {}", point.id, err)),
            }
        }
        if let Err(err) = inner.file.flush() {
            self.logger.error(&format!("flush failed: {}", err));
        }

        inner.points.extend(stored.iter().cloned());
        stored
    }

    fn get_all(&self) -> Vec<Point> {
        self.lock().points.clone()
    }

    fn clear(&self) -> bool {
        let mut inner = self.lock();
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let replaced = NamedTempFile::new_in(dir)
            .and_then(|empty| empty.persist(&self.path).map_err(|err| err.error));

        match replaced {
            Ok(file) => {
                inner.file = file;
                inner.points.clear();
                self.logger
                    .record(&format!("cleared {}", self.path.display()));
                true
            }
            Err(err) => {
                self.logger.error(&format!(
                    "clear of {} failed, store unchanged: {}",
                    self.path.display(),
                    err
                ));
                false
            }
        }
    }

    fn len(&self) -> usize {
        self.lock().points.len()
    }
}
