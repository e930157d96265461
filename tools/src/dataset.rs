//! Sample files.
//!
//! Samples are stored as raw little-endian `f64` values in files named `<prefix>_<seq>.f64`, where `seq` is a
//! zero-padded sequence number, so that sorting file names restores the order of samples.

use crate::config::Sample;
use anyhow::{bail, Context, Result};
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    mem::size_of,
    path::{Path, PathBuf},
};

pub const EXTENSION: &str = "f64";

/// Path of the file number `seq` for `prefix`.
pub fn file_path(prefix: &Path, seq: usize) -> PathBuf {
    let mut name = prefix.as_os_str().to_owned();
    name.push(format!("_{seq:06}.{EXTENSION}"));
    PathBuf::from(name)
}

/// Writes samples into a sequence of files, starting a new file every `points_per_file` samples.
pub struct DatasetWriter {
    prefix: PathBuf,
    points_per_file: usize,
    current: Option<BufWriter<File>>,
    in_current: usize,
    files: Vec<PathBuf>,
    total: u64,
}

impl DatasetWriter {
    pub fn new(prefix: impl Into<PathBuf>, points_per_file: usize) -> Self {
        Self {
            prefix: prefix.into(),
            points_per_file: points_per_file.max(1),
            current: None,
            in_current: 0,
            files: Vec::new(),
            total: 0,
        }
    }

    /// Files created so far.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Number of samples written so far.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn write(&mut self, mut samples: &[Sample]) -> Result<()> {
        while !samples.is_empty() {
            if self.current.is_none() || self.in_current == self.points_per_file {
                self.rotate()?;
            }
            let count = usize::min(samples.len(), self.points_per_file - self.in_current);
            let (head, tail) = samples.split_at(count);
            if let Some(file) = &mut self.current {
                for x in head {
                    file.write_all(&x.to_le_bytes())?;
                }
            }
            self.in_current += count;
            self.total += count as u64;
            samples = tail;
        }
        Ok(())
    }

    fn rotate(&mut self) -> Result<()> {
        self.flush()?;
        let path = file_path(&self.prefix, self.files.len());
        let file = File::create(&path).with_context(|| format!("cannot create {}", path.display()))?;
        tracing::debug!(path = %path.display(), "started sample file");
        self.files.push(path);
        self.in_current = 0;
        self.current = Some(BufWriter::new(file));
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        if let Some(file) = &mut self.current {
            file.flush()?;
        }
        Ok(())
    }

    /// Flushes the last file and returns paths of all written files.
    pub fn finish(mut self) -> Result<Vec<PathBuf>> {
        self.flush()?;
        Ok(self.files)
    }
}

/// Loads all samples stored in a file.
pub fn read_samples(path: &Path) -> Result<Vec<Sample>> {
    let bytes = fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
    if bytes.len() % size_of::<Sample>() != 0 {
        bail!("{}: size {} is not a multiple of sample size", path.display(), bytes.len());
    }
    Ok(bytes
        .chunks_exact(size_of::<Sample>())
        .map(|chunk| {
            let mut raw = [0; size_of::<Sample>()];
            raw.copy_from_slice(chunk);
            Sample::from_le_bytes(raw)
        })
        .collect())
}
