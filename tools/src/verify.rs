use crate::{
    config::Sample,
    dataset::read_samples,
    signal::{generate, transform},
};
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Number of mismatches kept in a report.
pub const MAX_REPORTED: usize = 30;

#[derive(Clone, Debug, PartialEq)]
pub struct Mismatch {
    pub index: u64,
    pub file: PathBuf,
    pub found: Sample,
    pub expected: Sample,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Report {
    /// Total number of checked samples.
    pub points: u64,
    /// Total number of mismatching samples.
    pub mismatch_count: u64,
    /// First [`MAX_REPORTED`] mismatches.
    pub mismatches: Vec<Mismatch>,
}

impl Report {
    pub fn is_ok(&self) -> bool {
        self.mismatch_count == 0
    }
}

/// Expected value of sample number `j`.
pub fn expected(j: u64, transformed: bool) -> Sample {
    let x = generate(j);
    if transformed {
        transform(j, x)
    } else {
        x
    }
}

/// Checks that the files, taken in name order, contain the generated sequence starting from the first sample.
pub fn verify<P: AsRef<Path>>(files: &[P], transformed: bool) -> Result<Report> {
    let mut files = files.iter().map(|path| path.as_ref()).collect::<Vec<_>>();
    files.sort();

    let mut report = Report::default();
    for file in files {
        let samples = read_samples(file)?;
        tracing::info!(file = %file.display(), points = samples.len(), "checking");
        for found in samples {
            let index = report.points;
            let expected = expected(index, transformed);
            if found != expected {
                report.mismatch_count += 1;
                if report.mismatches.len() < MAX_REPORTED {
                    report.mismatches.push(Mismatch {
                        index,
                        file: file.to_path_buf(),
                        found,
                        expected,
                    });
                }
            }
            report.points += 1;
        }
    }
    Ok(report)
}
