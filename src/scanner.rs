// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::document::{Document, DocumentError, Format};
use crate::rewriter::ConditionRewriter;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, error, info, warn};
use serde::Deserialize;
use walkdir::WalkDir;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScanOptions {
    /// Worker threads. Zero means one per CPU.
    pub workers: usize,
    /// Report what would change without writing anything.
    pub dry_run: bool,
    /// File extensions considered, without the dot.
    pub extensions: Vec<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            workers: 0,
            dry_run: false,
            extensions: vec!["xml".to_string(), "json".to_string()],
        }
    }
}

impl ScanOptions {
    fn worker_count(&self, files: usize) -> usize {
        let workers = if self.workers == 0 {
            num_cpus::get()
        } else {
            self.workers
        };
        workers.clamp(1, files.max(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Not a StructureDefinition.
    NotApplicable,
    Unchanged,
    Changed { written: bool },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub files: usize,
    pub definitions: usize,
    pub changed: usize,
    pub written: usize,
    pub failed: usize,
}

impl ScanSummary {
    fn record(&mut self, outcome: &Result<Outcome, DocumentError>) {
        self.files += 1;
        match outcome {
            Ok(Outcome::NotApplicable) => (),
            Ok(Outcome::Unchanged) => self.definitions += 1,
            Ok(Outcome::Changed { written }) => {
                self.definitions += 1;
                self.changed += 1;
                if *written {
                    self.written += 1;
                }
            }
            Err(_) => self.failed += 1,
        }
    }

    fn merge(&mut self, other: &ScanSummary) {
        self.files += other.files;
        self.definitions += other.definitions;
        self.changed += other.changed;
        self.written += other.written;
        self.failed += other.failed;
    }
}

/// Walks a directory tree and rewrites every StructureDefinition found.
pub struct Scanner {
    rewriter: ConditionRewriter,
    options: ScanOptions,
}

impl Scanner {
    pub fn new(rewriter: ConditionRewriter, options: ScanOptions) -> Self {
        Self { rewriter, options }
    }

    /// Candidate files under `root`, sorted.
    pub fn candidates(&self, root: &Path) -> Result<Vec<PathBuf>, DocumentError> {
        let meta = fs::metadata(root).map_err(|source| DocumentError::Io {
            path: root.into(),
            source,
        })?;
        if !meta.is_dir() {
            return Err(DocumentError::Io {
                path: root.into(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "not a directory"),
            });
        }

        let mut files = vec![];
        for entry in WalkDir::new(root) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("{e}");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let wanted = entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| self.options.extensions.iter().any(|e| e == ext));
            if wanted {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    }

    pub fn scan(&self, root: &Path) -> Result<ScanSummary, DocumentError> {
        let files = self.candidates(root)?;
        let workers = self.options.worker_count(files.len());
        info!("scanning {} files with {workers} workers", files.len());

        let next = AtomicUsize::new(0);
        let mut summary = ScanSummary::default();
        std::thread::scope(|s| {
            let (next, files) = (&next, &files);
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    s.spawn(move || {
                        let mut local = ScanSummary::default();
                        loop {
                            let idx = next.fetch_add(1, Ordering::Relaxed);
                            let Some(path) = files.get(idx) else {
                                break;
                            };
                            let outcome = self.process_file(path);
                            if let Err(e) = &outcome {
                                warn!("skipping {}: {e}", path.display());
                            }
                            local.record(&outcome);
                        }
                        local
                    })
                })
                .collect();
            for handle in handles {
                match handle.join() {
                    Ok(local) => summary.merge(&local),
                    Err(_) => error!("worker thread panicked"),
                }
            }
        });
        Ok(summary)
    }

    /// Processes one file. Files that are not StructureDefinitions are left
    /// alone; a definition is written back only when the rewriter changed it.
    pub fn process_file(&self, path: &Path) -> Result<Outcome, DocumentError> {
        let Some(format) = Format::from_path(path) else {
            return Ok(Outcome::NotApplicable);
        };
        let text = fs::read_to_string(path).map_err(|source| DocumentError::Io {
            path: path.into(),
            source,
        })?;
        let mut doc = Document::parse(format, &text)?;
        let Some(mut sd) = doc.definition()? else {
            debug!("{}: not a StructureDefinition", path.display());
            return Ok(Outcome::NotApplicable);
        };

        if !self.rewriter.process(&mut sd) {
            return Ok(Outcome::Unchanged);
        }
        doc.apply(&sd)?;
        if self.options.dry_run {
            info!("would update {}", path.display());
            return Ok(Outcome::Changed { written: false });
        }
        doc.write(path)?;
        info!("updated {}", path.display());
        Ok(Outcome::Changed { written: true })
    }
}
