use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};

use pak_format::PakPath;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::extract::{ExtractError, ExtractOutcome, ExtractionPipeline, FileSink};
use crate::node::{NamespaceNode, NodeIndex};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Node {} does not exist in this namespace", .0.get())]
    UnknownNode(NodeIndex),

    #[error("Creating directory failed. Path: '{}'", .1.display())]
    CreateDirFailed(#[source] std::io::Error, PathBuf),

    #[error("Creating file failed. Path: '{}'", .1.display())]
    CreateFileFailed(#[source] std::io::Error, PathBuf),

    #[error("Refusing to export `{path}` outside the destination directory")]
    UnsafePath { path: String },

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("Export task stopped unexpectedly")]
    Join(#[from] tokio::task::JoinError),
}

/// Options for batch export.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// A successful export never finishes sooner than this, so that progress
    /// can be seen even for a handful of small files.
    pub min_duration: Duration,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            min_duration: Duration::from_secs(1),
        }
    }
}

/// Statistics from a batch export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportStats {
    /// Number of files written.
    pub files_exported: u64,
    /// Number of directories created.
    pub dirs_created: u64,
    /// Total bytes written to disk.
    pub bytes_written: u64,
    /// The export stopped early because it was cancelled.
    pub cancelled: bool,
}

/// Progress updates from a batch export.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportProgress {
    /// Export started.
    Started { total_files: u64 },
    /// A file was written.
    Exported {
        name: String,
        completed: u64,
        total: u64,
    },
    /// The export is over, whether it completed or was cancelled.
    Finished,
}

impl ExportProgress {
    /// Human readable status line.
    pub fn status(&self) -> String {
        match self {
            ExportProgress::Started { total_files } => format!("Exporting {total_files} files"),
            ExportProgress::Exported {
                name,
                completed,
                total,
            } => format!("Exporting {name} ({completed}/{total})"),
            ExportProgress::Finished => "Export finished".to_string(),
        }
    }

    /// Share of the work done, from 0.0 to 1.0.
    pub fn fraction(&self) -> f64 {
        match self {
            ExportProgress::Started { .. } => 0.0,
            ExportProgress::Exported { total: 0, .. } | ExportProgress::Finished => 1.0,
            ExportProgress::Exported {
                completed, total, ..
            } => *completed as f64 / *total as f64,
        }
    }
}

struct PlannedFile {
    node: NodeIndex,
    target: PathBuf,
}

/// True if `relative` is made only of plain names, so joining it onto a
/// directory can never leave that directory.
fn stays_inside(relative: &Path) -> bool {
    relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
}

fn planned_target(destination: &Path, relative: &Path, path: &PakPath) -> Result<PathBuf, ExportError> {
    if relative.as_os_str().is_empty() || !stays_inside(relative) {
        return Err(ExportError::UnsafePath {
            path: path.to_string(),
        });
    }
    Ok(destination.join(relative))
}

/// Writes selected nodes of a namespace to disk.
#[derive(Debug, Clone)]
pub struct BatchExport {
    pipeline: ExtractionPipeline,
    options: ExportOptions,
    progress: Option<UnboundedSender<ExportProgress>>,
    cancel: CancellationToken,
}

impl BatchExport {
    pub fn new(pipeline: ExtractionPipeline) -> BatchExport {
        BatchExport {
            pipeline,
            options: ExportOptions::default(),
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn options(mut self, options: ExportOptions) -> Self {
        self.options = options;
        self
    }

    pub fn progress(mut self, tx: UnboundedSender<ExportProgress>) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn send(&self, event: ExportProgress) {
        if let Some(p) = self.progress.as_ref() {
            let _ = p.send(event);
        }
    }

    /// Work out where every file lands.
    ///
    /// A selected directory contributes its contents, not itself: exporting
    /// `Data` into `out` writes `out/icon.png`. A selected file is written as
    /// `out/<name>`.
    fn plan(&self, items: &[NodeIndex], destination: &Path) -> Result<Vec<PlannedFile>, ExportError> {
        let ns = self.pipeline.namespace();
        let mut planned = Vec::new();
        for &item in items {
            match ns.node(item) {
                None => return Err(ExportError::UnknownNode(item)),
                Some(NamespaceNode::File(file)) => planned.push(PlannedFile {
                    node: item,
                    target: planned_target(destination, Path::new(&file.name), &file.path)?,
                }),
                Some(NamespaceNode::Directory(dir)) => {
                    for node in ns.files_under(item) {
                        let Some(file) = ns.file(node) else { continue };
                        let relative = file
                            .path
                            .strip_prefix(&dir.path)
                            .unwrap_or_else(|| file.path.clone());
                        planned.push(PlannedFile {
                            node,
                            target: planned_target(destination, &relative.to_path_buf(), &file.path)?,
                        });
                    }
                }
            }
        }
        Ok(planned)
    }

    /// Export `items` under `destination`, on the current thread.
    ///
    /// The first failing file aborts the rest of the batch. Its partial output
    /// is removed. [ExportProgress::Finished] is sent however the export ends.
    pub fn export_batch(
        &self,
        items: &[NodeIndex],
        destination: &Path,
    ) -> Result<ExportStats, ExportError> {
        let start = Instant::now();
        let result = self.export_planned(items, destination);

        if let Ok(stats) = &result {
            let elapsed = start.elapsed();
            if !stats.cancelled && elapsed < self.options.min_duration {
                std::thread::sleep(self.options.min_duration - elapsed);
            }
        }

        self.send(ExportProgress::Finished);
        match &result {
            Ok(stats) => tracing::info!(
                files = stats.files_exported,
                bytes = stats.bytes_written,
                cancelled = stats.cancelled,
                "export finished"
            ),
            Err(e) => tracing::warn!(error = %e, "export failed"),
        }
        result
    }

    fn export_planned(
        &self,
        items: &[NodeIndex],
        destination: &Path,
    ) -> Result<ExportStats, ExportError> {
        let planned = self.plan(items, destination)?;
        let total = planned.len() as u64;
        let mut stats = ExportStats::default();
        let mut known_dirs = HashSet::new();

        tracing::info!(files = total, destination = %destination.display(), "exporting");
        self.send(ExportProgress::Started { total_files: total });

        self.create_dir(destination, &mut known_dirs, &mut stats)?;

        for (i, item) in planned.iter().enumerate() {
            if self.cancel.is_cancelled() {
                stats.cancelled = true;
                break;
            }

            let ns = self.pipeline.namespace();
            let Some(file) = ns.file(item.node) else {
                return Err(ExportError::UnknownNode(item.node));
            };

            if let Some(parent) = item.target.parent() {
                self.create_dir(parent, &mut known_dirs, &mut stats)?;
            }

            let sink = FileSink::create(&item.target)
                .map_err(|e| ExportError::CreateFileFailed(e, item.target.clone()))?;

            match self.pipeline.extract_to(file, sink, &self.cancel) {
                Ok(ExtractOutcome::Complete { bytes, .. }) => {
                    stats.files_exported += 1;
                    stats.bytes_written += bytes;
                }
                Ok(ExtractOutcome::Cancelled) => {
                    let _ = std::fs::remove_file(&item.target);
                    stats.cancelled = true;
                    break;
                }
                Err(e) => {
                    let _ = std::fs::remove_file(&item.target);
                    return Err(e.into());
                }
            }

            tracing::debug!(path = %file.path, target = %item.target.display(), "exported");
            self.send(ExportProgress::Exported {
                name: file.name.clone(),
                completed: i as u64 + 1,
                total,
            });
        }

        Ok(stats)
    }

    /// Export on the blocking pool.
    pub async fn run(self, items: Vec<NodeIndex>, destination: PathBuf) -> Result<ExportStats, ExportError> {
        tokio::task::spawn_blocking(move || self.export_batch(&items, &destination)).await?
    }

    fn create_dir(
        &self,
        path: &Path,
        known: &mut HashSet<PathBuf>,
        stats: &mut ExportStats,
    ) -> Result<(), ExportError> {
        if known.contains(path) {
            return Ok(());
        }
        if !path.is_dir() {
            std::fs::create_dir_all(path)
                .map_err(|e| ExportError::CreateDirFailed(e, path.to_path_buf()))?;
            stats.dirs_created += 1;
        }
        known.insert(path.to_path_buf());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_text() {
        let event = ExportProgress::Exported {
            name: "icon.png".into(),
            completed: 1,
            total: 4,
        };
        assert_eq!(event.status(), "Exporting icon.png (1/4)");
        assert_eq!(event.fraction(), 0.25);
        assert_eq!(ExportProgress::Started { total_files: 4 }.fraction(), 0.0);
        assert_eq!(ExportProgress::Finished.fraction(), 1.0);
        let empty = ExportProgress::Exported {
            name: String::new(),
            completed: 0,
            total: 0,
        };
        assert_eq!(empty.fraction(), 1.0);
    }

    #[test]
    fn targets_must_stay_inside() {
        let dest = Path::new("out");
        let path = PakPath::new("x");
        assert!(stays_inside(Path::new("Data/icon.png")));
        assert!(!stays_inside(Path::new("../escaped.txt")));
        assert!(!stays_inside(Path::new("/etc/escaped.txt")));
        assert!(!stays_inside(Path::new("./a")));
        assert_eq!(
            planned_target(dest, Path::new("Data/icon.png"), &path).unwrap(),
            dest.join("Data").join("icon.png")
        );
        assert!(matches!(
            planned_target(dest, Path::new(""), &path),
            Err(ExportError::UnsafePath { .. })
        ));
        assert!(matches!(
            planned_target(dest, Path::new("../x"), &path),
            Err(ExportError::UnsafePath { .. })
        ));
    }

    #[test]
    fn default_minimum_is_one_second() {
        assert_eq!(ExportOptions::default().min_duration, Duration::from_secs(1));
    }
}
