use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pakfs::{BatchExport, ExportOptions, ExportProgress, ExtractionPipeline};

use crate::cli::ExtractArgs;
use crate::error::{Error, Result};
use crate::util::{create_progress_bar, format_size};

/// Where extracted files go: `-o`, or else the current directory.
fn output_dir(output: Option<&Path>) -> Result<PathBuf> {
    match output {
        Some(path) => Ok(path.to_path_buf()),
        None => std::env::current_dir().map_err(|source| Error::CurrentDir { source }),
    }
}

pub async fn run(args: ExtractArgs) -> Result<()> {
    // Resolved before any pak is opened, so a failure here leaves nothing to unload.
    let output_path = output_dir(args.output.as_deref())?;
    let ns = super::open_namespace(&args.source, args.quiet).await?;

    let items = if args.paths.is_empty() {
        vec![ns.root()]
    } else {
        match args
            .paths
            .iter()
            .map(|p| super::find(&ns, p))
            .collect::<Result<Vec<_>>>()
        {
            Ok(items) => items,
            Err(e) => {
                ns.unload();
                return Err(e);
            }
        }
    };

    let show_progress = !args.quiet && std::io::stderr().is_terminal();
    let options = if show_progress {
        ExportOptions::default()
    } else {
        ExportOptions {
            min_duration: Duration::ZERO,
        }
    };

    let (progress_tx, mut progress_rx) = tokio::sync::mpsc::unbounded_channel::<ExportProgress>();
    let progress_task = tokio::spawn(async move {
        let mut bar = None;
        while let Some(update) = progress_rx.recv().await {
            if !show_progress {
                continue;
            }
            match update {
                ExportProgress::Started { total_files } => {
                    bar = Some(create_progress_bar(total_files, "Extracting"));
                }
                ExportProgress::Exported { completed, .. } => {
                    if let Some(pb) = &bar {
                        pb.set_message(update.status());
                        pb.set_position(completed);
                    }
                }
                ExportProgress::Finished => {
                    if let Some(pb) = bar.take() {
                        pb.finish_and_clear();
                    }
                }
            }
        }
        if let Some(pb) = bar {
            pb.finish_and_clear();
        }
    });

    let export = BatchExport::new(ExtractionPipeline::new(ns.clone()))
        .options(options)
        .progress(progress_tx);
    let token = export.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    let result = export.run(items, output_path.clone()).await;
    interrupt.abort();
    let _ = progress_task.await;
    ns.unload();

    let stats = result.map_err(|source| Error::Export { source })?;
    if stats.cancelled {
        return Err(Error::Interrupted);
    }

    if !args.quiet {
        println!(
            "Extracted {} files ({}) to {}",
            stats.files_exported,
            format_size(stats.bytes_written),
            output_path.display()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_defaults_to_current_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(output_dir(Some(dir.path())).unwrap(), dir.path());
        assert_eq!(output_dir(None).unwrap(), std::env::current_dir().unwrap());
    }
}
