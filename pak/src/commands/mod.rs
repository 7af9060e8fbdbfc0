mod cat;
mod extract;
mod info;
mod list;
mod tree;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use pakfs::{discover_virtual_pak, load_paks_in_background, LoadProgress, NodeIndex, VirtualNamespace};

pub use cat::run as cat;
pub use extract::run as extract;
pub use info::run as info;
pub use list::run as list;
pub use tree::run as tree;

use crate::cli::SourceArgs;
use crate::error::{Error, Result};
use crate::util::create_spinner;

/// The paks a source argument names, in overlay order.
fn resolve_paks(source: &SourceArgs) -> Result<Vec<PathBuf>> {
    let Some(dir) = &source.virtual_dir else {
        return Ok(source.paks.clone());
    };
    let paks = discover_virtual_pak(dir).map_err(|source| Error::ReadDirectory {
        path: dir.clone(),
        source,
    })?;
    if paks.is_empty() {
        return Err(Error::NoPaks { path: dir.clone() });
    }
    Ok(paks)
}

/// Load and consolidate the paks named by `source`, with a spinner on a terminal.
pub(crate) async fn open_namespace(source: &SourceArgs, quiet: bool) -> Result<Arc<VirtualNamespace>> {
    let paks = resolve_paks(source)?;
    let show_progress = !quiet && std::io::stderr().is_terminal();

    let (progress_tx, mut progress_rx) = tokio::sync::mpsc::unbounded_channel::<LoadProgress>();
    let progress_task = tokio::spawn(async move {
        let spinner = show_progress.then(|| create_spinner("Loading"));
        while let Some(update) = progress_rx.recv().await {
            if let Some(pb) = &spinner {
                pb.set_message(update.status());
            }
        }
        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }
    });

    let namespace = load_paks_in_background(paks, Some(progress_tx))
        .await
        .map_err(|source| Error::LoadPaks { source })?;
    let _ = progress_task.await;

    Ok(Arc::new(namespace))
}

/// Resolve a user supplied entry path.
pub(crate) fn find(namespace: &VirtualNamespace, path: &str) -> Result<NodeIndex> {
    namespace.find(path).ok_or_else(|| Error::NotFound {
        path: path.to_string(),
    })
}
