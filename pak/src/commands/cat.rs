use std::io::Write;
use std::sync::{Arc, Mutex};

use pakfs::{ExtractionPipeline, FileNode, LoadTask, PreviewConsumer, TaskState, ViewerKind, ViewerRegistry};

use crate::cli::CatArgs;
use crate::error::{Error, Result};

/// Holds the loaded bytes until the task is done, decoding EUC-KR text.
#[derive(Clone)]
struct Preview {
    decode_euc_kr: bool,
    content: Arc<Mutex<Option<Vec<u8>>>>,
}

impl PreviewConsumer for Preview {
    fn accept(&mut self, _file: &FileNode, data: Vec<u8>) {
        let data = if self.decode_euc_kr {
            let (text, _, _) = encoding_rs::EUC_KR.decode(&data);
            text.into_owned().into_bytes()
        } else {
            data
        };
        *self.content.lock().unwrap_or_else(|e| e.into_inner()) = Some(data);
    }
}

pub async fn run(args: CatArgs) -> Result<()> {
    let ns = super::open_namespace(&args.source, false).await?;
    let result = cat(ns.clone(), &args).await;
    ns.unload();
    result
}

async fn cat(ns: Arc<pakfs::VirtualNamespace>, args: &CatArgs) -> Result<()> {
    let idx = super::find(&ns, &args.path)?;
    let Some(node) = ns.node(idx) else {
        return Err(Error::NotFound {
            path: args.path.clone(),
        });
    };
    if node.is_dir() {
        return Err(Error::IsDirectory {
            path: args.path.clone(),
        });
    }

    let viewer = ViewerRegistry::with_defaults().resolve(node);
    let preview = Preview {
        decode_euc_kr: !args.raw && viewer == ViewerKind::EucKrText,
        content: Arc::new(Mutex::new(None)),
    };

    let task = LoadTask::new(ExtractionPipeline::new(ns.clone()), idx, preview.clone());
    let token = task.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    let state = task.spawn().wait().await;
    interrupt.abort();
    let state = state.map_err(|source| Error::LoadFile {
        path: args.path.clone(),
        source,
    })?;
    if state == TaskState::Cancelled {
        return Err(Error::Interrupted);
    }

    let content = preview
        .content
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .take()
        .unwrap_or_default();
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(&content)
        .and_then(|_| stdout.flush())
        .map_err(|source| Error::Output { source })
}
