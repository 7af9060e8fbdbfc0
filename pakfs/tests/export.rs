use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use pak_format::testing::MemoryArchive;
use pakfs::{
    BatchExport, ExportError, ExportOptions, ExportProgress, ExtractError, ExtractionPipeline,
    NamespaceBuilder, NodeIndex,
};

fn fast() -> ExportOptions {
    ExportOptions {
        min_duration: Duration::ZERO,
    }
}

fn scenario_one() -> ExtractionPipeline {
    let archive = MemoryArchive::new("resource00.pak")
        .with_file(r"\Data\icon.png", &[0x89; 100])
        .with_file(r"\Data\Sub\readme.txt", b"twenty bytes of text");
    let ns = NamespaceBuilder::new().archive(Arc::new(archive)).build().unwrap();
    ExtractionPipeline::new(Arc::new(ns))
}

fn file_len(path: &Path) -> u64 {
    std::fs::metadata(path).unwrap().len()
}

#[test]
fn directory_contents_land_in_destination() {
    let out = tempfile::tempdir().unwrap();
    let pipeline = scenario_one();
    let data = pipeline.namespace().find("Data").unwrap();

    let stats = BatchExport::new(pipeline)
        .options(fast())
        .export_batch(&[data], out.path())
        .unwrap();

    assert_eq!(file_len(&out.path().join("icon.png")), 100);
    assert_eq!(file_len(&out.path().join("Sub").join("readme.txt")), 20);
    assert!(!out.path().join("Data").exists());
    assert_eq!(stats.files_exported, 2);
    assert_eq!(stats.bytes_written, 120);
    assert!(!stats.cancelled);
}

#[test]
fn export_is_idempotent() {
    let out = tempfile::tempdir().unwrap();
    let pipeline = scenario_one();
    let root = pipeline.namespace().root();
    let export = BatchExport::new(pipeline).options(fast());

    let first = export.export_batch(&[root], out.path()).unwrap();
    let before = std::fs::read(out.path().join("Data").join("icon.png")).unwrap();
    let second = export.export_batch(&[root], out.path()).unwrap();
    let after = std::fs::read(out.path().join("Data").join("icon.png")).unwrap();

    assert_eq!(before, after);
    assert_eq!(first.files_exported, second.files_exported);
    assert_eq!(first.bytes_written, second.bytes_written);
    assert!(first.dirs_created > 0);
    assert_eq!(second.dirs_created, 0);
}

#[test]
fn selected_file_is_written_by_name() {
    let out = tempfile::tempdir().unwrap();
    let pipeline = scenario_one();
    let readme = pipeline.namespace().find("Data/Sub/readme.txt").unwrap();

    BatchExport::new(pipeline)
        .options(fast())
        .export_batch(&[readme], out.path())
        .unwrap();

    assert_eq!(
        std::fs::read(out.path().join("readme.txt")).unwrap(),
        b"twenty bytes of text"
    );
}

#[test]
fn first_failure_aborts_the_rest() {
    let archive = MemoryArchive::new("a.pak")
        .with_file(r"\one.txt", b"1")
        .with_file(r"\two.txt", b"2")
        .with_file(r"\three.txt", b"3")
        .failing_transfer(r"\two.txt");
    let ns = NamespaceBuilder::new().archive(Arc::new(archive)).build().unwrap();
    let pipeline = ExtractionPipeline::new(Arc::new(ns));
    let items: Vec<_> = ["one.txt", "two.txt", "three.txt"]
        .iter()
        .map(|p| pipeline.namespace().find(p).unwrap())
        .collect();

    let out = tempfile::tempdir().unwrap();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let err = BatchExport::new(pipeline)
        .options(fast())
        .progress(tx)
        .export_batch(&items, out.path())
        .unwrap_err();

    match err {
        ExportError::Extract(ExtractError::ReadFailed { archive, path, .. }) => {
            assert_eq!(archive, "a.pak");
            assert_eq!(path, r"\two.txt");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(out.path().join("one.txt").exists());
    assert!(!out.path().join("two.txt").exists());
    assert!(!out.path().join("three.txt").exists());

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    let exported: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ExportProgress::Exported { name, .. } => Some(name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(exported, ["one.txt"]);
    assert_eq!(events.last(), Some(&ExportProgress::Finished));
}

#[test]
fn plan_failure_still_finishes_progress() {
    let pipeline = scenario_one();
    let bogus = NodeIndex::new(999).unwrap();
    let out = tempfile::tempdir().unwrap();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    let err = BatchExport::new(pipeline)
        .options(fast())
        .progress(tx)
        .export_batch(&[bogus], out.path())
        .unwrap_err();

    assert!(matches!(err, ExportError::UnknownNode(_)));
    assert_eq!(rx.try_recv().unwrap(), ExportProgress::Finished);
}

#[test]
fn hostile_index_paths_stay_inside_destination() {
    let archive = MemoryArchive::new("a.pak")
        .with_file(r"\..\..\escaped.txt", b"outside?")
        .with_file(r"\.\maps\.\a.env", b"env")
        .with_file(r"\ui\..\main.xml", b"<ui/>")
        .with_file(r"\C:\drive.txt", b"drive");
    let ns = NamespaceBuilder::new().archive(Arc::new(archive)).build().unwrap();
    let pipeline = ExtractionPipeline::new(Arc::new(ns));
    let root = pipeline.namespace().root();
    assert!(pipeline.namespace().find("../../escaped.txt").is_some());

    let scratch = tempfile::tempdir().unwrap();
    let dest = scratch.path().join("a").join("dest");
    let result = BatchExport::new(pipeline)
        .options(fast())
        .export_batch(&[root], &dest);

    assert!(!scratch.path().join("escaped.txt").exists());
    assert!(!scratch.path().join("a").join("escaped.txt").exists());

    // `C:` is a plain name on Unix and a drive prefix on Windows.
    #[cfg(unix)]
    {
        result.unwrap();
        assert_eq!(std::fs::read(dest.join("escaped.txt")).unwrap(), b"outside?");
        assert_eq!(std::fs::read(dest.join("maps").join("a.env")).unwrap(), b"env");
        assert_eq!(std::fs::read(dest.join("ui").join("main.xml")).unwrap(), b"<ui/>");
        assert_eq!(std::fs::read(dest.join("C:").join("drive.txt")).unwrap(), b"drive");
    }
    #[cfg(windows)]
    assert!(matches!(result, Err(ExportError::UnsafePath { .. })));
}

#[test]
fn progress_is_monotonic_and_complete() {
    let mut archive = MemoryArchive::new("a.pak");
    for i in 0..5 {
        archive = archive.with_file(&format!(r"\maps\{i}.env"), b"env");
    }
    let ns = NamespaceBuilder::new().archive(Arc::new(archive)).build().unwrap();
    let pipeline = ExtractionPipeline::new(Arc::new(ns));
    let root = pipeline.namespace().root();

    let out = tempfile::tempdir().unwrap();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    BatchExport::new(pipeline)
        .options(fast())
        .progress(tx)
        .export_batch(&[root], out.path())
        .unwrap();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert_eq!(events.first(), Some(&ExportProgress::Started { total_files: 5 }));
    assert_eq!(events.last(), Some(&ExportProgress::Finished));
    let fractions: Vec<f64> = events.iter().map(ExportProgress::fraction).collect();
    assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(events[5].status(), "Exporting 4.env (5/5)");
}

#[test]
fn short_exports_take_the_minimum_duration() {
    let out = tempfile::tempdir().unwrap();
    let pipeline = scenario_one();
    let root = pipeline.namespace().root();

    let start = Instant::now();
    BatchExport::new(pipeline)
        .options(ExportOptions {
            min_duration: Duration::from_millis(200),
        })
        .export_batch(&[root], out.path())
        .unwrap();
    assert!(start.elapsed() >= Duration::from_millis(200));
}

#[tokio::test]
async fn cancelled_export_stops_writing() {
    let out = tempfile::tempdir().unwrap();
    let pipeline = scenario_one();
    let root = pipeline.namespace().root();

    let export = BatchExport::new(pipeline).options(fast());
    export.cancellation_token().cancel();
    let stats = export.run(vec![root], out.path().to_path_buf()).await.unwrap();

    assert!(stats.cancelled);
    assert_eq!(stats.files_exported, 0);
    assert!(!out.path().join("Data").exists());
}
