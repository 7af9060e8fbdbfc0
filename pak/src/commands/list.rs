use pakfs::VirtualNamespace;
use serde::Serialize;

use crate::cli::ListArgs;
use crate::error::{Error, Result};
use crate::util::{format_path, format_size, ratio};

#[derive(Serialize)]
struct JsonEntry {
    path: String,
    archive: String,
    size: u64,
    compressed_size: u64,
    disk_size: u64,
    offset: u64,
}

pub async fn run(args: ListArgs) -> Result<()> {
    let ns = super::open_namespace(&args.source, args.json).await?;

    let result = if args.json {
        list_json(&ns)
    } else {
        list_compact(&ns);
        Ok(())
    };

    ns.unload();
    result
}

fn list_compact(ns: &VirtualNamespace) {
    println!("{:>12}  {:>12}  {:>6}  Path", "Compressed", "Size", "Ratio");
    println!("{}", "-".repeat(60));

    let mut total_compressed = 0u64;
    let mut total_size = 0u64;

    for idx in ns.files_under(ns.root()) {
        let Some(file) = ns.file(idx) else { continue };
        let record = &file.record;
        println!(
            "{:>12}  {:>12}  {:>5.1}%  {}",
            format_size(record.compressed_size),
            format_size(record.decompressed_size),
            ratio(record.compressed_size, record.decompressed_size),
            format_path(&file.path, false)
        );
        total_compressed += record.compressed_size;
        total_size += record.decompressed_size;
    }

    println!("{}", "-".repeat(60));
    println!(
        "{:>12}  {:>12}  {:>5.1}%  Total ({} files)",
        format_size(total_compressed),
        format_size(total_size),
        ratio(total_compressed, total_size),
        ns.file_count()
    );
}

fn list_json(ns: &VirtualNamespace) -> Result<()> {
    let entries: Vec<JsonEntry> = ns
        .files_under(ns.root())
        .into_iter()
        .filter_map(|idx| ns.file(idx))
        .map(|file| JsonEntry {
            path: file.path.to_string(),
            archive: ns
                .archive(file.archive)
                .map(|a| a.name().to_string())
                .unwrap_or_default(),
            size: file.record.decompressed_size,
            compressed_size: file.record.compressed_size,
            disk_size: file.record.disk_size,
            offset: file.record.disk_offset,
        })
        .collect();

    let json = serde_json::to_string_pretty(&entries).map_err(|source| Error::Json { source })?;
    println!("{json}");
    Ok(())
}
