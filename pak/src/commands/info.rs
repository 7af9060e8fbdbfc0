use pakfs::{NamespaceNode, ViewerRegistry, VirtualNamespace};

use crate::cli::InfoArgs;
use crate::error::Result;
use crate::util::{format_path, format_size, ratio};

pub async fn run(args: InfoArgs) -> Result<()> {
    let ns = super::open_namespace(&args.source, false).await?;

    let result = match &args.path {
        Some(path) => show_entry_info(&ns, path),
        None => {
            show_namespace_info(&ns);
            Ok(())
        }
    };

    ns.unload();
    result
}

fn show_entry_info(ns: &VirtualNamespace, path: &str) -> Result<()> {
    let idx = super::find(ns, path)?;
    let Some(node) = ns.node(idx) else {
        return Ok(());
    };
    let viewers = ViewerRegistry::with_defaults();

    println!("Path:   {}", format_path(node.path(), node.is_dir()));

    match node {
        NamespaceNode::File(file) => {
            let record = &file.record;
            let archive = ns.archive(file.archive).map(|a| a.name()).unwrap_or("-");
            println!("Type:   file");
            println!("Viewer: {}", viewers.resolve(node));
            println!(
                "Size:   {} (compressed: {})",
                format_size(record.decompressed_size),
                format_size(record.compressed_size)
            );
            println!(
                "Ratio:  {:.1}%",
                ratio(record.compressed_size, record.decompressed_size)
            );

            println!();
            println!("Record:");
            println!("  Archive: {}", archive);
            println!("  Stored:  {}", record.full_path);
            println!("  Offset:  {:#x}", record.disk_offset);
            println!("  {}", record.summary());
        }
        NamespaceNode::Directory(dir) => {
            let files = ns.files_under(idx);
            let size: u64 = files
                .iter()
                .filter_map(|f| ns.file(*f))
                .map(|f| f.record.decompressed_size)
                .sum();
            println!("Type:    directory");
            println!("Entries: {}", dir.children.len());
            println!("Files:   {} ({})", files.len(), format_size(size));
        }
    }

    Ok(())
}

fn show_namespace_info(ns: &VirtualNamespace) {
    let mut total_size = 0u64;
    let mut total_compressed = 0u64;
    let mut owned = vec![0usize; ns.archives().len()];

    for idx in ns.files_under(ns.root()) {
        let Some(file) = ns.file(idx) else { continue };
        total_size += file.record.decompressed_size;
        total_compressed += file.record.compressed_size;
        if let Some(count) = owned.get_mut(file.archive.get()) {
            *count += 1;
        }
    }

    println!("Archives:");
    for (archive, count) in ns.archives().iter().zip(&owned) {
        let entries = archive.entry_map().map(|m| m.len()).unwrap_or(0);
        println!("  {}: {} entries, {} visible", archive.name(), entries, count);
    }

    println!();
    println!("Contents:");
    println!("  Files:       {}", ns.file_count());
    println!("  Directories: {}", ns.len() - ns.file_count());

    println!();
    println!("Size:");
    println!("  Original:    {}", format_size(total_size));
    println!("  Compressed:  {}", format_size(total_compressed));
    println!("  Ratio:       {:.1}%", ratio(total_compressed, total_size));
}
