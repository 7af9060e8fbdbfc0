use pakfs::{NodeIndex, VirtualNamespace};

use crate::cli::TreeArgs;
use crate::error::Result;

pub async fn run(args: TreeArgs) -> Result<()> {
    let ns = super::open_namespace(&args.source, false).await?;
    let start = match &args.path {
        Some(path) => super::find(&ns, path),
        None => Ok(ns.root()),
    };

    let result = start.map(|start| {
        let mut out = String::new();
        render(&ns, start, 0, args.depth, &mut out);
        print!("{out}");
    });

    ns.unload();
    result
}

fn render(ns: &VirtualNamespace, idx: NodeIndex, level: usize, max: Option<usize>, out: &mut String) {
    let Some(node) = ns.node(idx) else { return };

    if level == 0 {
        let label = if node.path().is_root() { "/" } else { node.name() };
        out.push_str(label);
        if node.is_dir() && !node.path().is_root() {
            out.push('/');
        }
        out.push('\n');
    } else {
        out.push_str(&"  ".repeat(level));
        out.push_str(node.name());
        if node.is_dir() {
            out.push('/');
        }
        out.push('\n');
    }

    if max.is_some_and(|max| level >= max) {
        return;
    }
    for child in ns.children(idx) {
        render(ns, *child, level + 1, max, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pak_format::testing::MemoryArchive;
    use pakfs::NamespaceBuilder;
    use std::sync::Arc;

    #[test]
    fn renders_sorted_with_depth_limit() {
        let archive = MemoryArchive::new("a.pak")
            .with_file(r"\Data\icon.png", b"png")
            .with_file(r"\Data\Sub\readme.txt", b"txt");
        let ns = NamespaceBuilder::new().archive(Arc::new(archive)).build().unwrap();

        let mut full = String::new();
        render(&ns, ns.root(), 0, None, &mut full);
        assert_eq!(full, "/\n  Data/\n    Sub/\n      readme.txt\n    icon.png\n");

        let mut shallow = String::new();
        render(&ns, ns.root(), 0, Some(1), &mut shallow);
        assert_eq!(shallow, "/\n  Data/\n");
    }
}
