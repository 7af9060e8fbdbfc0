use indicatif::{ProgressBar, ProgressStyle};
use pak_format::PakPath;

/// Create a progress bar for file operations
pub fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb.set_message(message.to_string());
    pb
}

/// Create a spinner for indeterminate operations
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Format a namespace path for display, directories with a trailing separator
pub fn format_path(path: &PakPath, is_dir: bool) -> String {
    let mut out = String::from("/");
    out.push_str(path.as_str());
    if is_dir && !path.is_root() {
        out.push('/');
    }
    out
}

/// Space saved by compression, in percent
pub fn ratio(compressed: u64, size: u64) -> f64 {
    if size == 0 {
        0.0
    } else {
        100.0 - (compressed as f64 / size as f64 * 100.0)
    }
}

/// Format file size in human-readable form
pub fn format_size(bytes: u64) -> String {
    use humansize::{format_size, BINARY};
    format_size(bytes, BINARY)
}
