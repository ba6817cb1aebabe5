use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

/// Create a styled progress bar
pub fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.blue} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg} ({eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-"),
    );
    pb
}

/// Per-worker bar showing the current file and stage
pub fn create_worker_bar(worker: usize) -> ProgressBar {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::with_template("  {prefix:.dim} [{bar:25.green/white}] {percent:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb.set_prefix(format!("worker {:>2}", worker + 1));
    pb.set_message("idle");
    pb
}

/// Spinner used while scanning the input directory
pub fn create_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(message.to_string());
    spinner
}

/// Format duration in a human-readable way
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if total_secs >= 60 {
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        format!("{}m {}s", mins, secs)
    } else if total_secs > 0 {
        format!("{}.{:03}s", total_secs, millis)
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Validate the input directory before discovery
pub fn validate_input_dir(input_dir: &Path) -> Result<()> {
    if !input_dir.exists() {
        return Err(anyhow::anyhow!(
            "Input directory does not exist: {}",
            input_dir.display()
        ));
    }
    if !input_dir.is_dir() {
        return Err(anyhow::anyhow!(
            "Input path is not a directory: {}",
            input_dir.display()
        ));
    }
    Ok(())
}

/// Get file extension in lowercase
pub fn get_file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Check if a file has one of the specified extensions
pub fn has_valid_extension(path: &Path, extensions: &[String]) -> bool {
    if let Some(ext) = get_file_extension(path) {
        extensions.contains(&ext)
    } else {
        false
    }
}

/// Print verbose information if verbose mode is enabled
pub fn verbose_println(verbose: bool, message: &str) {
    if verbose {
        println!("{} {}", style("[VERBOSE]").dim(), message);
    }
}

/// Print warning message
pub fn warn_println(message: &str) {
    println!("{} {}", style("[WARNING]").yellow().bold(), message);
}

/// Print error message
pub fn error_println(message: &str) {
    eprintln!("{} {}", style("[ERROR]").red().bold(), message);
}

/// Calculate processing statistics
#[derive(Debug)]
pub struct ProcessingStats {
    pub total_files: usize,
    pub successful: usize,
    pub failed: usize,
    pub shapes_kept: usize,
    pub shapes_removed: usize,
    pub total_duration: Duration,
}

impl ProcessingStats {
    pub fn new(total_files: usize) -> Self {
        Self {
            total_files,
            successful: 0,
            failed: 0,
            shapes_kept: 0,
            shapes_removed: 0,
            total_duration: Duration::ZERO,
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            (self.successful as f64 / self.total_files as f64) * 100.0
        }
    }

    /// Wall-clock time per file across the whole batch
    pub fn average_duration(&self) -> Duration {
        if self.total_files == 0 {
            Duration::ZERO
        } else {
            self.total_duration / self.total_files as u32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_secs(1)), "1.000s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 5s");
    }

    #[test]
    fn test_has_valid_extension() {
        let exts = vec!["png".to_string(), "gif".to_string()];
        assert!(has_valid_extension(Path::new("a/sprite.png"), &exts));
        assert!(has_valid_extension(Path::new("SPRITE.PNG"), &exts));
        assert!(has_valid_extension(Path::new("anim.Gif"), &exts));
        assert!(!has_valid_extension(Path::new("photo.jpg"), &exts));
        assert!(!has_valid_extension(Path::new("README"), &exts));
    }

    #[test]
    fn test_validate_input_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(validate_input_dir(dir.path()).is_ok());

        let file = dir.path().join("sprite.png");
        std::fs::write(&file, b"x").unwrap();
        assert!(validate_input_dir(&file).is_err());
        assert!(validate_input_dir(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_processing_stats() {
        let mut stats = ProcessingStats::new(4);
        stats.successful = 3;
        stats.failed = 1;
        stats.total_duration = Duration::from_secs(8);
        assert!((stats.success_rate() - 75.0).abs() < f64::EPSILON);
        assert_eq!(stats.average_duration(), Duration::from_secs(2));

        let empty = ProcessingStats::new(0);
        assert_eq!(empty.success_rate(), 0.0);
        assert_eq!(empty.average_duration(), Duration::ZERO);
    }
}
