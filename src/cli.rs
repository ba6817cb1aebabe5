use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::image_processing::{
    ChromaKey, DepixelConfig, KeyMatcher, DEFAULT_OUTPUT_DIR, DEFAULT_PREVIEW_SUBDIR,
};

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum VectorizerKind {
    /// Color tracing with smooth curves (vtracer)
    #[value(name = "trace")]
    Trace,
    /// One rectangle per pixel run; lossless and fully deterministic
    #[value(name = "grid")]
    Grid,
}

#[derive(Parser, Debug)]
#[command(
    name = "depixelize",
    about = "Batch-convert pixel-art sprites into scalable vector graphics",
    long_about = "
depixelize - pixel art to vector converter

Converts every raster sprite in a folder into an SVG plus a fixed-size PNG
preview. Transparent pixels are carried through tracing as a chroma-key color
and removed from the vector output afterwards, so transparency survives the
round trip.

Pipeline per file:
• transparent pixels -> opaque chroma key
• edge-aware EPX upscaling (Scale2x/Scale3x, palette preserving)
• color tracing to SVG
• removal of chroma-key shapes
• SVG rasterization to a transparent PNG preview

Example Usage:
  # Convert every .png in the current directory into ./depixelOutputs
  depixelize

  # Explicit folders, 512x512 previews, 8 workers
  depixelize -i ~/sprites -o ~/vectors -s 512x512 -j 8

  # Deterministic pixel-grid output, custom key color
  depixelize -i ~/sprites --vectorizer grid --key '#FF00FF' --key-names magenta,fuchsia

  # Machine-readable progress for wrapping tools
  depixelize -i ~/sprites --json-progress"
)]
pub struct Args {
    /// Directory containing the sprites (not searched recursively)
    #[arg(short = 'i', long = "input", default_value = ".", value_name = "DIR")]
    pub input_dir: PathBuf,

    /// Output directory [default: <input>/depixelOutputs]
    #[arg(short = 'o', long = "output", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Preview size (format: WIDTHxHEIGHT, e.g., 256x256)
    #[arg(
        short = 's',
        long = "size",
        default_value = "256x256",
        value_name = "WIDTHxHEIGHT"
    )]
    pub size: String,

    /// Integer upscale factor applied before tracing (1-8)
    #[arg(long = "scale", default_value = "4", value_name = "N")]
    pub scale: u32,

    /// Number of parallel workers (0 = auto-detect CPU cores)
    #[arg(short = 'j', long = "jobs", default_value = "4", value_name = "N")]
    pub jobs: usize,

    /// Comma-separated list of image extensions to process
    #[arg(long = "extensions", default_value = "png")]
    pub extensions_str: String,

    /// Vectorization backend
    #[arg(long = "vectorizer", default_value = "trace", value_name = "KIND")]
    pub vectorizer: VectorizerKind,

    /// Chroma-key color standing in for transparency (hex, e.g., #00FF00)
    #[arg(long = "key", default_value = "#00FF00", value_name = "COLOR")]
    pub key: String,

    /// Comma-separated color keywords that also denote the key in SVG fills
    #[arg(long = "key-names", default_value = "green,lime", value_name = "NAMES")]
    pub key_names_str: String,

    /// Enable verbose output with detailed progress information
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Emit progress as JSON lines on stdout (suppresses all other output)
    #[arg(long = "json-progress")]
    pub json_progress: bool,

    /// Generate processing report table at the end
    #[arg(
        long = "report",
        help = "Display a table with the outcome of every file"
    )]
    pub report: bool,
}

impl Args {
    /// Parse the size string into width and height
    pub fn parse_size(&self) -> Result<(u32, u32), String> {
        let parts: Vec<&str> = self.size.split(['x', 'X']).collect();
        if parts.len() != 2 {
            return Err(format!(
                "Invalid size format '{}'. Use WIDTHxHEIGHT (e.g., 256x256)",
                self.size
            ));
        }

        let width = parts[0]
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("Invalid width: '{}'", parts[0]))?;
        let height = parts[1]
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("Invalid height: '{}'", parts[1]))?;

        if width == 0 || height == 0 {
            return Err("Width and height must be greater than 0".to_string());
        }

        Ok((width, height))
    }

    /// Parse the extensions string into a vector
    pub fn parse_extensions(&self) -> Vec<String> {
        split_list(&self.extensions_str)
            .into_iter()
            .map(|s| s.trim_start_matches('.').to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn parse_key(&self) -> Result<ChromaKey, String> {
        self.key.parse()
    }

    pub fn parse_key_names(&self) -> Vec<String> {
        split_list(&self.key_names_str)
    }

    /// Output directory, defaulting to `depixelOutputs` inside the input directory.
    pub fn resolved_output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| self.input_dir.join(DEFAULT_OUTPUT_DIR))
    }

    /// Build the immutable batch configuration from the parsed flags.
    pub fn to_config(&self) -> Result<DepixelConfig> {
        let (preview_width, preview_height) = self.parse_size().map_err(anyhow::Error::msg)?;
        let key = self.parse_key().map_err(anyhow::Error::msg)?;
        let names = self.parse_key_names();
        let aliases: Vec<&str> = names.iter().map(String::as_str).collect();

        let config = DepixelConfig {
            upscale_factor: self.scale,
            preview_width,
            preview_height,
            output_dir: self.resolved_output_dir(),
            preview_subdir: DEFAULT_PREVIEW_SUBDIR.to_string(),
            worker_count: self.jobs,
            extensions: self.parse_extensions(),
            key_matcher: KeyMatcher::new(key, &aliases),
            verbose: self.verbose && !self.json_progress,
        };
        config.validate()?;
        Ok(config)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}


// Default implementation for tests
#[cfg(test)]
impl Default for Args {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            output_dir: None,
            size: "256x256".to_string(),
            scale: 4,
            jobs: 4,
            extensions_str: "png".to_string(),
            vectorizer: VectorizerKind::Trace,
            key: "#00FF00".to_string(),
            key_names_str: "green,lime".to_string(),
            verbose: false,
            json_progress: false,
            report: false,
        }
    }
}
