use image::RgbaImage;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use strum_macros::{Display, EnumIter};

use super::chroma_key::{encode_transparency, KeyMatcher};
use super::rasterize::Rasterizer;
use super::strip::strip_chroma_key;
use super::upscale::Upscaler;
use super::vectorize::Vectorizer;
use crate::error::{DepixelError, DepixelResult};

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum Stage {
    Loading,
    Encoding,
    Upscaling,
    Vectorizing,
    Stripping,
    #[strum(serialize = "Writing SVG")]
    WritingVector,
    Rasterizing,
    #[strum(serialize = "Writing PNG")]
    WritingPreview,
}

impl Stage {
    /// Rough completion percentage when the stage starts, for per-job progress bars.
    pub fn percent(&self) -> u64 {
        match self {
            Stage::Loading => 5,
            Stage::Encoding => 10,
            Stage::Upscaling => 20,
            Stage::Vectorizing => 35,
            Stage::Stripping => 70,
            Stage::WritingVector => 80,
            Stage::Rasterizing => 85,
            Stage::WritingPreview => 95,
        }
    }
}

/// One input file and the two artifacts derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJob {
    pub input_path: PathBuf,
    pub vector_path: PathBuf,
    pub preview_path: PathBuf,
}

impl BatchJob {
    /// Derive `<output_dir>/<stem>.svg` and `<output_dir>/<preview_subdir>/<stem>.png`.
    pub fn new(input_path: &Path, output_dir: &Path, preview_subdir: &str) -> Self {
        let stem = input_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("image");

        Self {
            input_path: input_path.to_path_buf(),
            vector_path: output_dir.join(format!("{}.svg", stem)),
            preview_path: output_dir.join(preview_subdir).join(format!("{}.png", stem)),
        }
    }

    pub fn file_name(&self) -> &str {
        self.input_path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("unknown")
    }
}

#[derive(Debug, Clone)]
pub struct ProcessingResult {
    pub input_path: PathBuf,
    pub vector_path: PathBuf,
    pub preview_path: PathBuf,
    pub shapes_kept: usize,
    pub shapes_removed: usize,
    pub processing_time: Duration,
}

/// Per-file transformation: encode, upscale, trace, strip, render, persist.
#[derive(Clone)]
pub struct Pipeline {
    pub upscaler: Arc<dyn Upscaler>,
    pub vectorizer: Arc<dyn Vectorizer>,
    pub rasterizer: Arc<dyn Rasterizer>,
    pub key_matcher: KeyMatcher,
    pub upscale_factor: u32,
    pub preview_size: (u32, u32),
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("upscaler", &self.upscaler.name())
            .field("vectorizer", &self.vectorizer.name())
            .field("rasterizer", &self.rasterizer.name())
            .field("key", &self.key_matcher.key())
            .field("upscale_factor", &self.upscale_factor)
            .field("preview_size", &self.preview_size)
            .finish()
    }
}

impl Pipeline {
    /// Run every stage for one job. The first failing stage ends the job.
    pub fn run(&self, job: &BatchJob, on_stage: &dyn Fn(Stage)) -> DepixelResult<ProcessingResult> {
        let started = Instant::now();

        on_stage(Stage::Loading);
        let source = load_rgba(&job.input_path)?;

        on_stage(Stage::Encoding);
        let encoded = encode_transparency(&source, self.key_matcher.key());
        drop(source);

        on_stage(Stage::Upscaling);
        let upscaled = guarded(
            || Ok(self.upscaler.upscale(&encoded, self.upscale_factor)),
            DepixelError::Vectorization,
            "upscaler",
        )?;
        let rgb = image::DynamicImage::ImageRgba8(upscaled).into_rgb8();

        on_stage(Stage::Vectorizing);
        let traced = guarded(
            || self.vectorizer.vectorize(&rgb),
            DepixelError::Vectorization,
            "vectorizer",
        )?;
        drop(rgb);

        on_stage(Stage::Stripping);
        let stripped = strip_chroma_key(&traced, &self.key_matcher)?;

        on_stage(Stage::WritingVector);
        stripped.document.save(&job.vector_path)?;

        on_stage(Stage::Rasterizing);
        let (width, height) = self.preview_size;
        let preview = guarded(
            || self.rasterizer.render(&stripped.document, width, height),
            DepixelError::Render,
            "rasterizer",
        )?;

        on_stage(Stage::WritingPreview);
        if let Some(parent) = job.preview_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| DepixelError::output_write(parent, e))?;
        }
        preview
            .save_with_format(&job.preview_path, image::ImageFormat::Png)
            .map_err(|e| DepixelError::output_write(&job.preview_path, e))?;

        Ok(ProcessingResult {
            input_path: job.input_path.clone(),
            vector_path: job.vector_path.clone(),
            preview_path: job.preview_path.clone(),
            shapes_kept: stripped.kept,
            shapes_removed: stripped.removed,
            processing_time: started.elapsed(),
        })
    }
}

/// Decode any supported raster and view it as RGBA8.
pub fn load_rgba(path: &Path) -> DepixelResult<RgbaImage> {
    let img = image::ImageReader::open(path)
        .map_err(|e| DepixelError::input_format(path, e))?
        .with_guessed_format()
        .map_err(|e| DepixelError::input_format(path, e))?
        .decode()
        .map_err(|e| DepixelError::input_format(path, e))?;
    Ok(img.into_rgba8())
}

/// Run an external stage, turning a panic into that stage's error.
fn guarded<T>(
    stage: impl FnOnce() -> DepixelResult<T>,
    on_panic: fn(String) -> DepixelError,
    label: &str,
) -> DepixelResult<T> {
    match catch_unwind(AssertUnwindSafe(stage)) {
        Ok(result) => result,
        Err(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(on_panic(format!("{} panicked: {}", label, detail)))
        }
    }
}
