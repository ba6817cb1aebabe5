pub mod batch;
pub mod chroma_key;
pub mod document;
pub mod pipeline;
pub mod rasterize;
pub mod report;
pub mod strip;
pub mod upscale;
pub mod vectorize;

use anyhow::{Context, Result};
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use crate::error::{DepixelError, DepixelResult};
use crate::utils::{has_valid_extension, verbose_println};

pub use batch::{BatchReport, JobEvent, JobOutcome};
pub use chroma_key::{encode_transparency, ChromaKey, ColorNotation, KeyMatcher};
pub use document::VectorDocument;
pub use pipeline::{BatchJob, Pipeline, ProcessingResult, Stage};
pub use rasterize::{Rasterizer, SvgRasterizer};
pub use strip::{strip_chroma_key, StripOutcome};
pub use upscale::{EdgeAwareUpscaler, Upscaler};
pub use vectorize::{PixelGridVectorizer, TracingVectorizer, Vectorizer};

pub const DEFAULT_UPSCALE_FACTOR: u32 = 4;
pub const DEFAULT_WORKER_COUNT: usize = 4;
pub const DEFAULT_OUTPUT_DIR: &str = "depixelOutputs";
pub const DEFAULT_PREVIEW_SUBDIR: &str = "png";
pub const DEFAULT_PREVIEW_SIZE: (u32, u32) = (256, 256);
pub const DEFAULT_EXTENSIONS: &[&str] = &["png"];

pub const MAX_UPSCALE_FACTOR: u32 = 8;
pub const MAX_PREVIEW_DIM: u32 = 4096;
pub const MAX_WORKER_COUNT: usize = 32;

/// Immutable settings for one batch run.
#[derive(Debug, Clone)]
pub struct DepixelConfig {
    pub upscale_factor: u32,
    pub preview_width: u32,
    pub preview_height: u32,
    pub output_dir: PathBuf,
    pub preview_subdir: String,
    /// 0 = one worker per CPU core
    pub worker_count: usize,
    pub extensions: Vec<String>,
    pub key_matcher: KeyMatcher,
    pub verbose: bool,
}

impl Default for DepixelConfig {
    fn default() -> Self {
        Self {
            upscale_factor: DEFAULT_UPSCALE_FACTOR,
            preview_width: DEFAULT_PREVIEW_SIZE.0,
            preview_height: DEFAULT_PREVIEW_SIZE.1,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            preview_subdir: DEFAULT_PREVIEW_SUBDIR.to_string(),
            worker_count: DEFAULT_WORKER_COUNT,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            key_matcher: KeyMatcher::default(),
            verbose: false,
        }
    }
}

impl DepixelConfig {
    pub fn validate(&self) -> Result<()> {
        if self.upscale_factor == 0 || self.upscale_factor > MAX_UPSCALE_FACTOR {
            return Err(anyhow::anyhow!(
                "Upscale factor must be between 1 and {}, got: {}",
                MAX_UPSCALE_FACTOR,
                self.upscale_factor
            ));
        }

        for (label, dim) in [("width", self.preview_width), ("height", self.preview_height)] {
            if dim == 0 || dim > MAX_PREVIEW_DIM {
                return Err(anyhow::anyhow!(
                    "Preview {} must be between 1 and {} pixels, got: {}",
                    label,
                    MAX_PREVIEW_DIM,
                    dim
                ));
            }
        }

        if self.worker_count > MAX_WORKER_COUNT {
            return Err(anyhow::anyhow!(
                "Job count too high (max {}), got: {}",
                MAX_WORKER_COUNT,
                self.worker_count
            ));
        }

        if self.extensions.is_empty() {
            return Err(anyhow::anyhow!("No valid extensions specified"));
        }

        if self.preview_subdir.is_empty() || self.preview_subdir.contains(['/', '\\']) {
            return Err(anyhow::anyhow!(
                "Preview subdirectory must be a single path component, got: '{}'",
                self.preview_subdir
            ));
        }

        Ok(())
    }

    /// Worker pool size after resolving 0 to the CPU count.
    pub fn effective_workers(&self) -> usize {
        if self.worker_count == 0 {
            num_cpus::get()
        } else {
            self.worker_count
        }
    }
}

/// One job per discovered input, in discovery order.
///
/// `collisions` maps each input whose outputs would overwrite an earlier
/// input's to that earlier input. Those jobs fail with `OutputWrite`.
#[derive(Debug, Default)]
pub struct JobPlan {
    pub jobs: Vec<BatchJob>,
    pub collisions: BTreeMap<PathBuf, PathBuf>,
}

impl JobPlan {
    /// Failure recorded for a colliding job, `None` for jobs that run.
    pub fn rejection(&self, job: &BatchJob) -> Option<DepixelError> {
        self.collisions.get(&job.input_path).map(|first| {
            DepixelError::output_write(
                &job.vector_path,
                format!("same output name as {}", first.display()),
            )
        })
    }
}

/// Batch orchestrator: discovery, output preparation and bounded parallel execution.
pub struct ProcessingEngine {
    config: DepixelConfig,
    pipeline: Pipeline,
}

impl ProcessingEngine {
    /// Engine with the default stages: EPX upscaling, vtracer tracing, resvg rendering.
    pub fn new(config: DepixelConfig) -> Result<Self> {
        Self::with_stages(
            config,
            Arc::new(EdgeAwareUpscaler),
            Arc::new(TracingVectorizer::new()),
            Arc::new(SvgRasterizer),
        )
    }

    pub fn with_stages(
        config: DepixelConfig,
        upscaler: Arc<dyn Upscaler>,
        vectorizer: Arc<dyn Vectorizer>,
        rasterizer: Arc<dyn Rasterizer>,
    ) -> Result<Self> {
        config.validate()?;

        let pipeline = Pipeline {
            upscaler,
            vectorizer,
            rasterizer,
            key_matcher: config.key_matcher.clone(),
            upscale_factor: config.upscale_factor,
            preview_size: (config.preview_width, config.preview_height),
        };

        Ok(Self { config, pipeline })
    }

    pub fn config(&self) -> &DepixelConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Discover raster files directly inside `input_dir` (no recursion).
    pub fn discover_images(&self, input_dir: &Path) -> Result<Vec<PathBuf>> {
        verbose_println(
            self.config.verbose,
            &format!("Scanning directory: {}", input_dir.display()),
        );

        let mut image_files = Vec::new();
        let walker = WalkDir::new(input_dir)
            .follow_links(true)
            .min_depth(1)
            .max_depth(1);

        for entry in walker {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();

            if entry.file_type().is_file() && has_valid_extension(path, &self.config.extensions) {
                image_files.push(path.to_path_buf());
            }
        }

        // Sort for consistent processing order
        image_files.sort();

        verbose_println(
            self.config.verbose,
            &format!("Found {} image files", image_files.len()),
        );
        Ok(image_files)
    }

    /// Create the output directory (and its parents) if missing.
    pub fn prepare_output_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config.output_dir).with_context(|| {
            format!(
                "Failed to create output directory: {}",
                self.config.output_dir.display()
            )
        })
    }

    /// Turn input files into jobs, keeping output paths unique.
    ///
    /// Stems are compared case-insensitively so `Sprite.png` and `sprite.PNG`
    /// cannot overwrite each other on case-insensitive filesystems either.
    /// The first input with a stem wins; later ones are marked as collisions.
    pub fn plan_jobs(&self, files: &[PathBuf]) -> JobPlan {
        let mut plan = JobPlan::default();
        let mut first_by_stem: HashMap<String, &PathBuf> = HashMap::new();

        for file in files {
            let stem = file
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("image")
                .to_lowercase();

            match first_by_stem.entry(stem) {
                Entry::Occupied(first) => {
                    plan.collisions.insert(file.clone(), (*first.get()).clone());
                }
                Entry::Vacant(slot) => {
                    slot.insert(file);
                }
            }
            plan.jobs.push(BatchJob::new(
                file,
                &self.config.output_dir,
                &self.config.preview_subdir,
            ));
        }
        plan
    }

    /// Run the pipeline for every job on a bounded worker pool.
    ///
    /// Every job runs to completion regardless of sibling failures; the report
    /// carries one outcome per job, in job order. Colliding jobs fail without
    /// touching the filesystem.
    pub fn process_batch<F>(&self, plan: &JobPlan, on_event: F) -> Result<BatchReport>
    where
        F: Fn(JobEvent<'_>) + Send + Sync,
    {
        let workers = self.config.effective_workers();
        verbose_println(
            self.config.verbose,
            &format!("Processing {} jobs on {} workers", plan.jobs.len(), workers),
        );

        batch::process_jobs_parallel(
            &plan.jobs,
            workers,
            |job, on_stage| match plan.rejection(job) {
                Some(err) => Err(err),
                None => self.process_single_image(job, on_stage),
            },
            on_event,
        )
    }

    /// Discover, prepare and process everything in `input_dir`.
    pub fn run<F>(&self, input_dir: &Path, on_event: F) -> Result<(BatchReport, JobPlan)>
    where
        F: Fn(JobEvent<'_>) + Send + Sync,
    {
        let files = self.discover_images(input_dir)?;
        self.prepare_output_dir()?;
        let plan = self.plan_jobs(&files);
        let report = self.process_batch(&plan, on_event)?;
        Ok((report, plan))
    }

    /// Process a single image file
    pub fn process_single_image(
        &self,
        job: &BatchJob,
        on_stage: &dyn Fn(Stage),
    ) -> DepixelResult<ProcessingResult> {
        verbose_println(
            self.config.verbose,
            &format!("Processing: {}", job.input_path.display()),
        );
        self.pipeline.run(job, on_stage)
    }
}
