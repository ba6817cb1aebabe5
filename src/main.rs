use anyhow::Result;
use clap::Parser;
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget};
use std::sync::Arc;
use std::time::Instant;

use depixelize::cli::{Args, VectorizerKind};
use depixelize::image_processing::report::print_report;
use depixelize::image_processing::{
    BatchReport, EdgeAwareUpscaler, JobEvent, PixelGridVectorizer, ProcessingEngine,
    SvgRasterizer, TracingVectorizer, Vectorizer,
};
use depixelize::utils::{
    create_progress_bar, create_spinner, create_worker_bar, error_println, format_duration,
    validate_input_dir, warn_println,
};
use depixelize::{DepixelConfig, JsonMessage};

fn main() -> Result<()> {
    let start_time = Instant::now();
    let args = Args::parse();
    let json_mode = args.json_progress;

    if !json_mode {
        println!("{}", style("depixelize - pixel art to vector").bold().blue());
        println!("{}", style("Chroma-keyed tracing with transparent previews").dim());
        println!();
    }

    validate_input_dir(&args.input_dir)?;
    let config = args.to_config()?;

    if config.verbose {
        print_configuration(&config, args.vectorizer);
    }

    let vectorizer: Arc<dyn Vectorizer> = match args.vectorizer {
        VectorizerKind::Trace => Arc::new(TracingVectorizer::new()),
        VectorizerKind::Grid => Arc::new(PixelGridVectorizer),
    };
    let engine = ProcessingEngine::with_stages(
        config,
        Arc::new(EdgeAwareUpscaler),
        vectorizer,
        Arc::new(SvgRasterizer),
    )?;

    // Initialize multi-progress system; JSON mode keeps stdout for JSON lines only
    let multi_progress = if json_mode {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    } else {
        MultiProgress::new()
    };

    let discovery = multi_progress.add(create_spinner("Scanning directory..."));
    let image_files = engine.discover_images(&args.input_dir)?;
    discovery.finish_with_message(format!("✓ Found {} images", image_files.len()));

    if image_files.is_empty() {
        if json_mode {
            JsonMessage::summary(&BatchReport::default(), start_time.elapsed()).emit();
        } else {
            println!(
                "{}",
                style("No images found with specified extensions").red()
            );
        }
        return Ok(());
    }

    engine.prepare_output_dir()?;
    let plan = engine.plan_jobs(&image_files);
    if !json_mode {
        for (rejected, first) in &plan.collisions {
            warn_println(&format!(
                "{} has the same output name as {} and will not be converted",
                rejected.display(),
                first.display()
            ));
        }
    }

    let main_progress = multi_progress.add(create_progress_bar(plan.jobs.len() as u64));
    main_progress.set_message("Processing images");

    // One bar per pool thread; any thread index may pick up a job
    let worker_bars: Vec<ProgressBar> = (0..engine.config().effective_workers())
        .map(|i| multi_progress.add(create_worker_bar(i)))
        .collect();

    let report = engine.process_batch(&plan, |event| match event {
        JobEvent::Started { job, worker } => {
            if let Some(pb) = worker_bars.get(worker) {
                pb.set_position(0);
                pb.set_message(job.file_name().to_string());
            }
        }
        JobEvent::Stage { job, worker, stage } => {
            if let Some(pb) = worker_bars.get(worker) {
                pb.set_position(stage.percent());
                pb.set_message(format!("{} - {}", job.file_name(), stage));
            }
        }
        JobEvent::Finished {
            job,
            worker,
            outcome,
            completed,
            total,
            eta,
        } => {
            if let Some(pb) = worker_bars.get(worker) {
                pb.set_position(100);
                pb.set_message("idle");
            }
            main_progress.inc(1);

            if json_mode {
                match outcome {
                    Ok(result) => JsonMessage::completed(result).emit(),
                    Err(e) => JsonMessage::failed(&job.input_path, e).emit(),
                }
                let message = match eta {
                    Some(eta) => format!("Processed {} (eta {})", job.file_name(), format_duration(eta)),
                    None => format!("Processed {}", job.file_name()),
                };
                JsonMessage::progress(completed, total, message);
            } else if let Err(e) = outcome {
                multi_progress.suspend(|| {
                    error_println(&format!("{}: {}", job.file_name(), e));
                });
            }
        }
    })?;

    main_progress.finish_with_message("✓ Processing complete!");
    for pb in &worker_bars {
        pb.finish_and_clear();
    }

    let total_time = start_time.elapsed();

    if json_mode {
        JsonMessage::summary(&report, total_time).emit();
    } else {
        println!();
        print_summary(&report, &engine, total_time);
        if args.report {
            print_report(&report);
        }
    }

    if !report.all_succeeded() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_configuration(config: &DepixelConfig, vectorizer: VectorizerKind) {
    println!("{}", style("Configuration:").bold());
    println!("  Upscale factor: {}", config.upscale_factor);
    println!(
        "  Preview size: {}x{}",
        config.preview_width, config.preview_height
    );
    println!("  Parallel jobs: {}", config.effective_workers());
    println!("  Extensions: {:?}", config.extensions);
    println!("  Vectorizer: {:?}", vectorizer);
    println!("  Chroma key: {}", config.key_matcher.key());
    println!("  Output directory: {}", config.output_dir.display());
    println!();
}

fn print_summary(report: &BatchReport, engine: &ProcessingEngine, total_time: std::time::Duration) {
    let stats = report.stats();

    println!("{}", style("Results Summary:").bold().green());
    println!(
        "  Successfully processed: {}",
        style(stats.successful).bold().green()
    );
    if stats.failed > 0 {
        println!("  Failed: {}", style(stats.failed).bold().red());
        for (kind, count) in report.failures_by_kind() {
            println!("    {}: {}", style(kind).dim(), count);
        }
    }
    println!(
        "  Key shapes removed: {}",
        style(stats.shapes_removed).bold().cyan()
    );

    println!();
    println!("{}", style("Performance:").bold().blue());
    println!(
        "  Total processing time: {}",
        style(format_duration(total_time)).bold()
    );
    println!(
        "  Average time per image: {}",
        style(format_duration(stats.average_duration())).dim()
    );

    println!();
    println!("{}", style("Output files:").bold().green());
    println!(
        "  Vectors: {}",
        engine.config().output_dir.display()
    );
    println!(
        "  Previews: {}",
        engine
            .config()
            .output_dir
            .join(&engine.config().preview_subdir)
            .display()
    );

    if stats.failed > 0 {
        println!();
        println!("{}", style("Errors encountered:").bold().red());
        for (i, outcome) in report.failed().enumerate() {
            if let Err(e) = &outcome.result {
                println!(
                    "  {}: {} - {}",
                    style(format!("#{}", i + 1)).dim(),
                    style(outcome.job.file_name()).bold().red(),
                    e
                );
            }
        }

        println!();
        println!(
            "{}",
            style(format!(
                "⚠ {} errors occurred during processing",
                stats.failed
            ))
            .bold()
            .yellow()
        );
        println!("  Check image files and try again with --verbose for more details");
    }
}
