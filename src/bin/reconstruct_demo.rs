use incremental_sfm::config::{load_config, RuntimeConfig};
use incremental_sfm::diagnostics::RunSummary;
use incremental_sfm::io::write_json_file;
use incremental_sfm::source::{KeyMatcher, VecSource};
use incremental_sfm::Reconstructor;
use std::env;
use std::path::PathBuf;

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let mut args = env::args();
    let program = args
        .next()
        .unwrap_or_else(|| "reconstruct_demo".to_string());
    let config = match args.next() {
        Some(path) => load_config(&PathBuf::from(path)).map_err(|e| e.to_string())?,
        None => {
            eprintln!("Usage: {program} <config.json>  (running built-in defaults)");
            RuntimeConfig::default()
        }
    };

    let scene = config.scene.build();
    let frames = scene.frames(config.scene.measured_range);
    let mut driver = Reconstructor::new(VecSource::new(frames), KeyMatcher, config.params.clone())
        .map_err(|e| e.to_string())?;
    if let Some(dir) = &config.output.export_dir {
        driver = driver.with_export_dir(dir);
    }
    let summary = driver.run().map_err(|e| e.to_string())?;

    print_text_summary(&summary);
    println!("\nTrajectory (estimated vs. ground truth)");
    let trajectory = driver.database().trajectory();
    for (pose, truth) in trajectory.poses.iter().zip(&scene.poses) {
        let p = pose.position;
        let t = truth.position;
        println!(
            "  {}: [{:.4}, {:.4}, {:.4}]  truth [{:.4}, {:.4}, {:.4}]  err={:.2e}",
            pose.uid,
            p.x,
            p.y,
            p.z,
            t.x,
            t.y,
            t.z,
            (p - t).norm()
        );
    }

    if let Some(path) = &config.output.report_json {
        write_json_file(path, &summary).map_err(|e| e.to_string())?;
        println!("\nJSON report written to {}", path.display());
    }
    Ok(())
}

fn print_text_summary(summary: &RunSummary) {
    println!("Reconstruction summary");
    println!("  viewpoints: {}", summary.viewpoints);
    println!(
        "  steps: refined={} deferred={} dropped={} unconverged={}",
        summary.refined, summary.deferred, summary.dropped, summary.unconverged
    );
    println!("  structures: {}", summary.structures);
    println!("  total_ms: {:.3}", summary.total_ms);
    println!("\nSteps");
    for step in &summary.steps {
        let agg = &step.aggregation;
        match &step.refinement {
            Some(r) => println!(
                "  #{:<3} {:?} iters={:<3} error={:.6} created={} aggregated={} fused={} structures={}",
                step.viewpoint,
                r.mode,
                r.iteration_count(),
                r.final_error,
                agg.created,
                agg.aggregated,
                agg.fused_skipped,
                step.structures
            ),
            None => println!(
                "  #{:<3} deferred created={} structures={}",
                step.viewpoint, agg.created, step.structures
            ),
        }
    }
}
