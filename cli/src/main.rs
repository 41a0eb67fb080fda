use argparse::{CliOpts, Method, Pool};
use simpull::{
    AlignmentMethod, BatchOptions, DetectionMethod, ExternalSettings, ImageDebugConfig, LiposomeProject,
    LiposomeSettings, Progress, SimPullProject, TrevorSettings,
};

mod argparse;

fn main() -> anyhow::Result<()> {
    color_backtrace::install();
    let args = argparse::get_args();
    setup_logger(args.verbose);
    log::trace!("Args: {:?}", args);

    run(&args).map_err(|e| {
        log::error!("{}", e);
        e.chain()
            .skip(1)
            .for_each(|cause| log::error!("because: {}", cause));
        anyhow::anyhow!("unrecoverable simpull failure")
    })
}

fn run(args: &CliOpts) -> anyhow::Result<()> {
    match &args.subcmd {
        argparse::SubCommand::Simpull(opts) => simpull(opts),
        argparse::SubCommand::Reports(opts) => {
            SimPullProject::open(&opts.path)?.generate_reports()?;
            Ok(())
        }
        argparse::SubCommand::Threshold(opts) => {
            let rows = SimPullProject::open(&opts.path)?.threshold_report(
                &opts.name,
                opts.min_int_per_area,
                opts.min_area,
            )?;
            for r in rows {
                println!("{}\t{:.3}", r.well, r.particles_per_fov);
            }
            Ok(())
        }
        argparse::SubCommand::Liposome(opts) => liposome(opts),
    }
}

fn batch_options(pool: &Pool) -> BatchOptions {
    BatchOptions {
        threads: pool.threads,
        ..Default::default()
    }
}

fn debug_config(pool: &Pool) -> ImageDebugConfig {
    ImageDebugConfig {
        dir: pool.debug_dir.clone(),
    }
}

fn log_progress(p: Progress) {
    log::info!("{}/{} fields of view done", p.completed, p.total);
}

fn simpull(opts: &argparse::Simpull) -> anyhow::Result<()> {
    let method = match opts.method {
        Method::Trevor => DetectionMethod::Trevor(TrevorSettings {
            threshold_sd: opts.threshold,
            tophat_radius: opts.tophat_radius,
            kernel_width: opts.kernel_width,
            erode_radius: opts.erode_radius,
        }),
        Method::External => DetectionMethod::External(ExternalSettings {
            size: opts.size,
            threshold: opts.threshold,
        }),
    };
    // no external backend ships with the command line tool
    let detector = method.into_detector(None, debug_config(&opts.pool))?;

    let project = SimPullProject::open(&opts.path)?;
    let summary = project.run_detection(detector.as_ref(), &batch_options(&opts.pool), log_progress)?;
    if summary.cancelled {
        log::warn!("detection cancelled, reports not generated");
        return Ok(());
    }
    let reports = project.generate_reports()?;
    for s in &reports.summary {
        println!("{}\t{}\t{:.3}", s.well, s.fov_count, s.particles_per_fov);
    }
    Ok(())
}

fn liposome(opts: &argparse::Liposome) -> anyhow::Result<()> {
    let settings = LiposomeSettings {
        threshold: opts.threshold,
        radius: opts.radius,
        margin: opts.margin,
        alignment: if opts.no_align {
            AlignmentMethod::Identity
        } else {
            AlignmentMethod::CrossCorrelation
        },
    };
    let project = LiposomeProject::open(&opts.path, settings)?;
    let outcome = project.run(&debug_config(&opts.pool), &batch_options(&opts.pool), log_progress)?;
    for s in &outcome.summary {
        match s.mean_influx {
            Some(m) => println!("{}\t{}\t{:.2}", s.sample, s.valid, m),
            None => println!("{}\t{}\t-", s.sample, s.valid),
        }
    }
    Ok(())
}

pub fn setup_logger(level: u8) {
    let mut builder = pretty_env_logger::formatted_timed_builder();

    let log_level = match level {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    builder.filter_level(log_level);
    builder.format_timestamp_millis();
    builder.init();
}
