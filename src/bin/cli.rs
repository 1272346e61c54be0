use anyhow::{bail, Context};
use crabcaliper::capture::{FrameSource, ImageFileSource, MeasurementSession};
use crabcaliper::{AnnotatedFrame, Calibration, CrabCaliperConfig, FramePipeline, MeasureError};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn main() -> anyhow::Result<()> {
    crabcaliper::init_logging();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: crabcaliper-cli <measure|camera|config-init> [args]");
        std::process::exit(1);
    }

    let command = &args[1];
    match command.as_str() {
        "measure" => cmd_measure(&args[2..]),
        "camera" => cmd_camera(&args[2..]),
        "config-init" => cmd_config_init(&args[2..]),
        _ => {
            eprintln!("Unknown command: {}", command);
            std::process::exit(1);
        }
    }
}

/// Options shared by the measuring commands
#[derive(Default)]
struct RunOptions {
    positional: Vec<String>,
    width: Option<String>,
    frames: Option<usize>,
    output_dir: Option<PathBuf>,
    config: Option<PathBuf>,
    json: bool,
}

fn parse_options(args: &[String]) -> anyhow::Result<RunOptions> {
    let mut opts = RunOptions::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--width" => opts.width = Some(next_value(&mut iter, "--width")?),
            "--frames" => {
                let n = next_value(&mut iter, "--frames")?;
                opts.frames = Some(n.parse().with_context(|| format!("bad --frames: {n}"))?);
            }
            "--output-dir" => {
                opts.output_dir = Some(PathBuf::from(next_value(&mut iter, "--output-dir")?))
            }
            "--config" => opts.config = Some(PathBuf::from(next_value(&mut iter, "--config")?)),
            "--json" => opts.json = true,
            other if other.starts_with("--") => bail!("Unknown option: {}", other),
            other => opts.positional.push(other.to_string()),
        }
    }
    Ok(opts)
}

fn next_value<'a>(iter: &mut impl Iterator<Item = &'a String>, flag: &str) -> anyhow::Result<String> {
    iter.next()
        .cloned()
        .with_context(|| format!("{flag} requires a value"))
}

fn load_config(opts: &RunOptions) -> anyhow::Result<CrabCaliperConfig> {
    let path = opts
        .config
        .clone()
        .unwrap_or_else(CrabCaliperConfig::default_path);
    Ok(CrabCaliperConfig::load_layered(&path)?)
}

fn open_session(
    config: &CrabCaliperConfig,
    source: Box<dyn FrameSource>,
    buffer_capacity: usize,
) -> anyhow::Result<MeasurementSession> {
    let pipeline = FramePipeline::from_config(config)?;
    let calibration = Calibration::from_config(&config.calibration)?;
    Ok(MeasurementSession::open(
        source,
        pipeline,
        calibration,
        buffer_capacity,
    ))
}

fn cmd_measure(args: &[String]) -> anyhow::Result<()> {
    let opts = parse_options(args)?;
    if opts.positional.is_empty() {
        eprintln!(
            "Usage: crabcaliper-cli measure <image>... [--width <w>] [--output-dir <dir>] [--json] [--config <path>]"
        );
        std::process::exit(1);
    }

    let config = load_config(&opts)?;
    let join_timeout = Duration::from_millis(config.capture.join_timeout_ms);
    let source = ImageFileSource::new(opts.positional.iter().map(PathBuf::from));

    // every still image is kept, so size the queue to hold all of them
    let session = open_session(&config, Box::new(source), opts.positional.len())?;
    if let Some(width) = &opts.width {
        session.set_calibration_width(width)?;
    }
    if let Some(dir) = &opts.output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating {}", dir.display()))?;
    }

    session.start()?;
    let mut index = 0usize;
    loop {
        match session.get_frame(Duration::from_secs(30)) {
            Ok(Some(annotated)) => {
                report(&annotated, index, &config.calibration.unit, &opts)?;
                index += 1;
            }
            Ok(None) => bail!("Timed out waiting for frame {}", index),
            Err(MeasureError::Closed) => break,
            Err(e) => return Err(e.into()),
        }
    }

    session.close(join_timeout)?;
    if index < opts.positional.len() {
        bail!(
            "Measured {} of {} images; see the log for failures",
            index,
            opts.positional.len()
        );
    }
    Ok(())
}

#[cfg(feature = "camera")]
fn cmd_camera(args: &[String]) -> anyhow::Result<()> {
    use crabcaliper::capture::CameraSource;
    use std::io::BufRead;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    let opts = parse_options(args)?;
    let device = match opts.positional.first() {
        Some(device) => device.clone(),
        None => {
            eprintln!(
                "Usage: crabcaliper-cli camera <device_index> [--width <w>] [--frames <n>] [--output-dir <dir>] [--json]"
            );
            for (index, name) in CameraSource::list()? {
                eprintln!("  {}: {}", index, name);
            }
            std::process::exit(1);
        }
    };

    let config = load_config(&opts)?;
    let join_timeout = Duration::from_millis(config.capture.join_timeout_ms);
    let source = CameraSource::open(&device, &config.capture)?;
    let session = open_session(&config, Box::new(source), config.capture.buffer_capacity)?;

    if let Some(width) = &opts.width {
        session.set_calibration_width(width)?;
    }
    if let Some(dir) = &opts.output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating {}", dir.display()))?;
    }

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || running.store(false, Ordering::Relaxed))
            .context("installing Ctrl-C handler")?;
    }

    // each stdin line is a calibration request
    {
        let session = session.clone();
        std::thread::Builder::new()
            .name("crabcaliper-calibrate".to_string())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    let Ok(line) = line else { break };
                    match session.set_calibration_width(&line) {
                        Ok(width) => eprintln!("Calibrating against {} on the next frame", width),
                        Err(MeasureError::Closed) => break,
                        Err(e) => eprintln!("{}", e),
                    }
                }
            })
            .context("spawning calibration reader")?;
    }

    session.start()?;
    let mut index = 0usize;
    while running.load(Ordering::Relaxed) && opts.frames.map_or(true, |n| index < n) {
        match session.latest_frame(Duration::from_millis(500)) {
            Ok(Some(annotated)) => {
                report(&annotated, index, &config.calibration.unit, &opts)?;
                index += 1;
            }
            Ok(None) => continue,
            Err(MeasureError::Closed) => break,
            Err(e) => return Err(e.into()),
        }
    }

    log::info!(
        "Shown {} frames, dropped {}",
        index,
        session.dropped_frames().unwrap_or(0)
    );
    session.close(join_timeout)?;
    Ok(())
}

#[cfg(not(feature = "camera"))]
fn cmd_camera(_args: &[String]) -> anyhow::Result<()> {
    bail!("camera support not compiled in; rebuild with --features camera")
}

fn cmd_config_init(args: &[String]) -> anyhow::Result<()> {
    let path = args
        .first()
        .map(PathBuf::from)
        .unwrap_or_else(CrabCaliperConfig::default_path);
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    CrabCaliperConfig::default().save_to_file(&path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn report(
    annotated: &AnnotatedFrame,
    index: usize,
    unit: &str,
    opts: &RunOptions,
) -> anyhow::Result<()> {
    if opts.json {
        println!("{}", serde_json::to_string(annotated)?);
    } else {
        println!(
            "Frame {} ({}): {} objects, {}ms",
            index,
            annotated.frame.device_id,
            annotated.measurements.len(),
            annotated.processing_time_ms
        );
        for (i, m) in annotated.measurements.iter().enumerate() {
            match (m.width, m.height) {
                (Some(w), Some(h)) => {
                    println!("  #{}: {:.3}{} x {:.3}{}", i, w, unit, h, unit)
                }
                _ => println!(
                    "  #{}: {:.1}px x {:.1}px (uncalibrated)",
                    i, m.pixel_width, m.pixel_height
                ),
            }
        }
    }

    if let Some(dir) = &opts.output_dir {
        let path = output_path(dir, &annotated.frame.device_id, index);
        annotated
            .frame
            .to_rgb_image()?
            .save(&path)
            .with_context(|| format!("saving {}", path.display()))?;
        log::debug!("Saved {}", path.display());
    }
    Ok(())
}

fn output_path(dir: &Path, device_id: &str, index: usize) -> PathBuf {
    let stem = Path::new(device_id)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("frame");
    dir.join(format!("{:04}_{}_measured.png", index, stem))
}
