mod cli;

use audex::batch::{BatchScheduler, BatchSummary, FileOutcome};
use audex::config::{self, ExtractOverrides};
use audex::quality::QualityRequest;
use audex_av::{AudioProbe, AudioProber, FfmpegEncoder, FfprobeProber, ToolRegistry};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, ExtractArgs};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "audex=trace,audex_av=debug,audex_common=debug".to_string()
        } else {
            "audex=info,audex_av=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Extract(args) => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_extract(args, cli.config.as_deref()))
        }
        Commands::Probe {
            file,
            json,
            quality,
            format,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(&file, json, quality, format, cli.config.as_deref()))
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("audex {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn run_extract(args: ExtractArgs, config_path: Option<&Path>) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;
    ExtractOverrides::from(args).apply(&mut config.extract);
    config::validate_config(&config)?;

    let registry = ToolRegistry::discover(&config.tools);
    registry.require_all().context(
        "ffmpeg and ffprobe are required; install them or set tools.ffmpeg_path / tools.ffprobe_path",
    )?;

    let prober = FfprobeProber::new(
        registry.require("ffprobe")?.to_path_buf(),
        config.tools.probe_timeout(),
    );
    let encoder = FfmpegEncoder::new(
        registry.require("ffmpeg")?.to_path_buf(),
        config.tools.encode_timeout(),
    );

    let settings = config.extract.to_settings();
    tracing::info!(
        "Extracting {} audio at {}{} from {}",
        settings.format,
        if settings.format.is_lossless() {
            "lossless".to_string()
        } else {
            settings.quality.to_string()
        },
        if settings.adaptive { " (adaptive)" } else { "" },
        settings.input_dir.display()
    );

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing running files and saving records");
            signal_token.cancel();
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::error!("Second interrupt, exiting immediately");
            std::process::exit(130);
        }
    });

    let scheduler = BatchScheduler::new(settings, Arc::new(prober), Arc::new(encoder));
    let summary = scheduler.run(cancel).await?;

    if summary.is_empty() {
        print_staging_failures(&summary);
        anyhow::bail!(
            "No video files found in {}",
            scheduler.settings().input_dir.display()
        );
    }

    print_summary(&summary, scheduler.settings().output_dir.as_path());

    if summary.was_interrupted() {
        anyhow::bail!(
            "Interrupted with {} file(s) not started; run again to resume",
            summary.interrupted
        );
    }
    if summary.failed > 0 {
        anyhow::bail!("{} file(s) failed", summary.failed);
    }

    Ok(())
}

fn print_staging_failures(summary: &BatchSummary) {
    for (path, reason) in &summary.staging_failures {
        println!("✗ could not stage {}: {}", path.display(), reason);
    }
}

fn print_summary(summary: &BatchSummary, output_dir: &Path) {
    println!();
    print_staging_failures(summary);
    for report in &summary.reports {
        match &report.outcome {
            FileOutcome::Succeeded {
                output,
                bitrate,
                adjusted,
                ..
            } => {
                print!("✓ {} -> {}", report.identity, output.display());
                if let Some(rate) = bitrate {
                    print!(" ({}{})", rate, if *adjusted { ", adaptive" } else { "" });
                }
                println!(" [{:.1}s]", report.elapsed.as_secs_f64());
            }
            FileOutcome::Skipped { .. } => {}
            FileOutcome::NoAudio => println!("- {} has no audio stream", report.identity),
            FileOutcome::Failed(e) => println!("✗ {}: {}", report.identity, e),
            FileOutcome::Interrupted => println!("… {} not started", report.identity),
        }

        for warning in &report.warnings {
            println!("  ! {}", warning);
        }
    }

    println!();
    if summary.staged > 0 {
        println!("Staged:      {}", summary.staged);
    }
    if !summary.staging_failures.is_empty() {
        println!("Not staged:  {}", summary.staging_failures.len());
    }
    println!("Succeeded:   {}", summary.succeeded);
    println!("Skipped:     {}", summary.skipped);
    println!("No audio:    {}", summary.no_audio);
    println!("Failed:      {}", summary.failed);
    if summary.interrupted > 0 {
        println!("Interrupted: {}", summary.interrupted);
    }
    if summary.store_recovered {
        println!("(extraction record was corrupt and has been rebuilt)");
    }
    println!(
        "Workers: {}, elapsed {:.1}s, output in {}",
        summary.workers,
        summary.elapsed.as_secs_f64(),
        output_dir.display()
    );
}

async fn probe_file(
    file: &Path,
    json: bool,
    quality: Option<audex_common::Bitrate>,
    format: Option<audex_common::AudioFormat>,
    config_path: Option<&Path>,
) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let config = config::load_config_or_default(config_path)?;
    let registry = ToolRegistry::discover(&config.tools);
    let prober = FfprobeProber::new(
        registry.require("ffprobe")?.to_path_buf(),
        config.tools.probe_timeout(),
    );

    let probe = prober.probe_audio(file).await?;
    let request = QualityRequest {
        requested: quality.unwrap_or(config.extract.quality),
        adaptive: true,
        format: format.unwrap_or(config.extract.format),
    };
    let decision = request.resolve(probe.bitrate());

    if json {
        let value = serde_json::json!({
            "file": file,
            "probe": probe,
            "requested": request.requested,
            "format": request.format,
            "adaptive_bitrate": decision.bitrate,
            "adjusted": decision.adjusted,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("File: {}", file.display());
    match &probe {
        AudioProbe::NoAudioStream => {
            println!("Audio: none");
            return Ok(());
        }
        AudioProbe::Stream(info) => {
            print!("Audio: {}", info.codec.as_deref().unwrap_or("unknown codec"));
            if let Some(channels) = info.channels {
                print!(" {}ch", channels);
            }
            if let Some(rate) = info.sample_rate {
                print!(" {} Hz", rate);
            }
            println!();
            match (info.bitrate, info.bitrate_source) {
                (Some(bps), Some(source)) => {
                    println!("Bitrate: {} kbps ({:?})", bps / 1000, source)
                }
                (Some(bps), None) => println!("Bitrate: {} kbps", bps / 1000),
                _ => println!("Bitrate: unknown"),
            }
        }
    }

    match decision.bitrate {
        Some(rate) => println!(
            "Adaptive {}: {} requested -> {}",
            request.format, request.requested, rate
        ),
        None => println!("Adaptive {}: lossless, no bitrate", request.format),
    }

    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = config::load_config_or_default(config_path)?;
    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install ffmpeg (which provides ffprobe) to extract audio.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let (config, source) = match path {
        Some(p) => (config::load_config(p)?, p.display().to_string()),
        None => match config::find_default_config() {
            Some(p) => (config::load_config(&p)?, p.display().to_string()),
            None => (config::Config::default(), "built-in defaults".to_string()),
        },
    };

    println!("✓ Configuration is valid ({})", source);
    let extract = &config.extract;
    println!("  Input:    {}", extract.input_dir.display());
    println!("  Output:   {}", extract.output_dir.display());
    println!("  Records:  {}", extract.record_dir().display());
    println!("  Format:   {}", extract.format);
    println!("  Quality:  {}{}", extract.quality, if extract.adaptive { " (adaptive)" } else { "" });
    println!("  Workers:  {:?}", extract.parallelism());
    println!(
        "  Resume: {}, archive: {}, stage: {}",
        extract.resume, extract.archive_done, extract.stage
    );

    Ok(())
}
