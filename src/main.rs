mod cli;

use ddpforge::analyzer;
use ddpforge::config::{self, Config};
use ddpforge::pipeline::{Pipeline, PipelineRun};
use ddpforge::profile::EncodeProfile;
use ddpforge_av::{check_tool, format_hms, resolve_tool, ProgressEvent, Tool};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands, EncodeArgs};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::{Arc, Mutex};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "ddpforge=trace,ddpforge_av=debug".to_string()
        } else {
            "ddpforge=info,ddpforge_av=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Encode(args) => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(encode(args, cli.config.as_deref()))
        }
        Commands::Info {
            input,
            json,
            truehdd_dir,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(info(&input, json, truehdd_dir, cli.config.as_deref()))
        }
        Commands::CheckTools {
            dee_dir,
            truehdd_dir,
        } => check_tools(cli.config.as_deref(), dee_dir, truehdd_dir),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("ddpforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Config file, then environment.
fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let mut config = config::load_config_or_default(config_path)?;
    config.apply_env(|key| std::env::var(key).ok());
    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }
    Ok(config)
}

async fn encode(args: EncodeArgs, config_path: Option<&Path>) -> Result<()> {
    let mut config = load_config(config_path)?;

    // CLI flags take precedence over environment and file
    if let Some(dir) = args.dee_dir.clone() {
        config.tools.encoder_dir = Some(dir);
    }
    if let Some(dir) = args.truehdd_dir.clone() {
        config.tools.decoder_dir = Some(dir);
    }
    if let Some(root) = args.work_root.clone() {
        config.paths.work_root = Some(root);
    }
    if let Some(dir) = args.output_dir.clone() {
        config.paths.output_dir = Some(dir);
    }
    if let Some(rate) = args.bitrate_ddp.clone() {
        config.encode.ddp_bitrate = rate;
    }
    if let Some(rate) = args.bitrate_atmos_5_1.clone() {
        config.encode.atmos_51_bitrate = rate;
    }
    if let Some(rate) = args.bitrate_atmos_7_1.clone() {
        config.encode.atmos_71_bitrate = rate;
    }
    if let Some(mode) = args.atmos_mode {
        config.encode.atmos_mode = mode;
    }
    if let Some(mode) = args.warp_mode {
        config.encode.warp_mode = mode;
    }
    if let Some(bed_conform) = args.bed_conform() {
        config.encode.bed_conform = bed_conform;
    }

    let cwd = std::env::current_dir()?;
    let settings = config.settings(&cwd);

    if !args.input.is_file() {
        anyhow::bail!("Input file does not exist: {}", args.input.display());
    }

    let bar = Arc::new(Mutex::new(None::<(EncodeProfile, ProgressBar)>));
    let pipeline = Pipeline::resolve(&config.tools, &cwd, settings)?
        .with_progress_callback(progress_renderer(bar.clone()));

    let mut run = pipeline.prepare(&args.input).await?;
    print_plan(&run, &pipeline);

    if args.dry_run {
        println!("\n[DRY RUN] Nothing decoded or encoded");
        return Ok(());
    }

    let result = pipeline.execute_until(&mut run, shutdown_signal()).await;

    if let Ok(mut guard) = bar.lock() {
        if let Some((_, pb)) = guard.take() {
            if !pb.is_finished() {
                pb.abandon();
            }
        }
    }

    result?;

    println!("\nDone. Outputs:");
    for output in &run.outputs {
        println!("  - {}", output.display());
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::warn!("Shutdown signal received; stopping the run");
}

fn print_plan(run: &PipelineRun, pipeline: &Pipeline) {
    let settings = pipeline.settings();
    if let Some(classification) = run.classification {
        println!("{}", classification);
    }
    println!("Selected bitrates and warp mode:");
    for sub in &run.sub_runs {
        println!(
            "  {}: {} kbps -> {}",
            sub.profile,
            sub.bitrate,
            sub.final_path.display()
        );
        println!("      working directory: {}", sub.work_dir.display());
    }
    println!("  Warp mode: {}", settings.warp_mode);
}

/// Renders encoder progress as a 40-cell bar, one bar per profile.
fn progress_renderer(
    slot: Arc<Mutex<Option<(EncodeProfile, ProgressBar)>>>,
) -> ddpforge::pipeline::ProgressCallback {
    Box::new(move |profile: EncodeProfile, event: &ProgressEvent| {
        let Ok(mut guard) = slot.lock() else {
            return;
        };

        let needs_new = !matches!(guard.as_ref(), Some((p, _)) if *p == profile);
        if needs_new {
            if let Some((_, old)) = guard.take() {
                old.abandon();
            }
            let pb = ProgressBar::new(1000);
            if let Ok(style) = ProgressStyle::with_template("[{bar:40}] {msg}") {
                pb.set_style(style.progress_chars("■■-"));
            }
            *guard = Some((profile, pb));
        }

        if let Some((_, pb)) = guard.as_ref() {
            if pb.is_finished() {
                return;
            }
            pb.set_position((event.percent * 10.0).round().clamp(0.0, 1000.0) as u64);
            pb.set_message(format!(
                "{:.1}% (elapsed: {}, remaining: {})",
                event.percent,
                format_hms(event.elapsed),
                format_hms(event.remaining)
            ));
            if event.percent >= 100.0 {
                pb.finish();
            }
        }
    })
}

async fn info(
    input: &Path,
    json: bool,
    truehdd_dir: Option<std::path::PathBuf>,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = load_config(config_path)?;
    if !input.is_file() {
        anyhow::bail!("File does not exist: {}", input.display());
    }

    let cwd = std::env::current_dir()?;
    let dir = truehdd_dir.or(config.tools.decoder_dir);
    let decoder = resolve_tool(Tool::Decoder, dir.as_deref(), &cwd)?;
    let classification = analyzer::analyze(&decoder, input).await?;

    if json {
        let value = serde_json::json!({
            "file": input,
            "atmos": classification,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("File: {}", input.display());
        println!("{}", classification);
    }
    Ok(())
}

fn check_tools(
    config_path: Option<&Path>,
    dee_dir: Option<std::path::PathBuf>,
    truehdd_dir: Option<std::path::PathBuf>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let cwd = std::env::current_dir()?;

    println!("Checking external tools...\n");

    let tools = [
        (Tool::Decoder, truehdd_dir.or(config.tools.decoder_dir)),
        (Tool::Encoder, dee_dir.or(config.tools.encoder_dir)),
    ];
    let mut all_ok = true;

    for (tool, dir) in tools {
        let info = check_tool(tool, dir.as_deref(), &cwd);
        let status = if info.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {} ({})", status, tool.display_name(), info.name);
        if let Some(ref version) = info.version {
            print!(" {}", version);
        }
        if let Some(ref path) = info.path {
            print!(" - {}", path.display());
        }
        if let Some(ref error) = info.error {
            print!(" - {}", error);
        }
        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
        Ok(())
    } else {
        anyhow::bail!("Some tools are missing")
    }
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            config::load_config(p)?
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    let warnings = config.validate();
    println!("✓ Configuration is valid");
    println!("  DDP 5.1 bitrate: {}", config.encode.ddp_bitrate);
    println!("  Atmos 5.1 bitrate: {}", config.encode.atmos_51_bitrate);
    println!("  Atmos 7.1 bitrate: {}", config.encode.atmos_71_bitrate);
    println!("  Atmos mode: {}", config.encode.atmos_mode);
    println!("  Warp mode: {}", config.encode.warp_mode);
    println!("  Bed conform: {}", config.encode.bed_conform);
    for warning in &warnings {
        println!("  warning: {}", warning);
    }

    Ok(())
}
