mod cli;

use nepenthe::{config, server::AppContext};
use nepenthe_av::{FfprobeProber, MetadataProbe};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;

/// Load config, then apply environment overrides. CLI overrides come after.
fn load_config(config_path: Option<&Path>) -> Result<config::Config> {
    let mut config = config::load_config_or_default(config_path)?;
    config::apply_env_overrides(&mut config)?;
    Ok(config)
}

async fn start_server(
    config_path: Option<&Path>,
    host: Option<String>,
    port: Option<u16>,
    video_paths: Option<String>,
) -> Result<()> {
    let mut config = load_config(config_path)?;

    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(paths) = video_paths {
        config.library.video_paths = config::split_paths(&paths);
    }
    config::validate_config(&config)?;

    tracing::info!("Starting Nepenthe server");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );
    tracing::info!("Library roots: {:?}", config.library.video_paths);

    let ctx = AppContext::from_config(config)?;
    nepenthe::server::start_server(ctx).await
}

async fn scan(config_path: Option<&Path>, paths: Option<String>, no_heal: bool) -> Result<()> {
    let config = load_config(config_path)?;
    config::validate_config(&config)?;
    let ctx = AppContext::from_config(config)?;

    let roots = paths.map(|p| config::split_paths(&p));
    let heal = if no_heal { Some(false) } else { None };
    let summary = ctx.ingest.run_scan(roots, heal).await?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    if let Some(error) = summary.error {
        anyhow::bail!("Scan failed: {}", error);
    }
    Ok(())
}

async fn clean(config_path: Option<&Path>, paths: Option<String>) -> Result<()> {
    let config = load_config(config_path)?;
    config::validate_config(&config)?;
    let roots = match paths {
        Some(p) => config::split_paths(&p),
        None => config.library.video_paths.clone(),
    };
    let ctx = AppContext::from_config(config)?;

    let report = ctx.ingest.sync_and_clean(roots).await?;
    println!("{}", report.message);
    for error in &report.errors {
        println!("  ! {}", error);
    }
    println!("Removed {} unreferenced thumbnail(s)", report.thumbnails_swept);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "nepenthe=trace,nepenthe_db=debug,nepenthe_av=debug,tower_http=debug".to_string()
        } else {
            "nepenthe=info,nepenthe_db=info,nepenthe_av=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Start {
            host,
            port,
            video_paths,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(config_path, host, port, video_paths))
        }
        Commands::Scan { paths, no_heal } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(scan(config_path, paths, no_heal))
        }
        Commands::Clean { paths } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(clean(config_path, paths))
        }
        Commands::Probe { file, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(config_path, &file, json))
        }
        Commands::CheckTools => check_tools(config_path),
        Commands::Validate {
            config: validate_path,
        } => {
            let path = validate_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("nepenthe {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn probe_file(config_path: Option<&Path>, file: &Path, json: bool) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let config = load_config(config_path)?;
    let tools = config.tools.resolve_paths();
    let prober = FfprobeProber::new(tools.ffprobe, config.tools.probe_timeout());
    let metadata = prober.probe(file).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&metadata)?);
        return Ok(());
    }

    println!("File: {}", file.display());
    match metadata.duration {
        Some(secs) => println!(
            "Duration: {:02}:{:02}:{:02}",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60
        ),
        None => println!("Duration: unknown"),
    }
    match (metadata.width, metadata.height) {
        (Some(w), Some(h)) => println!("Resolution: {}x{}", w, h),
        _ => println!("Resolution: unknown"),
    }

    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = load_config(config_path)?;
    let tools = nepenthe_av::check_tools(&config.tools.resolve_paths());
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
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        println!(" - {}", tool.path.display());
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Probing and thumbnails will be skipped until they are installed.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            config::load_config(p)?
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    println!("✓ Configuration is valid");
    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Library roots: {}", config.library.video_paths.len());
    for root in &config.library.video_paths {
        println!("    {}", root.display());
    }
    println!("  Data directory: {}", config.library.data_dir.display());
    println!("  Ingest workers: {}", config.ingest.workers);

    Ok(())
}
