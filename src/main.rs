//! Promotion audit CLI
//!
//! Entry point for the `promo-audit` command-line tool.

use clap::{Parser, Subcommand};
use promo_audit::config::{ConfigError, DEFAULT_CONFIG_FILE};
use promo_audit::reader::HttpReaderConfig;
use promo_audit::server::Listener;
use promo_audit::signal::SignalHandler;
use promo_audit::sink::{TracingLogger, TracingReporter};
use promo_audit::{
    logging, AuditConfig, AuditService, Disposition, DirectoryManifestSource, EffectiveConfig, HttpRegistryReader,
    ManifestIndex, ManifestSource, Reconciler,
};
use serde_json::{json, Value};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "promo-audit")]
#[command(about = "Audit registry pushes against promotion manifests", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the webhook
    Serve {
        /// Config file (default: promo-audit.toml if present)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Listen address, overrides server.bind
        #[arg(long)]
        bind: Option<String>,

        /// Manifest directory, overrides manifests.dir
        #[arg(long)]
        manifests: Option<PathBuf>,
    },

    /// Audit one push envelope and print the acknowledgment.
    ///
    /// Exits 0 when verified, 2 when rejected or unverified, 1 on errors.
    Audit {
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        #[arg(long)]
        manifests: Option<PathBuf>,

        /// Envelope file; stdin when absent or "-"
        file: Option<PathBuf>,
    },

    /// Decode a push envelope and print the event
    Decode {
        /// Envelope file; stdin when absent or "-"
        file: Option<PathBuf>,
    },

    /// Load and index manifests, print a summary
    Manifests {
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Manifest directory, overrides manifests.dir
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Print the effective configuration
    Config {
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            bind,
            manifests,
        } => run_serve(config, overrides(bind, manifests)),
        Commands::Audit {
            config,
            manifests,
            file,
        } => run_audit(config, overrides(None, manifests), file),
        Commands::Decode { file } => run_decode(file),
        Commands::Manifests { config, dir } => run_manifests(config, overrides(None, dir)),
        Commands::Config { config } => run_config(config),
    }
}

/// CLI flags as the top configuration layer.
fn overrides(bind: Option<String>, manifests: Option<PathBuf>) -> Option<Value> {
    let mut layer = json!({});
    if let Some(bind) = bind {
        layer["server"] = json!({ "bind": bind });
    }
    if let Some(dir) = manifests {
        layer["manifests"] = json!({ "dir": dir.to_string_lossy() });
    }
    Some(layer)
}

fn load_config(path: Option<PathBuf>, cli: Option<Value>) -> Result<EffectiveConfig, ConfigError> {
    let path = path.or_else(|| {
        let default = PathBuf::from(DEFAULT_CONFIG_FILE);
        default.exists().then_some(default)
    });
    EffectiveConfig::build(path.as_deref(), cli)
}

fn read_input(file: Option<&Path>) -> io::Result<Vec<u8>> {
    match file {
        Some(path) if path != Path::new("-") => std::fs::read(path),
        _ => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf)?;
            Ok(buf)
        }
    }
}

fn build_service(settings: &AuditConfig) -> Result<AuditService, String> {
    let reader_config: HttpReaderConfig = settings.reader_config();
    let reader = HttpRegistryReader::new(reader_config).map_err(|e| format!("Error creating registry client: {}", e))?;

    let reconciler = Reconciler::new(Arc::new(reader), Arc::new(TracingLogger), Arc::new(TracingReporter))
        .with_max_candidates(settings.audit.max_candidates);
    let source = DirectoryManifestSource::new(settings.manifests.dir.clone());

    AuditService::new(Box::new(source), reconciler).map_err(|e| {
        format!(
            "Error loading manifests from {}: {}",
            settings.manifests.dir.display(),
            e
        )
    })
}

fn run_serve(config_path: Option<PathBuf>, cli: Option<Value>) -> ExitCode {
    let effective = match load_config(config_path, cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let settings = effective.settings;
    logging::init(&settings.logging);

    let service = match build_service(&settings) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let handler = SignalHandler::new();
    let state = handler.state();
    let listener = match Listener::bind(&settings.server, handler.state()) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let shutdown = listener.shutdown_handle();
    if let Err(e) = handler.install(move || shutdown.shutdown()) {
        eprintln!("Error installing signal handler: {}", e);
        return ExitCode::FAILURE;
    }

    let runner = thread::spawn(move || listener.run(service));
    while !state.is_shutdown_requested() && !runner.is_finished() {
        thread::sleep(Duration::from_millis(200));
    }

    if !handler.wait_for_drain() {
        tracing::warn!(in_flight = state.in_flight(), "exiting with requests in flight");
        return ExitCode::FAILURE;
    }

    match runner.join() {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(e)) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
        Err(_) => {
            eprintln!("Listener thread panicked");
            ExitCode::FAILURE
        }
    }
}

fn run_audit(config_path: Option<PathBuf>, cli: Option<Value>, file: Option<PathBuf>) -> ExitCode {
    let effective = match load_config(config_path, cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    logging::init(&effective.settings.logging);

    let body = match read_input(file.as_deref()) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Error reading envelope: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let service = match build_service(&effective.settings) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let ack = service.handle(&body);
    match serde_json::to_string_pretty(&ack) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            return ExitCode::FAILURE;
        }
    }

    match ack.disposition {
        Disposition::Verified { .. } => ExitCode::SUCCESS,
        Disposition::Unverified { .. } | Disposition::Invalid { .. } => ExitCode::from(2),
        Disposition::Malformed { .. } => ExitCode::FAILURE,
    }
}

fn run_decode(file: Option<PathBuf>) -> ExitCode {
    let body = match read_input(file.as_deref()) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Error reading envelope: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let event = match audit_protocol::decode_envelope(&body) {
        Ok(event) => event,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string_pretty(&event) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_manifests(config_path: Option<PathBuf>, cli: Option<Value>) -> ExitCode {
    let effective = match load_config(config_path, cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let source = DirectoryManifestSource::new(effective.settings.manifests.dir.clone());
    let index = match source.fetch().and_then(ManifestIndex::build) {
        Ok(index) => index,
        Err(e) => {
            eprintln!("Error loading manifests from {}: {}", source.root().display(), e);
            return ExitCode::FAILURE;
        }
    };

    for manifest in index.manifests() {
        let origin = manifest
            .origin
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(inline)".to_string());
        println!("{}", origin);
        for registry in &manifest.registries {
            let marker = if registry.src { " (source)" } else { "" };
            println!("  registry {}{}", registry.name, marker);
        }
        for image in &manifest.images {
            println!("  image {} ({} digests)", image.name, image.dmap.len());
        }
    }
    println!(
        "{} manifests, {} registries, {} distinct digests",
        index.manifests().len(),
        index.registry_count(),
        index.distinct_digest_count()
    );
    ExitCode::SUCCESS
}

fn run_config(config_path: Option<PathBuf>) -> ExitCode {
    let effective = match load_config(config_path, None) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match effective.to_json() {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            ExitCode::FAILURE
        }
    }
}
