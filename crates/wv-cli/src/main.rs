use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use wv_audit::VerifyResult;
use wv_config::{ConfigConsumer, UnusedKeyPolicy};

mod commands;

#[derive(Parser)]
#[command(name = "wv")]
#[command(about = "Weight verification station tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge layered station config, print its hash and unused keys
    ConfigCheck {
        /// Paths in merge order (base -> site -> station...)
        #[arg(required = true)]
        paths: Vec<String>,

        /// Fail when any config key is not read by the station
        #[arg(long, default_value_t = false)]
        strict: bool,

        /// Also print the canonical JSON
        #[arg(long, default_value_t = false)]
        print_json: bool,
    },

    /// Classify a single reading against a standard weight
    Evaluate {
        /// Standard weight (kg)
        #[arg(long)]
        standard: f64,

        /// Scale reading (kg)
        #[arg(long)]
        reading: f64,

        /// Absolute band half-width (kg)
        #[arg(long, conflicts_with = "percent")]
        band: Option<f64>,

        /// Relative band half-width (% of standard)
        #[arg(long)]
        percent: Option<f64>,
    },

    /// Poll the scale bridge and print readings
    ScaleProbe {
        /// Bridge URL (overrides config)
        #[arg(long)]
        url: Option<String>,

        /// Number of successful readings to take
        #[arg(long, default_value_t = 5)]
        count: u32,

        /// Layered config paths in merge order
        #[arg(long = "config")]
        config_paths: Vec<String>,
    },

    /// Verify the hash chain of a station audit file
    AuditVerify {
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigCheck {
            paths,
            strict,
            print_json,
        } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = wv_config::load_layered_yaml(&path_refs)?;
            // Typed extraction validates ranges and enums.
            let station = loaded.station()?;

            let policy = if strict {
                UnusedKeyPolicy::Fail
            } else {
                UnusedKeyPolicy::Warn
            };
            let report =
                wv_config::report_unused_keys(ConfigConsumer::Station, &loaded.config_json, policy)?;

            println!("config_hash={}", loaded.config_hash);
            println!("scale_url={}", station.scale.url);
            println!("audit_enabled={}", station.audit.is_some());
            println!("unused_keys={}", report.unused_leaf_pointers.len());
            for p in &report.unused_leaf_pointers {
                println!("unused={p}");
            }
            if print_json {
                println!("{}", loaded.canonical_json);
            }
        }

        Commands::Evaluate {
            standard,
            reading,
            band,
            percent,
        } => {
            let band = commands::band_from_args(band, percent)?;
            for line in commands::evaluate_lines(standard, reading, &band) {
                println!("{line}");
            }
        }

        Commands::ScaleProbe {
            url,
            count,
            config_paths,
        } => {
            let mut scale = if config_paths.is_empty() {
                wv_config::StationConfig::default().scale
            } else {
                let path_refs: Vec<&str> = config_paths.iter().map(|s| s.as_str()).collect();
                let loaded = wv_config::load_layered_yaml(&path_refs)?;
                let report = wv_config::report_unused_keys(
                    ConfigConsumer::ScaleProbe,
                    &loaded.config_json,
                    UnusedKeyPolicy::Warn,
                )?;
                tracing::debug!(ignored = report.unused_leaf_pointers.len(), "probe config loaded");
                loaded.station()?.scale
            };
            if let Some(u) = url {
                scale.url = u;
            }
            commands::scale_probe(&scale, count).await?;
        }

        Commands::AuditVerify { path } => {
            let res = wv_audit::verify_hash_chain(&path)
                .with_context(|| format!("verify audit file failed: {path}"))?;
            match res {
                VerifyResult::Valid { lines } => {
                    println!("audit_valid=true lines={lines} path={path}");
                }
                VerifyResult::Broken { line, reason } => {
                    anyhow::bail!("AUDIT_CHAIN_BROKEN path={path} line={line}: {reason}");
                }
            }
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
