use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use rand_core::OsRng;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ct_chaff::{
    aes::{Aes, MaskedAes},
    clefia::Clefia,
    config::CipherKind,
    derive::EmulatedPuf,
    entropy::{RandomSource, SeededSource},
    fault,
    runtime::HostedRuntime,
    BatchScheduler, BlockTransform, ChaffConfig,
};

/// Runs a chaff-protected encryption campaign on the host.
#[derive(Parser, Debug)]
#[command(name = "ct-chaff", version)]
struct Args {
    /// TOML configuration file. Command line flags override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Total lanes, including the genuine one.
    #[arg(long)]
    lanes: Option<usize>,

    /// Number of batch iterations.
    #[arg(long)]
    batches: Option<u32>,

    /// Cipher to protect (`aes`, `masked_aes` or `clefia`).
    #[arg(long)]
    cipher: Option<CipherKind>,

    /// Exit after the campaign instead of halting.
    #[arg(long)]
    no_halt: bool,

    /// Log filter directives.
    #[arg(long, default_value = "info")]
    log_filter: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&args.log_filter).context("invalid log filter")?)
        .with(fmt::layer().with_target(false))
        .init();

    fault::install_panic_hook();

    let mut config = match &args.config {
        Some(path) => ChaffConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => ChaffConfig::default(),
    };

    if let Some(lanes) = args.lanes {
        config.lanes = lanes;
    }
    if let Some(batches) = args.batches {
        config.batches = batches;
    }
    if let Some(cipher) = args.cipher {
        config.cipher = cipher;
    }
    if args.no_halt {
        config.halt_on_complete = false;
    }
    config.validate().context("invalid configuration")?;

    let entropy: Arc<dyn RandomSource> = Arc::new(SeededSource::new(OsRng));
    match config.cipher {
        CipherKind::Aes => campaign(Aes, &config, entropy),
        CipherKind::MaskedAes => {
            let cipher = MaskedAes::new(Arc::clone(&entropy));
            campaign(cipher, &config, entropy)
        }
        CipherKind::Clefia => campaign(Clefia, &config, entropy),
    }
}

fn campaign<C: BlockTransform>(
    cipher: C,
    config: &ChaffConfig,
    entropy: Arc<dyn RandomSource>,
) -> anyhow::Result<()> {
    let puf = EmulatedPuf::new(Aes, &config.puf_key_bytes()?).context("invalid device key")?;
    let runtime = Arc::new(HostedRuntime::new(config.stack_size));

    let mut scheduler = BatchScheduler::from_config(config, cipher, &puf, runtime, entropy)
        .context("campaign setup failed")?;

    info!(cipher = C::NAME, lanes = config.lanes, "key chain derived");

    if config.halt_on_complete {
        scheduler.run_forever();
    }

    let report = scheduler.run()?;
    if let Some(ct) = report.last_ciphertext() {
        println!("{}", ct);
    }

    Ok(())
}
