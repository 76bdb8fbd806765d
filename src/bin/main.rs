use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use secrecy::SecretString;
use tracing_subscriber::EnvFilter;

use cryptodevs_sale::config::{LogFormat, LoggingConfig};
use cryptodevs_sale::evm::types::{utils::wei_to_ether, EthAddress};
use cryptodevs_sale::evm::EvmClient;
use cryptodevs_sale::{
    ActionKind, LocalWallet, LocalWalletProvider, SaleConfig, SaleController, SaleView,
    WalletProvider, WatchOnlyProvider,
};

const MNEMONIC_ENV: &str = "SALE_WALLET_MNEMONIC";

#[derive(Parser)]
#[command(name = "sale-cli", version, about = "Follow and mint from the Crypto Devs sale")]
struct Cli {
    /// Configuration file (defaults to SALE_CONFIG_PATH or config/sale.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// HD account index for the mnemonic wallet
    #[arg(long, global = true, default_value_t = 0)]
    account_index: u32,

    /// Follow this address read-only instead of using a mnemonic
    #[arg(long, global = true)]
    address: Option<String>,

    /// Print the sale view as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the current sale phase once
    Status,
    /// Keep printing the sale state until interrupted
    Watch,
    /// Start the presale (contract owner only)
    StartPresale,
    /// Mint during the presale at the presale price
    PresaleMint,
    /// Mint after the presale at the public price
    Mint,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => SaleConfig::load_from(path),
        None => SaleConfig::load(),
    }
    .context("loading configuration")?;
    init_tracing(&config.logging);

    let wallet = wallet_provider(&cli, &config)?;
    let controller = SaleController::from_config(&config, wallet)?;

    controller.connect().await?;
    let output = Output { json: cli.json };

    match cli.cmd {
        Command::Status => output.render(&controller.view())?,
        Command::Watch => watch(&controller, output).await?,
        Command::StartPresale => dispatch(&controller, output, ActionKind::StartPresale).await?,
        Command::PresaleMint => dispatch(&controller, output, ActionKind::PresaleMint).await?,
        Command::Mint => dispatch(&controller, output, ActionKind::PublicMint).await?,
    }

    controller.disconnect().await;
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match logging.format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn wallet_provider(cli: &Cli, config: &SaleConfig) -> anyhow::Result<Arc<dyn WalletProvider>> {
    let client = EvmClient::new(&config.network.rpc_url, config.network.chain_id)?;

    if let Ok(phrase) = std::env::var(MNEMONIC_ENV) {
        let wallet = LocalWallet::from_mnemonic(&SecretString::new(phrase), cli.account_index)?;
        return Ok(Arc::new(LocalWalletProvider::new(Arc::new(wallet), client)));
    }

    let Some(address) = &cli.address else {
        bail!("Set {} or pass --address to follow the sale read-only", MNEMONIC_ENV);
    };
    let address = EthAddress::parse(address)?;
    Ok(Arc::new(WatchOnlyProvider::new(*address.inner(), client)))
}

async fn dispatch(
    controller: &SaleController,
    output: Output,
    kind: ActionKind,
) -> anyhow::Result<()> {
    let view = controller.view();
    if let Some(fee) = view.fees.for_action(kind) {
        eprintln!("Sending {} with {} ETH", kind, wei_to_ether(fee));
    } else {
        eprintln!("Sending {}", kind);
    }

    let result = controller.dispatch(kind).await;
    output.render(&controller.view())?;

    let confirmation = result?;
    eprintln!("Confirmed in {}", confirmation.tx_hash);
    Ok(())
}

async fn watch(controller: &SaleController, output: Output) -> anyhow::Result<()> {
    let mut state = controller.subscribe();
    let mut notices = controller.notices();
    output.render(&controller.view())?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                output.render(&controller.view())?;
            }
            notice = notices.recv() => {
                if let Ok(notice) = notice {
                    eprintln!("! {}", notice);
                }
            }
        }
    }
    Ok(())
}

#[derive(Clone, Copy)]
struct Output {
    json: bool,
}

impl Output {
    fn render(self, view: &SaleView) -> anyhow::Result<()> {
        if self.json {
            println!("{}", view.to_json()?);
        } else {
            render_text(view);
        }
        Ok(())
    }
}

fn render_text(view: &SaleView) {
    println!("Phase: {}", view.phase());
    if let Some(minted) = view.minted_display() {
        println!("Minted: {} have been minted", minted);
    }
    match view.enabled_action() {
        Some(action) => match action.fee_wei {
            Some(fee) => println!("Available: {} ({} ETH)", action.kind, wei_to_ether(fee)),
            None => println!("Available: {}", action.kind),
        },
        None => println!("Available: none"),
    }
    println!("Last action: {:?}", view.status);
}
