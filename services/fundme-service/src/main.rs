mod routes;

use anyhow::Context;
use fm_contract::{ConfigError, ContractConfig, ContractGateway, FundMeGateway};
use fm_devchain::DevChain;
use fm_provider::WalletProvider;
use fm_provider_http::HttpRpcProvider;
use fm_session::{SessionConfig, SessionController};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const DEFAULT_SERVICE_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_ACCOUNTS_POLL: Duration = Duration::from_millis(2_000);

/// Where signing accounts come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WalletMode {
    /// Node-managed accounts over `FUNDME_RPC_URL`.
    Rpc,
    /// In-process chain and wallet, no node needed.
    DevChain,
    /// No wallet: read-only.
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ServiceConfig {
    addr: SocketAddr,
    wallet_mode: WalletMode,
    accounts_poll: Duration,
}

impl ServiceConfig {
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_addr = lookup("FUNDME_SERVICE_ADDR").unwrap_or_else(|| DEFAULT_SERVICE_ADDR.to_owned());
        let addr = raw_addr
            .trim()
            .parse::<SocketAddr>()
            .map_err(|err| ConfigError::invalid("FUNDME_SERVICE_ADDR", &raw_addr, err.to_string()))?;

        let wallet_mode = match lookup("FUNDME_WALLET") {
            None => WalletMode::Rpc,
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "rpc" => WalletMode::Rpc,
                "devchain" => WalletMode::DevChain,
                "none" => WalletMode::None,
                _ => return Err(ConfigError::invalid("FUNDME_WALLET", &raw, "expected rpc, devchain or none")),
            },
        };

        let accounts_poll = match lookup("FUNDME_ACCOUNTS_POLL_MS") {
            None => DEFAULT_ACCOUNTS_POLL,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(millis) if millis > 0 => Duration::from_millis(millis),
                _ => return Err(ConfigError::invalid("FUNDME_ACCOUNTS_POLL_MS", &raw, "expected a positive integer")),
            },
        };

        Ok(Self {
            addr,
            wallet_mode,
            accounts_poll,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let service = ServiceConfig::from_lookup(|key| std::env::var(key).ok())?;
    let contract = ContractConfig::from_env()?;
    let session_config = SessionConfig::from_env()?;

    let (wallet, gateway): (Option<Arc<dyn WalletProvider>>, Arc<dyn ContractGateway>) = match service.wallet_mode {
        WalletMode::Rpc => {
            let rpc = Arc::new(HttpRpcProvider::new(Some(contract.rpc_url.clone())));
            let _accounts_poller = rpc.watch_accounts(service.accounts_poll);
            let wallet: Arc<dyn WalletProvider> = rpc;
            let gateway: Arc<dyn ContractGateway> = Arc::new(FundMeGateway::from_config(&contract, wallet.clone()));
            (Some(wallet), gateway)
        }
        WalletMode::DevChain => {
            let chain = Arc::new(DevChain::default());
            let address = chain.contract_address();
            let wallet: Arc<dyn WalletProvider> = chain;
            let gateway: Arc<dyn ContractGateway> = Arc::new(FundMeGateway::new(address, wallet.clone()));
            (Some(wallet), gateway)
        }
        WalletMode::None => {
            let reader: Arc<dyn WalletProvider> = Arc::new(HttpRpcProvider::new(Some(contract.rpc_url.clone())));
            let gateway: Arc<dyn ContractGateway> = Arc::new(FundMeGateway::from_config(&contract, reader));
            (None, gateway)
        }
    };
    info!(
        "wallet mode {:?}, contract {}",
        service.wallet_mode,
        gateway.contract_address()
    );

    let session = Arc::new(SessionController::new(wallet, gateway, session_config));
    session.initialize().await;

    let app = routes::router(session.clone());
    let listener = tokio::net::TcpListener::bind(service.addr)
        .await
        .with_context(|| format!("bind {}", service.addr))?;
    info!("fundme-service listening on {}", service.addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    session.dispose();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("ctrl-c handler failed: {err}");
    }
    info!("shutting down");
}
