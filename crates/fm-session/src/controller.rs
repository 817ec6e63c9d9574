use fm_abi::{U256, format_ether, parse_ether};
use fm_api_types::{ConnectionState, OperationKind, OperationStatus, PendingOperation, WalletAddress};
use fm_contract::{ContractGateway, GatewayError};
use fm_provider::{
    AccountsSubscription, ProviderSigner, Receipt, Signer, TxHash, WalletProvider, authorized_accounts,
    request_accounts,
};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{ContractView, FunderRecord, SessionConfig, SessionError, SessionSnapshot};

/// State only the controller touches, behind the serializing lock.
#[derive(Default)]
struct Session {
    signer: Option<Arc<dyn Signer>>,
}

/// Connection lifecycle plus fund/withdraw orchestration.
///
/// Every state-mutating entry point goes through one async mutex. Lifecycle
/// calls (`initialize`, `connect`, `disconnect`, `on_accounts_changed`,
/// `refresh_contract_view`) wait their turn; `fund` and `withdraw` refuse
/// with [`SessionError::Busy`] when the lock is held.
pub struct SessionController {
    wallet: Option<Arc<dyn WalletProvider>>,
    gateway: Arc<dyn ContractGateway>,
    config: SessionConfig,
    session: Mutex<Session>,
    state: watch::Sender<SessionSnapshot>,
    listener: StdMutex<Option<JoinHandle<()>>>,
}

impl SessionController {
    /// `wallet` is `None` when the host exposes no wallet; the gateway is
    /// then expected to sit on a read-only provider.
    pub fn new(
        wallet: Option<Arc<dyn WalletProvider>>,
        gateway: Arc<dyn ContractGateway>,
        config: SessionConfig,
    ) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self {
            wallet,
            gateway,
            config,
            session: Mutex::new(Session::default()),
            state,
            listener: StdMutex::new(None),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn publish(&self, update: impl FnOnce(&mut SessionSnapshot)) {
        self.state.send_modify(|snapshot| {
            update(snapshot);
            snapshot.derive_owner_flag();
        });
    }

    fn publish_operation(&self, operation: &PendingOperation) {
        let operation = operation.clone();
        self.publish(|snapshot| snapshot.pending_operation = Some(operation));
    }

    /// Startup check for an existing wallet authorization. Never fails:
    /// problems are logged and the session stays disconnected.
    pub async fn initialize(self: &Arc<Self>) {
        let mut session = self.session.lock().await;

        let Some(wallet) = self.wallet.clone() else {
            info!("no wallet provider present, running read-only");
            self.publish(|snapshot| snapshot.wallet_unavailable = true);
            self.refresh_locked().await;
            return;
        };

        self.spawn_listener(wallet.subscribe_accounts());

        match authorized_accounts(wallet.as_ref()).await {
            Ok(accounts) => match accounts.into_iter().next() {
                Some(account) => {
                    self.attach(&mut session, wallet, account);
                    self.refresh_locked().await;
                }
                None => debug!("wallet present but no account authorized yet"),
            },
            Err(err) => warn!("reading authorized accounts failed, staying disconnected: {err}"),
        }
    }

    fn spawn_listener(self: &Arc<Self>, mut subscription: AccountsSubscription) {
        let controller = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            while let Some(accounts) = subscription.next().await {
                let Some(controller) = controller.upgrade() else {
                    break;
                };
                controller.on_accounts_changed(accounts).await;
            }
        });

        let previous = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Stops reacting to wallet account events.
    pub fn dispose(&self) {
        let handle = self.listener.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }

    fn attach(&self, session: &mut Session, wallet: Arc<dyn WalletProvider>, account: WalletAddress) {
        info!("session connected as {account}");
        session.signer = Some(Arc::new(ProviderSigner::new(wallet, account.clone())));
        self.publish(|snapshot| {
            snapshot.connection_state = ConnectionState::Connected;
            snapshot.account_address = Some(account);
        });
    }

    fn detach(&self, session: &mut Session) {
        session.signer = None;
        self.publish(|snapshot| {
            snapshot.connection_state = ConnectionState::Disconnected;
            snapshot.account_address = None;
        });
    }

    /// Asks the wallet for authorization; the only call that may prompt.
    pub async fn connect(&self) -> Result<WalletAddress, SessionError> {
        let mut session = self.session.lock().await;
        let Some(wallet) = self.wallet.clone() else {
            return Err(SessionError::WalletUnavailable);
        };

        let previous = self.state.borrow().connection_state;
        if previous == ConnectionState::Disconnected {
            self.publish(|snapshot| snapshot.connection_state = ConnectionState::Connecting);
        }

        let outcome = match request_accounts(wallet.as_ref()).await {
            Ok(accounts) => accounts
                .into_iter()
                .next()
                .ok_or_else(|| SessionError::AuthorizationRejected("wallet returned no accounts".to_owned())),
            Err(err) if err.is_user_rejection() => Err(SessionError::AuthorizationRejected(err.to_string())),
            Err(err) => Err(SessionError::Provider(err)),
        };

        match outcome {
            Ok(account) => {
                self.attach(&mut session, wallet, account.clone());
                self.refresh_locked().await;
                Ok(account)
            }
            Err(err) => {
                warn!("connect failed: {err}");
                self.publish(|snapshot| snapshot.connection_state = previous);
                Err(err)
            }
        }
    }

    /// Drops the signer and account. The last contract view stays visible.
    pub async fn disconnect(&self) {
        let mut session = self.session.lock().await;
        info!("session disconnected");
        self.detach(&mut session);
    }

    /// Wallet-originated account change. An empty set means the wallet
    /// revoked access.
    pub async fn on_accounts_changed(&self, accounts: Vec<WalletAddress>) {
        let mut session = self.session.lock().await;
        let Some(wallet) = self.wallet.clone() else {
            return;
        };

        match accounts.into_iter().next() {
            Some(account) => {
                self.attach(&mut session, wallet, account);
                self.refresh_locked().await;
            }
            None => {
                info!("wallet reported no authorized accounts");
                self.detach(&mut session);
            }
        }
    }

    /// Re-reads the contract. Returns whether a new view was published.
    pub async fn refresh_contract_view(&self) -> bool {
        let _session = self.session.lock().await;
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> bool {
        let gateway = self.gateway.as_ref();
        let contract_address = gateway.contract_address().clone();
        let reads = tokio::try_join!(
            gateway.read_minimum_contribution(),
            gateway.read_owner(),
            gateway.read_balance(&contract_address),
        );

        match reads {
            Ok((minimum_contribution, owner_address, contract_balance)) => {
                let view = ContractView {
                    contract_address,
                    minimum_contribution,
                    contract_balance,
                    owner_address,
                };
                self.publish(|snapshot| snapshot.contract_view = Some(view));
                true
            }
            Err(err) => {
                warn!("contract refresh failed, keeping previous view: {err}");
                false
            }
        }
    }

    /// Draft amount as typed; cleared only by a successful fund.
    pub fn set_fund_input(&self, text: impl Into<String>) {
        let text = text.into();
        self.publish(|snapshot| snapshot.fund_input = text);
    }

    /// Records `amount` as the draft once the session is free, then funds it.
    /// A `Busy` refusal leaves the current draft alone.
    pub async fn fund(&self, amount: &str) -> Result<PendingOperation, SessionError> {
        let session = self.session.try_lock().map_err(|_| SessionError::Busy)?;
        let draft_changed = self.state.borrow().fund_input != amount;
        if draft_changed {
            self.set_fund_input(amount);
        }
        let signer = session.signer.clone().ok_or(SessionError::NotConnected)?;

        let value = parse_ether(amount).map_err(|err| SessionError::InvalidAmount(err.to_string()))?;
        if value.is_zero() {
            return Err(SessionError::InvalidAmount("amount must be greater than zero".to_owned()));
        }

        let mut operation = PendingOperation::in_flight(OperationKind::Fund, Some(format_ether(value)));
        self.publish_operation(&operation);
        info!("funding {} ETH from {}", format_ether(value), signer.address());

        let outcome = self.submit_fund(signer.as_ref(), value, &mut operation).await;
        let result = self.settle(&mut operation, outcome).await;
        if result.is_ok() {
            self.publish(|snapshot| snapshot.fund_input.clear());
        }
        drop(session);
        result
    }

    async fn submit_fund(
        &self,
        signer: &dyn Signer,
        value: U256,
        operation: &mut PendingOperation,
    ) -> Result<Receipt, SessionError> {
        let available = signer
            .get_balance()
            .await
            .map_err(|err| SessionError::ReadFailure(format!("wallet balance: {err}")))?;
        if available < value {
            return Err(SessionError::InsufficientWalletBalance(format!(
                "requested {} ETH but the wallet holds {} ETH",
                format_ether(value),
                format_ether(available)
            )));
        }

        let hash = self.gateway.submit_fund(signer, value).await?;
        self.confirm(hash, operation).await
    }

    pub async fn withdraw(&self) -> Result<PendingOperation, SessionError> {
        let session = self.session.try_lock().map_err(|_| SessionError::Busy)?;
        let signer = session.signer.clone().ok_or(SessionError::NotConnected)?;
        if !self.state.borrow().is_owner {
            warn!("withdraw refused for non-owner {}", signer.address());
            return Err(SessionError::NotOwner);
        }

        let mut operation = PendingOperation::in_flight(OperationKind::Withdraw, None);
        self.publish_operation(&operation);
        info!("withdrawing contract balance to {}", signer.address());

        let outcome = match self.gateway.submit_withdraw(signer.as_ref()).await {
            Ok(hash) => self.confirm(hash, &mut operation).await,
            Err(err) => Err(err.into()),
        };
        let result = self.settle(&mut operation, outcome).await;
        drop(session);
        result
    }

    async fn confirm(&self, hash: TxHash, operation: &mut PendingOperation) -> Result<Receipt, SessionError> {
        operation.tx_hash = Some(hash.0.clone());
        self.publish_operation(operation);

        let wait = self.gateway.wait_for_confirmation(&hash, self.config.poll_interval);
        let confirmed: Result<Receipt, GatewayError> = match self.config.confirmation_timeout {
            Some(after) => tokio::time::timeout(after, wait)
                .await
                .map_err(|_| SessionError::ConfirmationTimeout { tx_hash: hash.0.clone(), after })?,
            None => wait.await,
        };
        Ok(confirmed?)
    }

    /// Records the outcome on the operation; success also refreshes the view.
    async fn settle(
        &self,
        operation: &mut PendingOperation,
        outcome: Result<Receipt, SessionError>,
    ) -> Result<PendingOperation, SessionError> {
        match outcome {
            Ok(receipt) => {
                debug!("{} confirmed in block {:?}", receipt.tx_hash, receipt.block_number);
                self.refresh_locked().await;
                operation.status = OperationStatus::Succeeded;
                self.publish_operation(operation);
                Ok(operation.clone())
            }
            Err(err) => {
                warn!("{:?} operation failed: {err}", operation.kind);
                operation.status = OperationStatus::Failed {
                    kind: err.kind().to_owned(),
                    reason: err.to_string(),
                };
                self.publish_operation(operation);
                Err(err)
            }
        }
    }

    pub async fn contract_version(&self) -> Result<U256, SessionError> {
        Ok(self.gateway.read_version().await?)
    }

    pub async fn amount_funded_by(&self, funder: &WalletAddress) -> Result<U256, SessionError> {
        Ok(self.gateway.read_amount_funded(funder).await?)
    }

    /// Walks `getFunders` until it runs out or `max_funders` is reached.
    /// Repeat funders appear once.
    pub async fn funders(&self) -> Result<Vec<FunderRecord>, SessionError> {
        let mut records: Vec<FunderRecord> = Vec::new();
        for index in 0..self.config.max_funders {
            let Some(address) = self.gateway.read_funder(u64::from(index)).await? else {
                break;
            };
            if records.iter().any(|record| record.address.matches(&address)) {
                continue;
            }
            let amount_funded = self.gateway.read_amount_funded(&address).await?;
            records.push(FunderRecord { address, amount_funded });
        }
        Ok(records)
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.dispose();
    }
}
