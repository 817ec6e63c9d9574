//! Deterministic in-memory chain with a FundMe contract and a built-in wallet.
//!
//! `DevChain` answers the same JSON-RPC methods a browser wallet or a local
//! node would, so everything above the provider boundary runs against it
//! unchanged. Knobs on the struct simulate the awkward cases: the user
//! declining a prompt, reads failing, transactions sitting unmined.

mod contract;

use async_trait::async_trait;
use fm_abi::{U256, ether, from_hex_data, keccak256, parse_quantity, to_hex_data, to_quantity};
use fm_api_types::WalletAddress;
use fm_provider::{
    AccountsListeners, AccountsSubscription, EXECUTION_REVERTED, ProviderError, UNAUTHORIZED, USER_REJECTED,
    WalletProvider,
};
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use contract::Ledger;

pub const DEV_CHAIN_ID: u64 = 31_337;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;
const SERVER_ERROR: i64 = -32000;
const TRANSFER_GAS: u64 = 21_000;
const CONTRACT_GAS: u64 = 90_000;

const SUPPORTED_METHODS: &[&str] = &[
    "eth_chainId",
    "eth_blockNumber",
    "eth_accounts",
    "eth_requestAccounts",
    "eth_getBalance",
    "eth_call",
    "eth_estimateGas",
    "eth_sendTransaction",
    "eth_getTransactionReceipt",
];

#[derive(Debug, Clone)]
pub struct DevChainConfig {
    pub contract_address: WalletAddress,
    pub owner: WalletAddress,
    /// `MINIMUM_USD()`, 18-decimal fixed point.
    pub minimum_usd: U256,
    /// Whole USD per ether used by the contract's conversion.
    pub eth_usd_price: u64,
    pub version: U256,
    /// Wallet accounts and their starting balances.
    pub accounts: Vec<(WalletAddress, U256)>,
    /// Receipts kept for `eth_getTransactionReceipt`; older ones are dropped.
    pub receipt_history: usize,
}

impl Default for DevChainConfig {
    fn default() -> Self {
        let funded = ether(10_000);
        let owner = WalletAddress::from("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
        Self {
            contract_address: WalletAddress::from("0xDc64a140Aa3E981100a9becA4E685f962f0cF6C9"),
            owner: owner.clone(),
            minimum_usd: ether(5),
            eth_usd_price: 2_000,
            version: U256::from(4u64),
            accounts: vec![
                (owner, funded),
                (WalletAddress::from("0x70997970C51812dc3A010C7d01b50e0d17dc79C8"), funded),
            ],
            receipt_history: 1_024,
        }
    }
}

#[derive(Debug, Clone)]
struct QueuedTx {
    hash: String,
    from: WalletAddress,
    to: WalletAddress,
    value: U256,
    data: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
struct StoredReceipt {
    success: bool,
    block_number: u64,
}

#[derive(Default)]
struct Controls {
    reject_connect: bool,
    reject_signing: bool,
    fail_reads: bool,
    mining_paused: bool,
}

struct ChainState {
    ledger: Ledger,
    wallet_accounts: Vec<WalletAddress>,
    authorized: Vec<WalletAddress>,
    controls: Controls,
    queued: Vec<QueuedTx>,
    receipts: HashMap<String, StoredReceipt>,
    receipt_order: VecDeque<String>,
    receipt_history: usize,
    block_number: u64,
    tx_count: u64,
    calls: HashMap<&'static str, usize>,
}

pub struct DevChain {
    state: Mutex<ChainState>,
    listeners: AccountsListeners,
}

impl Default for DevChain {
    fn default() -> Self {
        Self::new(DevChainConfig::default())
    }
}

impl DevChain {
    pub fn new(config: DevChainConfig) -> Self {
        let wallet_accounts = config.accounts.iter().map(|(address, _)| address.clone()).collect();
        Self {
            state: Mutex::new(ChainState {
                ledger: Ledger::new(&config),
                wallet_accounts,
                authorized: Vec::new(),
                controls: Controls::default(),
                queued: Vec::new(),
                receipts: HashMap::new(),
                receipt_order: VecDeque::new(),
                receipt_history: config.receipt_history.max(1),
                block_number: 0,
                tx_count: 0,
                calls: HashMap::new(),
            }),
            listeners: AccountsListeners::default(),
        }
    }

    fn state(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn contract_address(&self) -> WalletAddress {
        self.state().ledger.contract_address().clone()
    }

    pub fn owner(&self) -> WalletAddress {
        self.state().ledger.owner().clone()
    }

    pub fn wallet_accounts(&self) -> Vec<WalletAddress> {
        self.state().wallet_accounts.clone()
    }

    pub fn balance_of(&self, address: &WalletAddress) -> U256 {
        self.state().ledger.balance_of(address)
    }

    pub fn set_balance(&self, address: &WalletAddress, amount: U256) {
        self.state().ledger.set_balance(address, amount);
    }

    pub fn funders(&self) -> Vec<WalletAddress> {
        self.state().ledger.funders().to_vec()
    }

    /// Marks accounts as already authorized without emitting an event, the
    /// way a wallet remembers a site from an earlier visit.
    pub fn authorize(&self, accounts: Vec<WalletAddress>) {
        self.state().authorized = accounts;
    }

    /// Wallet-side account switch: authorizes `address` alone and emits
    /// `accountsChanged`.
    pub fn switch_account(&self, address: &WalletAddress) {
        let accounts = vec![address.clone()];
        {
            let mut state = self.state();
            if !state.wallet_accounts.iter().any(|known| known.matches(address)) {
                state.wallet_accounts.push(address.clone());
            }
            state.authorized = accounts.clone();
        }
        self.listeners.emit(&accounts);
    }

    /// Wallet-side revocation: no authorized accounts remain.
    pub fn revoke_all(&self) {
        self.state().authorized.clear();
        self.listeners.emit(&[]);
    }

    pub fn set_reject_connect(&self, reject: bool) {
        self.state().controls.reject_connect = reject;
    }

    pub fn set_reject_signing(&self, reject: bool) {
        self.state().controls.reject_signing = reject;
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.state().controls.fail_reads = fail;
    }

    /// Transactions sent while paused stay unmined (no receipt) until
    /// [`DevChain::resume_mining`].
    pub fn pause_mining(&self) {
        self.state().controls.mining_paused = true;
    }

    pub fn resume_mining(&self) {
        let mut state = self.state();
        state.controls.mining_paused = false;
        let queued = std::mem::take(&mut state.queued);
        for tx in queued {
            mine(&mut state, tx);
        }
    }

    /// How often a supported method has been requested. Unsupported
    /// methods are not counted.
    pub fn request_count(&self, method: &str) -> usize {
        self.state().calls.get(method).copied().unwrap_or(0)
    }

    fn handle(&self, method: &str, params: &Value) -> Result<Value, ProviderError> {
        let mut state = self.state();
        if let Some(known) = SUPPORTED_METHODS.iter().find(|known| **known == method) {
            *state.calls.entry(*known).or_insert(0) += 1;
        }
        debug!("devchain <- {method}");

        match method {
            "eth_chainId" => Ok(json!(format!("{DEV_CHAIN_ID:#x}"))),
            "eth_blockNumber" => Ok(json!(format!("{:#x}", state.block_number))),
            "eth_accounts" => Ok(accounts_json(&state.authorized)),
            "eth_requestAccounts" => {
                if state.controls.reject_connect {
                    return Err(ProviderError::rpc(USER_REJECTED, "User rejected the request."));
                }
                state.authorized = state.wallet_accounts.clone();
                Ok(accounts_json(&state.authorized))
            }
            "eth_getBalance" => {
                fail_if_reads_down(&state)?;
                let address = WalletAddress(string_param(params, 0)?);
                Ok(json!(to_quantity(state.ledger.balance_of(&address))))
            }
            "eth_call" => {
                fail_if_reads_down(&state)?;
                let call = CallParams::parse(params)?;
                let mut scratch = state.ledger.clone();
                scratch
                    .execute(&call.from, &call.to, call.value, &call.data)
                    .map(|output| json!(to_hex_data(&output)))
                    .map_err(revert_error)
            }
            "eth_estimateGas" => {
                let call = CallParams::parse(params)?;
                if state.ledger.balance_of(&call.from) < call.value {
                    return Err(insufficient_funds());
                }
                let mut scratch = state.ledger.clone();
                scratch
                    .execute(&call.from, &call.to, call.value, &call.data)
                    .map_err(revert_error)?;
                let gas = if call.to.matches(scratch.contract_address()) {
                    CONTRACT_GAS
                } else {
                    TRANSFER_GAS
                };
                Ok(json!(format!("{gas:#x}")))
            }
            "eth_sendTransaction" => {
                let call = CallParams::parse(params)?;
                if !state.authorized.iter().any(|account| account.matches(&call.from)) {
                    return Err(ProviderError::rpc(UNAUTHORIZED, format!("account {} is not authorized", call.from)));
                }
                if state.controls.reject_signing {
                    return Err(ProviderError::rpc(
                        USER_REJECTED,
                        "MetaMask Tx Signature: User denied transaction signature.",
                    ));
                }
                if state.ledger.balance_of(&call.from) < call.value {
                    return Err(insufficient_funds());
                }

                state.tx_count += 1;
                let seed = format!("devchain:{}:{}", state.tx_count, call.from.as_str().to_ascii_lowercase());
                let hash = to_hex_data(keccak256(seed.as_bytes()).as_slice());
                let tx = QueuedTx {
                    hash: hash.clone(),
                    from: call.from,
                    to: call.to,
                    value: call.value,
                    data: call.data,
                };
                if state.controls.mining_paused {
                    state.queued.push(tx);
                } else {
                    mine(&mut state, tx);
                }
                Ok(json!(hash))
            }
            "eth_getTransactionReceipt" => {
                let hash = string_param(params, 0)?;
                Ok(match state.receipts.get(&hash) {
                    Some(receipt) => json!({
                        "transactionHash": hash,
                        "status": if receipt.success { "0x1" } else { "0x0" },
                        "blockNumber": format!("{:#x}", receipt.block_number),
                    }),
                    None => Value::Null,
                })
            }
            other => Err(ProviderError::rpc(METHOD_NOT_FOUND, format!("method {other} not supported"))),
        }
    }
}

#[async_trait]
impl WalletProvider for DevChain {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        self.handle(method, &params)
    }

    fn subscribe_accounts(&self) -> AccountsSubscription {
        self.listeners.subscribe()
    }
}

fn mine(state: &mut ChainState, tx: QueuedTx) {
    state.block_number += 1;
    let mut next = state.ledger.clone();
    let success = next.execute(&tx.from, &tx.to, tx.value, &tx.data).is_ok();
    if success {
        state.ledger = next;
    }
    let block_number = state.block_number;
    state.receipt_order.push_back(tx.hash.clone());
    state.receipts.insert(tx.hash, StoredReceipt { success, block_number });
    while state.receipt_order.len() > state.receipt_history {
        if let Some(expired) = state.receipt_order.pop_front() {
            state.receipts.remove(&expired);
        }
    }
}

struct CallParams {
    from: WalletAddress,
    to: WalletAddress,
    value: U256,
    data: Vec<u8>,
}

impl CallParams {
    fn parse(params: &Value) -> Result<Self, ProviderError> {
        let object = params
            .get(0)
            .and_then(Value::as_object)
            .ok_or_else(|| invalid_params("expected a transaction object"))?;
        let field = |name: &str| object.get(name).and_then(Value::as_str);

        let to = field("to").ok_or_else(|| invalid_params("missing 'to'"))?;
        let value = match field("value") {
            Some(quantity) => parse_quantity(quantity).map_err(|err| invalid_params(&err.to_string()))?,
            None => U256::ZERO,
        };
        let data = match field("data").or_else(|| field("input")) {
            Some(hex) => from_hex_data(hex).map_err(|err| invalid_params(&err.to_string()))?,
            None => Vec::new(),
        };

        Ok(Self {
            from: WalletAddress(field("from").unwrap_or("0x0000000000000000000000000000000000000000").to_owned()),
            to: WalletAddress(to.to_owned()),
            value,
            data,
        })
    }
}

fn string_param(params: &Value, index: usize) -> Result<String, ProviderError> {
    params
        .get(index)
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| invalid_params(&format!("param {index} must be a string")))
}

fn accounts_json(accounts: &[WalletAddress]) -> Value {
    Value::Array(accounts.iter().map(|account| json!(account.as_str())).collect())
}

fn fail_if_reads_down(state: &ChainState) -> Result<(), ProviderError> {
    if state.controls.fail_reads {
        return Err(ProviderError::Transport("devchain: node unreachable".to_owned()));
    }
    Ok(())
}

fn revert_error(payload: Vec<u8>) -> ProviderError {
    ProviderError::Rpc {
        code: EXECUTION_REVERTED,
        message: "execution reverted".to_owned(),
        data: Some(json!(to_hex_data(&payload))),
    }
}

fn insufficient_funds() -> ProviderError {
    ProviderError::rpc(SERVER_ERROR, "insufficient funds for gas * price + value")
}

fn invalid_params(message: &str) -> ProviderError {
    ProviderError::rpc(INVALID_PARAMS, message)
}
