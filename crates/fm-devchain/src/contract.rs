use fm_abi::{
    IFundMe::{self, IFundMeCalls},
    Panic, Revert, SolError, SolInterface, SolValue, U256, parse_address, to_checksum_address,
};
use fm_api_types::WalletAddress;
use std::collections::HashMap;

use crate::DevChainConfig;

const PANIC_ARRAY_OUT_OF_BOUNDS: u64 = 0x32;
const BELOW_MINIMUM: &str = "You need to spend more ETH!";

/// Account balances plus the FundMe contract's storage.
///
/// Execution works on a clone and the caller commits it only on success, so
/// a reverted call never leaves partial writes behind.
#[derive(Debug, Clone)]
pub struct Ledger {
    contract_address: WalletAddress,
    owner: WalletAddress,
    minimum_usd: U256,
    eth_usd_price: U256,
    version: U256,
    balances: HashMap<String, U256>,
    funders: Vec<WalletAddress>,
    amount_funded: HashMap<String, U256>,
}

fn key(address: &WalletAddress) -> String {
    address.as_str().to_ascii_lowercase()
}

impl Ledger {
    pub(crate) fn new(config: &DevChainConfig) -> Self {
        let balances = config
            .accounts
            .iter()
            .map(|(address, balance)| (key(address), *balance))
            .collect();
        Self {
            contract_address: config.contract_address.clone(),
            owner: config.owner.clone(),
            minimum_usd: config.minimum_usd,
            eth_usd_price: U256::from(config.eth_usd_price),
            version: config.version,
            balances,
            funders: Vec::new(),
            amount_funded: HashMap::new(),
        }
    }

    pub fn contract_address(&self) -> &WalletAddress {
        &self.contract_address
    }

    pub fn owner(&self) -> &WalletAddress {
        &self.owner
    }

    pub fn funders(&self) -> &[WalletAddress] {
        &self.funders
    }

    pub fn balance_of(&self, address: &WalletAddress) -> U256 {
        self.balances.get(&key(address)).copied().unwrap_or_default()
    }

    pub fn set_balance(&mut self, address: &WalletAddress, amount: U256) {
        self.balances.insert(key(address), amount);
    }

    fn transfer(&mut self, from: &WalletAddress, to: &WalletAddress, amount: U256) -> Result<(), Vec<u8>> {
        if amount.is_zero() {
            return Ok(());
        }
        let remaining = self.balance_of(from).checked_sub(amount).ok_or_else(Vec::new)?;
        self.balances.insert(key(from), remaining);
        let credited = self.balance_of(to).saturating_add(amount);
        self.balances.insert(key(to), credited);
        Ok(())
    }

    /// Runs one call against this ledger. `Err` carries the revert payload.
    pub fn execute(&mut self, from: &WalletAddress, to: &WalletAddress, value: U256, data: &[u8]) -> Result<Vec<u8>, Vec<u8>> {
        self.transfer(from, to, value)?;
        if !to.matches(&self.contract_address) {
            return Ok(Vec::new());
        }

        let call = match IFundMeCalls::abi_decode(data) {
            Ok(call) => call,
            Err(_) if has_known_selector(data) => return Err(Vec::new()),
            // fallback() and receive() forward to fund()
            Err(_) => return self.fund(from, value),
        };

        match call {
            IFundMeCalls::fund(_) => self.fund(from, value),
            IFundMeCalls::withdraw(_) => self.withdraw(from),
            IFundMeCalls::MINIMUM_USD(_) => Ok(self.minimum_usd.abi_encode()),
            IFundMeCalls::getVersion(_) => Ok(self.version.abi_encode()),
            IFundMeCalls::getOwner(_) => encode_address(&self.owner),
            IFundMeCalls::getAddressToAmountFunded(call) => {
                let funder = to_checksum_address(&call.fundingAddress);
                let amount = self.amount_funded.get(&key(&funder)).copied().unwrap_or_default();
                Ok(amount.abi_encode())
            }
            IFundMeCalls::getFunders(call) => {
                match usize::try_from(call.index).ok().and_then(|index| self.funders.get(index)) {
                    Some(funder) => encode_address(funder),
                    None => Err(Panic {
                        code: U256::from(PANIC_ARRAY_OUT_OF_BOUNDS),
                    }
                    .abi_encode()),
                }
            }
        }
    }

    fn fund(&mut self, from: &WalletAddress, value: U256) -> Result<Vec<u8>, Vec<u8>> {
        let usd_value = value.saturating_mul(self.eth_usd_price);
        if usd_value < self.minimum_usd {
            return Err(Revert {
                reason: BELOW_MINIMUM.to_owned(),
            }
            .abi_encode());
        }
        let total = self.amount_funded.entry(key(from)).or_default();
        *total = total.saturating_add(value);
        self.funders.push(from.clone());
        Ok(Vec::new())
    }

    fn withdraw(&mut self, from: &WalletAddress) -> Result<Vec<u8>, Vec<u8>> {
        if !from.matches(&self.owner) {
            return Err(IFundMe::FundMe__NotOwner {}.abi_encode());
        }
        for funder in self.funders.drain(..) {
            self.amount_funded.insert(key(&funder), U256::ZERO);
        }
        let contract = self.contract_address.clone();
        let owner = self.owner.clone();
        let balance = self.balance_of(&contract);
        self.transfer(&contract, &owner, balance)?;
        Ok(Vec::new())
    }
}

fn has_known_selector(data: &[u8]) -> bool {
    match data.get(..4) {
        Some(&[a, b, c, d]) => IFundMeCalls::valid_selector([a, b, c, d]),
        _ => false,
    }
}

fn encode_address(address: &WalletAddress) -> Result<Vec<u8>, Vec<u8>> {
    parse_address(address)
        .map(|address| address.abi_encode())
        .map_err(|_| Vec::new())
}
