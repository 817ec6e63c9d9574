//! Wallet-and-contract session controller for the FundMe contract.
//!
//! One [`SessionController`] owns the connection lifecycle, reacts to wallet
//! account events and serializes fund/withdraw transactions. UI layers
//! observe it through [`SessionSnapshot`].

mod config;
mod controller;
mod error;
mod view;

pub use config::SessionConfig;
pub use controller::SessionController;
pub use error::SessionError;
pub use fm_api_types::{ConnectionState, OperationKind, OperationStatus, PendingOperation};
pub use view::{ContractView, FunderRecord, SessionSnapshot};
