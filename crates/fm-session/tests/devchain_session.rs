use fm_abi::{RevertReason, U256, parse_ether};
use fm_api_types::{ConnectionState, OperationStatus, WalletAddress};
use fm_contract::FundMeGateway;
use fm_devchain::DevChain;
use fm_provider::WalletProvider;
use fm_session::{SessionConfig, SessionController, SessionError, SessionSnapshot};
use std::sync::Arc;
use std::time::Duration;

fn fast_config() -> SessionConfig {
    SessionConfig {
        poll_interval: Duration::from_millis(5),
        ..SessionConfig::default()
    }
}

fn session_over(chain: &Arc<DevChain>) -> Arc<SessionController> {
    let wallet: Arc<dyn WalletProvider> = chain.clone();
    let gateway = Arc::new(FundMeGateway::new(chain.contract_address(), wallet.clone()));
    Arc::new(SessionController::new(Some(wallet), gateway, fast_config()))
}

async fn wait_until(session: &SessionController, check: impl FnMut(&SessionSnapshot) -> bool) {
    let mut receiver = session.subscribe();
    tokio::time::timeout(Duration::from_secs(2), receiver.wait_for(check))
        .await
        .expect("snapshot condition not reached")
        .unwrap();
}

fn ether(text: &str) -> U256 {
    parse_ether(text).unwrap()
}

#[tokio::test]
async fn fund_and_withdraw_round_trip() {
    let chain = Arc::new(DevChain::default());
    let owner = chain.owner();
    let funder = chain.wallet_accounts()[1].clone();
    chain.authorize(vec![funder.clone()]);

    let session = session_over(&chain);
    session.initialize().await;
    assert_eq!(session.snapshot().account_address, Some(funder.clone()));
    assert!(!session.snapshot().is_owner);

    let operation = session.fund("0.25").await.unwrap();
    assert_eq!(operation.status, OperationStatus::Succeeded);
    assert_eq!(session.snapshot().contract_view.unwrap().contract_balance, ether("0.25"));
    assert_eq!(session.amount_funded_by(&funder).await.unwrap(), ether("0.25"));

    assert!(matches!(session.withdraw().await, Err(SessionError::NotOwner)));

    chain.switch_account(&owner);
    wait_until(&session, |snapshot| snapshot.is_owner).await;

    let before = chain.balance_of(&owner);
    session.withdraw().await.unwrap();
    assert_eq!(session.snapshot().contract_view.unwrap().contract_balance, U256::ZERO);
    assert_eq!(chain.balance_of(&owner), before + ether("0.25"));
    assert!(session.funders().await.unwrap().is_empty());
}

#[tokio::test]
async fn below_minimum_surfaces_as_revert() {
    let chain = Arc::new(DevChain::default());
    let session = session_over(&chain);
    session.connect().await.unwrap();
    session.set_fund_input("0.001");

    let err = session.fund("0.001").await.unwrap_err();
    assert!(matches!(err, SessionError::ExecutionReverted(RevertReason::Message(ref m)) if m == "You need to spend more ETH!"));
    assert_eq!(chain.request_count("eth_sendTransaction"), 0);

    let snapshot = session.snapshot();
    assert_eq!(snapshot.fund_input, "0.001");
    assert_eq!(snapshot.connection_state, ConnectionState::Connected);
}

#[tokio::test]
async fn wallet_balance_is_checked_before_submission() {
    let chain = Arc::new(DevChain::default());
    let account = chain.wallet_accounts()[0].clone();
    chain.set_balance(&account, ether("1.0"));
    let session = session_over(&chain);
    session.connect().await.unwrap();

    let err = session.fund("1.5").await.unwrap_err();
    assert_eq!(err.kind(), "insufficient_wallet_balance");
    assert_eq!(chain.request_count("eth_estimateGas"), 0);
    assert_eq!(chain.request_count("eth_sendTransaction"), 0);
}

#[tokio::test]
async fn declined_signature_is_transaction_rejected() {
    let chain = Arc::new(DevChain::default());
    chain.set_reject_signing(true);
    let session = session_over(&chain);
    session.connect().await.unwrap();

    let err = session.fund("1").await.unwrap_err();
    assert_eq!(err.kind(), "transaction_rejected");
    assert!(session.snapshot().is_connected());
}

#[tokio::test]
async fn declined_connect_stays_disconnected() {
    let chain = Arc::new(DevChain::default());
    chain.set_reject_connect(true);
    let session = session_over(&chain);

    let err = session.connect().await.unwrap_err();
    assert_eq!(err.kind(), "authorization_rejected");
    assert_eq!(session.snapshot().connection_state, ConnectionState::Disconnected);
}

#[tokio::test]
async fn account_events_wait_for_in_flight_transaction() {
    let chain = Arc::new(DevChain::default());
    let funder = chain.wallet_accounts()[1].clone();
    chain.authorize(vec![funder.clone()]);
    let session = session_over(&chain);
    session.initialize().await;

    chain.pause_mining();
    let pending = {
        let session = session.clone();
        tokio::spawn(async move { session.fund("1").await })
    };
    wait_until(&session, |snapshot| {
        snapshot
            .pending_operation
            .as_ref()
            .is_some_and(|operation| operation.tx_hash.is_some())
    })
    .await;

    chain.revoke_all();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(
        session.snapshot().account_address,
        Some(funder),
        "revocation is queued behind the transaction"
    );

    chain.resume_mining();
    pending.await.unwrap().unwrap();
    wait_until(&session, |snapshot| snapshot.connection_state == ConnectionState::Disconnected).await;
    assert_eq!(session.snapshot().contract_view.unwrap().contract_balance, ether("1"));
}

#[tokio::test]
async fn read_failures_keep_last_view() {
    let chain = Arc::new(DevChain::default());
    let session = session_over(&chain);
    session.connect().await.unwrap();
    let before = session.snapshot().contract_view.clone();
    assert!(before.is_some());

    chain.set_fail_reads(true);
    assert!(!session.refresh_contract_view().await);
    assert_eq!(session.snapshot().contract_view, before);
    assert!(matches!(session.contract_version().await, Err(SessionError::ReadFailure(_))));
}

#[tokio::test]
async fn repeat_funders_are_aggregated() {
    let chain = Arc::new(DevChain::default());
    let funder = chain.wallet_accounts()[1].clone();
    chain.authorize(vec![funder.clone()]);
    let session = session_over(&chain);
    session.initialize().await;

    session.fund("0.5").await.unwrap();
    session.fund("0.5").await.unwrap();

    let funders = session.funders().await.unwrap();
    assert_eq!(funders.len(), 1);
    assert!(funders[0].address.matches(&WalletAddress::from(funder.as_str())));
    assert_eq!(funders[0].amount_funded, ether("1"));
    assert_eq!(session.contract_version().await.unwrap(), U256::from(4u64));
}
