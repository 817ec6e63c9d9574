use fm_api_types::WalletAddress;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::mpsc;

type AccountsSender = mpsc::UnboundedSender<Vec<WalletAddress>>;

#[derive(Default)]
struct ListenerTable {
    next_id: u64,
    senders: HashMap<u64, AccountsSender>,
}

/// `accountsChanged` listener registry a provider embeds and emits through.
#[derive(Default, Clone)]
pub struct AccountsListeners {
    table: Arc<Mutex<ListenerTable>>,
}

impl AccountsListeners {
    pub fn subscribe(&self) -> AccountsSubscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        let id = table.next_id;
        table.next_id += 1;
        table.senders.insert(id, sender);

        AccountsSubscription {
            id,
            receiver,
            table: Arc::downgrade(&self.table),
        }
    }

    pub fn emit(&self, accounts: &[WalletAddress]) {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        table
            .senders
            .retain(|_, sender| sender.send(accounts.to_vec()).is_ok());
    }

    pub fn len(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .senders
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct AccountsSubscription {
    id: u64,
    receiver: mpsc::UnboundedReceiver<Vec<WalletAddress>>,
    table: Weak<Mutex<ListenerTable>>,
}

impl AccountsSubscription {
    /// Waits for the next account set. `None` once the provider is gone.
    pub async fn next(&mut self) -> Option<Vec<WalletAddress>> {
        self.receiver.recv().await
    }

    pub fn try_next(&mut self) -> Option<Vec<WalletAddress>> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for AccountsSubscription {
    fn drop(&mut self) {
        if let Some(table) = self.table.upgrade() {
            table
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .senders
                .remove(&self.id);
        }
    }
}
