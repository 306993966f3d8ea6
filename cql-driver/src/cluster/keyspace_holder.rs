use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tokio::sync::watch::{self, Receiver, Sender};

/// Holds currently set global keyspace. Changes are broadcast to all connection pools, so every
/// connection uses the same keyspace.
#[derive(Debug)]
pub struct KeyspaceHolder {
    current_keyspace: ArcSwapOption<String>,
    keyspace_sender: Sender<Option<String>>,
}

impl Default for KeyspaceHolder {
    fn default() -> Self {
        let (keyspace_sender, _) = watch::channel(None);
        KeyspaceHolder {
            current_keyspace: Default::default(),
            keyspace_sender,
        }
    }
}

impl KeyspaceHolder {
    #[inline]
    pub fn current_keyspace(&self) -> Option<Arc<String>> {
        self.current_keyspace.load().clone()
    }

    pub fn update_current_keyspace(&self, keyspace: String) {
        let old_keyspace = self
            .current_keyspace
            .swap(Some(Arc::new(keyspace.clone())));

        match &old_keyspace {
            Some(old_keyspace) if **old_keyspace == keyspace => {}
            _ => {
                self.keyspace_sender.send_replace(Some(keyspace));
            }
        }
    }

    /// Subscribes to keyspace changes.
    #[inline]
    pub fn keyspace_receiver(&self) -> Receiver<Option<String>> {
        self.keyspace_sender.subscribe()
    }
}
