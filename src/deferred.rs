//! # Deferred Selection Module
//!
//! Two-phase interaction: options are presented as inline buttons in one
//! event, and a later button press is routed back to the stored option.
//!
//! Callback data has the form `{namespace}:{key}`, which keeps it well below
//! Telegram's 64-byte limit and lets the callback router dispatch on prefix.

use std::time::Duration;

use tracing::{debug, warn};

use crate::selection::{
    GroupId, OwnerId, SelectionEntry, SelectionError, SelectionKey, SelectionStore,
};

/// Upper bound on options shown in a single presentation
pub const MAX_OPTIONS: usize = 10;

/// One option offered to the user
#[derive(Debug, Clone)]
pub struct SelectionOption<T> {
    pub label: String,
    pub payload: T,
}

impl<T> SelectionOption<T> {
    pub fn new(label: impl Into<String>, payload: T) -> Self {
        Self {
            label: label.into(),
            payload,
        }
    }
}

/// Button description handed to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedButton {
    pub label: String,
    pub callback_data: String,
}

/// Presents options and resolves their activation for one feature namespace
#[derive(Debug)]
pub struct DeferredSelection<T> {
    namespace: &'static str,
    store: SelectionStore<T>,
}

impl<T> DeferredSelection<T> {
    pub fn new(namespace: &'static str, ttl: Duration) -> Self {
        Self {
            namespace,
            store: SelectionStore::new(ttl),
        }
    }

    /// Whether `callback_data` was produced by this selection
    pub fn owns(&self, callback_data: &str) -> bool {
        self.parse_key(callback_data).is_some()
    }

    fn parse_key(&self, callback_data: &str) -> Option<SelectionKey> {
        callback_data
            .strip_prefix(self.namespace)
            .and_then(|rest| rest.strip_prefix(':'))
            .filter(|token| !token.is_empty())
            .map(SelectionKey::from_token)
    }

    /// Store every option for `owner` and return one keyed button per option
    ///
    /// All options of one call form a single group: resolving any of them
    /// consumes the others. Options beyond [`MAX_OPTIONS`] are dropped.
    pub fn present_options(
        &self,
        options: Vec<SelectionOption<T>>,
        owner: OwnerId,
    ) -> Vec<KeyedButton> {
        if options.len() > MAX_OPTIONS {
            warn!(
                namespace = self.namespace,
                offered = options.len(),
                "Truncating presented options"
            );
        }

        let group = GroupId::new();
        let buttons: Vec<KeyedButton> = options
            .into_iter()
            .take(MAX_OPTIONS)
            .map(|option| {
                let key = self.store.put_in_group(option.payload, owner, group);
                KeyedButton {
                    label: option.label,
                    callback_data: format!("{}:{}", self.namespace, key),
                }
            })
            .collect();

        debug!(
            namespace = self.namespace,
            owner,
            options = buttons.len(),
            "Presented selection options"
        );
        buttons
    }

    /// Resolve a button press by `user` back to its stored option
    ///
    /// Malformed or foreign callback data resolves as `NotFound`.
    pub fn on_selection_activated(
        &self,
        callback_data: &str,
        user: OwnerId,
    ) -> Result<SelectionEntry<T>, SelectionError> {
        let key = self.parse_key(callback_data).ok_or(SelectionError::NotFound)?;
        let outcome = self.store.resolve(&key, user);
        match &outcome {
            Ok(_) => debug!(namespace = self.namespace, key = %key, user, "Selection resolved"),
            Err(e) => debug!(
                namespace = self.namespace,
                key = %key,
                user,
                error = %e,
                "Selection rejected"
            ),
        }
        outcome
    }

    pub fn prune_expired(&self) -> usize {
        self.store.prune_expired()
    }

    pub fn pending(&self) -> usize {
        self.store.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection() -> DeferredSelection<usize> {
        DeferredSelection::new("mus", Duration::from_secs(600))
    }

    #[test]
    fn test_buttons_carry_namespace_and_distinct_keys() {
        let sel = selection();
        let options = (1..=5).map(|i| SelectionOption::new(format!("🎵 {i}"), i)).collect();
        let buttons = sel.present_options(options, 10);

        assert_eq!(buttons.len(), 5);
        for button in &buttons {
            assert!(button.callback_data.starts_with("mus:"));
            assert!(button.callback_data.len() <= 64);
            assert!(sel.owns(&button.callback_data));
        }
        let mut data: Vec<_> = buttons.iter().map(|b| b.callback_data.clone()).collect();
        data.sort();
        data.dedup();
        assert_eq!(data.len(), 5);
    }

    #[test]
    fn test_options_truncated_to_max() {
        let sel = selection();
        let options = (0..15).map(|i| SelectionOption::new(i.to_string(), i)).collect();
        assert_eq!(sel.present_options(options, 1).len(), MAX_OPTIONS);
        assert_eq!(sel.pending(), MAX_OPTIONS);
    }

    #[test]
    fn test_foreign_namespace_is_not_found() {
        let sel = selection();
        let buttons = sel.present_options(vec![SelectionOption::new("a", 1)], 1);
        let foreign = buttons[0].callback_data.replacen("mus", "tt", 1);

        assert!(!sel.owns(&foreign));
        assert!(!sel.owns("mus:"));
        assert_eq!(sel.on_selection_activated(&foreign, 1), Err(SelectionError::NotFound));
        assert_eq!(sel.on_selection_activated("garbage", 1), Err(SelectionError::NotFound));
        assert_eq!(sel.pending(), 1);
    }

    #[test]
    fn test_wrong_user_then_owner() {
        let sel = selection();
        let buttons = sel.present_options(
            vec![SelectionOption::new("video", 1), SelectionOption::new("audio", 2)],
            100,
        );

        assert_eq!(
            sel.on_selection_activated(&buttons[1].callback_data, 200),
            Err(SelectionError::Forbidden)
        );
        let entry = sel.on_selection_activated(&buttons[1].callback_data, 100).unwrap();
        assert_eq!(entry.payload, 2);
        assert_eq!(
            sel.on_selection_activated(&buttons[0].callback_data, 100),
            Err(SelectionError::NotFound)
        );
    }
}
