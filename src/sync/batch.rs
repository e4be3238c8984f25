//! Accumulates the pages of a sync run into one delta.

use std::collections::{BTreeMap, BTreeSet};

use crate::{account::SyncedAccount, sync::SyncPage, transaction::SyncedTransaction};

/// The changes of every page fetched in one sync run.
///
/// Pages are folded in order, so each external ID is in at most one of the
/// upsert lists or the removed set, whichever the newest page put it in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncBatch {
    added: BTreeMap<String, SyncedTransaction>,
    modified: BTreeMap<String, SyncedTransaction>,
    removed: BTreeSet<String>,
    accounts: BTreeMap<String, SyncedAccount>,
}

impl SyncBatch {
    /// Fold the next page into the batch.
    pub fn push_page(&mut self, page: SyncPage) {
        for account in page.accounts {
            self.accounts.insert(account.external_id.clone(), account);
        }

        for transaction in page.added {
            self.removed.remove(&transaction.external_id);
            self.modified.remove(&transaction.external_id);
            self.added
                .insert(transaction.external_id.clone(), transaction);
        }

        for transaction in page.modified {
            self.removed.remove(&transaction.external_id);

            // Still new to the store, just with newer data.
            if let Some(added) = self.added.get_mut(&transaction.external_id) {
                *added = transaction;
            } else {
                self.modified
                    .insert(transaction.external_id.clone(), transaction);
            }
        }

        for external_id in page.removed {
            self.added.remove(&external_id);
            self.modified.remove(&external_id);
            self.removed.insert(external_id);
        }
    }

    /// Transactions that are new to the store.
    pub fn added(&self) -> impl Iterator<Item = &SyncedTransaction> {
        self.added.values()
    }

    /// Transactions that changed since the starting cursor.
    pub fn modified(&self) -> impl Iterator<Item = &SyncedTransaction> {
        self.modified.values()
    }

    /// Every transaction to insert or update, added first.
    pub fn upserts(&self) -> impl Iterator<Item = &SyncedTransaction> {
        self.added().chain(self.modified())
    }

    /// The external IDs of transactions to delete.
    pub fn removed(&self) -> Vec<String> {
        self.removed.iter().cloned().collect()
    }

    /// The accounts reported by the pages, latest data per account.
    pub fn accounts(&self) -> impl Iterator<Item = &SyncedAccount> {
        self.accounts.values()
    }

    /// The number of added, modified and removed transactions.
    pub fn counts(&self) -> (usize, usize, usize) {
        (self.added.len(), self.modified.len(), self.removed.len())
    }

    /// Whether the batch has no transaction changes.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }
}

#[cfg(test)]
mod push_page_tests {
    use std::collections::HashSet;

    use time::macros::date;

    use crate::{
        account::SyncedAccount,
        sync::{SyncPage, batch::SyncBatch},
        transaction::SyncedTransaction,
    };

    fn transaction(external_id: &str, amount: f64) -> SyncedTransaction {
        SyncedTransaction::new(external_id, "acc-1", "Shop", amount, date!(2025 - 10 - 01))
    }

    fn page(
        added: Vec<SyncedTransaction>,
        modified: Vec<SyncedTransaction>,
        removed: Vec<&str>,
    ) -> SyncPage {
        SyncPage {
            added,
            modified,
            removed: removed.into_iter().map(str::to_owned).collect(),
            accounts: vec![],
            next_cursor: "cursor".to_owned(),
            has_more: false,
        }
    }

    fn ids<'a>(transactions: impl Iterator<Item = &'a SyncedTransaction>) -> Vec<String> {
        transactions.map(|t| t.external_id.clone()).collect()
    }

    #[test]
    fn accumulates_every_page() {
        let mut batch = SyncBatch::default();

        batch.push_page(page(vec![transaction("a", 1.0)], vec![], vec!["x"]));
        batch.push_page(page(vec![transaction("b", 2.0)], vec![transaction("c", 3.0)], vec!["y"]));

        assert_eq!(ids(batch.added()), vec!["a", "b"]);
        assert_eq!(ids(batch.modified()), vec!["c"]);
        assert_eq!(batch.removed(), vec!["x", "y"]);
        assert_eq!(batch.counts(), (2, 1, 2));
    }

    #[test]
    fn later_removal_cancels_earlier_upsert() {
        let mut batch = SyncBatch::default();

        batch.push_page(page(vec![transaction("a", 1.0)], vec![transaction("b", 2.0)], vec![]));
        batch.push_page(page(vec![], vec![], vec!["a", "b"]));

        assert_eq!(batch.upserts().count(), 0);
        assert_eq!(batch.removed(), vec!["a", "b"]);
    }

    #[test]
    fn later_upsert_cancels_earlier_removal() {
        let mut batch = SyncBatch::default();

        batch.push_page(page(vec![], vec![], vec!["a"]));
        batch.push_page(page(vec![], vec![transaction("a", 5.0)], vec![]));

        assert!(batch.removed().is_empty());
        assert_eq!(ids(batch.modified()), vec!["a"]);
    }

    #[test]
    fn modify_after_add_stays_added_with_new_data() {
        let mut batch = SyncBatch::default();

        batch.push_page(page(vec![transaction("a", 1.0)], vec![], vec![]));
        batch.push_page(page(vec![], vec![transaction("a", 9.0)], vec![]));

        let added: Vec<_> = batch.added().collect();
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].amount, 9.0);
        assert_eq!(batch.modified().count(), 0);
    }

    #[test]
    fn upserts_and_removed_are_disjoint() {
        let mut batch = SyncBatch::default();

        batch.push_page(page(
            vec![transaction("a", 1.0), transaction("b", 1.0)],
            vec![transaction("c", 1.0)],
            vec!["d"],
        ));
        batch.push_page(page(vec![transaction("d", 1.0)], vec![], vec!["a", "c"]));
        batch.push_page(page(vec![], vec![transaction("a", 2.0)], vec!["b"]));

        let upserts: HashSet<String> = ids(batch.upserts()).into_iter().collect();
        let removed: HashSet<String> = batch.removed().into_iter().collect();
        assert!(
            upserts.is_disjoint(&removed),
            "want disjoint sets, got upserts {upserts:?} and removed {removed:?}"
        );
        assert_eq!(upserts, HashSet::from(["a".to_owned(), "d".to_owned()]));
        assert_eq!(removed, HashSet::from(["b".to_owned(), "c".to_owned()]));
    }

    #[test]
    fn latest_account_data_wins() {
        let mut batch = SyncBatch::default();
        let account = |balance| SyncedAccount {
            external_id: "acc-1".to_owned(),
            name: "Checking".to_owned(),
            balance: Some(balance),
            currency: Some("USD".to_owned()),
        };
        let mut first = page(vec![], vec![], vec![]);
        first.accounts = vec![account(10.0)];
        let mut second = page(vec![], vec![], vec![]);
        second.accounts = vec![account(20.0)];

        batch.push_page(first);
        batch.push_page(second);

        let accounts: Vec<_> = batch.accounts().collect();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].balance, Some(20.0));
    }

    #[test]
    fn new_batch_is_empty() {
        assert!(SyncBatch::default().is_empty());
    }
}
