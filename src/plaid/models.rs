//! Request and response bodies of `/transactions/sync`.

use serde::{Deserialize, Serialize};
use time::Date;

use crate::{account::SyncedAccount, sync::SyncPage, transaction::SyncedTransaction};

#[derive(Debug, Serialize)]
pub(super) struct SyncRequestBody<'a> {
    pub client_id: &'a str,
    pub secret: &'a str,
    pub access_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<&'a str>,
    pub count: u32,
}

#[derive(Debug, Deserialize)]
pub(super) struct SyncResponseBody {
    pub added: Vec<PlaidTransaction>,
    pub modified: Vec<PlaidTransaction>,
    pub removed: Vec<RemovedTransaction>,
    #[serde(default)]
    pub accounts: Vec<PlaidAccount>,
    pub next_cursor: String,
    pub has_more: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct PlaidTransaction {
    pub transaction_id: String,
    pub account_id: String,
    pub amount: f64,
    pub iso_currency_code: Option<String>,
    pub unofficial_currency_code: Option<String>,
    pub name: Option<String>,
    pub merchant_name: Option<String>,
    pub payment_channel: String,
    pub date: Date,
    pub authorized_date: Option<Date>,
    pub pending: bool,
    pub personal_finance_category: Option<PersonalFinanceCategory>,
}

#[derive(Debug, Deserialize)]
pub(super) struct PersonalFinanceCategory {
    pub primary: String,
    pub detailed: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct RemovedTransaction {
    pub transaction_id: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct PlaidAccount {
    pub account_id: String,
    pub name: String,
    pub balances: PlaidBalances,
}

#[derive(Debug, Deserialize)]
pub(super) struct PlaidBalances {
    pub current: Option<f64>,
    pub iso_currency_code: Option<String>,
    pub unofficial_currency_code: Option<String>,
}

/// The body Plaid sends with non-2xx responses.
#[derive(Debug, Deserialize)]
pub(super) struct ErrorResponseBody {
    pub error_type: String,
    pub error_code: String,
    #[serde(default)]
    pub error_message: String,
}

impl From<PlaidTransaction> for SyncedTransaction {
    fn from(transaction: PlaidTransaction) -> Self {
        let (category, subcategory) = match transaction.personal_finance_category {
            Some(category) => (Some(category.primary), Some(category.detailed)),
            None => (None, None),
        };

        Self {
            external_id: transaction.transaction_id,
            account_external_id: transaction.account_id,
            name: transaction
                .name
                .or(transaction.merchant_name)
                .unwrap_or_default(),
            amount: transaction.amount,
            currency: transaction
                .iso_currency_code
                .or(transaction.unofficial_currency_code),
            payment_channel: transaction.payment_channel,
            category,
            subcategory,
            date: transaction.date,
            authorized_date: transaction.authorized_date,
            pending: transaction.pending,
        }
    }
}

impl From<PlaidAccount> for SyncedAccount {
    fn from(account: PlaidAccount) -> Self {
        Self {
            external_id: account.account_id,
            name: account.name,
            balance: account.balances.current,
            currency: account
                .balances
                .iso_currency_code
                .or(account.balances.unofficial_currency_code),
        }
    }
}

impl From<SyncResponseBody> for SyncPage {
    fn from(body: SyncResponseBody) -> Self {
        Self {
            added: body.added.into_iter().map(SyncedTransaction::from).collect(),
            modified: body
                .modified
                .into_iter()
                .map(SyncedTransaction::from)
                .collect(),
            removed: body
                .removed
                .into_iter()
                .map(|removed| removed.transaction_id)
                .collect(),
            accounts: body.accounts.into_iter().map(SyncedAccount::from).collect(),
            next_cursor: body.next_cursor,
            has_more: body.has_more,
        }
    }
}

#[cfg(test)]
mod sync_response_tests {
    use time::macros::date;

    use crate::{
        plaid::models::{SyncRequestBody, SyncResponseBody},
        sync::SyncPage,
    };

    const RESPONSE: &str = r#"{
      "accounts": [
        {
          "account_id": "BxBXxLj1m4HMXBm9WZZmCWVbPjX16EHwv99vp",
          "balances": {
            "available": 110.94,
            "current": 110.94,
            "iso_currency_code": "USD",
            "limit": null,
            "unofficial_currency_code": null
          },
          "mask": "0000",
          "name": "Plaid Checking",
          "official_name": "Plaid Gold Standard 0% Interest Checking",
          "subtype": "checking",
          "type": "depository"
        }
      ],
      "added": [
        {
          "account_id": "BxBXxLj1m4HMXBm9WZZmCWVbPjX16EHwv99vp",
          "amount": 72.1,
          "iso_currency_code": "USD",
          "unofficial_currency_code": null,
          "authorized_date": "2023-09-24",
          "date": "2023-09-28",
          "merchant_name": "Walmart",
          "name": "PURCHASE WM SUPERCENTER #1700",
          "payment_channel": "in store",
          "pending": false,
          "personal_finance_category": {
            "primary": "GENERAL_MERCHANDISE",
            "detailed": "GENERAL_MERCHANDISE_SUPERSTORES",
            "confidence_level": "VERY_HIGH"
          },
          "transaction_id": "lPNjeW1nR6CDn5okmGQ6hEpMo4lLNoSrzqDje"
        }
      ],
      "modified": [
        {
          "account_id": "BxBXxLj1m4HMXBm9WZZmCWVbPjX16EHwv99vp",
          "amount": 28.34,
          "iso_currency_code": null,
          "unofficial_currency_code": "CAT",
          "authorized_date": null,
          "date": "2023-09-28",
          "merchant_name": "DoorDash",
          "name": null,
          "payment_channel": "online",
          "pending": true,
          "personal_finance_category": null,
          "transaction_id": "yhnUVvtcGGcCKU0bcz8PDQr5ZUxUXebUvbKC0"
        }
      ],
      "removed": [
        {
          "account_id": "BxBXxLj1m4HMXBm9WZZmCWVbPjX16EHwv99vp",
          "transaction_id": "CmdQTNgems8BT1B7ibkoUXVPyAeehT3Tmzk0l"
        }
      ],
      "next_cursor": "tVUUL15lYQN5rBnfDIc1I8xudpGdIlw9nsgeXWvhOfkECvUeR663i3Dt1uf/94S8ASkitgLcIiOSqNwzzp+bh89kirazha5vuZHBb2ZA5NtCDkkV",
      "has_more": false,
      "request_id": "45QSn",
      "transactions_update_status": "HISTORICAL_UPDATE_COMPLETE"
    }"#;

    fn parse_page() -> SyncPage {
        let body: SyncResponseBody =
            serde_json::from_str(RESPONSE).expect("Could not parse response");
        SyncPage::from(body)
    }

    #[test]
    fn maps_added_transaction() {
        let page = parse_page();

        let got = &page.added[0];
        assert_eq!(got.external_id, "lPNjeW1nR6CDn5okmGQ6hEpMo4lLNoSrzqDje");
        assert_eq!(got.account_external_id, "BxBXxLj1m4HMXBm9WZZmCWVbPjX16EHwv99vp");
        assert_eq!(got.name, "PURCHASE WM SUPERCENTER #1700");
        assert_eq!(got.amount, 72.1);
        assert_eq!(got.currency.as_deref(), Some("USD"));
        assert_eq!(got.payment_channel, "in store");
        assert_eq!(got.category.as_deref(), Some("GENERAL_MERCHANDISE"));
        assert_eq!(
            got.subcategory.as_deref(),
            Some("GENERAL_MERCHANDISE_SUPERSTORES")
        );
        assert_eq!(got.date, date!(2023 - 09 - 28));
        assert_eq!(got.authorized_date, Some(date!(2023 - 09 - 24)));
        assert!(!got.pending);
    }

    #[test]
    fn falls_back_to_unofficial_currency_and_merchant_name() {
        let page = parse_page();

        let got = &page.modified[0];
        assert_eq!(got.currency.as_deref(), Some("CAT"));
        assert_eq!(got.name, "DoorDash");
        assert_eq!(got.category, None);
        assert_eq!(got.subcategory, None);
        assert!(got.pending);
    }

    #[test]
    fn maps_removed_accounts_and_cursor() {
        let page = parse_page();

        assert_eq!(page.removed, vec!["CmdQTNgems8BT1B7ibkoUXVPyAeehT3Tmzk0l"]);
        assert_eq!(page.accounts.len(), 1);
        assert_eq!(page.accounts[0].balance, Some(110.94));
        assert_eq!(page.accounts[0].currency.as_deref(), Some("USD"));
        assert!(page.next_cursor.starts_with("tVUUL15lYQN5rBnf"));
        assert!(!page.has_more);
    }

    #[test]
    fn first_request_omits_cursor() {
        let body = SyncRequestBody {
            client_id: "client",
            secret: "secret",
            access_token: "access-sandbox-1",
            cursor: None,
            count: 100,
        };

        let json = serde_json::to_value(&body).expect("Could not serialize request");

        assert_eq!(json.get("cursor"), None);
        assert_eq!(json["count"], 100);
    }
}
