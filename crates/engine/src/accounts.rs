use crate::error::EngineError;
use configuration::AccountPolicy;
use core_types::Account;
use database::AccountStore;
use std::sync::Arc;

/// Resolves account ids to accounts under one book's policy.
///
/// Creation is insert-if-absent in the store, so a lookup racing another
/// process's creation never resets the account it created.
pub struct AccountManager {
    store: Arc<dyn AccountStore>,
    policy: AccountPolicy,
}

impl AccountManager {
    pub fn new(store: Arc<dyn AccountStore>, policy: AccountPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &AccountPolicy {
        &self.policy
    }

    /// Fetches the account, creating it with the policy's starting cash when
    /// the policy allows.
    pub async fn get_or_create(&self, account_id: &str) -> Result<Account, EngineError> {
        match self.store.get_account(account_id).await? {
            Some(account) => self.in_book(account),
            None if self.policy.auto_create && !account_id.trim().is_empty() => {
                match self.create(account_id).await? {
                    Created::Fresh(account) => Ok(account),
                    // Another process created it between our read and the insert.
                    Created::Existing(account) => self.in_book(account),
                }
            }
            None => Err(EngineError::AccountNotFound(account_id.to_string())),
        }
    }

    /// Provisions an account explicitly, whatever the auto-create setting.
    pub async fn open(&self, account_id: &str) -> Result<Account, EngineError> {
        if account_id.trim().is_empty() {
            return Err(EngineError::Validation("account id must not be empty".to_string()));
        }
        match self.create(account_id).await? {
            Created::Fresh(account) => Ok(account),
            Created::Existing(_) => Err(EngineError::Validation(format!(
                "account '{}' already exists",
                account_id
            ))),
        }
    }

    fn in_book(&self, account: Account) -> Result<Account, EngineError> {
        if account.kind == self.policy.kind {
            return Ok(account);
        }
        tracing::warn!(
            account_id = %account.account_id,
            stored = %account.kind,
            expected = %self.policy.kind,
            "Account belongs to another book."
        );
        Err(EngineError::AccountNotFound(account.account_id))
    }

    async fn create(&self, account_id: &str) -> Result<Created, EngineError> {
        let account = Account::new(account_id, self.policy.kind, self.policy.starting_cash);
        if !self.store.insert_account(&account).await? {
            let stored = self.store.get_account(account_id).await?.ok_or_else(|| {
                EngineError::Persistence(database::DbError::Conflict(format!(
                    "account {} vanished while being created",
                    account_id
                )))
            })?;
            tracing::debug!(account_id, "Account already existed; using the stored one.");
            return Ok(Created::Existing(stored));
        }
        tracing::info!(
            account_id,
            kind = %account.kind,
            starting_cash = %account.starting_cash,
            "Created account."
        );
        Ok(Created::Fresh(account))
    }
}

enum Created {
    Fresh(Account),
    Existing(Account),
}
