use crate::ids::{AccountId, AccountRef, Alias};
use crate::response::ResponseCode;
use crate::state::Account;

use super::kv::{KvSavepoint, WritableKvState};

pub const ACCOUNTS_KEY: &str = "ACCOUNTS";
pub const ALIASES_KEY: &str = "ALIASES";

#[derive(Debug, Clone)]
pub struct AccountStoreSavepoint {
    accounts: KvSavepoint<AccountId, Account>,
    aliases: KvSavepoint<Alias, AccountId>,
}

/// Writable account store with its alias index
#[derive(Debug, Clone)]
pub struct WritableAccountStore {
    accounts: WritableKvState<AccountId, Account>,
    aliases: WritableKvState<Alias, AccountId>,
}

impl Default for WritableAccountStore {
    fn default() -> Self {
        Self::new()
    }
}

impl WritableAccountStore {
    pub fn new() -> Self {
        Self {
            accounts: WritableKvState::new(ACCOUNTS_KEY),
            aliases: WritableKvState::new(ALIASES_KEY),
        }
    }

    pub fn with_accounts<I: IntoIterator<Item = Account>>(accounts: I) -> Self {
        let accounts: Vec<Account> = accounts.into_iter().collect();
        let aliases = accounts
            .iter()
            .filter_map(|a| a.alias.clone().map(|alias| (alias, a.account_id)))
            .collect::<Vec<_>>();
        Self {
            accounts: WritableKvState::with_committed(
                ACCOUNTS_KEY,
                accounts.into_iter().map(|a| (a.account_id, a)),
            ),
            aliases: WritableKvState::with_committed(ALIASES_KEY, aliases),
        }
    }

    pub fn get(&self, id: &AccountId) -> Option<&Account> {
        self.accounts.get(id)
    }

    pub fn get_original(&self, id: &AccountId) -> Option<&Account> {
        self.accounts.get_original(id)
    }

    pub fn get_at<'a>(&'a self, savepoint: &'a AccountStoreSavepoint, id: &AccountId) -> Option<&'a Account> {
        self.accounts.get_at(&savepoint.accounts, id)
    }

    /// Account that may take part in a transaction
    pub fn get_if_usable(&self, id: &AccountId) -> Result<&Account, ResponseCode> {
        let account = self.get(id).ok_or(ResponseCode::InvalidAccountId)?;
        if account.deleted {
            return Err(ResponseCode::AccountDeleted);
        }
        if account.expired_and_pending_removal {
            return Err(ResponseCode::AccountExpiredAndPendingRemoval);
        }
        Ok(account)
    }

    pub fn get_alias_id(&self, alias: &Alias) -> Option<AccountId> {
        self.aliases.get(alias).copied()
    }

    /// Id of an existing account referenced by id or alias
    pub fn resolve(&self, account: &AccountRef) -> Option<AccountId> {
        match account {
            AccountRef::Id(id) => self.accounts.contains(id).then_some(*id),
            AccountRef::Alias(alias) => self.get_alias_id(alias),
        }
    }

    pub fn get_by_ref(&self, account: &AccountRef) -> Option<&Account> {
        self.resolve(account).and_then(|id| self.get(&id))
    }

    pub fn put(&mut self, account: Account) {
        if let Some(alias) = &account.alias {
            if self.aliases.get(alias) != Some(&account.account_id) {
                self.aliases.put(alias.clone(), account.account_id);
            }
        }
        self.accounts.put(account.account_id, account);
    }

    pub fn remove_alias(&mut self, alias: &Alias) {
        self.aliases.remove(alias);
    }

    pub fn warm(&self, account: &AccountRef) {
        if let Some(id) = self.resolve(account) {
            self.accounts.warm(&id);
        }
    }

    pub fn size_of_state(&self) -> usize {
        self.accounts.size()
    }

    pub fn modified_account_ids(&self) -> Vec<AccountId> {
        self.accounts.modified_keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Account> {
        self.accounts.iter().map(|(_, account)| account)
    }

    pub fn savepoint(&self) -> AccountStoreSavepoint {
        AccountStoreSavepoint {
            accounts: self.accounts.savepoint(),
            aliases: self.aliases.savepoint(),
        }
    }

    pub fn rollback_to(&mut self, savepoint: AccountStoreSavepoint) {
        self.accounts.rollback_to(savepoint.accounts);
        self.aliases.rollback_to(savepoint.aliases);
    }

    pub fn discard(&mut self) {
        self.accounts.discard();
        self.aliases.discard();
    }

    pub fn commit(&mut self) {
        self.accounts.commit();
        self.aliases.commit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usability_codes() {
        let mut deleted = Account::new(AccountId::from_num(2));
        deleted.deleted = true;
        let mut expired = Account::new(AccountId::from_num(3));
        expired.expired_and_pending_removal = true;
        let store = WritableAccountStore::with_accounts(vec![deleted, expired]);

        assert_eq!(
            store.get_if_usable(&AccountId::from_num(1)).err(),
            Some(ResponseCode::InvalidAccountId)
        );
        assert_eq!(
            store.get_if_usable(&AccountId::from_num(2)).err(),
            Some(ResponseCode::AccountDeleted)
        );
        assert_eq!(
            store.get_if_usable(&AccountId::from_num(3)).err(),
            Some(ResponseCode::AccountExpiredAndPendingRemoval)
        );
    }

    #[test]
    fn test_alias_index_follows_puts() {
        let alias = Alias::new(vec![7; 32]);
        let mut store = WritableAccountStore::new();
        let mut account = Account::new(AccountId::from_num(1001));
        account.alias = Some(alias.clone());
        store.put(account);

        assert_eq!(store.get_alias_id(&alias), Some(AccountId::from_num(1001)));
        assert_eq!(
            store.resolve(&AccountRef::Alias(alias)),
            Some(AccountId::from_num(1001))
        );
        assert_eq!(store.resolve(&AccountRef::Id(AccountId::from_num(5))), None);
    }

    #[test]
    fn test_rollback_restores_aliases() {
        let mut store = WritableAccountStore::new();
        let savepoint = store.savepoint();
        let mut account = Account::new(AccountId::from_num(1001));
        account.alias = Some(Alias::new(vec![1; 20]));
        store.put(account);
        store.rollback_to(savepoint);

        assert_eq!(store.size_of_state(), 0);
        assert_eq!(store.get_alias_id(&Alias::new(vec![1; 20])), None);
    }
}
