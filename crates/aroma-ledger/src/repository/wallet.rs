//! # Wallet Repository
//!
//! Read access to the three wallet accounts (cash, bank, transfer).
//!
//! Balances move only through engine operations so that every change
//! leaves a movement row; the accounts themselves are bootstrapped at
//! startup and never inserted here.

use sqlx::SqlitePool;

use aroma_core::{Money, PaymentMethod, WalletAccount};

use crate::error::{LedgerError, LedgerResult};

const SELECT_ACCOUNT: &str = "SELECT method, balance_cents, updated_at FROM wallet_accounts";

/// Repository for wallet account lookups.
#[derive(Debug, Clone)]
pub struct WalletRepository {
    pool: SqlitePool,
}

impl WalletRepository {
    /// Creates a new WalletRepository.
    pub fn new(pool: SqlitePool) -> Self {
        WalletRepository { pool }
    }

    /// Gets the account of one payment method.
    pub async fn get(&self, method: PaymentMethod) -> LedgerResult<WalletAccount> {
        let account =
            sqlx::query_as::<_, WalletAccount>(&format!("{SELECT_ACCOUNT} WHERE method = ?1"))
                .bind(method)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| LedgerError::not_found("Wallet account", method.as_str()))?;

        Ok(account)
    }

    /// Gets all accounts, in cash/bank/transfer order.
    pub async fn all(&self) -> LedgerResult<Vec<WalletAccount>> {
        let mut accounts = sqlx::query_as::<_, WalletAccount>(SELECT_ACCOUNT)
            .fetch_all(&self.pool)
            .await?;

        accounts.sort_by_key(|account| {
            PaymentMethod::ALL.iter().position(|m| *m == account.method)
        });

        Ok(accounts)
    }

    /// Sums all balances.
    pub async fn total(&self) -> LedgerResult<Money> {
        let total: i64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(balance_cents), 0) FROM wallet_accounts")
                .fetch_one(&self.pool)
                .await?;

        Ok(Money::from_cents(total))
    }
}
