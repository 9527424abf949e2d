//! Fee payer selection.
//!
//! Prefers an account the manifest already involves, so paying the fee
//! doesn't add a signer. Falls back to any account in the profile. An
//! account qualifies when its fee-currency balance is strictly above the
//! configured reserve.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::gateway::BalanceSource;
use crate::manifest::{Amount, EntityAddress};

/// A profile account and its fee-currency balance. `balance` is `None` when
/// the lookup failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeePayerCandidate {
    pub account: EntityAddress,
    pub balance: Option<Amount>,
}

/// Outcome of a fee payer search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeePayerSearchResult {
    pub fee_payer: Option<EntityAddress>,
    /// Every profile account with its balance, in profile order, so the UI
    /// can offer a different payer.
    pub candidates: Vec<FeePayerCandidate>,
}

pub struct FeePayerSelector {
    balances: Arc<dyn BalanceSource>,
    fee_resource: EntityAddress,
    min_reserve: Amount,
}

impl FeePayerSelector {
    pub fn new(balances: Arc<dyn BalanceSource>, fee_resource: EntityAddress, min_reserve: Amount) -> Self {
        Self {
            balances,
            fee_resource,
            min_reserve,
        }
    }

    /// Searches `involved` (manifest order) first, then `profile_accounts`
    /// (profile order). Involved addresses the profile doesn't own are never
    /// picked.
    pub async fn select(
        &self,
        involved: &[EntityAddress],
        profile_accounts: &[EntityAddress],
    ) -> FeePayerSearchResult {
        let mut balances: HashMap<EntityAddress, Option<Amount>> = HashMap::new();

        let owned_involved = involved
            .iter()
            .filter(|address| profile_accounts.contains(address));
        let mut fee_payer = None;
        for account in owned_involved.chain(profile_accounts.iter()) {
            let balance = self.cached_balance(&mut balances, account).await;
            if balance.is_some_and(|b| b > self.min_reserve) {
                fee_payer = Some(account.clone());
                break;
            }
        }

        let mut candidates = Vec::with_capacity(profile_accounts.len());
        for account in profile_accounts {
            let balance = self.cached_balance(&mut balances, account).await;
            candidates.push(FeePayerCandidate {
                account: account.clone(),
                balance,
            });
        }

        debug!(
            fee_payer = fee_payer.as_ref().map(EntityAddress::as_str),
            candidates = candidates.len(),
            "fee payer search finished"
        );
        FeePayerSearchResult {
            fee_payer,
            candidates,
        }
    }

    async fn cached_balance(
        &self,
        cache: &mut HashMap<EntityAddress, Option<Amount>>,
        account: &EntityAddress,
    ) -> Option<Amount> {
        if let Some(balance) = cache.get(account) {
            return *balance;
        }
        let balance = match self.balances.balance_of(account, &self.fee_resource).await {
            Ok(amount) => Some(amount),
            Err(e) => {
                warn!(account = %account, error = %e, "balance lookup failed, skipping account");
                None
            }
        };
        cache.insert(account.clone(), balance);
        balance
    }
}
