//! Card-transaction reconciliation.
//!
//! Links charges from the company card feed to expenses. Matching a charge only
//! records the link on the charge; moving an `unmatched` expense forward is the
//! state machine's job (see [`crate::Ledger::match_card`]).

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::ReconciliationError;
use crate::models::card::{CardTransaction, CardTransactionStatus};
use crate::models::expense::{
    ExpenseCategory, ExpenseDraft, ExpenseRecord, ExpenseStatus, ExpenseType,
};

/// How to treat an existing link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Refuse to replace an existing link.
    #[default]
    Strict,
    /// Replace an existing link on either side.
    Rematch,
}

/// Whether an expense may receive a card charge in its current state.
pub fn is_matchable(status: ExpenseStatus) -> bool {
    matches!(
        status,
        ExpenseStatus::Draft | ExpenseStatus::Submitted | ExpenseStatus::Unmatched
    )
}

/// Link `transaction` to `expense`, returning the updated transaction.
///
/// Matching a transaction to the expense it already points at is a no-op.
pub fn match_transaction(
    transaction: &CardTransaction,
    expense: &ExpenseRecord,
    mode: MatchMode,
) -> Result<CardTransaction, ReconciliationError> {
    if transaction.status() == CardTransactionStatus::Ignored {
        return Err(ReconciliationError::TransactionIgnored(transaction.id.clone()));
    }
    if !is_matchable(expense.status()) {
        return Err(ReconciliationError::IneligibleExpense {
            expense_id: expense.id().clone(),
            status: expense.status(),
        });
    }
    if &transaction.owner_id != expense.owner_id() {
        return Err(ReconciliationError::OwnerMismatch {
            transaction_id: transaction.id.clone(),
            expense_id: expense.id().clone(),
        });
    }

    if let Some(current) = transaction.matched_expense_id() {
        if current == expense.id() {
            return Ok(transaction.clone());
        }
        if mode == MatchMode::Strict {
            return Err(ReconciliationError::Conflict {
                transaction_id: transaction.id.clone(),
                expense_id: current.clone(),
            });
        }
    }

    if let Some(linked) = expense.card_transaction_id() {
        if linked != &transaction.id && mode == MatchMode::Strict {
            return Err(ReconciliationError::Conflict {
                transaction_id: linked.clone(),
                expense_id: expense.id().clone(),
            });
        }
    }

    let mut matched = transaction.clone();
    matched.status = CardTransactionStatus::Matched;
    matched.matched_expense_id = Some(expense.id().clone());

    info!("card transaction {} matched to expense {}", matched.id, expense.id());
    Ok(matched)
}

/// Mark a transaction as ignored. There is no way back.
pub fn ignore_transaction(transaction: &CardTransaction) -> Result<CardTransaction, ReconciliationError> {
    match transaction.status() {
        CardTransactionStatus::Ignored => Ok(transaction.clone()),
        CardTransactionStatus::Matched => Err(ReconciliationError::Conflict {
            transaction_id: transaction.id.clone(),
            expense_id: transaction
                .matched_expense_id()
                .cloned()
                .unwrap_or_else(|| "unknown".into()),
        }),
        CardTransactionStatus::Unmatched => {
            let mut ignored = transaction.clone();
            ignored.status = CardTransactionStatus::Ignored;
            info!("card transaction {} ignored", ignored.id);
            Ok(ignored)
        }
    }
}

/// Drop a transaction's link so it can be matched again.
pub(crate) fn release_transaction(transaction: &CardTransaction) -> CardTransaction {
    let mut released = transaction.clone();
    if released.status == CardTransactionStatus::Matched {
        released.status = CardTransactionStatus::Unmatched;
        released.matched_expense_id = None;
    }
    released
}

/// Create a draft company-card expense from a charge.
///
/// Returns the new record, already linked to the charge, and the matched charge.
/// The record still has to go through submit and approval.
pub fn create_expense_from_transaction(
    transaction: &CardTransaction,
    now: DateTime<Utc>,
) -> Result<(ExpenseRecord, CardTransaction), ReconciliationError> {
    match transaction.status() {
        CardTransactionStatus::Ignored => {
            return Err(ReconciliationError::TransactionIgnored(transaction.id.clone()));
        }
        CardTransactionStatus::Matched => {
            if let Some(existing) = transaction.matched_expense_id() {
                return Err(ReconciliationError::Conflict {
                    transaction_id: transaction.id.clone(),
                    expense_id: existing.clone(),
                });
            }
        }
        CardTransactionStatus::Unmatched => {}
    }

    let draft = ExpenseDraft {
        id: None,
        amount: transaction.amount.clone(),
        merchant_name: transaction.merchant.clone(),
        expense_date: transaction.posted_date,
        category: ExpenseCategory::default(),
        expense_type: ExpenseType::CompanyCard,
        notes: None,
        receipt_attachments: Vec::new(),
        awaiting_card_match: false,
    };
    let mut record = ExpenseRecord::create(draft, transaction.owner_id.clone(), now);
    record.card_transaction_id = Some(transaction.id.clone());

    let matched = match_transaction(transaction, &record, MatchMode::Strict)?;
    Ok((record, matched))
}

/// Expenses `transaction` could be matched to, best candidates first.
///
/// Candidates belong to the same owner, are in a matchable state, and are not
/// linked to another charge. Exact amount matches come first, then the closest
/// expense date to the posted date.
pub fn match_candidates<'a, I>(transaction: &CardTransaction, expenses: I) -> Vec<&'a ExpenseRecord>
where
    I: IntoIterator<Item = &'a ExpenseRecord>,
{
    let mut candidates: Vec<&ExpenseRecord> = expenses
        .into_iter()
        .filter(|e| is_matchable(e.status()))
        .filter(|e| e.owner_id() == &transaction.owner_id)
        .filter(|e| {
            e.card_transaction_id()
                .map_or(true, |linked| linked == &transaction.id)
        })
        .collect();

    candidates.sort_by_key(|e| {
        let amount_differs = e.amount.amount != transaction.amount.amount;
        let day_distance = (e.expense_date - transaction.posted_date).num_days().abs();
        (amount_differs, day_distance)
    });
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use rust_decimal::Decimal;

    use crate::models::expense::{Money, UserId};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 2, 8, 0, 0).unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn charge(id: &str, cents: i64) -> CardTransaction {
        CardTransaction::new(id, UserId::from("alice"), "UBER *TRIP", Money::usd(Decimal::new(cents, 2)), day(1))
            .with_card_last4("4242")
    }

    fn expense(id: &str, cents: i64, date: NaiveDate) -> ExpenseRecord {
        let draft = ExpenseDraft::manual("USD", date)
            .with_id(id)
            .with_merchant("Uber")
            .with_amount(Decimal::new(cents, 2));
        ExpenseRecord::create(draft, UserId::from("alice"), now())
    }

    #[test]
    fn test_match_sets_link() {
        let tx = charge("tx1", 2450);
        let matched = match_transaction(&tx, &expense("e1", 2450, day(1)), MatchMode::Strict).unwrap();
        assert_eq!(matched.status(), CardTransactionStatus::Matched);
        assert_eq!(matched.matched_expense_id().map(|id| id.0.as_str()), Some("e1"));
    }

    #[test]
    fn test_second_match_to_other_expense_conflicts() {
        let tx = charge("tx1", 2450);
        let first = match_transaction(&tx, &expense("e1", 2450, day(1)), MatchMode::Strict).unwrap();

        let err = match_transaction(&first, &expense("e2", 2450, day(1)), MatchMode::Strict).unwrap_err();
        assert!(matches!(err, ReconciliationError::Conflict { .. }));

        let again = match_transaction(&first, &expense("e1", 2450, day(1)), MatchMode::Strict).unwrap();
        assert_eq!(again, first);

        let moved = match_transaction(&first, &expense("e2", 2450, day(1)), MatchMode::Rematch).unwrap();
        assert_eq!(moved.matched_expense_id().map(|id| id.0.as_str()), Some("e2"));
    }

    #[test]
    fn test_expense_linked_elsewhere_conflicts() {
        let mut linked = expense("e1", 2450, day(1));
        linked.card_transaction_id = Some("tx-other".into());

        let err = match_transaction(&charge("tx1", 2450), &linked, MatchMode::Strict).unwrap_err();
        assert!(matches!(err, ReconciliationError::Conflict { .. }));
    }

    #[test]
    fn test_ignored_transactions_stay_ignored() {
        let ignored = ignore_transaction(&charge("tx1", 999)).unwrap();
        assert_eq!(ignored.status(), CardTransactionStatus::Ignored);

        let err = match_transaction(&ignored, &expense("e1", 999, day(1)), MatchMode::Rematch).unwrap_err();
        assert_eq!(err, ReconciliationError::TransactionIgnored("tx1".into()));
    }

    #[test]
    fn test_cannot_ignore_matched() {
        let tx = charge("tx1", 999);
        let matched = match_transaction(&tx, &expense("e1", 999, day(1)), MatchMode::Strict).unwrap();
        assert!(ignore_transaction(&matched).is_err());
    }

    #[test]
    fn test_ineligible_and_foreign_expenses() {
        let tx = charge("tx1", 999);
        let mut approved = expense("e1", 999, day(1));
        approved.status = ExpenseStatus::Approved;
        assert!(matches!(
            match_transaction(&tx, &approved, MatchMode::Strict),
            Err(ReconciliationError::IneligibleExpense { .. })
        ));

        let draft = ExpenseDraft::manual("USD", day(1)).with_amount(Decimal::new(999, 2));
        let foreign = ExpenseRecord::create(draft, UserId::from("bob"), now());
        assert!(matches!(
            match_transaction(&tx, &foreign, MatchMode::Strict),
            Err(ReconciliationError::OwnerMismatch { .. })
        ));
    }

    #[test]
    fn test_create_expense_from_transaction() {
        let tx = charge("tx7", 3100);
        let (record, matched) = create_expense_from_transaction(&tx, now()).unwrap();

        assert_eq!(record.status(), ExpenseStatus::Draft);
        assert_eq!(record.expense_type(), ExpenseType::CompanyCard);
        assert_eq!(record.merchant_name, "UBER *TRIP");
        assert_eq!(record.amount, tx.amount);
        assert_eq!(record.expense_date, day(1));
        assert_eq!(record.card_transaction_id(), Some(&tx.id));
        assert_eq!(matched.matched_expense_id(), Some(record.id()));

        assert!(create_expense_from_transaction(&matched, now()).is_err());
    }

    #[test]
    fn test_release_transaction() {
        let tx = charge("tx1", 999);
        let matched = match_transaction(&tx, &expense("e1", 999, day(1)), MatchMode::Strict).unwrap();
        let released = release_transaction(&matched);
        assert_eq!(released.status(), CardTransactionStatus::Unmatched);
        assert!(released.matched_expense_id().is_none());
    }

    #[test]
    fn test_match_candidates_ranking() {
        let tx = charge("tx1", 2450);
        let mut paid = expense("paid", 2450, day(1));
        paid.status = ExpenseStatus::Paid;
        let expenses = vec![
            expense("far", 2450, day(9)),
            expense("wrong-amount", 1000, day(1)),
            expense("near", 2450, day(2)),
            paid,
        ];

        let ranked: Vec<&str> = match_candidates(&tx, &expenses)
            .into_iter()
            .map(|e| e.id().0.as_str())
            .collect();
        assert_eq!(ranked, vec!["near", "far", "wrong-amount"]);
    }
}
