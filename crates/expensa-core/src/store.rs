//! Persistence seam and the ledger that drives records through it.
//!
//! Every write is a compare-and-swap on `(id, expected status)`: if the stored
//! record moved on since it was read, the write fails with
//! [`StoreError::StaleState`] and the caller re-reads.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ForbiddenReason, ReconciliationError, Requirement, Result, StoreError, TransitionError};
use crate::lifecycle::{policy, ExpenseEvent, StateMachine};
use crate::models::card::{CardTransaction, TransactionId};
use crate::models::config::ExpensaConfig;
use crate::models::expense::{
    Actor, ExpenseDraft, ExpenseId, ExpenseRecord, ExpenseStatus, ExpenseType, UserId,
};
use crate::reconcile::{self, MatchMode};

/// Which expenses to list. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ExpenseStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expense_type: Option<ExpenseType>,
}

impl ExpenseFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_owner(mut self, owner: UserId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_status(mut self, status: ExpenseStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_type(mut self, expense_type: ExpenseType) -> Self {
        self.expense_type = Some(expense_type);
        self
    }

    pub fn matches(&self, record: &ExpenseRecord) -> bool {
        self.owner.as_ref().map_or(true, |o| record.is_owned_by(o))
            && self.status.map_or(true, |s| record.status() == s)
            && self.expense_type.map_or(true, |t| record.expense_type() == t)
    }
}

/// Storage for expense records.
pub trait ExpenseStore {
    fn load(&self, id: &ExpenseId) -> std::result::Result<ExpenseRecord, StoreError>;

    /// Add a new record. Fails if the id is taken.
    fn insert(&mut self, record: ExpenseRecord) -> std::result::Result<(), StoreError>;

    /// Replace a record whose stored status is still `expected`.
    fn save(&mut self, record: ExpenseRecord, expected: ExpenseStatus) -> std::result::Result<(), StoreError>;

    /// Remove a record whose stored status is still `expected`.
    fn delete(&mut self, id: &ExpenseId, expected: ExpenseStatus) -> std::result::Result<ExpenseRecord, StoreError>;

    /// Matching records, oldest first.
    fn list(&self, filter: &ExpenseFilter) -> Vec<ExpenseRecord>;
}

/// Storage for card transactions.
pub trait TransactionStore {
    fn load_transaction(&self, id: &TransactionId) -> std::result::Result<CardTransaction, ReconciliationError>;

    fn save_transaction(&mut self, transaction: CardTransaction);

    fn list_transactions(&self) -> Vec<CardTransaction>;
}

/// Store backed by hash maps.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    expenses: HashMap<ExpenseId, ExpenseRecord>,
    transactions: HashMap<TransactionId, CardTransaction>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.expenses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expenses.is_empty()
    }

    fn check_expected(&self, id: &ExpenseId, expected: ExpenseStatus) -> std::result::Result<(), StoreError> {
        let current = self
            .expenses
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        if current.status() != expected {
            return Err(StoreError::StaleState {
                id: id.clone(),
                expected,
                actual: current.status(),
            });
        }
        Ok(())
    }
}

impl ExpenseStore for InMemoryStore {
    fn load(&self, id: &ExpenseId) -> std::result::Result<ExpenseRecord, StoreError> {
        self.expenses
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    fn insert(&mut self, record: ExpenseRecord) -> std::result::Result<(), StoreError> {
        if self.expenses.contains_key(record.id()) {
            return Err(StoreError::Duplicate(record.id().clone()));
        }
        self.expenses.insert(record.id().clone(), record);
        Ok(())
    }

    fn save(&mut self, record: ExpenseRecord, expected: ExpenseStatus) -> std::result::Result<(), StoreError> {
        self.check_expected(record.id(), expected)?;
        self.expenses.insert(record.id().clone(), record);
        Ok(())
    }

    fn delete(&mut self, id: &ExpenseId, expected: ExpenseStatus) -> std::result::Result<ExpenseRecord, StoreError> {
        self.check_expected(id, expected)?;
        self.expenses
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    fn list(&self, filter: &ExpenseFilter) -> Vec<ExpenseRecord> {
        let mut records: Vec<ExpenseRecord> = self
            .expenses
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            a.timestamps()
                .created_at
                .cmp(&b.timestamps().created_at)
                .then_with(|| a.id().cmp(b.id()))
        });
        records
    }
}

impl TransactionStore for InMemoryStore {
    fn load_transaction(&self, id: &TransactionId) -> std::result::Result<CardTransaction, ReconciliationError> {
        self.transactions
            .get(id)
            .cloned()
            .ok_or_else(|| ReconciliationError::NotFound(id.clone()))
    }

    fn save_transaction(&mut self, transaction: CardTransaction) {
        self.transactions.insert(transaction.id.clone(), transaction);
    }

    fn list_transactions(&self) -> Vec<CardTransaction> {
        let mut transactions: Vec<CardTransaction> = self.transactions.values().cloned().collect();
        transactions.sort_by(|a, b| a.posted_date.cmp(&b.posted_date).then_with(|| a.id.cmp(&b.id)));
        transactions
    }
}

/// Records handed off together for export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportBatch {
    pub id: String,
    pub exported_at: DateTime<Utc>,
    pub records: Vec<ExpenseRecord>,
}

/// Applies lifecycle and reconciliation operations against a store.
pub struct Ledger<S> {
    store: S,
    machine: StateMachine,
}

impl<S: ExpenseStore + TransactionStore> Ledger<S> {
    pub fn new(store: S, machine: StateMachine) -> Self {
        Self { store, machine }
    }

    pub fn from_config(store: S, config: &ExpensaConfig) -> Self {
        Self::new(
            store,
            StateMachine::new(config.lifecycle.clone(), config.policy.clone()),
        )
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn machine(&self) -> &StateMachine {
        &self.machine
    }

    /// Create an expense owned by `owner`, with policy flags evaluated.
    pub fn create(&mut self, draft: ExpenseDraft, owner: &Actor, now: DateTime<Utc>) -> Result<ExpenseRecord> {
        if draft.amount.amount.is_sign_negative() && !draft.amount.amount.is_zero() {
            return Err(TransitionError::PolicyViolation {
                missing: vec![Requirement::NonNegativeAmount],
            }
            .into());
        }
        let mut record = ExpenseRecord::create(draft, owner.id.clone(), now);
        policy::refresh(&mut record, self.machine.policy());
        self.store.insert(record.clone())?;
        info!("expense {} created by {} in {}", record.id(), owner.id, record.status());
        Ok(record)
    }

    pub fn get(&self, id: &ExpenseId) -> Result<ExpenseRecord> {
        Ok(self.store.load(id)?)
    }

    pub fn list(&self, filter: &ExpenseFilter) -> Vec<ExpenseRecord> {
        self.store.list(filter)
    }

    /// Load, apply `event`, and save only if nobody moved the record meanwhile.
    pub fn transition(
        &mut self,
        id: &ExpenseId,
        event: ExpenseEvent,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<ExpenseRecord> {
        let current = self.store.load(id)?;
        let next = self.machine.apply(&current, event, actor, now)?;
        self.store.save(next.clone(), current.status())?;
        Ok(next)
    }

    /// Delete a draft. Only its owner may. A charge linked to it goes back to unmatched.
    pub fn delete(&mut self, id: &ExpenseId, actor: &Actor) -> Result<ExpenseRecord> {
        let current = self.store.load(id)?;
        self.machine.authorize_delete(&current, actor)?;
        let linked = match current.card_transaction_id() {
            Some(tx_id) => self.load_transaction_if_present(tx_id)?,
            None => None,
        };

        let removed = self.store.delete(id, current.status())?;
        if let Some(transaction) = linked.filter(|t| t.matched_expense_id() == Some(id)) {
            self.store.save_transaction(reconcile::release_transaction(&transaction));
        }
        info!("expense {} deleted by {}", id, actor.id);
        Ok(removed)
    }

    /// Add a charge from the card feed.
    pub fn import_transaction(&mut self, transaction: CardTransaction) {
        debug!("importing card transaction {}", transaction.id);
        self.store.save_transaction(transaction);
    }

    pub fn transactions(&self) -> Vec<CardTransaction> {
        self.store.list_transactions()
    }

    /// Match a charge to an expense and advance the expense if it was waiting in `unmatched`.
    ///
    /// With [`MatchMode::Rematch`] any previous link on either side is released.
    pub fn match_card(
        &mut self,
        transaction_id: &TransactionId,
        expense_id: &ExpenseId,
        actor: &Actor,
        mode: MatchMode,
        now: DateTime<Utc>,
    ) -> Result<(ExpenseRecord, CardTransaction)> {
        let transaction = self.store.load_transaction(transaction_id)?;
        let expense = self.store.load(expense_id)?;

        let matched = reconcile::match_transaction(&transaction, &expense, mode)?;
        let event = ExpenseEvent::MatchCard {
            transaction_id: transaction_id.clone(),
        };
        let next = self.machine.apply(&expense, event, actor, now)?;

        // Everything being replaced is loaded before the first write.
        // A missing counterpart is already unlinked.
        let previous_expense = match transaction.matched_expense_id().filter(|id| *id != expense_id) {
            Some(id) => match self.store.load(id) {
                Ok(record) => Some(record),
                Err(StoreError::NotFound(_)) => None,
                Err(err) => return Err(err.into()),
            },
            None => None,
        };
        let previous_transaction = match expense.card_transaction_id().filter(|id| *id != transaction_id) {
            Some(id) => self.load_transaction_if_present(id)?,
            None => None,
        };

        self.store.save(next.clone(), expense.status())?;
        if let Some(previous) = previous_transaction {
            self.store.save_transaction(reconcile::release_transaction(&previous));
        }
        if let Some(mut previous) = previous_expense {
            let status = previous.status();
            previous.card_transaction_id = None;
            previous.touch(now);
            self.store.save(previous, status)?;
        }
        self.store.save_transaction(matched.clone());

        Ok((next, matched))
    }

    fn load_transaction_if_present(&self, id: &TransactionId) -> Result<Option<CardTransaction>> {
        match self.store.load_transaction(id) {
            Ok(transaction) => Ok(Some(transaction)),
            Err(ReconciliationError::NotFound(_)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Mark a charge as ignored. Irreversible.
    pub fn ignore_card(&mut self, transaction_id: &TransactionId, actor: &Actor) -> Result<CardTransaction> {
        let transaction = self.store.load_transaction(transaction_id)?;
        require_owner_or_finance(&transaction.owner_id, actor)?;
        let ignored = reconcile::ignore_transaction(&transaction)?;
        self.store.save_transaction(ignored.clone());
        Ok(ignored)
    }

    /// Create a draft company-card expense from a charge and link the two.
    pub fn create_from_card(
        &mut self,
        transaction_id: &TransactionId,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<ExpenseRecord> {
        let transaction = self.store.load_transaction(transaction_id)?;
        require_owner_or_finance(&transaction.owner_id, actor)?;

        let (mut record, matched) = reconcile::create_expense_from_transaction(&transaction, now)?;
        policy::refresh(&mut record, self.machine.policy());
        self.store.insert(record.clone())?;
        self.store.save_transaction(matched);
        info!("expense {} created from card transaction {}", record.id(), transaction_id);
        Ok(record)
    }

    /// Export approved expenses together. Nothing is written unless every record can move.
    pub fn export_batch(&mut self, ids: &[ExpenseId], actor: &Actor, now: DateTime<Utc>) -> Result<ExportBatch> {
        let records = self.apply_all(ids, ExpenseEvent::Export, actor, now)?;
        let exported_at = records
            .iter()
            .filter_map(|r| r.timestamps().exported_at)
            .max()
            .unwrap_or(now);
        let batch = ExportBatch {
            id: Uuid::new_v4().to_string(),
            exported_at,
            records,
        };
        info!("export batch {} with {} expenses", batch.id, batch.records.len());
        Ok(batch)
    }

    /// Mark approved expenses as paid. Nothing is written unless every record can move.
    pub fn mark_paid(&mut self, ids: &[ExpenseId], actor: &Actor, now: DateTime<Utc>) -> Result<Vec<ExpenseRecord>> {
        self.apply_all(ids, ExpenseEvent::MarkPaid, actor, now)
    }

    fn apply_all(
        &mut self,
        ids: &[ExpenseId],
        event: ExpenseEvent,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<Vec<ExpenseRecord>> {
        let mut seen = BTreeSet::new();
        let mut staged = Vec::new();
        for id in ids.iter().filter(|id| seen.insert(*id)) {
            let current = self.store.load(id)?;
            let next = self.machine.apply(&current, event.clone(), actor, now)?;
            staged.push((next, current.status()));
        }

        let mut applied = Vec::with_capacity(staged.len());
        for (next, expected) in staged {
            self.store.save(next.clone(), expected)?;
            applied.push(next);
        }
        Ok(applied)
    }
}

fn require_owner_or_finance(owner: &UserId, actor: &Actor) -> std::result::Result<(), TransitionError> {
    if &actor.id == owner || actor.role.is_finance() {
        return Ok(());
    }
    Err(TransitionError::Forbidden {
        reason: ForbiddenReason::RoleNotPermitted {
            actor: actor.id.clone(),
            role: actor.role.as_str().to_string(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    use crate::error::ExpensaError;
    use crate::models::card::CardTransactionStatus;
    use crate::models::config::{CardMatchTarget, LifecycleConfig};
    use crate::models::expense::{AttachmentKind, ExpenseCategory, Money, ReceiptAttachment, Role};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap()
    }

    fn alice() -> Actor {
        Actor::new("alice", Role::Employee)
    }

    fn bob() -> Actor {
        Actor::new("bob", Role::Manager)
    }

    fn fran() -> Actor {
        Actor::new("fran", Role::Finance)
    }

    fn draft(merchant: &str, cents: i64) -> ExpenseDraft {
        ExpenseDraft::manual("USD", NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
            .with_merchant(merchant)
            .with_amount(Decimal::new(cents, 2))
            .with_attachment(ReceiptAttachment::new("a", "s3://r/a.jpg", AttachmentKind::Image))
    }

    fn ledger() -> Ledger<InMemoryStore> {
        Ledger::new(InMemoryStore::new(), StateMachine::default())
    }

    fn approved(ledger: &mut Ledger<InMemoryStore>, merchant: &str) -> ExpenseId {
        let id = ledger.create(draft(merchant, 1000), &alice(), t0()).unwrap().id().clone();
        ledger.transition(&id, ExpenseEvent::Submit, &alice(), t0()).unwrap();
        ledger.transition(&id, ExpenseEvent::Approve, &bob(), t0()).unwrap();
        id
    }

    #[test]
    fn test_save_with_stale_status_fails() {
        let mut store = InMemoryStore::new();
        let record = ExpenseRecord::create(draft("Cafe", 500), UserId::from("alice"), t0());
        let id = record.id().clone();
        store.insert(record.clone()).unwrap();

        let mut moved = record.clone();
        moved.status = ExpenseStatus::Submitted;
        store.save(moved, ExpenseStatus::Draft).unwrap();

        let err = store.save(record, ExpenseStatus::Draft).unwrap_err();
        assert_eq!(
            err,
            StoreError::StaleState {
                id: id.clone(),
                expected: ExpenseStatus::Draft,
                actual: ExpenseStatus::Submitted,
            }
        );
        assert_eq!(store.load(&id).unwrap().status(), ExpenseStatus::Submitted);
    }

    #[test]
    fn test_insert_duplicate() {
        let mut store = InMemoryStore::new();
        let record = ExpenseRecord::create(draft("Cafe", 500).with_id("e1"), UserId::from("alice"), t0());
        store.insert(record.clone()).unwrap();
        assert_eq!(store.insert(record), Err(StoreError::Duplicate("e1".into())));
    }

    #[test]
    fn test_create_applies_policy_flags() {
        let mut ledger = ledger();
        let record = ledger
            .create(draft("Steakhouse", 12000).with_category(ExpenseCategory::Meals), &alice(), t0())
            .unwrap();
        assert_eq!(record.policy_violations.len(), 1);
        assert_eq!(ledger.get(record.id()).unwrap(), record);
    }

    #[test]
    fn test_failed_transition_leaves_store_untouched() {
        let mut ledger = ledger();
        let record = ledger.create(draft("", 1000), &alice(), t0()).unwrap();

        let err = ledger
            .transition(record.id(), ExpenseEvent::Submit, &alice(), t0())
            .unwrap_err();
        assert!(matches!(err, ExpensaError::Transition(TransitionError::PolicyViolation { .. })));
        assert_eq!(ledger.get(record.id()).unwrap().status(), ExpenseStatus::Draft);
    }

    #[test]
    fn test_delete_only_drafts() {
        let mut ledger = ledger();
        let record = ledger.create(draft("Cafe", 500), &alice(), t0()).unwrap();
        assert!(ledger.delete(record.id(), &bob()).is_err());
        ledger.delete(record.id(), &alice()).unwrap();
        assert!(ledger.store().is_empty());

        let id = approved(&mut ledger, "Hotel");
        assert!(ledger.delete(&id, &alice()).is_err());
    }

    #[test]
    fn test_list_filters() {
        let mut ledger = ledger();
        let a = ledger.create(draft("One", 100), &alice(), t0()).unwrap();
        ledger
            .create(draft("Two", 100), &Actor::new("carol", Role::Employee), t0() + Duration::seconds(1))
            .unwrap();
        ledger.transition(a.id(), ExpenseEvent::Submit, &alice(), t0()).unwrap();

        let filter = ExpenseFilter::all().with_owner(UserId::from("alice"));
        assert_eq!(ledger.list(&filter).len(), 1);

        let filter = ExpenseFilter::all().with_status(ExpenseStatus::Draft);
        let drafts = ledger.list(&filter);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].merchant_name, "Two");

        assert_eq!(ledger.list(&ExpenseFilter::all()).len(), 2);
    }

    #[test]
    fn test_export_batch_is_all_or_nothing() {
        let mut ledger = ledger();
        let first = approved(&mut ledger, "Hotel");
        let pending = ledger.create(draft("Cab", 900), &alice(), t0()).unwrap().id().clone();

        let err = ledger.export_batch(&[first.clone(), pending], &fran(), t0());
        assert!(err.is_err());
        assert_eq!(ledger.get(&first).unwrap().status(), ExpenseStatus::Approved);

        let second = approved(&mut ledger, "Train");
        let batch = ledger
            .export_batch(&[first.clone(), second.clone(), first.clone()], &fran(), t0())
            .unwrap();
        assert_eq!(batch.records.len(), 2);
        assert!(batch.records.iter().all(|r| r.status() == ExpenseStatus::Exported));
        assert_eq!(ledger.get(&second).unwrap().status(), ExpenseStatus::Exported);
    }

    #[test]
    fn test_mark_paid_needs_finance() {
        let mut ledger = ledger();
        let id = approved(&mut ledger, "Hotel");
        assert!(ledger.mark_paid(&[id.clone()], &bob(), t0()).is_err());

        let paid = ledger.mark_paid(&[id], &fran(), t0()).unwrap();
        assert_eq!(paid[0].status(), ExpenseStatus::Paid);
    }

    fn card_ledger(target: CardMatchTarget) -> Ledger<InMemoryStore> {
        let config = ExpensaConfig {
            lifecycle: LifecycleConfig {
                card_match_target: target,
                ..Default::default()
            },
            ..Default::default()
        };
        Ledger::from_config(InMemoryStore::new(), &config)
    }

    fn charge(id: &str) -> CardTransaction {
        CardTransaction::new(
            id,
            UserId::from("alice"),
            "DELTA AIR 0062",
            Money::usd(Decimal::new(31200, 2)),
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        )
    }

    #[test]
    fn test_match_card_advances_unmatched_expense() {
        let mut ledger = card_ledger(CardMatchTarget::Submitted);
        ledger.import_transaction(charge("tx1"));
        let record = ledger
            .create(draft("Delta", 31200).with_type(ExpenseType::CompanyCard), &alice(), t0())
            .unwrap();
        let parked = ledger
            .transition(record.id(), ExpenseEvent::Submit, &alice(), t0())
            .unwrap();
        assert_eq!(parked.status(), ExpenseStatus::Unmatched);

        let (expense, tx) = ledger
            .match_card(&"tx1".into(), record.id(), &alice(), MatchMode::Strict, t0())
            .unwrap();
        assert_eq!(expense.status(), ExpenseStatus::Submitted);
        assert_eq!(tx.status(), CardTransactionStatus::Matched);
        assert_eq!(
            ledger.store().load_transaction(&"tx1".into()).unwrap().matched_expense_id(),
            Some(record.id())
        );
    }

    #[test]
    fn test_second_match_conflicts_and_rematch_moves_link() {
        let mut ledger = card_ledger(CardMatchTarget::Submitted);
        ledger.import_transaction(charge("tx1"));
        let e1 = ledger.create(draft("Delta", 31200), &alice(), t0()).unwrap().id().clone();
        let e2 = ledger.create(draft("Delta", 31200), &alice(), t0()).unwrap().id().clone();

        ledger.match_card(&"tx1".into(), &e1, &alice(), MatchMode::Strict, t0()).unwrap();
        let err = ledger
            .match_card(&"tx1".into(), &e2, &alice(), MatchMode::Strict, t0())
            .unwrap_err();
        assert!(matches!(
            err,
            ExpensaError::Reconciliation(ReconciliationError::Conflict { .. })
        ));

        ledger.match_card(&"tx1".into(), &e2, &alice(), MatchMode::Rematch, t0()).unwrap();
        assert!(ledger.get(&e1).unwrap().card_transaction_id().is_none());
        assert_eq!(
            ledger.get(&e2).unwrap().card_transaction_id(),
            Some(&TransactionId::from("tx1"))
        );
    }

    #[test]
    fn test_delete_releases_linked_charge() {
        let mut ledger = card_ledger(CardMatchTarget::Submitted);
        ledger.import_transaction(charge("tx1"));
        let e1 = ledger.create(draft("Delta", 31200), &alice(), t0()).unwrap().id().clone();
        ledger.match_card(&"tx1".into(), &e1, &alice(), MatchMode::Strict, t0()).unwrap();

        ledger.delete(&e1, &alice()).unwrap();
        let tx = ledger.store().load_transaction(&"tx1".into()).unwrap();
        assert_eq!(tx.status(), CardTransactionStatus::Unmatched);
        assert_eq!(tx.matched_expense_id(), None);

        let e2 = ledger.create(draft("Delta", 31200), &alice(), t0()).unwrap().id().clone();
        let (expense, tx) = ledger
            .match_card(&"tx1".into(), &e2, &alice(), MatchMode::Strict, t0())
            .unwrap();
        assert_eq!(expense.card_transaction_id(), Some(&TransactionId::from("tx1")));
        assert_eq!(tx.matched_expense_id(), Some(&e2));
    }

    #[test]
    fn test_rematch_treats_missing_previous_expense_as_unlinked() {
        // A charge left pointing at an expense the store no longer has.
        let gone = ExpenseRecord::create(draft("Delta", 31200).with_id("gone"), UserId::from("alice"), t0());
        let dangling = reconcile::match_transaction(&charge("tx1"), &gone, MatchMode::Strict).unwrap();
        let mut store = InMemoryStore::new();
        store.save_transaction(dangling);

        let mut ledger = Ledger::new(store, StateMachine::default());
        let e2 = ledger.create(draft("Delta", 31200), &alice(), t0()).unwrap().id().clone();

        let err = ledger
            .match_card(&"tx1".into(), &e2, &alice(), MatchMode::Strict, t0())
            .unwrap_err();
        assert!(matches!(
            err,
            ExpensaError::Reconciliation(ReconciliationError::Conflict { .. })
        ));
        assert!(ledger.get(&e2).unwrap().card_transaction_id().is_none());

        ledger.match_card(&"tx1".into(), &e2, &alice(), MatchMode::Rematch, t0()).unwrap();
        assert_eq!(
            ledger.get(&e2).unwrap().card_transaction_id(),
            Some(&TransactionId::from("tx1"))
        );
        assert_eq!(
            ledger.store().load_transaction(&"tx1".into()).unwrap().matched_expense_id(),
            Some(&e2)
        );
    }

    #[test]
    fn test_create_refuses_negative_amount() {
        let mut ledger = ledger();
        let err = ledger.create(draft("Refund", -500), &alice(), t0()).unwrap_err();
        assert!(matches!(
            err,
            ExpensaError::Transition(TransitionError::PolicyViolation { ref missing })
                if missing == &vec![Requirement::NonNegativeAmount]
        ));
        assert!(ledger.store().is_empty());
    }

    #[test]
    fn test_create_from_card_and_ignore() {
        let mut ledger = card_ledger(CardMatchTarget::Approved);
        ledger.import_transaction(charge("tx1"));
        ledger.import_transaction(charge("tx2"));

        let record = ledger.create_from_card(&"tx1".into(), &fran(), t0()).unwrap();
        assert_eq!(record.status(), ExpenseStatus::Draft);
        assert_eq!(record.owner_id(), &UserId::from("alice"));

        assert!(ledger.ignore_card(&"tx2".into(), &bob()).is_err());
        let ignored = ledger.ignore_card(&"tx2".into(), &alice()).unwrap();
        assert_eq!(ignored.status(), CardTransactionStatus::Ignored);
        assert!(ledger.create_from_card(&"tx2".into(), &alice(), t0()).is_err());
        assert!(ledger.ignore_card(&"tx1".into(), &alice()).is_err());
    }
}
