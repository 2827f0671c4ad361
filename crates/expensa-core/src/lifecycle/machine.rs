//! Expense state machine.
//!
//! ```text
//! draft ──submit──▶ submitted ──approve──▶ approved ──mark_paid──▶ paid
//!   ▲ │               │                       └──────export──────▶ exported
//!   edit              reject
//!                     ▼
//!                  rejected ──submit──▶ submitted
//!
//! unmatched ──match_card──▶ submitted | approved
//! ```
//!
//! Every event is checked in the same order: is it defined from the current
//! state, may the actor trigger it, do the record's fields satisfy it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ForbiddenReason, Requirement, TransitionError};
use crate::lifecycle::policy;
use crate::models::card::TransactionId;
use crate::models::config::{LifecycleConfig, PolicyConfig};
use crate::models::expense::{Actor, ExpensePatch, ExpenseRecord, ExpenseStatus, ExpenseType};

/// Something that happens to an expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExpenseEvent {
    /// Owner sends the expense for approval.
    Submit,
    /// Owner changes fields of a draft or rejected expense.
    Edit { patch: ExpensePatch },
    Approve,
    Reject { reason: String },
    MarkPaid,
    /// Hand the expense off in an export batch.
    Export,
    /// Link a card charge to the expense.
    MatchCard { transaction_id: TransactionId },
    /// Owner stops waiting for a card charge. The expense stays unmatched.
    IgnoreMatch,
}

impl ExpenseEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ExpenseEvent::Submit => "submit",
            ExpenseEvent::Edit { .. } => "edit",
            ExpenseEvent::Approve => "approve",
            ExpenseEvent::Reject { .. } => "reject",
            ExpenseEvent::MarkPaid => "mark_paid",
            ExpenseEvent::Export => "export",
            ExpenseEvent::MatchCard { .. } => "match_card",
            ExpenseEvent::IgnoreMatch => "ignore_match",
        }
    }

    /// Whether the event is defined from `from` at all.
    pub fn is_defined_from(&self, from: ExpenseStatus) -> bool {
        matches!(
            (from, self),
            (ExpenseStatus::Draft | ExpenseStatus::Rejected, ExpenseEvent::Submit)
                | (ExpenseStatus::Draft | ExpenseStatus::Rejected, ExpenseEvent::Edit { .. })
                | (ExpenseStatus::Submitted, ExpenseEvent::Approve)
                | (ExpenseStatus::Submitted, ExpenseEvent::Reject { .. })
                | (ExpenseStatus::Approved, ExpenseEvent::MarkPaid)
                | (ExpenseStatus::Approved, ExpenseEvent::Export)
                | (
                    ExpenseStatus::Draft | ExpenseStatus::Submitted | ExpenseStatus::Unmatched,
                    ExpenseEvent::MatchCard { .. }
                )
                | (ExpenseStatus::Unmatched, ExpenseEvent::IgnoreMatch)
        )
    }
}

/// Validates and applies lifecycle events.
#[derive(Debug, Clone, Default)]
pub struct StateMachine {
    config: LifecycleConfig,
    policy: PolicyConfig,
}

impl StateMachine {
    pub fn new(config: LifecycleConfig, policy: PolicyConfig) -> Self {
        Self { config, policy }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    /// Apply `event` to a copy of `record`.
    ///
    /// On error the caller's record is untouched; on success the returned record has
    /// its status, timestamps, and side-effect fields updated.
    pub fn apply(
        &self,
        record: &ExpenseRecord,
        event: ExpenseEvent,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<ExpenseRecord, TransitionError> {
        let from = record.status();
        if !event.is_defined_from(from) {
            return Err(TransitionError::IllegalTransition {
                from,
                event: event.name().to_string(),
            });
        }

        self.authorize(record, &event, actor)?;
        self.check_preconditions(record, &event, now)?;

        let name = event.name();
        let mut next = record.clone();
        let stamp = next.touch(now);

        match event {
            ExpenseEvent::Submit => {
                next.status = if self.awaits_card_match(&next) {
                    ExpenseStatus::Unmatched
                } else {
                    ExpenseStatus::Submitted
                };
                next.timestamps.submitted_at = Some(stamp);
            }
            ExpenseEvent::Edit { patch } => {
                patch.apply_to(&mut next);
                policy::refresh(&mut next, &self.policy);
            }
            ExpenseEvent::Approve => {
                next.status = ExpenseStatus::Approved;
                next.timestamps.approved_at.get_or_insert(stamp);
                next.approver_id = Some(actor.id.clone());
            }
            ExpenseEvent::Reject { reason } => {
                next.status = ExpenseStatus::Rejected;
                next.approver_id = Some(actor.id.clone());
                let reason = reason.trim();
                if !reason.is_empty() {
                    next.merge_flags(vec![reason.to_string()]);
                }
            }
            ExpenseEvent::MarkPaid => {
                next.status = ExpenseStatus::Paid;
                next.timestamps.paid_at.get_or_insert(stamp);
            }
            ExpenseEvent::Export => {
                next.status = ExpenseStatus::Exported;
                next.timestamps.exported_at.get_or_insert(stamp);
            }
            ExpenseEvent::MatchCard { transaction_id } => {
                next.card_transaction_id = Some(transaction_id);
                next.match_ignored = false;
                if from == ExpenseStatus::Unmatched {
                    self.advance_matched(&mut next, actor, stamp);
                }
            }
            ExpenseEvent::IgnoreMatch => {
                next.match_ignored = true;
            }
        }

        info!(
            "expense {}: {} {} -> {} by {}",
            next.id(),
            name,
            from,
            next.status(),
            actor.id
        );
        Ok(next)
    }

    /// Company-card expenses submitted without a linked charge wait in `unmatched`.
    fn awaits_card_match(&self, record: &ExpenseRecord) -> bool {
        self.config.card_submit_awaits_match
            && record.expense_type() == ExpenseType::CompanyCard
            && record.card_transaction_id().is_none()
    }

    fn advance_matched(&self, next: &mut ExpenseRecord, actor: &Actor, stamp: DateTime<Utc>) {
        let target = self.config.card_match_target.status();
        next.status = target;
        next.timestamps.submitted_at.get_or_insert(stamp);
        if target == ExpenseStatus::Approved {
            next.timestamps.approved_at.get_or_insert(stamp);
            next.approver_id = Some(actor.id.clone());
        }
    }

    fn authorize(
        &self,
        record: &ExpenseRecord,
        event: &ExpenseEvent,
        actor: &Actor,
    ) -> Result<(), TransitionError> {
        match event {
            ExpenseEvent::Submit | ExpenseEvent::Edit { .. } => require_owner(record, actor),
            ExpenseEvent::Approve | ExpenseEvent::Reject { .. } => self.require_decider(record, actor),
            ExpenseEvent::MarkPaid | ExpenseEvent::Export => require_finance(actor),
            ExpenseEvent::MatchCard { .. } | ExpenseEvent::IgnoreMatch => {
                if record.is_owned_by(&actor.id) {
                    Ok(())
                } else {
                    require_finance(actor)
                }
            }
        }
    }

    fn require_decider(&self, record: &ExpenseRecord, actor: &Actor) -> Result<(), TransitionError> {
        if !actor.role.can_decide() {
            return Err(role_not_permitted(actor));
        }
        if record.is_owned_by(&actor.id) && !self.config.allow_self_approval {
            return Err(TransitionError::Forbidden {
                reason: ForbiddenReason::SelfApproval {
                    actor: actor.id.clone(),
                },
            });
        }
        Ok(())
    }

    fn check_preconditions(
        &self,
        record: &ExpenseRecord,
        event: &ExpenseEvent,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        let missing = match event {
            ExpenseEvent::Submit => self.submit_requirements(record, now),
            ExpenseEvent::Edit { patch } => edit_requirements(record, patch),
            _ => return Ok(()),
        };
        if missing.is_empty() {
            Ok(())
        } else {
            debug!("expense {} refused {}: {:?}", record.id(), event.name(), missing);
            Err(TransitionError::PolicyViolation { missing })
        }
    }

    /// Every requirement for submission that `record` does not meet.
    pub fn submit_requirements(&self, record: &ExpenseRecord, now: DateTime<Utc>) -> Vec<Requirement> {
        let mut missing = Vec::new();
        if record.merchant_name.trim().is_empty() {
            missing.push(Requirement::MerchantName);
        }
        if !record.amount.is_positive() {
            missing.push(Requirement::PositiveAmount);
        }
        if self.config.require_receipt_on_submit && record.receipt_attachments.is_empty() {
            missing.push(Requirement::ReceiptAttachment);
        }
        if self.config.reject_future_dates && record.expense_date > now.date_naive() {
            missing.push(Requirement::ExpenseDateNotInFuture);
        }
        missing
    }

    /// Check that `actor` may delete `record`. Only the owner may, and only while in draft.
    pub fn authorize_delete(&self, record: &ExpenseRecord, actor: &Actor) -> Result<(), TransitionError> {
        if record.status() != ExpenseStatus::Draft {
            return Err(TransitionError::IllegalTransition {
                from: record.status(),
                event: "delete".to_string(),
            });
        }
        require_owner(record, actor)
    }
}

/// Requirements a patch would break. Merchant may only be blanked while in draft.
fn edit_requirements(record: &ExpenseRecord, patch: &ExpensePatch) -> Vec<Requirement> {
    let mut missing = Vec::new();
    let blank_merchant = patch
        .merchant_name
        .as_deref()
        .is_some_and(|m| m.trim().is_empty());
    if blank_merchant && record.status() != ExpenseStatus::Draft {
        missing.push(Requirement::MerchantName);
    }
    if patch.amount.is_some_and(|a| a.is_sign_negative() && !a.is_zero()) {
        missing.push(Requirement::NonNegativeAmount);
    }
    missing
}

/// Apply `event` with default settings at the current time.
pub fn apply_transition(
    record: &ExpenseRecord,
    event: ExpenseEvent,
    actor: &Actor,
) -> Result<ExpenseRecord, TransitionError> {
    StateMachine::default().apply(record, event, actor, Utc::now())
}

/// Check that `actor` may delete `record` with default settings.
pub fn authorize_delete(record: &ExpenseRecord, actor: &Actor) -> Result<(), TransitionError> {
    StateMachine::default().authorize_delete(record, actor)
}

fn require_owner(record: &ExpenseRecord, actor: &Actor) -> Result<(), TransitionError> {
    if record.is_owned_by(&actor.id) {
        Ok(())
    } else {
        Err(TransitionError::Forbidden {
            reason: ForbiddenReason::NotOwner {
                actor: actor.id.clone(),
            },
        })
    }
}

fn require_finance(actor: &Actor) -> Result<(), TransitionError> {
    if actor.role.is_finance() {
        Ok(())
    } else {
        Err(role_not_permitted(actor))
    }
}

fn role_not_permitted(actor: &Actor) -> TransitionError {
    TransitionError::Forbidden {
        reason: ForbiddenReason::RoleNotPermitted {
            actor: actor.id.clone(),
            role: actor.role.as_str().to_string(),
        },
    }
}
