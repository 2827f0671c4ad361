//! Expense record model.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::card::TransactionId;
use crate::receipt::ExtractedFields;

/// Opaque expense identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpenseId(pub String);

impl ExpenseId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for ExpenseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExpenseId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of a person (owner, approver, finance user).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Role asserted by the caller for an actor.
///
/// The core does not look roles up anywhere; it trusts what it is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Employee,
    Manager,
    Finance,
    Admin,
}

impl Role {
    /// May approve or reject submitted expenses.
    pub fn can_decide(&self) -> bool {
        matches!(self, Role::Manager | Role::Finance | Role::Admin)
    }

    /// May pay, export, and reconcile on behalf of others.
    pub fn is_finance(&self) -> bool {
        matches!(self, Role::Finance | Role::Admin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Employee => "employee",
            Role::Manager => "manager",
            Role::Finance => "finance",
            Role::Admin => "admin",
        }
    }
}

/// The person triggering a lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: UserId(id.into()),
            role,
        }
    }
}

/// A currency-tagged amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    /// ISO 4217 code.
    pub currency: String,
}

impl Money {
    pub fn new(amount: Decimal, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }

    pub fn usd(amount: Decimal) -> Self {
        Self::new(amount, "USD")
    }

    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} {}", self.amount, self.currency)
    }
}

/// Expense category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseCategory {
    Meals,
    Travel,
    Transportation,
    Lodging,
    Supplies,
    Tools,
    Software,
    Other,
}

impl ExpenseCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseCategory::Meals => "meals",
            ExpenseCategory::Travel => "travel",
            ExpenseCategory::Transportation => "transportation",
            ExpenseCategory::Lodging => "lodging",
            ExpenseCategory::Supplies => "supplies",
            ExpenseCategory::Tools => "tools",
            ExpenseCategory::Software => "software",
            ExpenseCategory::Other => "other",
        }
    }
}

impl Default for ExpenseCategory {
    fn default() -> Self {
        Self::Other
    }
}

/// How the expense was paid; decides the lifecycle branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseType {
    /// Paid personally, to be reimbursed.
    Reimbursement,
    /// Charged to a company card, reconciled against the card feed.
    CompanyCard,
}

impl Default for ExpenseType {
    fn default() -> Self {
        Self::Reimbursement
    }
}

/// Lifecycle state of an expense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
    Paid,
    Exported,
    /// Company-card expense waiting for its charge to be matched.
    Unmatched,
}

impl ExpenseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseStatus::Draft => "draft",
            ExpenseStatus::Submitted => "submitted",
            ExpenseStatus::Approved => "approved",
            ExpenseStatus::Rejected => "rejected",
            ExpenseStatus::Paid => "paid",
            ExpenseStatus::Exported => "exported",
            ExpenseStatus::Unmatched => "unmatched",
        }
    }

    /// No transition leaves a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExpenseStatus::Paid | ExpenseStatus::Exported)
    }

    /// Fields may be changed by the owner.
    pub fn is_editable(&self) -> bool {
        matches!(self, ExpenseStatus::Draft | ExpenseStatus::Rejected)
    }
}

impl fmt::Display for ExpenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of attached receipt file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Image,
    Pdf,
}

/// A receipt file attached to an expense. Storage lives elsewhere; this is a reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptAttachment {
    pub id: String,
    /// URL or storage key.
    pub url: String,
    pub kind: AttachmentKind,
}

impl ReceiptAttachment {
    pub fn new(id: impl Into<String>, url: impl Into<String>, kind: AttachmentKind) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            kind,
        }
    }
}

/// Record timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<DateTime<Utc>>,
}

impl Timestamps {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            updated_at: now,
            submitted_at: None,
            approved_at: None,
            paid_at: None,
            exported_at: None,
        }
    }
}

/// The canonical expense record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    id: ExpenseId,
    owner_id: UserId,
    expense_type: ExpenseType,

    /// Total value, subtotal plus tax.
    pub amount: Money,

    /// May be empty only while in draft.
    pub merchant_name: String,

    pub expense_date: NaiveDate,

    pub category: ExpenseCategory,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    pub(crate) status: ExpenseStatus,

    /// Advisory flags, oldest first. Never block a transition.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policy_violations: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub receipt_attachments: Vec<ReceiptAttachment>,

    pub(crate) timestamps: Timestamps,

    /// Whoever made the latest approve or reject decision.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) approver_id: Option<UserId>,

    /// Card charge linked to this expense, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) card_transaction_id: Option<TransactionId>,

    /// Owner chose not to wait for a card charge.
    #[serde(default)]
    pub(crate) match_ignored: bool,
}

impl ExpenseRecord {
    /// Create a record in its initial state.
    ///
    /// Status starts at `draft`, or `unmatched` when `awaiting_card_match` is set for a
    /// company-card expense.
    pub fn create(draft: ExpenseDraft, owner_id: UserId, now: DateTime<Utc>) -> Self {
        let status = if draft.awaiting_card_match && draft.expense_type == ExpenseType::CompanyCard {
            ExpenseStatus::Unmatched
        } else {
            ExpenseStatus::Draft
        };

        Self {
            id: draft.id.unwrap_or_else(ExpenseId::generate),
            owner_id,
            expense_type: draft.expense_type,
            amount: draft.amount,
            merchant_name: draft.merchant_name,
            expense_date: draft.expense_date,
            category: draft.category,
            notes: draft.notes,
            status,
            policy_violations: Vec::new(),
            receipt_attachments: draft.receipt_attachments,
            timestamps: Timestamps::new(now),
            approver_id: None,
            card_transaction_id: None,
            match_ignored: false,
        }
    }

    pub fn id(&self) -> &ExpenseId {
        &self.id
    }

    pub fn owner_id(&self) -> &UserId {
        &self.owner_id
    }

    pub fn expense_type(&self) -> ExpenseType {
        self.expense_type
    }

    pub fn status(&self) -> ExpenseStatus {
        self.status
    }

    pub fn timestamps(&self) -> &Timestamps {
        &self.timestamps
    }

    /// The latest decider. Re-deciding a resubmitted expense replaces it.
    pub fn approver_id(&self) -> Option<&UserId> {
        self.approver_id.as_ref()
    }

    pub fn card_transaction_id(&self) -> Option<&TransactionId> {
        self.card_transaction_id.as_ref()
    }

    pub fn match_ignored(&self) -> bool {
        self.match_ignored
    }

    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.owner_id == user
    }

    /// Advance `updated_at`, never moving it backwards.
    pub(crate) fn touch(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        let stamp = now.max(self.timestamps.updated_at);
        self.timestamps.updated_at = stamp;
        stamp
    }

    /// Append flags that are not already present.
    pub(crate) fn merge_flags(&mut self, flags: Vec<String>) {
        for flag in flags {
            if !self.policy_violations.contains(&flag) {
                self.policy_violations.push(flag);
            }
        }
    }
}

/// Input for a new expense, from extraction, manual entry, or a card charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseDraft {
    /// Use a caller-chosen id instead of generating one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ExpenseId>,
    pub amount: Money,
    #[serde(default)]
    pub merchant_name: String,
    pub expense_date: NaiveDate,
    #[serde(default)]
    pub category: ExpenseCategory,
    #[serde(default)]
    pub expense_type: ExpenseType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub receipt_attachments: Vec<ReceiptAttachment>,
    /// Start a company-card expense in `unmatched`.
    #[serde(default)]
    pub awaiting_card_match: bool,
}

impl ExpenseDraft {
    /// An empty manual-entry draft dated `date`.
    pub fn manual(currency: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            id: None,
            amount: Money::new(Decimal::ZERO, currency),
            merchant_name: String::new(),
            expense_date: date,
            category: ExpenseCategory::default(),
            expense_type: ExpenseType::default(),
            notes: None,
            receipt_attachments: Vec::new(),
            awaiting_card_match: false,
        }
    }

    /// A draft seeded from extracted receipt fields.
    ///
    /// Amount is subtotal plus tax when both were found, else the total, else the
    /// subtotal. Missing fields stay empty for the owner to fill in; a missing date
    /// becomes `today`.
    pub fn from_extracted(fields: &ExtractedFields, currency: impl Into<String>, today: NaiveDate) -> Self {
        let mut draft = Self::manual(currency, fields.date.unwrap_or(today));
        if let Some(merchant) = &fields.merchant_name {
            draft.merchant_name = merchant.clone();
        }
        if let Some(amount) = fields.expense_amount() {
            draft.amount.amount = amount;
        }
        draft
    }

    pub fn with_merchant(mut self, merchant: impl Into<String>) -> Self {
        self.merchant_name = merchant.into();
        self
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount.amount = amount;
        self
    }

    pub fn with_category(mut self, category: ExpenseCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_type(mut self, expense_type: ExpenseType) -> Self {
        self.expense_type = expense_type;
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(ExpenseId(id.into()));
        self
    }

    pub fn with_attachment(mut self, attachment: ReceiptAttachment) -> Self {
        self.receipt_attachments.push(attachment);
        self
    }

    pub fn awaiting_card_match(mut self) -> Self {
        self.awaiting_card_match = true;
        self
    }
}

/// Owner edits to a draft or rejected expense. `None` leaves a field unchanged.
///
/// Identity, owner, and expense type are not editable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpensePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expense_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<ExpenseCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Appended to the existing attachments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add_attachments: Vec<ReceiptAttachment>,
}

impl ExpensePatch {
    pub fn is_empty(&self) -> bool {
        self.merchant_name.is_none()
            && self.amount.is_none()
            && self.expense_date.is_none()
            && self.category.is_none()
            && self.notes.is_none()
            && self.add_attachments.is_empty()
    }

    pub(crate) fn apply_to(self, record: &mut ExpenseRecord) {
        if let Some(merchant) = self.merchant_name {
            record.merchant_name = merchant;
        }
        if let Some(amount) = self.amount {
            record.amount.amount = amount;
        }
        if let Some(date) = self.expense_date {
            record.expense_date = date;
        }
        if let Some(category) = self.category {
            record.category = category;
        }
        if let Some(notes) = self.notes {
            record.notes = Some(notes);
        }
        record.receipt_attachments.extend(self.add_attachments);
    }
}
