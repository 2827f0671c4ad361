//! Advisory spending policy.
//!
//! Flags produced here are informational. They are stored on the record but never
//! block a transition.

use crate::models::config::PolicyConfig;
use crate::models::expense::ExpenseRecord;

const LIMIT_FLAG_PREFIX: &str = "This exceeds the ";

/// Flags for every category limit the record goes over.
pub fn evaluate(record: &ExpenseRecord, policy: &PolicyConfig) -> Vec<String> {
    policy
        .category_limits
        .iter()
        .filter(|limit| limit.category == record.category && record.amount.amount > limit.limit)
        .map(|limit| {
            format!(
                "{}{} limit of ${}. Please add justification.",
                LIMIT_FLAG_PREFIX,
                limit.label,
                limit.limit.normalize()
            )
        })
        .collect()
}

/// Whether a flag was produced by [`evaluate`].
pub fn is_limit_flag(flag: &str) -> bool {
    flag.starts_with(LIMIT_FLAG_PREFIX)
}

/// Replace the record's limit flags with a fresh evaluation. Other flags, such as
/// rejection reasons, are kept.
pub(crate) fn refresh(record: &mut ExpenseRecord, policy: &PolicyConfig) {
    let flags = evaluate(record, policy);
    record.policy_violations.retain(|flag| !is_limit_flag(flag));
    record.merge_flags(flags);
}
