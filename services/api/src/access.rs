//! Authorization rules for deal and user operations
//!
//! Every decision in the service funnels through the predicates in this
//! module. They are pure functions over already-resolved entities: the
//! handlers load the caller and the target first (missing rows are 404s,
//! decided before any privilege question), then branch on these checks and
//! map a refusal to 403.
//!
//! The rules:
//! - reading or updating a deal requires the caller to be its creator or
//!   one of its participants;
//! - deleting a deal requires the caller to be its creator; membership
//!   alone is not enough;
//! - listing or creating users requires the superuser flag.

use crate::models::{DealWithUsers, User};

/// True when the caller participates in the deal.
pub fn is_participant(caller: &User, deal: &DealWithUsers) -> bool {
    deal.users.iter().any(|user| user.id == caller.id)
}

/// True when the caller created the deal.
pub fn is_creator(caller: &User, deal: &DealWithUsers) -> bool {
    deal.deal.creator_id == caller.id
}

/// Creator or participant: gates reading and updating a deal.
pub fn may_access_deal(caller: &User, deal: &DealWithUsers) -> bool {
    is_creator(caller, deal) || is_participant(caller, deal)
}

/// Creator only: deleting is stricter than reading or updating.
pub fn may_delete_deal(caller: &User, deal: &DealWithUsers) -> bool {
    is_creator(caller, deal)
}

/// Superuser only: gates the administrative user operations.
pub fn may_administer_users(caller: &User) -> bool {
    caller.is_superuser
}
