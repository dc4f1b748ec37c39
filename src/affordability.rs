use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::error::{ChipinError, ChipinResult};
use crate::schemas::{Event, EventStatus, UserNick};

/// Nickname → declared spending ceiling, loaded once per operation so the
/// status check never touches storage mid-computation.
pub type Ceilings = HashMap<UserNick, f64>;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct EventQuote {
    pub share: f64,
    pub status: EventStatus,
}

/// The equal split of `total_spend` over `member_count` members, rounded to
/// cents. An empty group has a share of exactly 0.
pub fn per_member_share(total_spend: f64, member_count: usize) -> f64 {
    if member_count == 0 {
        return 0.0;
    }
    round_to_2_decimals(total_spend / member_count as f64)
}

/// Prices an event against the current group membership: the event is
/// Pending as soon as one member's ceiling falls below the per-member
/// share, Active when every ceiling covers it.
///
/// A member without a profile row counts as ceiling 0. The check is a pure
/// predicate; callers recompute it after any change to membership, spend or
/// a ceiling.
pub fn compute_status(event: &Event, members: &HashSet<UserNick>, ceilings: &Ceilings) -> EventQuote {
    let share = per_member_share(event.total_spend, members.len());
    for member in members {
        let ceiling = ceilings.get(member).copied().unwrap_or(0.0);
        if ceiling < share {
            return EventQuote {
                share,
                status: EventStatus::Pending,
            };
        }
    }
    EventQuote {
        share,
        status: EventStatus::Active,
    }
}

/// Adds a group member to the event's participants, provided their ceiling
/// covers the current share.
pub fn join_event(
    event: &mut Event,
    members: &HashSet<UserNick>,
    user: &UserNick,
    ceilings: &Ceilings,
) -> ChipinResult<()> {
    if !members.contains(user) {
        return Err(ChipinError::NotAMember);
    }
    let share = per_member_share(event.total_spend, members.len());
    if ceilings.get(user).copied().unwrap_or(0.0) < share {
        return Err(ChipinError::CannotAfford);
    }
    if !event.members.insert(user.clone()) {
        return Err(ChipinError::AlreadyJoined);
    }
    Ok(())
}

pub fn leave_event(event: &mut Event, user: &UserNick) -> ChipinResult<()> {
    if !event.members.remove(user) {
        return Err(ChipinError::NotJoined);
    }
    Ok(())
}

fn round_to_2_decimals(n: f64) -> f64 {
    (n * 100.0).round() / 100.0
}
