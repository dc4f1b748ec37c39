use crate::error::{ChipinError, ChipinResult};
use crate::schemas::{Group, UserNick};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// The invite was converted into membership.
    Accepted,
    /// The user was a member all along; accepting again is a no-op.
    AlreadyMember,
}

/// Puts `target` on the group's invited list. Any member may invite.
pub fn invite(group: &mut Group, inviter: &UserNick, target: &UserNick) -> ChipinResult<()> {
    if !group.members.contains(inviter) {
        return Err(ChipinError::NotAuthorized);
    }
    if group.members.contains(target) {
        return Err(ChipinError::AlreadyMember);
    }
    if !group.invited.insert(target.clone()) {
        return Err(ChipinError::AlreadyInvited);
    }
    Ok(())
}

/// Converts `target`'s invite into membership, removing it from the invited
/// set and inserting into the member set in one mutation so the two sets
/// stay disjoint.
pub fn accept_invite(group: &mut Group, target: &UserNick) -> ChipinResult<AcceptOutcome> {
    if group.members.contains(target) {
        // A stale invite entry for an existing member is dropped here.
        group.invited.remove(target);
        return Ok(AcceptOutcome::AlreadyMember);
    }
    if !group.invited.remove(target) {
        return Err(ChipinError::NotInvited);
    }
    group.members.insert(target.clone());
    // Members cannot hold a join request; a request left open while the
    // invite went through is resolved by the acceptance.
    group.requests.retain(|request| &request.user != target);
    Ok(AcceptOutcome::Accepted)
}

/// Removes `user` from the member set. The admin cannot leave their own
/// group; deleting it is the admin's only exit. Open join requests of other
/// users are untouched, their quorum shrinks on the next vote.
pub fn leave_group(group: &mut Group, user: &UserNick) -> ChipinResult<()> {
    if user == &group.admin {
        return Err(ChipinError::NotAuthorized);
    }
    if !group.members.remove(user) {
        return Err(ChipinError::NotAMember);
    }
    // Participants must stay a subset of members.
    for event in &mut group.events {
        event.members.remove(user);
    }
    Ok(())
}

/// Deletes `owner`'s join request from the ledger. Only the owner may
/// withdraw it.
pub fn withdraw_request(
    group: &mut Group,
    owner: &UserNick,
    acting_user: &UserNick,
) -> ChipinResult<()> {
    if acting_user != owner {
        return Err(ChipinError::NotAuthorized);
    }
    let position = group
        .requests
        .iter()
        .position(|request| &request.user == owner)
        .ok_or(ChipinError::NoSuchRequest)?;
    group.requests.remove(position);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::schemas::JoinRequest;

    fn group_with_admin(admin: &str) -> Group {
        Group::new("g1".to_string(), "Trip".to_string(), admin.to_string())
    }

    #[test]
    fn invite_then_accept_moves_the_user_into_members() {
        let mut group = group_with_admin("ana");
        invite(&mut group, &"ana".to_string(), &"bea".to_string()).unwrap();
        assert!(group.invited.contains("bea"));

        let outcome = accept_invite(&mut group, &"bea".to_string());
        assert_eq!(outcome, Ok(AcceptOutcome::Accepted));
        assert!(group.members.contains("bea"));
        assert!(!group.invited.contains("bea"));

        // Accepting again is a no-op.
        let again = accept_invite(&mut group, &"bea".to_string());
        assert_eq!(again, Ok(AcceptOutcome::AlreadyMember));
        assert!(group.members.contains("bea"));
    }

    #[test]
    fn accepting_an_invite_resolves_an_open_join_request() {
        let mut group = group_with_admin("ana");
        group
            .requests
            .push(JoinRequest::new("bea".to_string(), Utc::now()));
        group.invited.insert("bea".to_string());

        accept_invite(&mut group, &"bea".to_string()).unwrap();
        assert!(group.members.contains("bea"));
        assert!(group.requests.is_empty());
    }

    #[test]
    fn only_members_can_invite() {
        let mut group = group_with_admin("ana");
        let outcome = invite(&mut group, &"mallory".to_string(), &"bea".to_string());
        assert_eq!(outcome, Err(ChipinError::NotAuthorized));
        assert!(group.invited.is_empty());
    }

    #[test]
    fn inviting_twice_is_rejected() {
        let mut group = group_with_admin("ana");
        invite(&mut group, &"ana".to_string(), &"bea".to_string()).unwrap();
        let second = invite(&mut group, &"ana".to_string(), &"bea".to_string());
        assert_eq!(second, Err(ChipinError::AlreadyInvited));
    }

    #[test]
    fn members_cannot_be_invited() {
        let mut group = group_with_admin("ana");
        let outcome = invite(&mut group, &"ana".to_string(), &"ana".to_string());
        assert_eq!(outcome, Err(ChipinError::AlreadyMember));
    }

    #[test]
    fn accepting_without_an_invite_fails() {
        let mut group = group_with_admin("ana");
        let outcome = accept_invite(&mut group, &"bea".to_string());
        assert_eq!(outcome, Err(ChipinError::NotInvited));
        assert!(!group.members.contains("bea"));
    }

    #[test]
    fn leaving_removes_membership_and_event_participation() {
        let mut group = group_with_admin("ana");
        group.members.insert("bea".to_string());
        group.events.push(crate::schemas::Event {
            id: "e1".to_string(),
            name: "Dinner".to_string(),
            date: Utc::now(),
            total_spend: 40.0,
            status: crate::schemas::EventStatus::Pending,
            created_by: "ana".to_string(),
            members: ["bea".to_string()].into_iter().collect(),
        });

        leave_group(&mut group, &"bea".to_string()).unwrap();
        assert!(!group.members.contains("bea"));
        assert!(group.events[0].members.is_empty());

        let again = leave_group(&mut group, &"bea".to_string());
        assert_eq!(again, Err(ChipinError::NotAMember));
    }

    #[test]
    fn the_admin_cannot_leave() {
        let mut group = group_with_admin("ana");
        let outcome = leave_group(&mut group, &"ana".to_string());
        assert_eq!(outcome, Err(ChipinError::NotAuthorized));
        assert!(group.members.contains("ana"));
    }

    #[test]
    fn only_the_owner_can_withdraw_a_request() {
        let mut group = group_with_admin("ana");
        group
            .requests
            .push(JoinRequest::new("fran".to_string(), Utc::now()));

        let by_other = withdraw_request(&mut group, &"fran".to_string(), &"ana".to_string());
        assert_eq!(by_other, Err(ChipinError::NotAuthorized));
        assert_eq!(group.requests.len(), 1);

        withdraw_request(&mut group, &"fran".to_string(), &"fran".to_string()).unwrap();
        assert!(group.requests.is_empty());

        let missing = withdraw_request(&mut group, &"fran".to_string(), &"fran".to_string());
        assert_eq!(missing, Err(ChipinError::NoSuchRequest));
    }
}
