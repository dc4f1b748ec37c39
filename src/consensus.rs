use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::error::{ChipinError, ChipinResult};
use crate::schemas::{Group, JoinRequest, UserNick};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoteOutcome {
    /// Vote counted, threshold not yet met.
    Recorded,
    /// The 60% threshold was crossed and the requester was admitted.
    Approved,
}

/// Distinct votes needed to admit a requester into a group of `members`
/// members: ceil(members * 3 / 5), the 60% rule.
pub const fn required_votes(members: usize) -> usize {
    (members * 3 + 4) / 5
}

/// Records `voter`'s endorsement of a join request and admits the requester
/// once enough of the current members have endorsed it.
///
/// The denominator is the member count at the moment of this vote, so a
/// membership change mid-ballot moves the quorum for requests in flight.
/// Votes are monotonic; there is no way to un-vote.
pub fn register_vote(
    request: &mut JoinRequest,
    voter: &UserNick,
    members: &mut HashSet<UserNick>,
) -> ChipinResult<VoteOutcome> {
    if !members.contains(voter) {
        return Err(ChipinError::NotAuthorized);
    }
    if !request.votes.insert(voter.clone()) {
        return Err(ChipinError::AlreadyVoted);
    }
    // An empty group has no defined approval ratio and can never approve.
    if members.is_empty() || request.votes.len() < required_votes(members.len()) {
        return Ok(VoteOutcome::Recorded);
    }
    request.approved = true;
    members.insert(request.user.clone());
    Ok(VoteOutcome::Approved)
}

/// Opens a join request for `user`, keeping the ledger invariants: members
/// cannot request, and each user holds at most one open request.
pub fn request_to_join(
    group: &mut Group,
    user: &UserNick,
    now: DateTime<Utc>,
) -> ChipinResult<()> {
    if group.members.contains(user) {
        return Err(ChipinError::AlreadyMember);
    }
    if group.requests.iter().any(|request| &request.user == user) {
        return Err(ChipinError::AlreadyRequested);
    }
    group.requests.push(JoinRequest::new(user.clone(), now));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members(nicks: &[&str]) -> HashSet<UserNick> {
        nicks.iter().map(|nick| nick.to_string()).collect()
    }

    fn request_for(user: &str) -> JoinRequest {
        JoinRequest::new(user.to_string(), Utc::now())
    }

    #[test]
    fn required_votes_is_sixty_percent_rounded_up() {
        let test_cases = [
            (1, 1),  // 1 × 0.6 = 0.6  → 1
            (2, 2),  // 2 × 0.6 = 1.2  → 2
            (3, 2),  // 3 × 0.6 = 1.8  → 2
            (4, 3),  // 4 × 0.6 = 2.4  → 3
            (5, 3),  // 5 × 0.6 = 3.0  → 3
            (6, 4),  // 6 × 0.6 = 3.6  → 4
            (10, 6), // 10 × 0.6 = 6.0 → 6
        ];
        for (group_size, expected) in test_cases {
            assert_eq!(
                required_votes(group_size),
                expected,
                "required_votes({}) should be {}",
                group_size,
                expected
            );
        }
    }

    #[test]
    fn five_member_group_approves_on_the_third_vote() {
        let mut group_members = members(&["ana", "bea", "carl", "dana", "eli"]);
        let mut request = request_for("fran");

        let first = register_vote(&mut request, &"ana".to_string(), &mut group_members);
        assert_eq!(first, Ok(VoteOutcome::Recorded));
        let second = register_vote(&mut request, &"bea".to_string(), &mut group_members);
        assert_eq!(second, Ok(VoteOutcome::Recorded));
        assert!(!request.approved);
        assert!(!group_members.contains("fran"));

        // 3 of 5 is exactly 60%
        let third = register_vote(&mut request, &"carl".to_string(), &mut group_members);
        assert_eq!(third, Ok(VoteOutcome::Approved));
        assert!(request.approved);
        assert!(group_members.contains("fran"));
    }

    #[test]
    fn a_voter_cannot_vote_twice() {
        let mut group_members = members(&["ana", "bea", "carl", "dana", "eli"]);
        let mut request = request_for("fran");

        register_vote(&mut request, &"ana".to_string(), &mut group_members).unwrap();
        let second = register_vote(&mut request, &"ana".to_string(), &mut group_members);
        assert_eq!(second, Err(ChipinError::AlreadyVoted));
        assert_eq!(request.votes.len(), 1);
        assert!(!request.approved);
    }

    #[test]
    fn non_members_cannot_vote() {
        let mut group_members = members(&["ana", "bea"]);
        let mut request = request_for("fran");

        let outcome = register_vote(&mut request, &"mallory".to_string(), &mut group_members);
        assert_eq!(outcome, Err(ChipinError::NotAuthorized));
        assert!(request.votes.is_empty());
    }

    #[test]
    fn a_departure_mid_ballot_shrinks_the_quorum() {
        let mut group_members = members(&["ana", "bea", "carl", "dana", "eli"]);
        let mut request = request_for("fran");

        register_vote(&mut request, &"ana".to_string(), &mut group_members).unwrap();
        register_vote(&mut request, &"bea".to_string(), &mut group_members).unwrap();
        // 2 of 5 is 0.4; a non-voter leaving makes it 2 of 4, still short.
        group_members.remove("eli");
        assert!(request.votes.len() < required_votes(group_members.len()));

        // The third vote over four members reaches 75% and admits.
        let third = register_vote(&mut request, &"carl".to_string(), &mut group_members);
        assert_eq!(third, Ok(VoteOutcome::Approved));
        assert!(group_members.contains("fran"));
    }

    #[test]
    fn members_cannot_request_to_join() {
        let mut group = Group::new("g1".to_string(), "Trip".to_string(), "ana".to_string());
        let outcome = request_to_join(&mut group, &"ana".to_string(), Utc::now());
        assert_eq!(outcome, Err(ChipinError::AlreadyMember));
        assert!(group.requests.is_empty());
    }

    #[test]
    fn only_one_open_request_per_user() {
        let mut group = Group::new("g1".to_string(), "Trip".to_string(), "ana".to_string());
        request_to_join(&mut group, &"fran".to_string(), Utc::now()).unwrap();
        let second = request_to_join(&mut group, &"fran".to_string(), Utc::now());
        assert_eq!(second, Err(ChipinError::AlreadyRequested));
        assert_eq!(group.requests.len(), 1);
    }
}
