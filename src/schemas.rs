use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type UserNick = String;

/// A group document holds everything that belongs to the group: the member
/// and invited sets, the open join requests, the events and the comments.
/// Persisting the whole aggregate in one write keeps each request's
/// read-compute-persist cycle atomic.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub admin: UserNick,
    pub members: HashSet<UserNick>,
    pub invited: HashSet<UserNick>,
    pub requests: Vec<JoinRequest>,
    pub events: Vec<Event>,
    pub comments: Vec<Comment>,
}

impl Group {
    /// The creating user becomes the admin and the first member.
    pub fn new(id: String, name: String, admin: UserNick) -> Self {
        let mut members = HashSet::new();
        members.insert(admin.clone());
        Group {
            id,
            name,
            admin,
            members,
            invited: HashSet::new(),
            requests: vec![],
            events: vec![],
            comments: vec![],
        }
    }
}

/// A pending petition by a non-member to join a group, resolved by member
/// voting. A group's ledger keeps at most one request per user.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct JoinRequest {
    pub user: UserNick,
    pub approved: bool,
    pub votes: HashSet<UserNick>,
    pub created_at: DateTime<Utc>,
}

impl JoinRequest {
    pub fn new(user: UserNick, created_at: DateTime<Utc>) -> Self {
        JoinRequest {
            user,
            approved: false,
            votes: HashSet::new(),
            created_at,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum EventStatus {
    Pending,
    Active,
}

/// A shared-cost activity. `members` are the participating group members;
/// the per-member share always divides the spend over the whole group.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Event {
    pub id: String,
    pub name: String,
    pub date: DateTime<Utc>,
    pub total_spend: f64,
    pub status: EventStatus,
    pub created_by: UserNick,
    pub members: HashSet<UserNick>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Comment {
    pub id: String,
    pub author: UserNick,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// User profile. `max_spend` is the declared spending ceiling consulted
/// when pricing events; the engines only ever read it.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Profile {
    pub nickname: UserNick,
    pub email: String,
    pub first_name: String,
    pub surname: String,
    pub password_digest: String,
    pub max_spend: f64,
}
