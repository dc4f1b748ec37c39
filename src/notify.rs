use serde::Serialize;
use tracing::info;

use crate::schemas::{Group, UserNick};

/// Rendered invitation notification. Delivery happens out of process; the
/// backend only produces the payload.
#[derive(Clone, Debug, Serialize)]
pub struct InviteEmail {
    pub to: UserNick,
    pub subject: String,
    pub body: String,
}

pub fn invitation_email(group: &Group, target: &UserNick, inviter: &UserNick) -> InviteEmail {
    let accept_link = format!("/groups/{}/invites/accept", group.id);
    InviteEmail {
        to: target.clone(),
        subject: format!("You have been invited to join {}", group.name),
        body: format!(
            "{} has invited you to join the group \"{}\". Accept the invitation at {}",
            inviter, group.name, accept_link
        ),
    }
}

pub fn send(email: &InviteEmail) {
    info!(to = %email.to, subject = %email.subject, "invitation queued for delivery");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_email_carries_the_accept_link() {
        let group = Group::new("g42".to_string(), "Ski trip".to_string(), "ana".to_string());
        let email = invitation_email(&group, &"bea".to_string(), &"ana".to_string());
        assert_eq!(email.to, "bea");
        assert!(email.subject.contains("Ski trip"));
        assert!(email.body.contains("/groups/g42/invites/accept"));
    }
}
