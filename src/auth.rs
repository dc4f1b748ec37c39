use crate::schemas::UserNick;
use actix_web::{http::header::HeaderValue, HttpRequest};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{env, num::ParseIntError};

type HmacSha256 = Hmac<Sha256>;

/// Session token carried as a JSON blob in the Authorization header. The
/// hash field is the hex HMAC of the other fields, keyed by the SHA-256 of
/// the server secret.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SessionToken {
    pub nickname: UserNick,
    pub issued_at: String,
    pub hash: String,
}

/// Extracts the acting user from the request, or None if the token is
/// missing, malformed or carries a bad signature.
pub fn authenticated_user(request: &HttpRequest) -> Option<UserNick> {
    let authorization = request
        .headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .map(HeaderValue::to_str)?
        .ok()?;
    let secret = env::var("SESSION_SECRET").ok()?;
    let token: SessionToken = serde_json::from_str(authorization).ok()?;
    let presented_hash = token
        .hash
        .chars()
        .collect::<Vec<_>>()
        .chunks(2)
        .map(|n| u8::from_str_radix(&String::from_iter(n), 16))
        .collect::<Result<Vec<u8>, ParseIntError>>()
        .ok()?;
    let computed_hash = compute_hash(&token.nickname, &token.issued_at, &secret);
    if computed_hash == presented_hash {
        Some(token.nickname)
    } else {
        None
    }
}

/// Signs a fresh token for a user who just proved their credentials.
pub fn issue_token(nickname: &UserNick, issued_at: String, secret: &str) -> SessionToken {
    let hash = to_hex(&compute_hash(nickname, &issued_at, secret));
    SessionToken {
        nickname: nickname.clone(),
        issued_at,
        hash,
    }
}

/// Nickname-salted digest stored in the profile instead of the password.
pub fn password_digest(nickname: &str, password: &str) -> String {
    let mut sha256_hasher = Sha256::new();
    sha256_hasher.update(nickname.as_bytes());
    sha256_hasher.update(password.as_bytes());
    to_hex(&sha256_hasher.finalize())
}

fn compute_hash(nickname: &str, issued_at: &str, secret: &str) -> Vec<u8> {
    let hash_content = format!("issued_at={}\nnickname={}", issued_at, nickname);
    let mut sha256_hasher = Sha256::new();
    sha256_hasher.update(secret.as_bytes());
    let secret_hash = sha256_hasher.finalize();

    let mut hmac_hasher = HmacSha256::new_from_slice(&secret_hash).unwrap();
    hmac_hasher.update(hash_content.as_bytes());
    hmac_hasher.finalize().into_bytes().to_vec()
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{:02x}", byte)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_verify_against_the_same_secret() {
        let token = issue_token(&"ana".to_string(), "1700000000".to_string(), "hunter2");
        let decoded = token
            .hash
            .chars()
            .collect::<Vec<_>>()
            .chunks(2)
            .map(|n| u8::from_str_radix(&String::from_iter(n), 16).unwrap())
            .collect::<Vec<u8>>();
        assert_eq!(
            decoded,
            compute_hash(&token.nickname, &token.issued_at, "hunter2")
        );
        assert_ne!(
            decoded,
            compute_hash(&token.nickname, &token.issued_at, "other-secret")
        );
    }

    #[test]
    fn password_digests_are_salted_by_nickname() {
        assert_ne!(
            password_digest("ana", "hunter2"),
            password_digest("bea", "hunter2")
        );
        assert_eq!(
            password_digest("ana", "hunter2"),
            password_digest("ana", "hunter2")
        );
    }
}
