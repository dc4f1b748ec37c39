use actix_web::http::StatusCode;
use actix_web::ResponseError;
use thiserror::Error;

pub type ChipinResult<T> = Result<T, ChipinError>;

/// Every rule violation is value-returned and translated into a user-facing
/// notice; none of these are fatal.
#[derive(Debug, Error, PartialEq)]
pub enum ChipinError {
    #[error("You do not have permission to perform this action")]
    NotAuthorized,

    #[error("Missing or invalid authorization token")]
    Unauthenticated,

    #[error("Invalid Credentials.")]
    InvalidCredentials,

    #[error("You have already voted on this request")]
    AlreadyVoted,

    #[error("This user has already been invited")]
    AlreadyInvited,

    #[error("Already a member of this group")]
    AlreadyMember,

    #[error("You have not been invited to this group")]
    NotInvited,

    #[error("You are not a member of this group")]
    NotAMember,

    #[error("You have already requested to join this group")]
    AlreadyRequested,

    #[error("No join request found for this user")]
    NoSuchRequest,

    #[error("You have already joined this event")]
    AlreadyJoined,

    #[error("You have not joined this event")]
    NotJoined,

    #[error("Your spending limit does not cover the share for this event")]
    CannotAfford,

    #[error("{0}")]
    Validation(String),

    #[error("Couldn't find the desired {0}")]
    NotFound(&'static str),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResponseError for ChipinError {
    fn status_code(&self) -> StatusCode {
        match self {
            ChipinError::NotAuthorized => StatusCode::FORBIDDEN,
            ChipinError::Unauthenticated | ChipinError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            ChipinError::Validation(_) => StatusCode::BAD_REQUEST,
            ChipinError::NoSuchRequest | ChipinError::NotFound(_) => StatusCode::NOT_FOUND,
            ChipinError::Database(_) | ChipinError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::CONFLICT,
        }
    }
}
