use std::collections::HashSet;

use actix_cors::Cors;
use actix_web::{delete, get, post, put, web, App, HttpRequest, HttpResponse, HttpServer};
use chrono::{DateTime, Utc};
use mongodb::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

mod affordability;
mod auth;
mod consensus;
mod error;
mod membership;
mod notify;
mod schemas;
mod store;

use crate::affordability::compute_status;
use crate::consensus::VoteOutcome;
use crate::error::{ChipinError, ChipinResult};
use crate::membership::AcceptOutcome;
use crate::schemas::{Comment, Event, EventStatus, Group, Profile, UserNick};

fn current_user(request: &HttpRequest) -> ChipinResult<UserNick> {
    auth::authenticated_user(request).ok_or(ChipinError::Unauthenticated)
}

/// Event statuses are not maintained incrementally; every mutation of the
/// membership, a spend or a participation re-prices all the group's events.
async fn refresh_event_statuses(client: &Client, group: &mut Group) -> ChipinResult<()> {
    let ceilings = store::ceilings_of(client, &group.members).await?;
    for event in &mut group.events {
        let quote = compute_status(event, &group.members, &ceilings);
        event.status = quote.status;
    }
    Ok(())
}

#[derive(Deserialize, Serialize)]
struct RegistrationJson {
    nickname: String,
    email: String,
    first_name: String,
    surname: String,
    password: String,
    max_spend: f64,
}

#[post("/users")]
async fn register(
    client: web::Data<Client>,
    json: web::Json<RegistrationJson>,
) -> ChipinResult<HttpResponse> {
    let json = json.into_inner();
    if json.max_spend < 0.0 {
        return Err(ChipinError::Validation(
            "max_spend must not be negative".to_string(),
        ));
    }
    if store::find_profile(&client, &json.nickname).await?.is_some() {
        return Err(ChipinError::Validation(
            "This nickname is already taken".to_string(),
        ));
    }
    let profile = Profile {
        password_digest: auth::password_digest(&json.nickname, &json.password),
        nickname: json.nickname,
        email: json.email,
        first_name: json.first_name,
        surname: json.surname,
        max_spend: json.max_spend,
    };
    store::insert_profile(&client, profile).await?;
    Ok(HttpResponse::Ok().body("User registered"))
}

#[derive(Deserialize, Serialize)]
struct LoginJson {
    nickname: String,
    password: String,
}

#[post("/users/login")]
async fn login(
    client: web::Data<Client>,
    json: web::Json<LoginJson>,
) -> ChipinResult<HttpResponse> {
    let json = json.into_inner();
    let profile = store::find_profile(&client, &json.nickname)
        .await?
        .ok_or(ChipinError::InvalidCredentials)?;
    if auth::password_digest(&json.nickname, &json.password) != profile.password_digest {
        return Err(ChipinError::InvalidCredentials);
    }
    let secret = std::env::var("SESSION_SECRET")
        .map_err(|_| ChipinError::Internal("SESSION_SECRET is not set".to_string()))?;
    let token = auth::issue_token(
        &profile.nickname,
        Utc::now().timestamp().to_string(),
        &secret,
    );
    Ok(HttpResponse::Ok().json(token))
}

#[derive(Deserialize, Serialize)]
struct TopUpJson {
    amount: f64,
}

#[post("/users/top_up")]
async fn top_up(
    client: web::Data<Client>,
    request: HttpRequest,
    json: web::Json<TopUpJson>,
) -> ChipinResult<HttpResponse> {
    let nickname = current_user(&request)?;
    if json.amount < 0.0 {
        return Err(ChipinError::Validation(
            "amount must not be negative".to_string(),
        ));
    }
    let mut profile = store::load_profile(&client, &nickname).await?;
    profile.max_spend += json.amount;
    store::save_profile(&client, &profile).await?;
    Ok(HttpResponse::Ok().json(profile.max_spend))
}

#[derive(Deserialize, Serialize)]
struct GroupNameJson {
    name: String,
}

#[get("/groups")]
async fn list_groups(client: web::Data<Client>, request: HttpRequest) -> ChipinResult<HttpResponse> {
    let nickname = current_user(&request)?;
    let groups = store::groups_of(&client, &nickname).await?;
    Ok(HttpResponse::Ok().json(groups))
}

#[put("/groups/{id}")]
async fn add_group(
    client: web::Data<Client>,
    request: HttpRequest,
    id: web::Path<String>,
    json: web::Json<GroupNameJson>,
) -> ChipinResult<HttpResponse> {
    let nickname = current_user(&request)?;
    let id = id.into_inner();
    if store::find_group(&client, &id).await?.is_some() {
        return Err(ChipinError::Validation(
            "This group id is already taken".to_string(),
        ));
    }
    let group = Group::new(id, json.into_inner().name, nickname);
    let name = group.name.clone();
    store::insert_group(&client, group).await?;
    info!(group = %name, "group created");
    Ok(HttpResponse::Ok().body(format!("Group \"{}\" created successfully!", name)))
}

#[get("/groups/{id}")]
async fn get_group(client: web::Data<Client>, id: web::Path<String>) -> ChipinResult<HttpResponse> {
    let group = store::load_group(&client, &id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(group))
}

#[delete("/groups/{id}")]
async fn delete_group(
    client: web::Data<Client>,
    request: HttpRequest,
    id: web::Path<String>,
) -> ChipinResult<HttpResponse> {
    let nickname = current_user(&request)?;
    let group = store::load_group(&client, &id.into_inner()).await?;
    if nickname != group.admin {
        return Err(ChipinError::NotAuthorized);
    }
    store::delete_group(&client, &group.id).await?;
    Ok(HttpResponse::Ok().body(format!("Group \"{}\" has been deleted.", group.name)))
}

#[derive(Deserialize, Serialize)]
struct InviteJson {
    nickname: String,
}

#[post("/groups/{id}/invites")]
async fn invite_member(
    client: web::Data<Client>,
    request: HttpRequest,
    id: web::Path<String>,
    json: web::Json<InviteJson>,
) -> ChipinResult<HttpResponse> {
    let inviter = current_user(&request)?;
    let target = json.into_inner().nickname;
    let mut group = store::load_group(&client, &id.into_inner()).await?;
    // Only registered users can be invited.
    store::load_profile(&client, &target).await?;
    membership::invite(&mut group, &inviter, &target)?;
    store::save_group(&client, &group).await?;
    notify::send(&notify::invitation_email(&group, &target, &inviter));
    Ok(HttpResponse::Ok().body(format!("Invitation sent to {}", target)))
}

#[post("/groups/{id}/invites/accept")]
async fn accept_invite(
    client: web::Data<Client>,
    request: HttpRequest,
    id: web::Path<String>,
) -> ChipinResult<HttpResponse> {
    let nickname = current_user(&request)?;
    let mut group = store::load_group(&client, &id.into_inner()).await?;
    let outcome = membership::accept_invite(&mut group, &nickname)?;
    refresh_event_statuses(&client, &mut group).await?;
    store::save_group(&client, &group).await?;
    match outcome {
        AcceptOutcome::Accepted => {
            info!(group = %group.id, user = %nickname, "invite accepted");
            Ok(HttpResponse::Ok().body(format!("You have joined \"{}\"", group.name)))
        }
        AcceptOutcome::AlreadyMember => {
            Ok(HttpResponse::Ok().body("Already a member of this group"))
        }
    }
}

#[post("/groups/{id}/requests")]
async fn request_membership(
    client: web::Data<Client>,
    request: HttpRequest,
    id: web::Path<String>,
) -> ChipinResult<HttpResponse> {
    let nickname = current_user(&request)?;
    let mut group = store::load_group(&client, &id.into_inner()).await?;
    consensus::request_to_join(&mut group, &nickname, Utc::now())?;
    store::save_group(&client, &group).await?;
    info!(group = %group.id, user = %nickname, "join request opened");
    Ok(HttpResponse::Ok().body(format!("Request to join \"{}\" submitted", group.name)))
}

#[delete("/groups/{id}/requests/{nick}")]
async fn withdraw_join_request(
    client: web::Data<Client>,
    request: HttpRequest,
    path: web::Path<(String, String)>,
) -> ChipinResult<HttpResponse> {
    let acting_user = current_user(&request)?;
    let (group_id, owner) = path.into_inner();
    let mut group = store::load_group(&client, &group_id).await?;
    membership::withdraw_request(&mut group, &owner, &acting_user)?;
    store::save_group(&client, &group).await?;
    Ok(HttpResponse::Ok().body("Join request withdrawn"))
}

#[post("/groups/{id}/requests/{nick}/votes")]
async fn vote_on_join_request(
    client: web::Data<Client>,
    request: HttpRequest,
    path: web::Path<(String, String)>,
) -> ChipinResult<HttpResponse> {
    let voter = current_user(&request)?;
    let (group_id, requester) = path.into_inner();
    let mut group = store::load_group(&client, &group_id).await?;
    let position = group
        .requests
        .iter()
        .position(|join_request| join_request.user == requester)
        .ok_or(ChipinError::NoSuchRequest)?;
    let outcome =
        consensus::register_vote(&mut group.requests[position], &voter, &mut group.members)?;
    if outcome == VoteOutcome::Approved {
        // Approved requests leave the ledger; the new member changes every
        // event's share. A pending invite for the same user is resolved too.
        group.requests.remove(position);
        group.invited.remove(&requester);
        refresh_event_statuses(&client, &mut group).await?;
    }
    store::save_group(&client, &group).await?;
    info!(group = %group.id, %requester, %voter, ?outcome, "vote registered");
    match outcome {
        VoteOutcome::Approved => Ok(HttpResponse::Ok()
            .body(format!("{} has been admitted to \"{}\"", requester, group.name))),
        VoteOutcome::Recorded => Ok(HttpResponse::Ok().body("Vote recorded")),
    }
}

#[post("/groups/{id}/leave")]
async fn leave_group(
    client: web::Data<Client>,
    request: HttpRequest,
    id: web::Path<String>,
) -> ChipinResult<HttpResponse> {
    let nickname = current_user(&request)?;
    let mut group = store::load_group(&client, &id.into_inner()).await?;
    membership::leave_group(&mut group, &nickname)?;
    refresh_event_statuses(&client, &mut group).await?;
    store::save_group(&client, &group).await?;
    info!(group = %group.id, user = %nickname, "member left");
    Ok(HttpResponse::Ok().body(format!("You have left \"{}\"", group.name)))
}

#[derive(Deserialize, Serialize)]
struct EventJson {
    name: String,
    date: DateTime<Utc>,
    total_spend: f64,
}

#[derive(Serialize)]
struct EventQuoteJson {
    share: f64,
    status: EventStatus,
    event: Event,
}

#[put("/groups/{id}/events/{event_id}")]
async fn add_event(
    client: web::Data<Client>,
    request: HttpRequest,
    path: web::Path<(String, String)>,
    json: web::Json<EventJson>,
) -> ChipinResult<HttpResponse> {
    let nickname = current_user(&request)?;
    let (group_id, event_id) = path.into_inner();
    let json = json.into_inner();
    if json.total_spend < 0.0 {
        return Err(ChipinError::Validation(
            "total_spend must not be negative".to_string(),
        ));
    }
    let mut group = store::load_group(&client, &group_id).await?;
    if !group.members.contains(&nickname) {
        return Err(ChipinError::NotAMember);
    }
    if group.events.iter().any(|event| event.id == event_id) {
        return Err(ChipinError::Validation(
            "This event id is already taken".to_string(),
        ));
    }
    let ceilings = store::ceilings_of(&client, &group.members).await?;
    let mut event = Event {
        id: event_id,
        name: json.name,
        date: json.date,
        total_spend: json.total_spend,
        status: EventStatus::Pending,
        created_by: nickname,
        members: HashSet::new(),
    };
    event.status = compute_status(&event, &group.members, &ceilings).status;
    info!(group = %group.id, event = %event.id, status = ?event.status, "event created");
    group.events.push(event);
    store::save_group(&client, &group).await?;
    Ok(HttpResponse::Ok().body("Event added"))
}

#[get("/groups/{id}/events/{event_id}")]
async fn get_event(
    client: web::Data<Client>,
    path: web::Path<(String, String)>,
) -> ChipinResult<HttpResponse> {
    let (group_id, event_id) = path.into_inner();
    let group = store::load_group(&client, &group_id).await?;
    let ceilings = store::ceilings_of(&client, &group.members).await?;
    let event = group
        .events
        .iter()
        .find(|event| event.id == event_id)
        .ok_or(ChipinError::NotFound("event"))?;
    let quote = compute_status(event, &group.members, &ceilings);
    Ok(HttpResponse::Ok().json(EventQuoteJson {
        share: quote.share,
        status: quote.status,
        event: event.clone(),
    }))
}

#[derive(Deserialize, Serialize)]
struct SpendJson {
    total_spend: f64,
}

#[post("/groups/{id}/events/{event_id}/spend")]
async fn update_event_spend(
    client: web::Data<Client>,
    request: HttpRequest,
    path: web::Path<(String, String)>,
    json: web::Json<SpendJson>,
) -> ChipinResult<HttpResponse> {
    let nickname = current_user(&request)?;
    let (group_id, event_id) = path.into_inner();
    if json.total_spend < 0.0 {
        return Err(ChipinError::Validation(
            "total_spend must not be negative".to_string(),
        ));
    }
    let mut group = store::load_group(&client, &group_id).await?;
    if !group.members.contains(&nickname) {
        return Err(ChipinError::NotAMember);
    }
    let ceilings = store::ceilings_of(&client, &group.members).await?;
    let event = group
        .events
        .iter_mut()
        .find(|event| event.id == event_id)
        .ok_or(ChipinError::NotFound("event"))?;
    event.total_spend = json.total_spend;
    let quote = compute_status(event, &group.members, &ceilings);
    event.status = quote.status;
    store::save_group(&client, &group).await?;
    Ok(HttpResponse::Ok().json(quote))
}

#[post("/groups/{id}/events/{event_id}/join")]
async fn join_event(
    client: web::Data<Client>,
    request: HttpRequest,
    path: web::Path<(String, String)>,
) -> ChipinResult<HttpResponse> {
    let nickname = current_user(&request)?;
    let (group_id, event_id) = path.into_inner();
    let mut group = store::load_group(&client, &group_id).await?;
    let ceilings = store::ceilings_of(&client, &group.members).await?;
    let event = group
        .events
        .iter_mut()
        .find(|event| event.id == event_id)
        .ok_or(ChipinError::NotFound("event"))?;
    affordability::join_event(event, &group.members, &nickname, &ceilings)?;
    event.status = compute_status(event, &group.members, &ceilings).status;
    store::save_group(&client, &group).await?;
    Ok(HttpResponse::Ok().body("You have joined the event"))
}

#[post("/groups/{id}/events/{event_id}/depart")]
async fn depart_event(
    client: web::Data<Client>,
    request: HttpRequest,
    path: web::Path<(String, String)>,
) -> ChipinResult<HttpResponse> {
    let nickname = current_user(&request)?;
    let (group_id, event_id) = path.into_inner();
    let mut group = store::load_group(&client, &group_id).await?;
    let ceilings = store::ceilings_of(&client, &group.members).await?;
    let event = group
        .events
        .iter_mut()
        .find(|event| event.id == event_id)
        .ok_or(ChipinError::NotFound("event"))?;
    affordability::leave_event(event, &nickname)?;
    event.status = compute_status(event, &group.members, &ceilings).status;
    store::save_group(&client, &group).await?;
    Ok(HttpResponse::Ok().body("You have left the event"))
}

#[delete("/groups/{id}/events/{event_id}")]
async fn delete_event(
    client: web::Data<Client>,
    request: HttpRequest,
    path: web::Path<(String, String)>,
) -> ChipinResult<HttpResponse> {
    let nickname = current_user(&request)?;
    let (group_id, event_id) = path.into_inner();
    let mut group = store::load_group(&client, &group_id).await?;
    let position = group
        .events
        .iter()
        .position(|event| event.id == event_id)
        .ok_or(ChipinError::NotFound("event"))?;
    if nickname != group.admin && nickname != group.events[position].created_by {
        return Err(ChipinError::NotAuthorized);
    }
    group.events.remove(position);
    store::save_group(&client, &group).await?;
    Ok(HttpResponse::Ok().body("Event deleted"))
}

#[derive(Deserialize, Serialize)]
struct CommentJson {
    text: String,
}

#[post("/groups/{id}/comments")]
async fn add_comment(
    client: web::Data<Client>,
    request: HttpRequest,
    id: web::Path<String>,
    json: web::Json<CommentJson>,
) -> ChipinResult<HttpResponse> {
    let nickname = current_user(&request)?;
    let mut group = store::load_group(&client, &id.into_inner()).await?;
    if !group.members.contains(&nickname) {
        return Err(ChipinError::NotAMember);
    }
    let now = Utc::now();
    group.comments.push(Comment {
        id: now.timestamp_millis().to_string(),
        author: nickname,
        text: json.into_inner().text,
        created_at: now,
    });
    store::save_group(&client, &group).await?;
    Ok(HttpResponse::Ok().body("Comment added"))
}

#[put("/groups/{id}/comments/{comment_id}")]
async fn edit_comment(
    client: web::Data<Client>,
    request: HttpRequest,
    path: web::Path<(String, String)>,
    json: web::Json<CommentJson>,
) -> ChipinResult<HttpResponse> {
    let nickname = current_user(&request)?;
    let (group_id, comment_id) = path.into_inner();
    let mut group = store::load_group(&client, &group_id).await?;
    let comment = group
        .comments
        .iter_mut()
        .find(|comment| comment.id == comment_id)
        .ok_or(ChipinError::NotFound("comment"))?;
    if comment.author != nickname {
        return Err(ChipinError::NotAuthorized);
    }
    comment.text = json.into_inner().text;
    store::save_group(&client, &group).await?;
    Ok(HttpResponse::Ok().body("Comment updated"))
}

#[delete("/groups/{id}/comments/{comment_id}")]
async fn delete_comment(
    client: web::Data<Client>,
    request: HttpRequest,
    path: web::Path<(String, String)>,
) -> ChipinResult<HttpResponse> {
    let nickname = current_user(&request)?;
    let (group_id, comment_id) = path.into_inner();
    let mut group = store::load_group(&client, &group_id).await?;
    let position = group
        .comments
        .iter()
        .position(|comment| comment.id == comment_id)
        .ok_or(ChipinError::NotFound("comment"))?;
    if nickname != group.comments[position].author && nickname != group.admin {
        return Err(ChipinError::NotAuthorized);
    }
    group.comments.remove(position);
    store::save_group(&client, &group).await?;
    Ok(HttpResponse::Ok().body("Comment deleted"))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let uri = std::env::var("MONGODB_URI").expect("You need to add the MONGODB_URI to the env");
    info!("Using the following URI: {}", uri);

    let client = Client::with_uri_str(uri).await.expect("failed to connect");
    info!("Connected");

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .app_data(web::Data::new(client.clone()))
            .service(register)
            .service(login)
            .service(top_up)
            .service(list_groups)
            .service(add_group)
            .service(get_group)
            .service(delete_group)
            .service(invite_member)
            .service(accept_invite)
            .service(request_membership)
            .service(withdraw_join_request)
            .service(vote_on_join_request)
            .service(leave_group)
            .service(add_event)
            .service(get_event)
            .service(update_event_spend)
            .service(join_event)
            .service(depart_event)
            .service(delete_event)
            .service(add_comment)
            .service(edit_comment)
            .service(delete_comment)
    })
    .bind(("0.0.0.0", 8080))?
    .run()
    .await
}
