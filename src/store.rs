use std::collections::HashSet;

use futures::TryStreamExt;
use mongodb::{bson::doc, Client, Collection};

use crate::affordability::Ceilings;
use crate::error::{ChipinError, ChipinResult};
use crate::schemas::{Group, Profile, UserNick};

const DATABASE: &str = "Chipin";

fn groups(client: &Client) -> Collection<Group> {
    client.database(DATABASE).collection("Groups")
}

fn profiles(client: &Client) -> Collection<Profile> {
    client.database(DATABASE).collection("Profiles")
}

pub async fn insert_group(client: &Client, group: Group) -> ChipinResult<()> {
    groups(client)
        .insert_one(group, None)
        .await
        .map_err(into_database_error)?;
    Ok(())
}

pub async fn find_group(client: &Client, id: &str) -> ChipinResult<Option<Group>> {
    groups(client)
        .find_one(doc! { "id": id }, None)
        .await
        .map_err(into_database_error)
}

pub async fn load_group(client: &Client, id: &str) -> ChipinResult<Group> {
    find_group(client, id)
        .await?
        .ok_or(ChipinError::NotFound("group"))
}

/// Persists the whole aggregate in one document replacement.
pub async fn save_group(client: &Client, group: &Group) -> ChipinResult<()> {
    groups(client)
        .replace_one(doc! { "id": &group.id }, group, None)
        .await
        .map_err(into_database_error)?;
    Ok(())
}

pub async fn delete_group(client: &Client, id: &str) -> ChipinResult<()> {
    groups(client)
        .delete_one(doc! { "id": id }, None)
        .await
        .map_err(into_database_error)?;
    Ok(())
}

/// All groups the user belongs to.
pub async fn groups_of(client: &Client, nickname: &UserNick) -> ChipinResult<Vec<Group>> {
    let cursor = groups(client)
        .find(doc! { "members": nickname }, None)
        .await
        .map_err(into_database_error)?;
    cursor.try_collect().await.map_err(into_database_error)
}

pub async fn insert_profile(client: &Client, profile: Profile) -> ChipinResult<()> {
    profiles(client)
        .insert_one(profile, None)
        .await
        .map_err(into_database_error)?;
    Ok(())
}

pub async fn find_profile(client: &Client, nickname: &str) -> ChipinResult<Option<Profile>> {
    profiles(client)
        .find_one(doc! { "nickname": nickname }, None)
        .await
        .map_err(into_database_error)
}

pub async fn load_profile(client: &Client, nickname: &str) -> ChipinResult<Profile> {
    find_profile(client, nickname)
        .await?
        .ok_or(ChipinError::NotFound("user"))
}

pub async fn save_profile(client: &Client, profile: &Profile) -> ChipinResult<()> {
    profiles(client)
        .replace_one(doc! { "nickname": &profile.nickname }, profile, None)
        .await
        .map_err(into_database_error)?;
    Ok(())
}

/// Builds the nickname → spending ceiling lookup for a member set in one
/// query, so the engines never go back to storage mid-computation.
pub async fn ceilings_of(
    client: &Client,
    members: &HashSet<UserNick>,
) -> ChipinResult<Ceilings> {
    let nicknames: Vec<&str> = members.iter().map(String::as_str).collect();
    let cursor = profiles(client)
        .find(doc! { "nickname": { "$in": nicknames } }, None)
        .await
        .map_err(into_database_error)?;
    let member_profiles: Vec<Profile> =
        cursor.try_collect().await.map_err(into_database_error)?;
    Ok(member_profiles
        .into_iter()
        .map(|profile| (profile.nickname, profile.max_spend))
        .collect())
}

fn into_database_error(err: mongodb::error::Error) -> ChipinError {
    ChipinError::Database(err.to_string())
}
