use chrono::Utc;
use serde_json::Value;

use super::{guarded, Outcome};
use crate::backend::{maybe_single, single, tables, to_row, FileStorage, Filter, RemoteTable, Select};
use crate::error::ApiError;
use crate::models::{Profile, ProfilePatch};

/// Fetch the caller's profile. A user who never saved one gets `None`.
pub async fn get_profile(remote: &dyn RemoteTable, user_id: &str) -> Outcome<Option<Profile>> {
  guarded("get_profile", async {
    let rows = remote
      .select(tables::PROFILES, &Select::new().eq("id", user_id).limit(1))
      .await?;
    maybe_single(rows)
  })
  .await
}

/// Create or replace the caller's profile. The row id is always the caller.
pub async fn upsert_profile(
  remote: &dyn RemoteTable,
  user_id: &str,
  profile: &Profile,
) -> Outcome<Profile> {
  guarded("upsert_profile", async {
    let mut row = profile.clone();
    row.id = user_id.to_string();
    row.updated_at = Some(Utc::now());
    let rows = remote
      .upsert(tables::PROFILES, vec![to_row(&row)?], "id")
      .await?;
    single(rows)
  })
  .await
}

/// Apply a partial update to the caller's profile.
pub async fn update_profile(
  remote: &dyn RemoteTable,
  user_id: &str,
  patch: &ProfilePatch,
) -> Outcome<Profile> {
  guarded("update_profile", async {
    if patch.is_empty() {
      return Err(ApiError::validation("Nothing to update"));
    }
    let mut body = to_row(patch)?;
    if let Value::Object(map) = &mut body {
      map.insert("updated_at".into(), Value::String(Utc::now().to_rfc3339()));
    }
    let rows = remote
      .update(tables::PROFILES, &[Filter::eq("id", user_id)], body)
      .await?;
    single(rows).map_err(|_| ApiError::not_found("Save your profile before editing it"))
  })
  .await
}

/// Upload a profile picture and point the profile at it.
///
/// This is the one data call that needs two round trips: the object upload
/// and the profile update.
pub async fn upload_avatar(
  remote: &dyn RemoteTable,
  files: &dyn FileStorage,
  bucket: &str,
  user_id: &str,
  file_name: &str,
  bytes: Vec<u8>,
) -> Outcome<Profile> {
  let mime = mime_guess::from_path(file_name).first_or_octet_stream();
  if mime.type_() != mime_guess::mime::IMAGE {
    return Outcome::fail(ApiError::validation(format!(
      "{} is not an image ({})",
      file_name, mime
    )));
  }
  if bytes.is_empty() {
    return Outcome::fail(ApiError::validation("Image file is empty"));
  }

  let ext = mime.subtype().as_str().to_string();
  let path = format!("{}/avatar.{}", user_id, ext);
  let url = match guarded(
    "upload_avatar",
    files.upload(bucket, &path, bytes, mime.essence_str()),
  )
  .await
  .into_result()
  {
    Ok(url) => url,
    Err(e) => return Outcome::fail(e),
  };

  let patch = ProfilePatch {
    avatar_url: Some(url),
    ..Default::default()
  };
  update_profile(remote, user_id, &patch).await
}
