use rusqlite::params;

use postspace_shared::{Coordinates, Profile, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::rows::{format_ts, now, parse_ts, parse_uuid};

const PROFILE_COLUMNS: &str =
    "id, username, profile_picture, tag, bio, point_x, point_y, point_z, created_at";

/// A profile row to create. `id` is the owner's identity.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProfile {
    pub id: UserId,
    pub username: String,
    pub profile_picture: Option<String>,
    pub tag: Option<String>,
    pub bio: Option<String>,
    pub coordinates: Option<Coordinates>,
}

impl NewProfile {
    pub fn new(id: UserId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            profile_picture: None,
            tag: None,
            bio: None,
            coordinates: None,
        }
    }
}

/// Partial update. `None` leaves a column untouched; `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileChanges {
    pub username: Option<String>,
    pub profile_picture: Option<Option<String>>,
    pub tag: Option<Option<String>>,
    pub bio: Option<Option<String>>,
}

impl ProfileChanges {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.profile_picture.is_none()
            && self.tag.is_none()
            && self.bio.is_none()
    }
}

impl Database {
    /// Create a profile. Fails with [`StoreError::Conflict`] if the id or
    /// username is already in use.
    pub fn insert_profile(&self, new: &NewProfile) -> Result<Profile> {
        let profile = Profile {
            id: new.id,
            username: new.username.clone(),
            profile_picture: new.profile_picture.clone(),
            tag: new.tag.clone(),
            bio: new.bio.clone(),
            coordinates: new.coordinates,
            created_at: now(),
        };

        self.conn().execute(
            "INSERT INTO profile (id, username, profile_picture, tag, bio,
                                  point_x, point_y, point_z, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                profile.id.to_string(),
                profile.username,
                profile.profile_picture,
                profile.tag,
                profile.bio,
                profile.coordinates.map(|c| c.x),
                profile.coordinates.map(|c| c.y),
                profile.coordinates.map(|c| c.z),
                format_ts(&profile.created_at),
            ],
        )?;

        tracing::info!(user = %profile.id.short(), username = %profile.username, "profile created");

        Ok(profile)
    }

    pub fn get_profile_by_username(&self, username: &str) -> Result<Profile> {
        self.conn()
            .query_row(
                &format!("SELECT {PROFILE_COLUMNS} FROM profile WHERE username = ?1"),
                params![username],
                row_to_profile,
            )
            .map_err(StoreError::not_found_as("profile"))
    }

    pub fn get_profile_by_id(&self, id: UserId) -> Result<Profile> {
        self.conn()
            .query_row(
                &format!("SELECT {PROFILE_COLUMNS} FROM profile WHERE id = ?1"),
                params![id.to_string()],
                row_to_profile,
            )
            .map_err(StoreError::not_found_as("profile"))
    }

    /// Apply `changes` to the profile owned by `id` and return the result.
    pub fn update_profile(&self, id: UserId, changes: &ProfileChanges) -> Result<Profile> {
        let current = self.get_profile_by_id(id)?;
        if changes.is_empty() {
            return Ok(current);
        }

        let username = changes.username.clone().unwrap_or(current.username);
        let profile_picture = changes
            .profile_picture
            .clone()
            .unwrap_or(current.profile_picture);
        let tag = changes.tag.clone().unwrap_or(current.tag);
        let bio = changes.bio.clone().unwrap_or(current.bio);

        self.conn().execute(
            "UPDATE profile
             SET username = ?2, profile_picture = ?3, tag = ?4, bio = ?5
             WHERE id = ?1",
            params![id.to_string(), username, profile_picture, tag, bio],
        )?;

        tracing::debug!(user = %id.short(), "profile updated");

        self.get_profile_by_id(id)
    }
}

fn row_to_profile(row: &rusqlite::Row<'_>) -> rusqlite::Result<Profile> {
    let id_str: String = row.get(0)?;
    let x: Option<f64> = row.get(5)?;
    let y: Option<f64> = row.get(6)?;
    let z: Option<f64> = row.get(7)?;
    let ts_str: String = row.get(8)?;
    let picture: Option<String> = row.get(2)?;

    Ok(Profile {
        id: UserId(parse_uuid(0, &id_str)?),
        username: row.get(1)?,
        profile_picture: picture.filter(|s| !s.trim().is_empty()),
        tag: row.get(3)?,
        bio: row.get(4)?,
        coordinates: match (x, y, z) {
            (Some(x), Some(y), Some(z)) => Some(Coordinates::new(x, y, z)),
            _ => None,
        },
        created_at: parse_ts(8, &ts_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_insert_and_lookup() {
        let db = db();
        let id = UserId(Uuid::new_v4());
        let mut new = NewProfile::new(id, "ada");
        new.tag = Some("math".into());
        new.coordinates = Some(Coordinates::new(0.1, 0.2, 0.3));
        let created = db.insert_profile(&new).unwrap();

        assert_eq!(db.get_profile_by_username("ada").unwrap(), created);
        assert_eq!(db.get_profile_by_id(id).unwrap(), created);
    }

    #[test]
    fn test_unknown_username_is_not_found() {
        let db = db();
        assert!(matches!(
            db.get_profile_by_username("nobody"),
            Err(StoreError::NotFound("profile"))
        ));
    }

    #[test]
    fn test_duplicate_username_conflicts() {
        let db = db();
        db.insert_profile(&NewProfile::new(UserId(Uuid::new_v4()), "ada"))
            .unwrap();
        let err = db
            .insert_profile(&NewProfile::new(UserId(Uuid::new_v4()), "ada"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn test_second_profile_for_same_user_conflicts() {
        let db = db();
        let id = UserId(Uuid::new_v4());
        db.insert_profile(&NewProfile::new(id, "ada")).unwrap();
        let err = db.insert_profile(&NewProfile::new(id, "lovelace")).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn test_update_sets_and_clears_fields() {
        let db = db();
        let id = UserId(Uuid::new_v4());
        let mut new = NewProfile::new(id, "ada");
        new.bio = Some("old".into());
        db.insert_profile(&new).unwrap();

        let changes = ProfileChanges {
            tag: Some(Some("engines".into())),
            bio: Some(None),
            ..Default::default()
        };
        let updated = db.update_profile(id, &changes).unwrap();
        assert_eq!(updated.username, "ada");
        assert_eq!(updated.tag.as_deref(), Some("engines"));
        assert!(updated.bio.is_none());
    }

    #[test]
    fn test_update_rename_conflicts_with_taken_username() {
        let db = db();
        let a = UserId(Uuid::new_v4());
        db.insert_profile(&NewProfile::new(a, "ada")).unwrap();
        db.insert_profile(&NewProfile::new(UserId(Uuid::new_v4()), "grace"))
            .unwrap();

        let changes = ProfileChanges {
            username: Some("grace".into()),
            ..Default::default()
        };
        assert!(matches!(
            db.update_profile(a, &changes),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn test_update_missing_profile_is_not_found() {
        let db = db();
        let err = db
            .update_profile(UserId(Uuid::new_v4()), &ProfileChanges::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound("profile")));
    }
}
