//! Profile and family directory.
//!
//! This is the piece of the identity story the ledger depends on: resolving
//! a user id to a profile and a shared family. Credentials, sessions and
//! tokens stay with the external identity provider and never appear here.

use anyhow::{anyhow, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::domain::ActivityService;
use crate::storage::DirectoryStore;
use shared::{Family, IdentitySnapshot, Profile};

#[derive(Clone)]
pub struct FamilyService {
    directory: Arc<dyn DirectoryStore>,
    activity: Option<ActivityService>,
}

impl FamilyService {
    pub fn new(directory: Arc<dyn DirectoryStore>) -> Self {
        Self {
            directory,
            activity: None,
        }
    }

    pub fn with_activity(mut self, activity: ActivityService) -> Self {
        self.activity = Some(activity);
        self
    }

    /// Create a new family with a generated join code.
    pub async fn create_family(&self) -> Result<Family> {
        let family = Family {
            id: shared::new_record_id(),
            code: generate_join_code(),
            created_at: Utc::now().to_rfc3339(),
        };

        self.directory.insert_family(&family).await?;
        info!("created family {} with code {}", family.id, family.code);
        Ok(family)
    }

    pub async fn find_family_by_code(&self, code: &str) -> Result<Option<Family>> {
        self.directory.find_family_by_code(code).await
    }

    /// Register a profile for a user. With a join code the user lands in
    /// that family; without one a fresh family is created for them.
    pub async fn create_profile(
        &self,
        user_id: &str,
        name: &str,
        family_code: Option<&str>,
    ) -> Result<Profile> {
        let family = match family_code {
            Some(code) => self
                .directory
                .find_family_by_code(code)
                .await?
                .ok_or_else(|| anyhow!("family code '{}' not found", code))?,
            None => self.create_family().await?,
        };

        let now = Utc::now().to_rfc3339();
        let profile = Profile {
            id: user_id.to_string(),
            name: name.to_string(),
            family_id: Some(family.id.clone()),
            created_at: now.clone(),
            updated_at: now,
        };
        self.directory.insert_profile(&profile).await?;

        if let Some(activity) = &self.activity {
            activity
                .record(user_id, &family.id, "signup", "Conta criada")
                .await;
        }

        Ok(profile)
    }

    /// Resolve a user id into the snapshot the ledger activates with.
    /// Missing pieces resolve to `None` rather than erroring: a user with no
    /// profile (or a profile with no family) simply has no data to load.
    pub async fn fetch_identity(&self, user_id: &str) -> Result<IdentitySnapshot> {
        let profile = self.directory.find_profile(user_id).await?;

        let family = match profile.as_ref().and_then(|p| p.family_id.clone()) {
            Some(family_id) => self.directory.find_family(&family_id).await?,
            None => None,
        };

        Ok(IdentitySnapshot {
            user_id: Some(user_id.to_string()),
            profile,
            family,
            loading: false,
        })
    }

    pub async fn update_profile_name(&self, user_id: &str, name: &str) -> Result<Profile> {
        let mut profile = self
            .directory
            .find_profile(user_id)
            .await?
            .ok_or_else(|| anyhow!("no profile for user '{}'", user_id))?;

        profile.name = name.to_string();
        profile.updated_at = Utc::now().to_rfc3339();
        self.directory.update_profile(&profile).await?;

        if let Some(activity) = &self.activity {
            if let Some(family_id) = &profile.family_id {
                activity
                    .record(user_id, family_id, "update_profile", "Perfil atualizado")
                    .await;
            }
        }

        Ok(profile)
    }

    /// Move a user into the family matching `code`. The caller must
    /// re-activate the ledger afterwards so the old family's data is
    /// discarded and the new family's records load.
    pub async fn join_family(&self, user_id: &str, code: &str) -> Result<Family> {
        let family = self
            .directory
            .find_family_by_code(code)
            .await?
            .ok_or_else(|| anyhow!("family code '{}' not found", code))?;

        let mut profile = self
            .directory
            .find_profile(user_id)
            .await?
            .ok_or_else(|| anyhow!("no profile for user '{}'", user_id))?;

        profile.family_id = Some(family.id.clone());
        profile.updated_at = Utc::now().to_rfc3339();
        self.directory.update_profile(&profile).await?;

        if let Some(activity) = &self.activity {
            activity
                .record(user_id, &family.id, "join_family", "Ingressou em nova família")
                .await;
        }

        info!("user {} joined family {}", user_id, family.id);
        Ok(family)
    }
}

/// Short, human-typable join code: 8 uppercase hex characters.
fn generate_join_code() -> String {
    uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(8)
        .collect::<String>()
        .to_uppercase()
}
