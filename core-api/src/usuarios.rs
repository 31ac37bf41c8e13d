//! Account endpoints: profile (`/users/profile`), password change and
//! preferences (`/usuario/...`)

use crate::ensure_session;
use crate::error::Result;
use crate::models::{
    ChangePasswordDto, UpdatePreferencesDto, UpdateProfileDto, UserPreferences, UserProfile,
};
use core_auth::AuthenticatedClient;
use tracing::{info, instrument};

const PROFILE_PATH: &str = "/users/profile";
const CHANGE_PASSWORD_PATH: &str = "/usuario/change-password";
const PREFERENCES_PATH: &str = "/usuario/preferences";

#[derive(Debug, Clone)]
pub struct UsuariosApi {
    client: AuthenticatedClient,
}

impl UsuariosApi {
    pub fn new(client: AuthenticatedClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self))]
    pub async fn profile(&self) -> Result<UserProfile> {
        ensure_session(&self.client).await?;
        Ok(self.client.get(PROFILE_PATH).await?)
    }

    #[instrument(skip(self, dto))]
    pub async fn update_profile(&self, dto: &UpdateProfileDto) -> Result<UserProfile> {
        ensure_session(&self.client).await?;
        Ok(self.client.put(PROFILE_PATH, dto).await?)
    }

    /// Changes the password of the signed-in user after local validation.
    #[instrument(skip(self, dto))]
    pub async fn change_password(&self, dto: &ChangePasswordDto) -> Result<()> {
        dto.validate()?;
        ensure_session(&self.client).await?;
        self.client.post_no_content(CHANGE_PASSWORD_PATH, dto).await?;
        info!("Password changed");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn preferences(&self) -> Result<UserPreferences> {
        ensure_session(&self.client).await?;
        Ok(self.client.get(PREFERENCES_PATH).await?)
    }

    #[instrument(skip(self, dto))]
    pub async fn update_preferences(&self, dto: &UpdatePreferencesDto) -> Result<UserPreferences> {
        ensure_session(&self.client).await?;
        Ok(self.client.put(PREFERENCES_PATH, dto).await?)
    }
}
