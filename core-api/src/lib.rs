//! # Backend API
//!
//! Typed wrappers over the authenticated client for the QuiniCat backend:
//! bets (`/apuestas`), the user profile (`/users/profile`), password change
//! and preferences (`/usuario/...`).
//!
//! Every call requires a backend-authenticated session and fails with
//! [`ApiError::NotAuthenticated`] without touching the network otherwise.
//! Token renewal on 401 is handled by [`core_auth::AuthenticatedClient`].

pub mod apuestas;
pub mod error;
pub mod models;
pub mod usuarios;

pub use apuestas::ApuestasApi;
pub use error::{ApiError, Result};
pub use models::{
    Apuesta, ChangePasswordDto, CreateApuestaDto, EstadoApuesta, NuevoPartido, Partido,
    Pronostico, Theme, UpdateApuestaDto, UpdatePreferencesDto, UpdateProfileDto,
    UserPreferences, UserProfile,
};
pub use usuarios::UsuariosApi;

use core_auth::AuthenticatedClient;

/// Both endpoint groups over one client.
#[derive(Debug, Clone)]
pub struct QuiniCatApi {
    pub apuestas: ApuestasApi,
    pub usuarios: UsuariosApi,
}

impl QuiniCatApi {
    pub fn new(client: AuthenticatedClient) -> Self {
        Self {
            apuestas: ApuestasApi::new(client.clone()),
            usuarios: UsuariosApi::new(client),
        }
    }
}

async fn ensure_session(client: &AuthenticatedClient) -> Result<()> {
    match client.session_store().current_token().await {
        Some(_) => Ok(()),
        None => Err(ApiError::NotAuthenticated),
    }
}

/// `<collection>/<id>` with the id percent-encoded as one segment.
fn resource_path(collection: &str, id: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(id.as_bytes()).collect();
    format!("{}/{}", collection, encoded)
}
