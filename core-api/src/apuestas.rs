//! Bets endpoints (`/apuestas`)

use crate::error::Result;
use crate::models::{Apuesta, CreateApuestaDto, UpdateApuestaDto};
use crate::{ensure_session, resource_path};
use core_auth::AuthenticatedClient;
use tracing::{debug, info, instrument};

const APUESTAS_PATH: &str = "/apuestas";

/// Typed access to the user's bets.
#[derive(Debug, Clone)]
pub struct ApuestasApi {
    client: AuthenticatedClient,
}

impl ApuestasApi {
    pub fn new(client: AuthenticatedClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Apuesta>> {
        ensure_session(&self.client).await?;
        let apuestas: Vec<Apuesta> = self.client.get(APUESTAS_PATH).await?;
        debug!(count = apuestas.len(), "Fetched bets");
        Ok(apuestas)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<Apuesta> {
        ensure_session(&self.client).await?;
        Ok(self.client.get(&resource_path(APUESTAS_PATH, id)).await?)
    }

    /// Submits a new bet after local validation.
    #[instrument(skip(self, dto), fields(partidos = dto.partidos.len()))]
    pub async fn create(&self, dto: &CreateApuestaDto) -> Result<Apuesta> {
        dto.validate()?;
        ensure_session(&self.client).await?;
        let apuesta: Apuesta = self.client.post(APUESTAS_PATH, dto).await?;
        info!(id = %apuesta.id, "Bet created");
        Ok(apuesta)
    }

    #[instrument(skip(self, dto))]
    pub async fn update(&self, id: &str, dto: &UpdateApuestaDto) -> Result<Apuesta> {
        ensure_session(&self.client).await?;
        Ok(self.client.put(&resource_path(APUESTAS_PATH, id), dto).await?)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<()> {
        ensure_session(&self.client).await?;
        self.client.delete(&resource_path(APUESTAS_PATH, id)).await?;
        info!(%id, "Bet deleted");
        Ok(())
    }
}
