//! Backend resource types
//!
//! Field names follow the backend's JSON (Spanish, camelCase).

use crate::error::{ApiError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Predicted or actual outcome of a match: home win, draw or away win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pronostico {
    #[serde(rename = "1")]
    Local,
    #[serde(rename = "X")]
    Empate,
    #[serde(rename = "2")]
    Visitante,
}

impl Pronostico {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pronostico::Local => "1",
            Pronostico::Empate => "X",
            Pronostico::Visitante => "2",
        }
    }
}

impl fmt::Display for Pronostico {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstadoApuesta {
    Pendiente,
    Ganada,
    Perdida,
}

/// A match inside a bet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partido {
    pub id: String,
    pub local: String,
    pub visitante: String,
    pub apuesta: Pronostico,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resultado: Option<Pronostico>,
}

impl Partido {
    /// `Some(true)` if the prediction matched, `None` while unplayed.
    pub fn acertado(&self) -> Option<bool> {
        self.resultado.map(|resultado| resultado == self.apuesta)
    }
}

/// A submitted prediction pool ("quiniela").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Apuesta {
    pub id: String,
    /// Submission date as sent by the backend
    pub fecha: String,
    #[serde(default)]
    pub partidos: Vec<Partido>,
    pub estado: EstadoApuesta,
    pub monto: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ganancia: Option<f64>,
}

impl Apuesta {
    pub fn aciertos(&self) -> usize {
        self.partidos
            .iter()
            .filter(|partido| partido.acertado() == Some(true))
            .count()
    }
}

/// Match of a new bet; the backend assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NuevoPartido {
    pub local: String,
    pub visitante: String,
    pub apuesta: Pronostico,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resultado: Option<Pronostico>,
}

impl NuevoPartido {
    pub fn new(local: impl Into<String>, visitante: impl Into<String>, apuesta: Pronostico) -> Self {
        Self {
            local: local.into(),
            visitante: visitante.into(),
            apuesta,
            resultado: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateApuestaDto {
    pub partidos: Vec<NuevoPartido>,
    pub monto: f64,
}

impl CreateApuestaDto {
    /// Rejects empty bets and non-positive stakes before they reach the backend.
    pub fn validate(&self) -> Result<()> {
        if self.partidos.is_empty() {
            return Err(ApiError::Validation(
                "a bet needs at least one match".to_string(),
            ));
        }
        if !self.monto.is_finite() || self.monto <= 0.0 {
            return Err(ApiError::Validation(format!(
                "stake must be positive, got {}",
                self.monto
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateApuestaDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estado: Option<EstadoApuesta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ganancia: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub nombre: String,
    pub saldo: f64,
    #[serde(default)]
    pub apuestas_ganadas: u32,
    #[serde(default)]
    pub apuestas_perdidas: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateProfileDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nombre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saldo: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreferences {
    pub theme: Theme,
    pub notifications: bool,
    /// Language tag, e.g. `ca` or `es`
    pub language: String,
}

/// Partial preferences update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePreferencesDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notifications: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordDto {
    pub current_password: String,
    pub new_password: String,
}

impl ChangePasswordDto {
    pub fn new(current_password: impl Into<String>, new_password: impl Into<String>) -> Self {
        Self {
            current_password: current_password.into(),
            new_password: new_password.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.new_password.trim().is_empty() {
            return Err(ApiError::Validation("new password must not be empty".to_string()));
        }
        if self.new_password == self.current_password {
            return Err(ApiError::Validation(
                "new password must differ from the current one".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for ChangePasswordDto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangePasswordDto")
            .field("current_password", &"[REDACTED]")
            .field("new_password", &"[REDACTED]")
            .finish()
    }
}
