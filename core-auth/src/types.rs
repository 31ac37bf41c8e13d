use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use tracing::warn;

/// Opaque bearer credential issued by the backend.
///
/// The client never parses or trusts it for claims. The `Debug`
/// implementation redacts the value so sessions can be logged safely.
///
/// # Examples
///
/// ```
/// use core_auth::AccessToken;
///
/// let token = AccessToken::new("eyJhbGciOi...");
/// assert_eq!(token.as_str(), "eyJhbGciOi...");
/// assert_eq!(format!("{:?}", token), "AccessToken([REDACTED])");
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value of an `Authorization` header carrying this token
    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

/// Role granted by the backend.
///
/// Serialized as the backend's wire strings; unknown roles are preserved.
///
/// ```
/// use core_auth::Role;
///
/// assert_eq!(Role::parse("ROLE_ADMIN"), Role::Admin);
/// assert_eq!(Role::parse("ROLE_REFEREE").as_str(), "ROLE_REFEREE");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    User,
    Other(String),
}

impl Role {
    pub fn parse(s: &str) -> Self {
        match s {
            "ROLE_ADMIN" => Role::Admin,
            "ROLE_USER" => Role::User,
            other => Role::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "ROLE_ADMIN",
            Role::User => "ROLE_USER",
            Role::Other(s) => s,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Role::parse(&s))
    }
}

/// Identity fields of the signed-in user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    #[serde(
        default,
        deserialize_with = "deserialize_optional_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Avatar URL
    #[serde(default)]
    pub image: Option<String>,
}

/// The authenticated identity held by the client.
///
/// A session with an access token is backend-authenticated. A session with
/// identity fields but no token is only partially authenticated: the identity
/// provider succeeded but the backend exchange did not, and it must not be
/// used for protected backend calls.
///
/// The serialized form uses camelCase and also accepts the legacy
/// `symfonyToken` / `symfonyTokenExpiresAt` field names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub user: SessionUser,
    #[serde(default, alias = "symfonyToken")]
    pub access_token: Option<AccessToken>,
    #[serde(
        default,
        alias = "symfonyTokenExpiresAt",
        deserialize_with = "deserialize_optional_expiry"
    )]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub role: Option<Role>,
}

impl Session {
    /// Session holding only identity-provider data.
    pub fn partial(user: SessionUser) -> Self {
        Self {
            user,
            ..Self::default()
        }
    }

    /// Session built from identity data plus a backend grant.
    ///
    /// The grant's user id wins over the identity-provider subject.
    pub fn from_grant(mut user: SessionUser, grant: TokenGrant) -> Self {
        if grant.user_id.is_some() {
            user.id = grant.user_id;
        }
        Self {
            user,
            access_token: Some(grant.access_token),
            expires_at: grant.expires_at,
            role: grant.role,
        }
    }

    pub fn is_backend_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    /// Advisory expiry check. The backend stays authoritative; an expired
    /// token is still sent and renewed on 401.
    pub fn is_token_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |expires_at| now >= expires_at)
    }

    /// Applies a patch; absent fields keep their current value.
    pub fn apply(&mut self, patch: &SessionPatch) {
        if let Some(token) = &patch.access_token {
            self.access_token = Some(token.clone());
        }
        if let Some(expires_at) = patch.expires_at {
            self.expires_at = Some(expires_at);
        }
        if let Some(role) = &patch.role {
            self.role = Some(role.clone());
        }
    }
}

/// Partial update to a session.
///
/// Used by both the initial exchange and the renewal cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<AccessToken>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl SessionPatch {
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.expires_at.is_none() && self.role.is_none()
    }
}

impl From<&TokenGrant> for SessionPatch {
    fn from(grant: &TokenGrant) -> Self {
        Self {
            access_token: Some(grant.access_token.clone()),
            expires_at: grant.expires_at,
            role: grant.role.clone(),
        }
    }
}

/// Result of a successful verify/refresh/login exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: AccessToken,
    pub expires_at: Option<DateTime<Utc>>,
    /// Top-level role, else the nested user role
    pub role: Option<Role>,
    pub user_id: Option<String>,
}

/// Optional profile data forwarded with an identity assertion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileHints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Credential produced by the identity provider (e.g. an ID token).
///
/// The core does not validate its signature; the backend does.
#[derive(Clone)]
pub struct IdentityAssertion {
    pub assertion: String,
    /// Identity-provider subject, used as user id when the backend sends none
    pub subject: Option<String>,
    pub hints: ProfileHints,
}

impl IdentityAssertion {
    pub fn new(assertion: impl Into<String>) -> Self {
        Self {
            assertion: assertion.into(),
            subject: None,
            hints: ProfileHints::default(),
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_hints(mut self, hints: ProfileHints) -> Self {
        self.hints = hints;
        self
    }

    /// Identity fields for a session created from this assertion.
    pub fn to_user(&self) -> SessionUser {
        SessionUser {
            id: self.subject.clone(),
            name: self.hints.name.clone(),
            email: self.hints.email.clone(),
            image: self.hints.image.clone(),
        }
    }
}

impl fmt::Debug for IdentityAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityAssertion")
            .field("assertion", &"[REDACTED]")
            .field("subject", &self.subject)
            .field("hints", &self.hints)
            .finish()
    }
}

/// Resolution state of the session, as seen by the route guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    /// The durable session has not been loaded yet
    Pending,
    /// A backend-authenticated session is present
    Authenticated,
    /// No session, or only a partial one
    Unauthenticated,
}

impl SessionStatus {
    pub fn of(session: Option<&Session>) -> Self {
        match session {
            Some(session) if session.is_backend_authenticated() => SessionStatus::Authenticated,
            _ => SessionStatus::Unauthenticated,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Pending => write!(f, "pending"),
            SessionStatus::Authenticated => write!(f, "authenticated"),
            SessionStatus::Unauthenticated => write!(f, "unauthenticated"),
        }
    }
}

/// Parses a backend expiry: Unix seconds (integer or fractional) or
/// RFC 3339 text. Anything else is logged and dropped.
pub(crate) fn parse_expiry(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    let parsed = match value {
        serde_json::Value::Null => return None,
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(secs) => Utc.timestamp_opt(secs, 0).single(),
            None => n
                .as_f64()
                .filter(|secs| secs.is_finite())
                .and_then(|secs| Utc.timestamp_millis_opt((secs * 1000.0) as i64).single()),
        },
        serde_json::Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    };
    if parsed.is_none() {
        warn!(expires_at = %value, "Ignoring unparsable token expiry");
    }
    parsed
}

/// User id as sent by the backend: string or number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum WireId {
    Number(i64),
    Text(String),
}

impl WireId {
    pub(crate) fn into_string(self) -> String {
        match self {
            WireId::Number(n) => n.to_string(),
            WireId::Text(s) => s,
        }
    }
}

fn deserialize_optional_id<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(Option::<WireId>::deserialize(deserializer)?.map(WireId::into_string))
}

fn deserialize_optional_expiry<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    Ok(Option::<serde_json::Value>::deserialize(deserializer)?
        .as_ref()
        .and_then(parse_expiry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn grant() -> TokenGrant {
        TokenGrant {
            access_token: AccessToken::new("backend-token"),
            expires_at: Some(Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()),
            role: Some(Role::User),
            user_id: Some("42".to_string()),
        }
    }

    #[test]
    fn test_access_token_debug_redacts() {
        let session = Session::from_grant(SessionUser::default(), grant());
        let debug = format!("{:?}", session);
        assert!(!debug.contains("backend-token"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_role_wire_strings() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"ROLE_ADMIN\"");
        let role: Role = serde_json::from_str("\"ROLE_USER\"").unwrap();
        assert_eq!(role, Role::User);
        let other: Role = serde_json::from_str("\"ROLE_TIPSTER\"").unwrap();
        assert_eq!(other, Role::Other("ROLE_TIPSTER".to_string()));
        assert!(!other.is_admin());
    }

    #[test]
    fn test_partial_session_is_not_backend_authenticated() {
        let session = Session::partial(SessionUser {
            email: Some("socio@quinicat.cat".to_string()),
            ..SessionUser::default()
        });
        assert!(!session.is_backend_authenticated());
        assert_eq!(SessionStatus::of(Some(&session)), SessionStatus::Unauthenticated);
        assert_eq!(SessionStatus::of(None), SessionStatus::Unauthenticated);
    }

    #[test]
    fn test_from_grant_prefers_backend_user_id() {
        let user = SessionUser {
            id: Some("google-sub".to_string()),
            ..SessionUser::default()
        };
        let session = Session::from_grant(user.clone(), grant());
        assert_eq!(session.user.id.as_deref(), Some("42"));
        assert_eq!(SessionStatus::of(Some(&session)), SessionStatus::Authenticated);

        let no_id = TokenGrant {
            user_id: None,
            ..grant()
        };
        let session = Session::from_grant(user, no_id);
        assert_eq!(session.user.id.as_deref(), Some("google-sub"));
    }

    #[test]
    fn test_apply_patch_keeps_absent_fields() {
        let mut session = Session::from_grant(SessionUser::default(), grant());
        session.apply(&SessionPatch {
            access_token: Some(AccessToken::new("renewed")),
            ..SessionPatch::default()
        });

        assert_eq!(session.access_token.as_ref().unwrap().as_str(), "renewed");
        assert_eq!(session.role, Some(Role::User));
        assert!(session.expires_at.is_some());
    }

    #[test]
    fn test_token_expiry_is_advisory() {
        let session = Session::from_grant(SessionUser::default(), grant());
        let expires_at = session.expires_at.unwrap();

        assert!(!session.is_token_expired(expires_at - Duration::seconds(1)));
        assert!(session.is_token_expired(expires_at));
        assert!(!Session::default().is_token_expired(Utc::now()));
    }

    #[test]
    fn test_session_accepts_legacy_field_names() {
        let json = r#"{
            "user": {"id": 7, "name": "Núria", "email": "nuria@quinicat.cat"},
            "symfonyToken": "legacy-token",
            "symfonyTokenExpiresAt": "2025-03-01T12:00:00+01:00",
            "role": "ROLE_ADMIN",
            "expires": "2025-04-01T00:00:00.000Z"
        }"#;

        let session: Session = serde_json::from_str(json).unwrap();
        assert_eq!(session.user.id.as_deref(), Some("7"));
        assert_eq!(session.access_token.unwrap().as_str(), "legacy-token");
        assert_eq!(
            session.expires_at,
            Some(Utc.with_ymd_and_hms(2025, 3, 1, 11, 0, 0).unwrap())
        );
        assert_eq!(session.role, Some(Role::Admin));
    }

    #[test]
    fn test_session_unparsable_expiry_is_absent() {
        let session: Session =
            serde_json::from_str(r#"{"accessToken": "t", "expiresAt": "next tuesday"}"#).unwrap();
        assert!(session.is_backend_authenticated());
        assert_eq!(session.expires_at, None);
    }

    #[test]
    fn test_session_fractional_expiry_is_kept() {
        let session: Session =
            serde_json::from_str(r#"{"accessToken": "t", "expiresAt": 1893456000.5}"#).unwrap();
        assert_eq!(
            session.expires_at,
            Utc.timestamp_millis_opt(1_893_456_000_500).single()
        );

        let session: Session =
            serde_json::from_str(r#"{"accessToken": "t", "expiresAt": [1, 2]}"#).unwrap();
        assert!(session.is_backend_authenticated());
        assert_eq!(session.expires_at, None);
    }

    #[test]
    fn test_parse_expiry_accepts_backend_formats() {
        let expected = Utc.timestamp_opt(1_893_456_000, 0).single();
        assert_eq!(parse_expiry(&serde_json::json!(1_893_456_000)), expected);
        assert_eq!(parse_expiry(&serde_json::json!(1_893_456_000.0)), expected);
        assert_eq!(parse_expiry(&serde_json::json!("2030-01-01T00:00:00Z")), expected);
        assert_eq!(parse_expiry(&serde_json::Value::Null), None);
        assert_eq!(parse_expiry(&serde_json::json!(true)), None);
        assert_eq!(parse_expiry(&serde_json::json!(f64::MAX)), None);
    }

    #[test]
    fn test_patch_wire_format() {
        let patch = SessionPatch::from(&grant());
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json["accessToken"], "backend-token");
        assert_eq!(json["role"], "ROLE_USER");
        assert!(json["expiresAt"].as_str().unwrap().starts_with("2025-03-01T12:00:00"));

        let empty = serde_json::to_value(SessionPatch::default()).unwrap();
        assert_eq!(empty, serde_json::json!({}));
        assert!(SessionPatch::default().is_empty());
    }

    #[test]
    fn test_assertion_debug_redacts() {
        let assertion = IdentityAssertion::new("id-token-value").with_subject("sub-1");
        let debug = format!("{:?}", assertion);
        assert!(!debug.contains("id-token-value"));
        assert!(debug.contains("sub-1"));
    }
}
