//! Postgres-backed store.

use super::{
    AuditLog, AuditLogData, AuditLogStore, AuthorizationCode,
    AuthorizationCodeStore, CeremonySession, CeremonyStore, Client, ClientConsent, ClientStore,
    ConsentStore, Credential, CredentialStore, DeleteCredentialOutcome, OneTimeAccessToken,
    CustomClaims, OneTimeTokenStore, StoreError, StoreResult, User, UserGroup, UserStore,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, types::Json, FromRow, PgPool, Row};
use tracing::{info_span, Instrument, Span};
use uuid::Uuid;

pub const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the bundled schema.
    ///
    /// # Errors
    /// Returns error if any statement fails.
    pub async fn apply_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&self.pool)
            .instrument(query_span("DDL"))
            .await
            .context("Failed to apply database schema")?;
        Ok(())
    }
}

fn query_span(operation: &'static str) -> Span {
    info_span!("db.query", db.system = "postgresql", db.operation = operation)
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn unique_as(field: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |err| {
        if is_unique_violation(&err) {
            StoreError::AlreadyInUse(field)
        } else {
            StoreError::Database(err)
        }
    }
}

struct UserRow(User);

impl<'r> FromRow<'r, PgRow> for UserRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let group_ids: Vec<Uuid> = row.try_get("group_ids")?;
        let group_names: Vec<String> = row.try_get("group_names")?;
        Ok(Self(User {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            is_admin: row.try_get("is_admin")?,
            groups: group_ids
                .into_iter()
                .zip(group_names)
                .map(|(id, name)| UserGroup {
                    id,
                    name,
                    custom_claims: CustomClaims::new(),
                })
                .collect(),
            custom_claims: CustomClaims::new(),
        }))
    }
}

struct CredentialRow(Credential);

impl<'r> FromRow<'r, PgRow> for CredentialRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self(Credential {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            credential_id: row.try_get("credential_id")?,
            public_key: row.try_get("public_key")?,
            attestation_type: row.try_get("attestation_type")?,
            transports: row.try_get("transports")?,
            backup_eligible: row.try_get("backup_eligible")?,
            backup_state: row.try_get("backup_state")?,
            user_id: row.try_get("user_id")?,
            created_at: row.try_get("created_at")?,
        }))
    }
}

struct SessionRow(CeremonySession);

impl<'r> FromRow<'r, PgRow> for SessionRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let Json(state) = row.try_get::<Json<serde_json::Value>, _>("state")?;
        Ok(Self(CeremonySession {
            id: row.try_get("id")?,
            challenge: row.try_get("challenge")?,
            expires_at: row.try_get("expires_at")?,
            user_verification: row.try_get("user_verification")?,
            user_id: row.try_get("user_id")?,
            state,
        }))
    }
}

struct ClientRow(Client);

impl<'r> FromRow<'r, PgRow> for ClientRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self(Client {
            id: row.try_get("id")?,
            secret_hash: row.try_get("secret_hash")?,
            name: row.try_get("name")?,
            callback_urls: row.try_get("callback_urls")?,
            allowed_group_ids: row.try_get("allowed_group_ids")?,
            created_by: row.try_get("created_by")?,
        }))
    }
}

struct CodeRow(AuthorizationCode);

impl<'r> FromRow<'r, PgRow> for CodeRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self(AuthorizationCode {
            code: row.try_get("code")?,
            client_id: row.try_get("client_id")?,
            user_id: row.try_get("user_id")?,
            scope: row.try_get("scope")?,
            nonce: row.try_get("nonce")?,
            code_challenge: row.try_get("code_challenge")?,
            code_challenge_method_sha256: row.try_get("code_challenge_method_sha256")?,
            expires_at: row.try_get("expires_at")?,
        }))
    }
}

macro_rules! select_user {
    ($filter:literal) => {
        concat!(
            r"
            SELECT u.id, u.username, u.email, u.first_name, u.last_name, u.is_admin,
                   COALESCE(ARRAY_AGG(g.id) FILTER (WHERE g.id IS NOT NULL), '{}') AS group_ids,
                   COALESCE(ARRAY_AGG(g.name) FILTER (WHERE g.id IS NOT NULL), '{}') AS group_names
            FROM users u
            LEFT JOIN user_groups_users ugu ON ugu.user_id = u.id
            LEFT JOIN user_groups g ON g.id = ugu.user_group_id
            WHERE ",
            $filter,
            "
            GROUP BY u.id
            "
        )
    };
}

impl PgStore {
    /// Attach the custom claims of `user` and of each of its groups.
    async fn with_custom_claims(&self, mut user: User) -> StoreResult<User> {
        let group_ids: Vec<Uuid> = user.groups.iter().map(|g| g.id).collect();
        let rows = sqlx::query(
            r"
            SELECT key, value, user_group_id
            FROM custom_claims
            WHERE user_id = $1 OR user_group_id = ANY($2)
            ",
        )
        .bind(user.id)
        .bind(&group_ids)
        .fetch_all(&self.pool)
        .instrument(query_span("SELECT"))
        .await?;

        for row in rows {
            let key: String = row.try_get("key")?;
            let value: String = row.try_get("value")?;
            match row.try_get::<Option<Uuid>, _>("user_group_id")? {
                Some(group_id) => {
                    if let Some(group) = user.groups.iter_mut().find(|g| g.id == group_id) {
                        group.custom_claims.insert(key, value);
                    }
                }
                None => {
                    user.custom_claims.insert(key, value);
                }
            }
        }
        Ok(user)
    }

    async fn found_user(&self, row: Option<UserRow>) -> StoreResult<Option<User>> {
        match row {
            Some(UserRow(user)) => Ok(Some(self.with_custom_claims(user).await?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(select_user!("u.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT"))
            .await?;
        self.found_user(row).await
    }

    async fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(select_user!("u.username = $1"))
            .bind(username)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT"))
            .await?;
        self.found_user(row).await
    }

    async fn count_users(&self) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .instrument(query_span("SELECT"))
            .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn create_user(&self, user: &User) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r"
            INSERT INTO users (id, username, email, first_name, last_name, is_admin)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.is_admin)
        .execute(&mut *tx)
        .instrument(query_span("INSERT"))
        .await
        .map_err(unique_as("username or email"))?;

        for group in &user.groups {
            sqlx::query(
                "INSERT INTO user_groups (id, name) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING",
            )
            .bind(group.id)
            .bind(&group.name)
            .execute(&mut *tx)
            .instrument(query_span("INSERT"))
            .await?;
            sqlx::query("INSERT INTO user_groups_users (user_id, user_group_id) VALUES ($1, $2)")
                .bind(user.id)
                .bind(group.id)
                .execute(&mut *tx)
                .instrument(query_span("INSERT"))
                .await?;
        }

        let user_claims = user
            .custom_claims
            .iter()
            .map(|claim| (Some(user.id), None::<Uuid>, claim));
        let group_claims = user.groups.iter().flat_map(|group| {
            group
                .custom_claims
                .iter()
                .map(move |claim| (None::<Uuid>, Some(group.id), claim))
        });
        let claims: Vec<(Option<Uuid>, Option<Uuid>, (&String, &String))> =
            user_claims.chain(group_claims).collect();
        for (user_id, group_id, (key, value)) in claims {
            sqlx::query(
                r"
                INSERT INTO custom_claims (id, key, value, user_id, user_group_id)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT DO NOTHING
                ",
            )
            .bind(Uuid::new_v4())
            .bind(key)
            .bind(value)
            .bind(user_id)
            .bind(group_id)
            .execute(&mut *tx)
            .instrument(query_span("INSERT"))
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn list_credentials(&self, user_id: Uuid) -> StoreResult<Vec<Credential>> {
        let rows = sqlx::query_as::<_, CredentialRow>(
            "SELECT * FROM webauthn_credentials WHERE user_id = $1 ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .instrument(query_span("SELECT"))
        .await?;
        Ok(rows.into_iter().map(|CredentialRow(c)| c).collect())
    }

    async fn create_credential(&self, credential: &Credential) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO webauthn_credentials
                (id, name, credential_id, public_key, attestation_type, transports,
                 backup_eligible, backup_state, user_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ",
        )
        .bind(credential.id)
        .bind(&credential.name)
        .bind(&credential.credential_id)
        .bind(&credential.public_key)
        .bind(&credential.attestation_type)
        .bind(&credential.transports)
        .bind(credential.backup_eligible)
        .bind(credential.backup_state)
        .bind(credential.user_id)
        .bind(credential.created_at)
        .execute(&self.pool)
        .instrument(query_span("INSERT"))
        .await
        .map_err(unique_as("passkey"))?;
        Ok(())
    }

    async fn rename_credential(
        &self,
        user_id: Uuid,
        id: Uuid,
        name: &str,
    ) -> StoreResult<Option<Credential>> {
        let row = sqlx::query_as::<_, CredentialRow>(
            "UPDATE webauthn_credentials SET name = $1 WHERE id = $2 AND user_id = $3 RETURNING *",
        )
        .bind(name)
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .instrument(query_span("UPDATE"))
        .await?;
        Ok(row.map(|CredentialRow(c)| c))
    }

    async fn delete_credential(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> StoreResult<DeleteCredentialOutcome> {
        let mut tx = self.pool.begin().await?;

        // Serialize concurrent deletions for the same owner.
        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .instrument(query_span("SELECT"))
            .await?;

        let row = sqlx::query(
            r"
            SELECT COUNT(*) AS owned,
                   COUNT(*) FILTER (WHERE id = $2) AS target
            FROM webauthn_credentials
            WHERE user_id = $1
            ",
        )
        .bind(user_id)
        .bind(id)
        .fetch_one(&mut *tx)
        .instrument(query_span("SELECT"))
        .await?;
        let owned: i64 = row.try_get("owned")?;
        let target: i64 = row.try_get("target")?;

        if target == 0 {
            return Ok(DeleteCredentialOutcome::NotFound);
        }
        if owned <= 1 {
            return Ok(DeleteCredentialOutcome::LastCredential);
        }

        sqlx::query("DELETE FROM webauthn_credentials WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .instrument(query_span("DELETE"))
            .await?;
        tx.commit().await?;

        Ok(DeleteCredentialOutcome::Deleted)
    }
}

#[async_trait]
impl CeremonyStore for PgStore {
    async fn create_session(&self, session: &CeremonySession) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO webauthn_sessions
                (id, challenge, expires_at, user_verification, user_id, state)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(session.id)
        .bind(&session.challenge)
        .bind(session.expires_at)
        .bind(&session.user_verification)
        .bind(session.user_id)
        .bind(Json(&session.state))
        .execute(&self.pool)
        .instrument(query_span("INSERT"))
        .await?;
        Ok(())
    }

    async fn take_session(&self, id: Uuid) -> StoreResult<Option<CeremonySession>> {
        let row = sqlx::query_as::<_, SessionRow>(
            "DELETE FROM webauthn_sessions WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .instrument(query_span("DELETE"))
        .await?;
        Ok(row.map(|SessionRow(s)| s))
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM webauthn_sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .instrument(query_span("DELETE"))
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ClientStore for PgStore {
    async fn get_client(&self, id: &str) -> StoreResult<Option<Client>> {
        let row = sqlx::query_as::<_, ClientRow>("SELECT * FROM oidc_clients WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT"))
            .await?;
        Ok(row.map(|ClientRow(c)| c))
    }

    async fn create_client(&self, client: &Client) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO oidc_clients
                (id, secret_hash, name, callback_urls, allowed_group_ids, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(&client.id)
        .bind(&client.secret_hash)
        .bind(&client.name)
        .bind(&client.callback_urls)
        .bind(&client.allowed_group_ids)
        .bind(client.created_by)
        .execute(&self.pool)
        .instrument(query_span("INSERT"))
        .await
        .map_err(unique_as("client id"))?;
        Ok(())
    }

    async fn update_client_secret(&self, id: &str, secret_hash: &str) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE oidc_clients SET secret_hash = $1 WHERE id = $2")
            .bind(secret_hash)
            .bind(id)
            .execute(&self.pool)
            .instrument(query_span("UPDATE"))
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ConsentStore for PgStore {
    async fn get_consent(
        &self,
        user_id: Uuid,
        client_id: &str,
    ) -> StoreResult<Option<ClientConsent>> {
        let row = sqlx::query(
            "SELECT scope FROM user_authorized_oidc_clients WHERE user_id = $1 AND client_id = $2",
        )
        .bind(user_id)
        .bind(client_id)
        .fetch_optional(&self.pool)
        .instrument(query_span("SELECT"))
        .await?;
        row.map(|row| -> StoreResult<ClientConsent> {
            Ok(ClientConsent {
                user_id,
                client_id: client_id.to_string(),
                scope: row.try_get("scope")?,
            })
        })
        .transpose()
    }

    async fn upsert_consent(&self, consent: &ClientConsent) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO user_authorized_oidc_clients (user_id, client_id, scope)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, client_id) DO UPDATE SET scope = EXCLUDED.scope
            ",
        )
        .bind(consent.user_id)
        .bind(&consent.client_id)
        .bind(&consent.scope)
        .execute(&self.pool)
        .instrument(query_span("INSERT"))
        .await?;
        Ok(())
    }
}

#[async_trait]
impl AuthorizationCodeStore for PgStore {
    async fn create_code(&self, code: &AuthorizationCode) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO oidc_authorization_codes
                (code, client_id, user_id, scope, nonce, code_challenge,
                 code_challenge_method_sha256, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(&code.code)
        .bind(&code.client_id)
        .bind(code.user_id)
        .bind(&code.scope)
        .bind(&code.nonce)
        .bind(&code.code_challenge)
        .bind(code.code_challenge_method_sha256)
        .bind(code.expires_at)
        .execute(&self.pool)
        .instrument(query_span("INSERT"))
        .await
        .map_err(unique_as("authorization code"))?;
        Ok(())
    }

    async fn take_code(&self, code: &str) -> StoreResult<Option<AuthorizationCode>> {
        let row = sqlx::query_as::<_, CodeRow>(
            "DELETE FROM oidc_authorization_codes WHERE code = $1 RETURNING *",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .instrument(query_span("DELETE"))
        .await?;
        Ok(row.map(|CodeRow(c)| c))
    }

    async fn delete_expired_codes(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM oidc_authorization_codes WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .instrument(query_span("DELETE"))
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl AuditLogStore for PgStore {
    async fn create_audit_log(&self, entry: &AuditLog) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO audit_logs
                (id, event, ip_address, user_agent, user_id, country, city, data, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(entry.id)
        .bind(entry.event.as_str())
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(entry.user_id)
        .bind(&entry.country)
        .bind(&entry.city)
        .bind(Json::<&AuditLogData>(&entry.data))
        .bind(entry.created_at)
        .execute(&self.pool)
        .instrument(query_span("INSERT"))
        .await?;
        Ok(())
    }

    async fn count_audit_logs(
        &self,
        user_id: Uuid,
        ip_address: &str,
        user_agent: &str,
    ) -> StoreResult<i64> {
        let row = sqlx::query(
            r"
            SELECT COUNT(*) AS total FROM audit_logs
            WHERE user_id = $1 AND ip_address = $2 AND user_agent = $3
            ",
        )
        .bind(user_id)
        .bind(ip_address)
        .bind(user_agent)
        .fetch_one(&self.pool)
        .instrument(query_span("SELECT"))
        .await?;
        Ok(row.try_get("total")?)
    }

    async fn delete_audit_logs_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM audit_logs WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .instrument(query_span("DELETE"))
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl OneTimeTokenStore for PgStore {
    async fn create_one_time_token(&self, token: &OneTimeAccessToken) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO one_time_access_tokens (token, user_id, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(&token.token)
        .bind(token.user_id)
        .bind(token.expires_at)
        .execute(&self.pool)
        .instrument(query_span("INSERT"))
        .await
        .map_err(unique_as("token"))?;
        Ok(())
    }

    async fn take_one_time_token(&self, token: &str) -> StoreResult<Option<OneTimeAccessToken>> {
        let row = sqlx::query(
            r"
            DELETE FROM one_time_access_tokens WHERE token = $1
            RETURNING token, user_id, expires_at
            ",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .instrument(query_span("DELETE"))
        .await?;
        row.map(|row| -> StoreResult<OneTimeAccessToken> {
            Ok(OneTimeAccessToken {
                token: row.try_get("token")?,
                user_id: row.try_get("user_id")?,
                expires_at: row.try_get("expires_at")?,
            })
        })
        .transpose()
    }

    async fn delete_expired_one_time_tokens(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM one_time_access_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .instrument(query_span("DELETE"))
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    #[derive(Debug)]
    struct TestDbError {
        code: Option<&'static str>,
    }

    impl fmt::Display for TestDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test db error")
        }
    }

    impl StdError for TestDbError {}

    impl sqlx::error::DatabaseError for TestDbError {
        fn message(&self) -> &str {
            "test db error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::Borrowed)
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::Other
        }
    }

    #[test]
    fn unique_violations_map_to_already_in_use() {
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("23505"),
        }));
        assert!(matches!(
            unique_as("passkey")(err),
            StoreError::AlreadyInUse("passkey")
        ));

        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("99999"),
        }));
        assert!(matches!(unique_as("passkey")(err), StoreError::Database(_)));
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }

    #[test]
    fn schema_creates_every_table() {
        for table in [
            "users",
            "webauthn_credentials",
            "webauthn_sessions",
            "oidc_clients",
            "user_authorized_oidc_clients",
            "oidc_authorization_codes",
            "one_time_access_tokens",
            "audit_logs",
        ] {
            assert!(
                SCHEMA_SQL.contains(&format!("CREATE TABLE IF NOT EXISTS {table} ")),
                "missing table {table}"
            );
        }
    }
}
