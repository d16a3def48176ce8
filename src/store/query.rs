//! Read contracts over the IdP template tables.
//!
//! Readers see whole events only: a template is always returned together
//! with the satellite matching its type. Both are written in one
//! transaction, and every query of one read call runs in one snapshot.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_query::{Alias, Asterisk, Expr, Order, Query, SelectStatement};

use super::{Result, SqlDatabase, SqlProjectionStore, StoreError};
use crate::domain::{IdpState, IdpType, OwnerType};
use crate::event::idp::{CryptoValue, LdapAttributes};
use crate::projections::idp_template::{col, sat, TABLE};

#[derive(Debug, Clone, PartialEq)]
pub struct IdpTemplate {
    pub id: String,
    pub instance_id: String,
    pub resource_owner: String,
    pub creation_date: DateTime<Utc>,
    pub change_date: DateTime<Utc>,
    pub sequence: u64,
    pub state: IdpState,
    pub name: Option<String>,
    pub owner_type: OwnerType,
    pub idp_type: IdpType,
    pub owner_removed: bool,
    pub is_creation_allowed: bool,
    pub is_linking_allowed: bool,
    pub is_auto_creation: bool,
    pub is_auto_update: bool,
    /// `None` while the type is unspecified (legacy config not yet
    /// upgraded).
    pub details: Option<IdpTemplateDetails>,
}

/// Type-specific configuration, one variant per satellite table.
#[derive(Debug, Clone, PartialEq)]
pub enum IdpTemplateDetails {
    OAuth(OAuthTemplate),
    Oidc(OidcTemplate),
    Jwt(JwtTemplate),
    Google(GoogleTemplate),
    Ldap(LdapTemplate),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OAuthTemplate {
    pub client_id: String,
    pub client_secret: CryptoValue,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub user_endpoint: String,
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OidcTemplate {
    pub issuer: String,
    pub client_id: String,
    pub client_secret: CryptoValue,
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JwtTemplate {
    pub issuer: String,
    pub jwt_endpoint: String,
    pub keys_endpoint: String,
    pub header_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GoogleTemplate {
    pub client_id: String,
    pub client_secret: CryptoValue,
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LdapTemplate {
    pub host: Option<String>,
    pub port: Option<String>,
    pub tls: Option<bool>,
    pub base_dn: Option<String>,
    pub user_object_class: Option<String>,
    pub user_unique_attribute: Option<String>,
    pub admin: Option<String>,
    pub password: Option<CryptoValue>,
    pub attributes: LdapAttributes,
}

/// Queries over the IdP template read model.
#[async_trait]
pub trait IdpTemplateQueries: Send + Sync {
    async fn template_by_id(&self, instance_id: &str, id: &str) -> Result<Option<IdpTemplate>>;

    /// Templates of one resource owner, ordered by id. Templates of a
    /// removed owner are only listed with `include_owner_removed`.
    async fn templates_by_resource_owner(
        &self,
        instance_id: &str,
        resource_owner: &str,
        include_owner_removed: bool,
    ) -> Result<Vec<IdpTemplate>>;
}

fn base_select() -> SelectStatement {
    Query::select()
        .column(Asterisk)
        .from(Alias::new(TABLE))
        .to_owned()
}

fn satellite_select(suffix: &str, instance_id: &str, id: &str) -> SelectStatement {
    Query::select()
        .column(Asterisk)
        .from(Alias::new(format!("{TABLE}_{suffix}")))
        .and_where(Expr::col(Alias::new(sat::INSTANCE_ID)).eq(instance_id))
        .and_where(Expr::col(Alias::new(sat::IDP_ID)).eq(id))
        .to_owned()
}

fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| StoreError::decode(column, e))
}

fn parse_enum<T: TryFrom<i16, Error = i16>>(column: &str, value: i16) -> Result<T> {
    T::try_from(value).map_err(|v| StoreError::decode(column, format!("unknown value {v}")))
}

fn parse_scopes(value: Option<String>) -> Result<Vec<String>> {
    match value {
        Some(json) => serde_json::from_str(&json).map_err(|e| StoreError::decode(sat::SCOPES, e)),
        None => Ok(Vec::new()),
    }
}

fn parse_secret(column: &str, value: &str) -> Result<CryptoValue> {
    serde_json::from_str(value).map_err(|e| StoreError::decode(column, e))
}

/// Macro to implement IdpTemplateQueries for a specific SQL backend.
macro_rules! impl_idp_template_queries {
    ($db_type:ty, $row_type:ty, $conn_type:ty, $feature:literal) => {
        #[cfg(feature = $feature)]
        impl SqlProjectionStore<$db_type> {
            fn get<T>(row: &$row_type, column: &str) -> Result<T>
            where
                T: for<'r> sqlx::Decode<'r, <$row_type as sqlx::Row>::Database>
                    + sqlx::Type<<$row_type as sqlx::Row>::Database>,
            {
                use sqlx::Row;
                row.try_get(column).map_err(|e| StoreError::decode(column, e))
            }

            fn decode_template(row: &$row_type) -> Result<IdpTemplate> {
                let creation_date: String = Self::get(row, col::CREATION_DATE)?;
                let change_date: String = Self::get(row, col::CHANGE_DATE)?;
                let sequence: i64 = Self::get(row, col::SEQUENCE)?;

                Ok(IdpTemplate {
                    id: Self::get(row, col::ID)?,
                    instance_id: Self::get(row, col::INSTANCE_ID)?,
                    resource_owner: Self::get(row, col::RESOURCE_OWNER)?,
                    creation_date: parse_timestamp(col::CREATION_DATE, &creation_date)?,
                    change_date: parse_timestamp(col::CHANGE_DATE, &change_date)?,
                    sequence: u64::try_from(sequence)
                        .map_err(|e| StoreError::decode(col::SEQUENCE, e))?,
                    state: parse_enum(col::STATE, Self::get(row, col::STATE)?)?,
                    name: Self::get(row, col::NAME)?,
                    owner_type: parse_enum(col::OWNER_TYPE, Self::get(row, col::OWNER_TYPE)?)?,
                    idp_type: parse_enum(col::TYPE, Self::get(row, col::TYPE)?)?,
                    owner_removed: Self::get(row, col::OWNER_REMOVED)?,
                    is_creation_allowed: Self::get(row, col::IS_CREATION_ALLOWED)?,
                    is_linking_allowed: Self::get(row, col::IS_LINKING_ALLOWED)?,
                    is_auto_creation: Self::get(row, col::IS_AUTO_CREATION)?,
                    is_auto_update: Self::get(row, col::IS_AUTO_UPDATE)?,
                    details: None,
                })
            }

            fn decode_details(idp_type: IdpType, row: &$row_type) -> Result<IdpTemplateDetails> {
                let secret = |column: &str| -> Result<CryptoValue> {
                    let value: String = Self::get(row, column)?;
                    parse_secret(column, &value)
                };
                let text = |column: &str| -> Result<String> { Self::get(row, column) };
                let optional = |column: &str| -> Result<Option<String>> { Self::get(row, column) };

                let details = match idp_type {
                    IdpType::OAuth => IdpTemplateDetails::OAuth(OAuthTemplate {
                        client_id: text(sat::CLIENT_ID)?,
                        client_secret: secret(sat::CLIENT_SECRET)?,
                        authorization_endpoint: text(sat::AUTHORIZATION_ENDPOINT)?,
                        token_endpoint: text(sat::TOKEN_ENDPOINT)?,
                        user_endpoint: text(sat::USER_ENDPOINT)?,
                        scopes: parse_scopes(optional(sat::SCOPES)?)?,
                    }),
                    IdpType::Oidc => IdpTemplateDetails::Oidc(OidcTemplate {
                        issuer: text(sat::ISSUER)?,
                        client_id: text(sat::CLIENT_ID)?,
                        client_secret: secret(sat::CLIENT_SECRET)?,
                        scopes: parse_scopes(optional(sat::SCOPES)?)?,
                    }),
                    IdpType::Jwt => IdpTemplateDetails::Jwt(JwtTemplate {
                        issuer: text(sat::ISSUER)?,
                        jwt_endpoint: text(sat::JWT_ENDPOINT)?,
                        keys_endpoint: text(sat::KEYS_ENDPOINT)?,
                        header_name: optional(sat::HEADER_NAME)?,
                    }),
                    IdpType::Google => IdpTemplateDetails::Google(GoogleTemplate {
                        client_id: text(sat::CLIENT_ID)?,
                        client_secret: secret(sat::CLIENT_SECRET)?,
                        scopes: parse_scopes(optional(sat::SCOPES)?)?,
                    }),
                    IdpType::Ldap => {
                        let attr = |column: &str| -> Result<String> {
                            Ok(optional(column)?.unwrap_or_default())
                        };
                        let password = optional(sat::PASSWORD)?
                            .map(|value| parse_secret(sat::PASSWORD, &value))
                            .transpose()?;

                        IdpTemplateDetails::Ldap(LdapTemplate {
                            host: optional(sat::HOST)?,
                            port: optional(sat::PORT)?,
                            tls: Self::get(row, sat::TLS)?,
                            base_dn: optional(sat::BASE_DN)?,
                            user_object_class: optional(sat::USER_OBJECT_CLASS)?,
                            user_unique_attribute: optional(sat::USER_UNIQUE_ATTRIBUTE)?,
                            admin: optional(sat::ADMIN)?,
                            password,
                            attributes: LdapAttributes {
                                id_attribute: attr(sat::ID_ATTRIBUTE)?,
                                first_name_attribute: attr(sat::FIRST_NAME_ATTRIBUTE)?,
                                last_name_attribute: attr(sat::LAST_NAME_ATTRIBUTE)?,
                                display_name_attribute: attr(sat::DISPLAY_NAME_ATTRIBUTE)?,
                                nick_name_attribute: attr(sat::NICK_NAME_ATTRIBUTE)?,
                                preferred_username_attribute: attr(
                                    sat::PREFERRED_USERNAME_ATTRIBUTE,
                                )?,
                                email_attribute: attr(sat::EMAIL_ATTRIBUTE)?,
                                email_verified_attribute: attr(sat::EMAIL_VERIFIED_ATTRIBUTE)?,
                                phone_attribute: attr(sat::PHONE_ATTRIBUTE)?,
                                phone_verified_attribute: attr(sat::PHONE_VERIFIED_ATTRIBUTE)?,
                                preferred_language_attribute: attr(
                                    sat::PREFERRED_LANGUAGE_ATTRIBUTE,
                                )?,
                                avatar_url_attribute: attr(sat::AVATAR_URL_ATTRIBUTE)?,
                                profile_attribute: attr(sat::PROFILE_ATTRIBUTE)?,
                            },
                        })
                    }
                    IdpType::Unspecified => {
                        return Err(StoreError::decode(col::TYPE, "unspecified type has no details"))
                    }
                };
                Ok(details)
            }

            async fn begin_snapshot(
                &self,
            ) -> Result<sqlx::Transaction<'static, <$row_type as sqlx::Row>::Database>> {
                let mut tx = self.pool().begin().await?;
                if let Some(sql) = <$db_type as SqlDatabase>::SNAPSHOT_READ_SQL {
                    sqlx::query(sql).execute(&mut *tx).await?;
                }
                Ok(tx)
            }

            async fn with_details(
                conn: &mut $conn_type,
                mut template: IdpTemplate,
            ) -> Result<IdpTemplate> {
                let Some(suffix) = template.idp_type.table_suffix() else {
                    return Ok(template);
                };

                let sql = <$db_type>::build_select(satellite_select(
                    suffix,
                    &template.instance_id,
                    &template.id,
                ));
                let row = sqlx::query(&sql).fetch_optional(&mut *conn).await?;
                template.details = row
                    .map(|row| Self::decode_details(template.idp_type, &row))
                    .transpose()?;
                Ok(template)
            }
        }

        #[cfg(feature = $feature)]
        #[async_trait]
        impl IdpTemplateQueries for SqlProjectionStore<$db_type> {
            async fn template_by_id(
                &self,
                instance_id: &str,
                id: &str,
            ) -> Result<Option<IdpTemplate>> {
                let stmt = base_select()
                    .and_where(Expr::col(Alias::new(col::INSTANCE_ID)).eq(instance_id))
                    .and_where(Expr::col(Alias::new(col::ID)).eq(id))
                    .to_owned();

                let sql = <$db_type>::build_select(stmt);

                let mut tx = self.begin_snapshot().await?;
                let template = match sqlx::query(&sql).fetch_optional(&mut *tx).await? {
                    Some(row) => {
                        let template = Self::decode_template(&row)?;
                        Some(Self::with_details(&mut *tx, template).await?)
                    }
                    None => None,
                };
                tx.commit().await?;
                Ok(template)
            }

            async fn templates_by_resource_owner(
                &self,
                instance_id: &str,
                resource_owner: &str,
                include_owner_removed: bool,
            ) -> Result<Vec<IdpTemplate>> {
                let sql = {
                    let mut stmt = base_select();
                    stmt.and_where(Expr::col(Alias::new(col::INSTANCE_ID)).eq(instance_id))
                        .and_where(Expr::col(Alias::new(col::RESOURCE_OWNER)).eq(resource_owner))
                        .order_by(Alias::new(col::ID), Order::Asc);
                    if !include_owner_removed {
                        stmt.and_where(Expr::col(Alias::new(col::OWNER_REMOVED)).eq(false));
                    }
                    <$db_type>::build_select(stmt)
                };

                let mut tx = self.begin_snapshot().await?;
                let rows = sqlx::query(&sql).fetch_all(&mut *tx).await?;

                let mut templates = Vec::with_capacity(rows.len());
                for row in &rows {
                    let template = Self::decode_template(row)?;
                    templates.push(Self::with_details(&mut *tx, template).await?);
                }
                tx.commit().await?;
                Ok(templates)
            }
        }
    };
}

impl_idp_template_queries!(
    super::Postgres,
    sqlx::postgres::PgRow,
    sqlx::PgConnection,
    "postgres"
);
impl_idp_template_queries!(
    super::Sqlite,
    sqlx::sqlite::SqliteRow,
    sqlx::SqliteConnection,
    "sqlite"
);
