//! Reducers of the IdP template projection.
//!
//! Org and instance aggregates share every reducer body. The scope an event
//! was emitted under only decides the row's `owner_type`.

use sea_query::Value;

use super::{col, sat};
use crate::domain::{IdpState, IdpType, OwnerType};
use crate::event::idp::{
    CryptoValue, GoogleIdpAdded, GoogleIdpChanged, IdpConfigAdded, IdpConfigChanged, IdpRemoved,
    JwtConfigAdded, JwtConfigChanged, JwtIdpAdded, JwtIdpChanged, LdapAttributeChanges,
    LdapAttributes, LdapIdpAdded, LdapIdpChanged, OAuthIdpAdded, OAuthIdpChanged,
    OidcConfigAdded, OidcConfigChanged, OidcIdpAdded, OidcIdpChanged, OptionChanges, Options,
};
use crate::event::{instance, org, Event};
use crate::handler::{
    string_array, timestamp, AggregateReducer, Column, Condition, EventReducer, MultiStatement,
    ReduceError, Statement,
};

macro_rules! idp_reducers {
    ($scope:ident) => {
        vec![
            EventReducer::new($scope::OAUTH_IDP_ADDED, reduce_oauth_added),
            EventReducer::new($scope::OAUTH_IDP_CHANGED, reduce_oauth_changed),
            EventReducer::new($scope::OIDC_IDP_ADDED, reduce_oidc_added),
            EventReducer::new($scope::OIDC_IDP_CHANGED, reduce_oidc_changed),
            EventReducer::new($scope::JWT_IDP_ADDED, reduce_jwt_added),
            EventReducer::new($scope::JWT_IDP_CHANGED, reduce_jwt_changed),
            EventReducer::new($scope::IDP_CONFIG_ADDED, reduce_old_config_added),
            EventReducer::new($scope::IDP_CONFIG_CHANGED, reduce_old_config_changed),
            EventReducer::new($scope::IDP_OIDC_CONFIG_ADDED, reduce_old_oidc_config_added),
            EventReducer::new($scope::IDP_OIDC_CONFIG_CHANGED, reduce_old_oidc_config_changed),
            EventReducer::new($scope::IDP_JWT_CONFIG_ADDED, reduce_old_jwt_config_added),
            EventReducer::new($scope::IDP_JWT_CONFIG_CHANGED, reduce_old_jwt_config_changed),
            EventReducer::new($scope::GOOGLE_IDP_ADDED, reduce_google_added),
            EventReducer::new($scope::GOOGLE_IDP_CHANGED, reduce_google_changed),
            EventReducer::new($scope::LDAP_IDP_ADDED, reduce_ldap_added),
            EventReducer::new($scope::LDAP_IDP_CHANGED, reduce_ldap_changed),
            EventReducer::new($scope::IDP_REMOVED, reduce_idp_removed),
        ]
    };
}

/// Registration for both aggregate scopes.
///
/// Legacy config reducers stay registered for as long as any history may
/// still contain those events.
pub fn reducers() -> Vec<AggregateReducer> {
    let mut instance_reducers = idp_reducers!(instance);
    instance_reducers.push(EventReducer::new(
        instance::INSTANCE_REMOVED,
        reduce_instance_removed,
    ));

    let mut org_reducers = idp_reducers!(org);
    org_reducers.push(EventReducer::new(org::ORG_REMOVED, reduce_owner_removed));

    vec![
        AggregateReducer {
            aggregate_type: instance::AGGREGATE_TYPE,
            reducers: instance_reducers,
        },
        AggregateReducer {
            aggregate_type: org::AGGREGATE_TYPE,
            reducers: org_reducers,
        },
    ]
}

// ============================================================================
// Composition helpers
// ============================================================================

/// Column assignments collected from optional event fields.
#[derive(Default)]
struct Changes(Vec<Column>);

impl Changes {
    fn set<V: Into<Value>>(&mut self, name: &'static str, value: Option<V>) -> &mut Self {
        if let Some(value) = value {
            self.0.push(Column::new(name, value));
        }
        self
    }

    fn options(&mut self, options: &OptionChanges) -> &mut Self {
        self.set(col::IS_CREATION_ALLOWED, options.is_creation_allowed)
            .set(col::IS_LINKING_ALLOWED, options.is_linking_allowed)
            .set(col::IS_AUTO_CREATION, options.is_auto_creation)
            .set(col::IS_AUTO_UPDATE, options.is_auto_update)
    }

    fn ldap_attributes(&mut self, attrs: LdapAttributeChanges) -> &mut Self {
        let values = [
            attrs.id_attribute,
            attrs.first_name_attribute,
            attrs.last_name_attribute,
            attrs.display_name_attribute,
            attrs.nick_name_attribute,
            attrs.preferred_username_attribute,
            attrs.email_attribute,
            attrs.email_verified_attribute,
            attrs.phone_attribute,
            attrs.phone_verified_attribute,
            attrs.preferred_language_attribute,
            attrs.avatar_url_attribute,
            attrs.profile_attribute,
        ];
        for (name, value) in sat::LDAP_ATTRIBUTES.into_iter().zip(values) {
            self.set(name, value);
        }
        self
    }

    fn into_columns(self) -> Vec<Column> {
        self.0
    }
}

/// Range checked by `ReducerTable::reduce` before any reducer runs.
fn sequence(event: &Event) -> Value {
    Value::BigInt(i64::try_from(event.sequence).ok())
}

/// `change_date` and `sequence` go on every base-table update.
fn audit_columns(event: &Event) -> [Column; 2] {
    [
        Column::new(col::CHANGE_DATE, timestamp(event.created_at)),
        Column::new(col::SEQUENCE, sequence(event)),
    ]
}

fn base_key(event: &Event, id: &str) -> Vec<Condition> {
    vec![
        Condition::new(col::ID, id),
        Condition::new(col::INSTANCE_ID, event.aggregate.instance_id.as_str()),
    ]
}

fn satellite_key(event: &Event, id: &str) -> Vec<Condition> {
    vec![
        Condition::new(sat::IDP_ID, id),
        Condition::new(sat::INSTANCE_ID, event.aggregate.instance_id.as_str()),
    ]
}

struct BaseRow<'a> {
    owner_type: OwnerType,
    idp_type: IdpType,
    id: &'a str,
    name: String,
    is_creation_allowed: bool,
    is_linking_allowed: bool,
    is_auto_creation: bool,
    is_auto_update: bool,
}

impl<'a> BaseRow<'a> {
    fn new(
        owner_type: OwnerType,
        idp_type: IdpType,
        id: &'a str,
        name: String,
        options: &Options,
    ) -> Self {
        Self {
            owner_type,
            idp_type,
            id,
            name,
            is_creation_allowed: options.is_creation_allowed,
            is_linking_allowed: options.is_linking_allowed,
            is_auto_creation: options.is_auto_creation,
            is_auto_update: options.is_auto_update,
        }
    }

    fn create(self, event: &Event) -> Statement {
        Statement::Create {
            suffix: None,
            columns: vec![
                Column::new(col::ID, self.id),
                Column::new(col::CREATION_DATE, timestamp(event.created_at)),
                Column::new(col::CHANGE_DATE, timestamp(event.created_at)),
                Column::new(col::SEQUENCE, sequence(event)),
                Column::new(col::RESOURCE_OWNER, event.aggregate.resource_owner.as_str()),
                Column::new(col::INSTANCE_ID, event.aggregate.instance_id.as_str()),
                Column::new(col::STATE, IdpState::Active),
                Column::new(col::NAME, self.name),
                Column::new(col::OWNER_TYPE, self.owner_type),
                Column::new(col::TYPE, self.idp_type),
                Column::new(col::IS_CREATION_ALLOWED, self.is_creation_allowed),
                Column::new(col::IS_LINKING_ALLOWED, self.is_linking_allowed),
                Column::new(col::IS_AUTO_CREATION, self.is_auto_creation),
                Column::new(col::IS_AUTO_UPDATE, self.is_auto_update),
            ],
            conflict_key: vec![col::INSTANCE_ID, col::ID],
        }
    }
}

/// Create of the satellite row selected by `idp_type`.
fn satellite_create(
    event: &Event,
    idp_type: IdpType,
    id: &str,
    columns: Vec<Column>,
) -> Option<Statement> {
    let suffix = idp_type.table_suffix()?;
    let mut all = vec![
        Column::new(sat::IDP_ID, id),
        Column::new(sat::INSTANCE_ID, event.aggregate.instance_id.as_str()),
    ];
    all.extend(columns);
    Some(Statement::Create {
        suffix: Some(suffix),
        columns: all,
        conflict_key: vec![sat::INSTANCE_ID, sat::IDP_ID],
    })
}

/// Satellite update, or nothing if the event carries no satellite field.
fn satellite_update(
    event: &Event,
    idp_type: IdpType,
    id: &str,
    changes: Changes,
) -> Option<Statement> {
    let columns = changes.into_columns();
    if columns.is_empty() {
        return None;
    }
    Some(Statement::Update {
        suffix: Some(idp_type.table_suffix()?),
        columns,
        conditions: satellite_key(event, id),
    })
}

/// Base row plus satellite row, same key, matching discriminant.
fn added(event: &Event, base: BaseRow<'_>, satellite: Vec<Column>) -> MultiStatement {
    let (idp_type, id) = (base.idp_type, base.id);
    let mut statements = vec![base.create(event)];
    statements.extend(satellite_create(event, idp_type, id, satellite));
    MultiStatement::new(event, statements)
}

/// Base update with name, options and audit columns, plus a satellite
/// update when any satellite field is present.
fn changed(
    event: &Event,
    idp_type: IdpType,
    id: &str,
    name: Option<String>,
    options: &OptionChanges,
    satellite: Changes,
) -> MultiStatement {
    let mut base = Changes::default();
    base.set(col::NAME, name).options(options);
    let mut columns = base.into_columns();
    columns.extend(audit_columns(event));

    let mut statements = vec![Statement::Update {
        suffix: None,
        columns,
        conditions: base_key(event, id),
    }];
    statements.extend(satellite_update(event, idp_type, id, satellite));
    MultiStatement::new(event, statements)
}

fn secret(value: CryptoValue) -> String {
    value.to_json_text()
}

// ============================================================================
// OAuth
// ============================================================================

fn reduce_oauth_added(event: &Event) -> Result<MultiStatement, ReduceError> {
    let (owner_type, e) = event
        .scoped::<OAuthIdpAdded>(org::OAUTH_IDP_ADDED, instance::OAUTH_IDP_ADDED)?
        .into_parts();

    Ok(added(
        event,
        BaseRow::new(owner_type, IdpType::OAuth, &e.id, e.name, &e.options),
        vec![
            Column::new(sat::CLIENT_ID, e.client_id.as_str()),
            Column::new(sat::CLIENT_SECRET, e.client_secret.to_json_text()),
            Column::new(sat::AUTHORIZATION_ENDPOINT, e.authorization_endpoint.as_str()),
            Column::new(sat::TOKEN_ENDPOINT, e.token_endpoint.as_str()),
            Column::new(sat::USER_ENDPOINT, e.user_endpoint.as_str()),
            Column::new(sat::SCOPES, string_array(&e.scopes)),
        ],
    ))
}

fn reduce_oauth_changed(event: &Event) -> Result<MultiStatement, ReduceError> {
    let e = event
        .scoped::<OAuthIdpChanged>(org::OAUTH_IDP_CHANGED, instance::OAUTH_IDP_CHANGED)?
        .into_inner();

    let mut satellite = Changes::default();
    satellite
        .set(sat::CLIENT_ID, e.client_id)
        .set(sat::CLIENT_SECRET, e.client_secret.map(secret))
        .set(sat::AUTHORIZATION_ENDPOINT, e.authorization_endpoint)
        .set(sat::TOKEN_ENDPOINT, e.token_endpoint)
        .set(sat::USER_ENDPOINT, e.user_endpoint)
        .set(sat::SCOPES, e.scopes.as_deref().map(string_array));

    Ok(changed(event, IdpType::OAuth, &e.id, e.name, &e.options, satellite))
}

// ============================================================================
// OIDC
// ============================================================================

fn reduce_oidc_added(event: &Event) -> Result<MultiStatement, ReduceError> {
    let (owner_type, e) = event
        .scoped::<OidcIdpAdded>(org::OIDC_IDP_ADDED, instance::OIDC_IDP_ADDED)?
        .into_parts();

    Ok(added(
        event,
        BaseRow::new(owner_type, IdpType::Oidc, &e.id, e.name, &e.options),
        vec![
            Column::new(sat::ISSUER, e.issuer.as_str()),
            Column::new(sat::CLIENT_ID, e.client_id.as_str()),
            Column::new(sat::CLIENT_SECRET, e.client_secret.to_json_text()),
            Column::new(sat::SCOPES, string_array(&e.scopes)),
        ],
    ))
}

fn reduce_oidc_changed(event: &Event) -> Result<MultiStatement, ReduceError> {
    let e = event
        .scoped::<OidcIdpChanged>(org::OIDC_IDP_CHANGED, instance::OIDC_IDP_CHANGED)?
        .into_inner();

    let mut satellite = Changes::default();
    satellite
        .set(sat::ISSUER, e.issuer)
        .set(sat::CLIENT_ID, e.client_id)
        .set(sat::CLIENT_SECRET, e.client_secret.map(secret))
        .set(sat::SCOPES, e.scopes.as_deref().map(string_array));

    Ok(changed(event, IdpType::Oidc, &e.id, e.name, &e.options, satellite))
}

// ============================================================================
// JWT
// ============================================================================

fn reduce_jwt_added(event: &Event) -> Result<MultiStatement, ReduceError> {
    let (owner_type, e) = event
        .scoped::<JwtIdpAdded>(org::JWT_IDP_ADDED, instance::JWT_IDP_ADDED)?
        .into_parts();

    Ok(added(
        event,
        BaseRow::new(owner_type, IdpType::Jwt, &e.id, e.name, &e.options),
        vec![
            Column::new(sat::ISSUER, e.issuer.as_str()),
            Column::new(sat::JWT_ENDPOINT, e.jwt_endpoint.as_str()),
            Column::new(sat::KEYS_ENDPOINT, e.keys_endpoint.as_str()),
            Column::new(sat::HEADER_NAME, e.header_name.as_str()),
        ],
    ))
}

fn reduce_jwt_changed(event: &Event) -> Result<MultiStatement, ReduceError> {
    let e = event
        .scoped::<JwtIdpChanged>(org::JWT_IDP_CHANGED, instance::JWT_IDP_CHANGED)?
        .into_inner();

    let mut satellite = Changes::default();
    satellite
        .set(sat::ISSUER, e.issuer)
        .set(sat::JWT_ENDPOINT, e.jwt_endpoint)
        .set(sat::KEYS_ENDPOINT, e.keys_endpoint)
        .set(sat::HEADER_NAME, e.header_name);

    Ok(changed(event, IdpType::Jwt, &e.id, e.name, &e.options, satellite))
}

// ============================================================================
// Google
// ============================================================================

fn reduce_google_added(event: &Event) -> Result<MultiStatement, ReduceError> {
    let (owner_type, e) = event
        .scoped::<GoogleIdpAdded>(org::GOOGLE_IDP_ADDED, instance::GOOGLE_IDP_ADDED)?
        .into_parts();

    Ok(added(
        event,
        BaseRow::new(owner_type, IdpType::Google, &e.id, e.name, &e.options),
        vec![
            Column::new(sat::CLIENT_ID, e.client_id.as_str()),
            Column::new(sat::CLIENT_SECRET, e.client_secret.to_json_text()),
            Column::new(sat::SCOPES, string_array(&e.scopes)),
        ],
    ))
}

fn reduce_google_changed(event: &Event) -> Result<MultiStatement, ReduceError> {
    let e = event
        .scoped::<GoogleIdpChanged>(org::GOOGLE_IDP_CHANGED, instance::GOOGLE_IDP_CHANGED)?
        .into_inner();

    let mut satellite = Changes::default();
    satellite
        .set(sat::CLIENT_ID, e.client_id)
        .set(sat::CLIENT_SECRET, e.client_secret.map(secret))
        .set(sat::SCOPES, e.scopes.as_deref().map(string_array));

    Ok(changed(event, IdpType::Google, &e.id, e.name, &e.options, satellite))
}

// ============================================================================
// LDAP
// ============================================================================

fn ldap_attribute_columns(attrs: LdapAttributes) -> Vec<Column> {
    let values = [
        attrs.id_attribute,
        attrs.first_name_attribute,
        attrs.last_name_attribute,
        attrs.display_name_attribute,
        attrs.nick_name_attribute,
        attrs.preferred_username_attribute,
        attrs.email_attribute,
        attrs.email_verified_attribute,
        attrs.phone_attribute,
        attrs.phone_verified_attribute,
        attrs.preferred_language_attribute,
        attrs.avatar_url_attribute,
        attrs.profile_attribute,
    ];
    sat::LDAP_ATTRIBUTES
        .into_iter()
        .zip(values)
        .map(|(name, value)| Column::new(name, value))
        .collect()
}

fn reduce_ldap_added(event: &Event) -> Result<MultiStatement, ReduceError> {
    let (owner_type, e) = event
        .scoped::<LdapIdpAdded>(org::LDAP_IDP_ADDED, instance::LDAP_IDP_ADDED)?
        .into_parts();

    let mut satellite = vec![
        Column::new(sat::HOST, e.host.as_str()),
        Column::new(sat::PORT, e.port.as_str()),
        Column::new(sat::TLS, e.tls),
        Column::new(sat::BASE_DN, e.base_dn.as_str()),
        Column::new(sat::USER_OBJECT_CLASS, e.user_object_class.as_str()),
        Column::new(sat::USER_UNIQUE_ATTRIBUTE, e.user_unique_attribute.as_str()),
        Column::new(sat::ADMIN, e.admin.as_str()),
        Column::new(sat::PASSWORD, e.password.to_json_text()),
    ];
    satellite.extend(ldap_attribute_columns(e.attributes));

    Ok(added(
        event,
        BaseRow::new(owner_type, IdpType::Ldap, &e.id, e.name, &e.options),
        satellite,
    ))
}

fn reduce_ldap_changed(event: &Event) -> Result<MultiStatement, ReduceError> {
    let e = event
        .scoped::<LdapIdpChanged>(org::LDAP_IDP_CHANGED, instance::LDAP_IDP_CHANGED)?
        .into_inner();

    let mut satellite = Changes::default();
    satellite
        .set(sat::HOST, e.host)
        .set(sat::PORT, e.port)
        .set(sat::TLS, e.tls)
        .set(sat::BASE_DN, e.base_dn)
        .set(sat::USER_OBJECT_CLASS, e.user_object_class)
        .set(sat::USER_UNIQUE_ATTRIBUTE, e.user_unique_attribute)
        .set(sat::ADMIN, e.admin)
        .set(sat::PASSWORD, e.password.map(secret))
        .ldap_attributes(e.attributes);

    Ok(changed(event, IdpType::Ldap, &e.id, e.name, &e.options, satellite))
}

// ============================================================================
// Legacy IdP configs
// ============================================================================

/// Generic row with an unspecified type; the typed config event that
/// follows upgrades it. Capability flags default to permissive.
fn reduce_old_config_added(event: &Event) -> Result<MultiStatement, ReduceError> {
    let (owner_type, e) = event
        .scoped::<IdpConfigAdded>(org::IDP_CONFIG_ADDED, instance::IDP_CONFIG_ADDED)?
        .into_parts();

    let base = BaseRow {
        owner_type,
        idp_type: IdpType::Unspecified,
        id: &e.idp_config_id,
        name: e.name,
        is_creation_allowed: true,
        is_linking_allowed: true,
        is_auto_creation: e.auto_register,
        is_auto_update: false,
    };
    Ok(MultiStatement::new(event, vec![base.create(event)]))
}

fn reduce_old_config_changed(event: &Event) -> Result<MultiStatement, ReduceError> {
    let e = event
        .scoped::<IdpConfigChanged>(org::IDP_CONFIG_CHANGED, instance::IDP_CONFIG_CHANGED)?
        .into_inner();

    let mut changes = Changes::default();
    changes
        .set(col::NAME, e.name)
        .set(col::IS_AUTO_CREATION, e.auto_register);
    let mut columns = changes.into_columns();
    columns.extend(audit_columns(event));

    Ok(MultiStatement::new(
        event,
        vec![Statement::Update {
            suffix: None,
            columns,
            conditions: base_key(event, &e.idp_config_id),
        }],
    ))
}

/// Discriminant upgrade of a legacy row, committed together with the
/// satellite create.
fn upgrade(event: &Event, idp_type: IdpType, id: &str, satellite: Vec<Column>) -> MultiStatement {
    let mut columns = audit_columns(event).to_vec();
    columns.push(Column::new(col::TYPE, idp_type));

    let mut statements = vec![Statement::Update {
        suffix: None,
        columns,
        conditions: base_key(event, id),
    }];
    statements.extend(satellite_create(event, idp_type, id, satellite));
    MultiStatement::new(event, statements)
}

/// Audit bump of the legacy row plus an optional satellite patch.
fn legacy_changed(event: &Event, idp_type: IdpType, id: &str, satellite: Changes) -> MultiStatement {
    let mut statements = vec![Statement::Update {
        suffix: None,
        columns: audit_columns(event).to_vec(),
        conditions: base_key(event, id),
    }];
    statements.extend(satellite_update(event, idp_type, id, satellite));
    MultiStatement::new(event, statements)
}

fn reduce_old_oidc_config_added(event: &Event) -> Result<MultiStatement, ReduceError> {
    let e = event
        .scoped::<OidcConfigAdded>(org::IDP_OIDC_CONFIG_ADDED, instance::IDP_OIDC_CONFIG_ADDED)?
        .into_inner();

    Ok(upgrade(
        event,
        IdpType::Oidc,
        &e.idp_config_id,
        vec![
            Column::new(sat::ISSUER, e.issuer.as_str()),
            Column::new(sat::CLIENT_ID, e.client_id.as_str()),
            Column::new(sat::CLIENT_SECRET, e.client_secret.to_json_text()),
            Column::new(sat::SCOPES, string_array(&e.scopes)),
        ],
    ))
}

fn reduce_old_oidc_config_changed(event: &Event) -> Result<MultiStatement, ReduceError> {
    let e = event
        .scoped::<OidcConfigChanged>(
            org::IDP_OIDC_CONFIG_CHANGED,
            instance::IDP_OIDC_CONFIG_CHANGED,
        )?
        .into_inner();

    let mut satellite = Changes::default();
    satellite
        .set(sat::CLIENT_ID, e.client_id)
        .set(sat::CLIENT_SECRET, e.client_secret.map(secret))
        .set(sat::ISSUER, e.issuer)
        .set(sat::SCOPES, e.scopes.as_deref().map(string_array));

    Ok(legacy_changed(event, IdpType::Oidc, &e.idp_config_id, satellite))
}

fn reduce_old_jwt_config_added(event: &Event) -> Result<MultiStatement, ReduceError> {
    let e = event
        .scoped::<JwtConfigAdded>(org::IDP_JWT_CONFIG_ADDED, instance::IDP_JWT_CONFIG_ADDED)?
        .into_inner();

    Ok(upgrade(
        event,
        IdpType::Jwt,
        &e.idp_config_id,
        vec![
            Column::new(sat::ISSUER, e.issuer.as_str()),
            Column::new(sat::JWT_ENDPOINT, e.jwt_endpoint.as_str()),
            Column::new(sat::KEYS_ENDPOINT, e.keys_endpoint.as_str()),
            Column::new(sat::HEADER_NAME, e.header_name.as_str()),
        ],
    ))
}

fn reduce_old_jwt_config_changed(event: &Event) -> Result<MultiStatement, ReduceError> {
    let e = event
        .scoped::<JwtConfigChanged>(
            org::IDP_JWT_CONFIG_CHANGED,
            instance::IDP_JWT_CONFIG_CHANGED,
        )?
        .into_inner();

    let mut satellite = Changes::default();
    satellite
        .set(sat::JWT_ENDPOINT, e.jwt_endpoint)
        .set(sat::ISSUER, e.issuer)
        .set(sat::KEYS_ENDPOINT, e.keys_endpoint)
        .set(sat::HEADER_NAME, e.header_name);

    Ok(legacy_changed(event, IdpType::Jwt, &e.idp_config_id, satellite))
}

// ============================================================================
// Removal
// ============================================================================

/// Hard delete of the base row. Satellites follow through the cascading
/// foreign key, so the reducer does not need to know the row's type.
fn reduce_idp_removed(event: &Event) -> Result<MultiStatement, ReduceError> {
    let e = event
        .scoped::<IdpRemoved>(org::IDP_REMOVED, instance::IDP_REMOVED)?
        .into_inner();

    Ok(MultiStatement::new(
        event,
        vec![Statement::Delete {
            suffix: None,
            conditions: base_key(event, &e.id),
        }],
    ))
}

/// Soft delete: every IdP owned by the removed org stays, flagged.
fn reduce_owner_removed(event: &Event) -> Result<MultiStatement, ReduceError> {
    event.expect(org::AGGREGATE_TYPE, org::ORG_REMOVED)?;

    let mut columns = audit_columns(event).to_vec();
    columns.push(Column::new(col::OWNER_REMOVED, true));

    Ok(MultiStatement::new(
        event,
        vec![Statement::Update {
            suffix: None,
            columns,
            conditions: vec![
                Condition::new(col::INSTANCE_ID, event.aggregate.instance_id.as_str()),
                Condition::new(col::RESOURCE_OWNER, event.aggregate.id.as_str()),
            ],
        }],
    ))
}

fn reduce_instance_removed(event: &Event) -> Result<MultiStatement, ReduceError> {
    event.expect(instance::AGGREGATE_TYPE, instance::INSTANCE_REMOVED)?;

    Ok(MultiStatement::new(
        event,
        vec![Statement::Delete {
            suffix: None,
            conditions: vec![Condition::new(
                col::INSTANCE_ID,
                event.aggregate.instance_id.as_str(),
            )],
        }],
    ))
}
