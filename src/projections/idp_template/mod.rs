//! Identity provider templates.
//!
//! One row per IdP in the base table, plus exactly one row in the satellite
//! table selected by the row's type discriminant. Both org-owned and
//! instance-owned IdPs land in the same tables, distinguished by
//! `owner_type`.

mod reducers;


use crate::handler::{
    ColumnSpec, ColumnType, ForeignKeySpec, IndexSpec, MultiTableCheck, Projection, ReduceError,
    ReducerTable, TableSpec,
};

pub use reducers::reducers;

/// Projection name and base table name.
pub const TABLE: &str = "idp_templates";

pub const OAUTH_SUFFIX: &str = "oauth";
pub const OIDC_SUFFIX: &str = "oidc";
pub const JWT_SUFFIX: &str = "jwt";
pub const GOOGLE_SUFFIX: &str = "google";
pub const LDAP_SUFFIX: &str = "ldap";

/// Base table columns.
pub mod col {
    pub const ID: &str = "id";
    pub const CREATION_DATE: &str = "creation_date";
    pub const CHANGE_DATE: &str = "change_date";
    pub const SEQUENCE: &str = "sequence";
    pub const RESOURCE_OWNER: &str = "resource_owner";
    pub const INSTANCE_ID: &str = "instance_id";
    pub const STATE: &str = "state";
    pub const NAME: &str = "name";
    pub const OWNER_TYPE: &str = "owner_type";
    pub const TYPE: &str = "type";
    pub const OWNER_REMOVED: &str = "owner_removed";
    pub const IS_CREATION_ALLOWED: &str = "is_creation_allowed";
    pub const IS_LINKING_ALLOWED: &str = "is_linking_allowed";
    pub const IS_AUTO_CREATION: &str = "is_auto_creation";
    pub const IS_AUTO_UPDATE: &str = "is_auto_update";
}

/// Satellite table columns. Key columns are shared by every satellite.
pub mod sat {
    pub const IDP_ID: &str = "idp_id";
    pub const INSTANCE_ID: &str = "instance_id";

    pub const CLIENT_ID: &str = "client_id";
    pub const CLIENT_SECRET: &str = "client_secret";
    pub const AUTHORIZATION_ENDPOINT: &str = "authorization_endpoint";
    pub const TOKEN_ENDPOINT: &str = "token_endpoint";
    pub const USER_ENDPOINT: &str = "user_endpoint";
    pub const SCOPES: &str = "scopes";
    pub const ISSUER: &str = "issuer";
    pub const JWT_ENDPOINT: &str = "jwt_endpoint";
    pub const KEYS_ENDPOINT: &str = "keys_endpoint";
    pub const HEADER_NAME: &str = "header_name";

    pub const HOST: &str = "host";
    pub const PORT: &str = "port";
    pub const TLS: &str = "tls";
    pub const BASE_DN: &str = "base_dn";
    pub const USER_OBJECT_CLASS: &str = "user_object_class";
    pub const USER_UNIQUE_ATTRIBUTE: &str = "user_unique_attribute";
    pub const ADMIN: &str = "admin";
    pub const PASSWORD: &str = "password";
    pub const ID_ATTRIBUTE: &str = "id_attribute";
    pub const FIRST_NAME_ATTRIBUTE: &str = "first_name_attribute";
    pub const LAST_NAME_ATTRIBUTE: &str = "last_name_attribute";
    pub const DISPLAY_NAME_ATTRIBUTE: &str = "display_name_attribute";
    pub const NICK_NAME_ATTRIBUTE: &str = "nick_name_attribute";
    pub const PREFERRED_USERNAME_ATTRIBUTE: &str = "preferred_username_attribute";
    pub const EMAIL_ATTRIBUTE: &str = "email_attribute";
    pub const EMAIL_VERIFIED_ATTRIBUTE: &str = "email_verified_attribute";
    pub const PHONE_ATTRIBUTE: &str = "phone_attribute";
    pub const PHONE_VERIFIED_ATTRIBUTE: &str = "phone_verified_attribute";
    pub const PREFERRED_LANGUAGE_ATTRIBUTE: &str = "preferred_language_attribute";
    pub const AVATAR_URL_ATTRIBUTE: &str = "avatar_url_attribute";
    pub const PROFILE_ATTRIBUTE: &str = "profile_attribute";

    /// LDAP attribute mapping columns, in declaration order.
    pub const LDAP_ATTRIBUTES: [&str; 13] = [
        ID_ATTRIBUTE,
        FIRST_NAME_ATTRIBUTE,
        LAST_NAME_ATTRIBUTE,
        DISPLAY_NAME_ATTRIBUTE,
        NICK_NAME_ATTRIBUTE,
        PREFERRED_USERNAME_ATTRIBUTE,
        EMAIL_ATTRIBUTE,
        EMAIL_VERIFIED_ATTRIBUTE,
        PHONE_ATTRIBUTE,
        PHONE_VERIFIED_ATTRIBUTE,
        PREFERRED_LANGUAGE_ATTRIBUTE,
        AVATAR_URL_ATTRIBUTE,
        PROFILE_ATTRIBUTE,
    ];
}

/// The IdP template projection.
pub fn projection() -> Result<Projection, ReduceError> {
    Ok(Projection {
        name: TABLE,
        check: check(),
        reducers: ReducerTable::new(reducers())?,
    })
}

/// Declared layout of the base table and its five satellites.
pub fn check() -> MultiTableCheck {
    use ColumnType::*;

    let base = TableSpec::new(
        vec![
            ColumnSpec::new(col::ID, Text),
            ColumnSpec::new(col::CREATION_DATE, Timestamp),
            ColumnSpec::new(col::CHANGE_DATE, Timestamp),
            ColumnSpec::new(col::SEQUENCE, Int64),
            ColumnSpec::new(col::RESOURCE_OWNER, Text),
            ColumnSpec::new(col::INSTANCE_ID, Text),
            ColumnSpec::new(col::STATE, Enum),
            ColumnSpec::new(col::NAME, Text).nullable(),
            ColumnSpec::new(col::OWNER_TYPE, Enum),
            ColumnSpec::new(col::TYPE, Enum),
            ColumnSpec::new(col::OWNER_REMOVED, Bool).default(false),
            ColumnSpec::new(col::IS_CREATION_ALLOWED, Bool).default(false),
            ColumnSpec::new(col::IS_LINKING_ALLOWED, Bool).default(false),
            ColumnSpec::new(col::IS_AUTO_CREATION, Bool).default(false),
            ColumnSpec::new(col::IS_AUTO_UPDATE, Bool).default(false),
        ],
        vec![col::INSTANCE_ID, col::ID],
    )
    .with_index(IndexSpec::new("resource_owner", vec![col::RESOURCE_OWNER]))
    .with_index(IndexSpec::new("owner_removed", vec![col::OWNER_REMOVED]));

    let satellite = |suffix: &'static str, extra: Vec<ColumnSpec>| {
        let mut columns = vec![
            ColumnSpec::new(sat::IDP_ID, Text),
            ColumnSpec::new(sat::INSTANCE_ID, Text),
        ];
        columns.extend(extra);
        TableSpec::suffixed(suffix, columns, vec![sat::INSTANCE_ID, sat::IDP_ID]).with_foreign_key(
            ForeignKeySpec {
                columns: vec![sat::INSTANCE_ID, sat::IDP_ID],
                references: vec![col::INSTANCE_ID, col::ID],
            },
        )
    };

    let mut ldap = vec![
        ColumnSpec::new(sat::HOST, Text).nullable(),
        ColumnSpec::new(sat::PORT, Text).nullable(),
        ColumnSpec::new(sat::TLS, Bool).nullable(),
        ColumnSpec::new(sat::BASE_DN, Text).nullable(),
        ColumnSpec::new(sat::USER_OBJECT_CLASS, Text).nullable(),
        ColumnSpec::new(sat::USER_UNIQUE_ATTRIBUTE, Text).nullable(),
        ColumnSpec::new(sat::ADMIN, Text).nullable(),
        ColumnSpec::new(sat::PASSWORD, Jsonb).nullable(),
    ];
    ldap.extend(
        sat::LDAP_ATTRIBUTES
            .iter()
            .map(|name| ColumnSpec::new(*name, Text).nullable()),
    );

    MultiTableCheck::new(
        TABLE,
        vec![
            base,
            satellite(
                OAUTH_SUFFIX,
                vec![
                    ColumnSpec::new(sat::CLIENT_ID, Text),
                    ColumnSpec::new(sat::CLIENT_SECRET, Jsonb),
                    ColumnSpec::new(sat::AUTHORIZATION_ENDPOINT, Text),
                    ColumnSpec::new(sat::TOKEN_ENDPOINT, Text),
                    ColumnSpec::new(sat::USER_ENDPOINT, Text),
                    ColumnSpec::new(sat::SCOPES, TextArray).nullable(),
                ],
            ),
            satellite(
                OIDC_SUFFIX,
                vec![
                    ColumnSpec::new(sat::ISSUER, Text),
                    ColumnSpec::new(sat::CLIENT_ID, Text),
                    ColumnSpec::new(sat::CLIENT_SECRET, Jsonb),
                    ColumnSpec::new(sat::SCOPES, TextArray).nullable(),
                ],
            ),
            satellite(
                JWT_SUFFIX,
                vec![
                    ColumnSpec::new(sat::ISSUER, Text),
                    ColumnSpec::new(sat::JWT_ENDPOINT, Text),
                    ColumnSpec::new(sat::KEYS_ENDPOINT, Text),
                    ColumnSpec::new(sat::HEADER_NAME, Text).nullable(),
                ],
            ),
            satellite(
                GOOGLE_SUFFIX,
                vec![
                    ColumnSpec::new(sat::CLIENT_ID, Text),
                    ColumnSpec::new(sat::CLIENT_SECRET, Jsonb),
                    ColumnSpec::new(sat::SCOPES, TextArray).nullable(),
                ],
            ),
            satellite(LDAP_SUFFIX, ldap),
        ],
    )
}
