//! Event-type tags emitted by the org aggregate.
//!
//! Tags are persisted with every event and can never be renamed.

pub const AGGREGATE_TYPE: &str = "org";

pub const ORG_REMOVED: &str = "org.removed";

pub const OAUTH_IDP_ADDED: &str = "org.idp.oauth.added";
pub const OAUTH_IDP_CHANGED: &str = "org.idp.oauth.changed";
pub const OIDC_IDP_ADDED: &str = "org.idp.oidc.added";
pub const OIDC_IDP_CHANGED: &str = "org.idp.oidc.changed";
pub const JWT_IDP_ADDED: &str = "org.idp.jwt.added";
pub const JWT_IDP_CHANGED: &str = "org.idp.jwt.changed";
pub const GOOGLE_IDP_ADDED: &str = "org.idp.google.added";
pub const GOOGLE_IDP_CHANGED: &str = "org.idp.google.changed";
pub const LDAP_IDP_ADDED: &str = "org.idp.ldap.added";
pub const LDAP_IDP_CHANGED: &str = "org.idp.ldap.changed";
pub const IDP_REMOVED: &str = "org.idp.removed";

// Pre-template generation. Still present in old histories.
pub const IDP_CONFIG_ADDED: &str = "org.idp.config.added";
pub const IDP_CONFIG_CHANGED: &str = "org.idp.config.changed";
pub const IDP_OIDC_CONFIG_ADDED: &str = "org.idp.oidc.config.added";
pub const IDP_OIDC_CONFIG_CHANGED: &str = "org.idp.oidc.config.changed";
pub const IDP_JWT_CONFIG_ADDED: &str = "org.idp.jwt.config.added";
pub const IDP_JWT_CONFIG_CHANGED: &str = "org.idp.jwt.config.changed";
