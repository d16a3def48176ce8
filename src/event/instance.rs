//! Event-type tags emitted by the instance aggregate.
//!
//! Tags are persisted with every event and can never be renamed.

pub const AGGREGATE_TYPE: &str = "instance";

pub const INSTANCE_REMOVED: &str = "instance.removed";

pub const OAUTH_IDP_ADDED: &str = "instance.idp.oauth.added";
pub const OAUTH_IDP_CHANGED: &str = "instance.idp.oauth.changed";
pub const OIDC_IDP_ADDED: &str = "instance.idp.oidc.added";
pub const OIDC_IDP_CHANGED: &str = "instance.idp.oidc.changed";
pub const JWT_IDP_ADDED: &str = "instance.idp.jwt.added";
pub const JWT_IDP_CHANGED: &str = "instance.idp.jwt.changed";
pub const GOOGLE_IDP_ADDED: &str = "instance.idp.google.added";
pub const GOOGLE_IDP_CHANGED: &str = "instance.idp.google.changed";
pub const LDAP_IDP_ADDED: &str = "instance.idp.ldap.added";
pub const LDAP_IDP_CHANGED: &str = "instance.idp.ldap.changed";
pub const IDP_REMOVED: &str = "instance.idp.removed";

// Pre-template generation. Still present in old histories.
pub const IDP_CONFIG_ADDED: &str = "instance.idp.config.added";
pub const IDP_CONFIG_CHANGED: &str = "instance.idp.config.changed";
pub const IDP_OIDC_CONFIG_ADDED: &str = "instance.idp.oidc.config.added";
pub const IDP_OIDC_CONFIG_CHANGED: &str = "instance.idp.oidc.config.changed";
pub const IDP_JWT_CONFIG_ADDED: &str = "instance.idp.jwt.config.added";
pub const IDP_JWT_CONFIG_CHANGED: &str = "instance.idp.jwt.config.changed";
