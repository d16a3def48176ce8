//! Typed payloads of identity provider events.
//!
//! Org and instance aggregates emit structurally identical payloads under
//! different tags, so one type serves both scopes.
//!
//! In `*Changed` payloads every mutable attribute is an `Option`: a missing
//! field means "leave as is", a present value (an empty string or list
//! included) means "overwrite".

use serde::{Deserialize, Serialize};

/// Encrypted secret as produced by the command side.
///
/// Treated as an opaque blob and stored verbatim as JSON text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CryptoValue(pub serde_json::Value);

impl CryptoValue {
    pub fn to_json_text(&self) -> String {
        self.0.to_string()
    }
}

/// Options shared by every current-generation IdP.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
    pub is_creation_allowed: bool,
    pub is_linking_allowed: bool,
    pub is_auto_creation: bool,
    pub is_auto_update: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionChanges {
    pub is_creation_allowed: Option<bool>,
    pub is_linking_allowed: Option<bool>,
    pub is_auto_creation: Option<bool>,
    pub is_auto_update: Option<bool>,
}

// ============================================================================
// OAuth
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthIdpAdded {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub client_id: String,
    pub client_secret: CryptoValue,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub user_endpoint: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(flatten)]
    pub options: Options,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthIdpChanged {
    pub id: String,
    pub name: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<CryptoValue>,
    pub authorization_endpoint: Option<String>,
    pub token_endpoint: Option<String>,
    pub user_endpoint: Option<String>,
    pub scopes: Option<Vec<String>>,
    #[serde(flatten)]
    pub options: OptionChanges,
}

// ============================================================================
// OIDC
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OidcIdpAdded {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub issuer: String,
    pub client_id: String,
    pub client_secret: CryptoValue,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(flatten)]
    pub options: Options,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OidcIdpChanged {
    pub id: String,
    pub name: Option<String>,
    pub issuer: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<CryptoValue>,
    pub scopes: Option<Vec<String>>,
    #[serde(flatten)]
    pub options: OptionChanges,
}

// ============================================================================
// JWT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JwtIdpAdded {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub issuer: String,
    pub jwt_endpoint: String,
    pub keys_endpoint: String,
    #[serde(default)]
    pub header_name: String,
    #[serde(flatten)]
    pub options: Options,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JwtIdpChanged {
    pub id: String,
    pub name: Option<String>,
    pub issuer: Option<String>,
    pub jwt_endpoint: Option<String>,
    pub keys_endpoint: Option<String>,
    pub header_name: Option<String>,
    #[serde(flatten)]
    pub options: OptionChanges,
}

// ============================================================================
// Google
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleIdpAdded {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub client_id: String,
    pub client_secret: CryptoValue,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(flatten)]
    pub options: Options,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleIdpChanged {
    pub id: String,
    pub name: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<CryptoValue>,
    pub scopes: Option<Vec<String>>,
    #[serde(flatten)]
    pub options: OptionChanges,
}

// ============================================================================
// LDAP
// ============================================================================

/// Mapping of LDAP attributes onto user profile fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LdapAttributes {
    pub id_attribute: String,
    pub first_name_attribute: String,
    pub last_name_attribute: String,
    pub display_name_attribute: String,
    pub nick_name_attribute: String,
    pub preferred_username_attribute: String,
    pub email_attribute: String,
    pub email_verified_attribute: String,
    pub phone_attribute: String,
    pub phone_verified_attribute: String,
    pub preferred_language_attribute: String,
    pub avatar_url_attribute: String,
    pub profile_attribute: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LdapAttributeChanges {
    pub id_attribute: Option<String>,
    pub first_name_attribute: Option<String>,
    pub last_name_attribute: Option<String>,
    pub display_name_attribute: Option<String>,
    pub nick_name_attribute: Option<String>,
    pub preferred_username_attribute: Option<String>,
    pub email_attribute: Option<String>,
    pub email_verified_attribute: Option<String>,
    pub phone_attribute: Option<String>,
    pub phone_verified_attribute: Option<String>,
    pub preferred_language_attribute: Option<String>,
    pub avatar_url_attribute: Option<String>,
    pub profile_attribute: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LdapIdpAdded {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub host: String,
    #[serde(default)]
    pub port: String,
    #[serde(default)]
    pub tls: bool,
    #[serde(rename = "baseDN")]
    pub base_dn: String,
    pub user_object_class: String,
    pub user_unique_attribute: String,
    pub admin: String,
    pub password: CryptoValue,
    #[serde(flatten)]
    pub attributes: LdapAttributes,
    #[serde(flatten)]
    pub options: Options,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LdapIdpChanged {
    pub id: String,
    pub name: Option<String>,
    pub host: Option<String>,
    pub port: Option<String>,
    pub tls: Option<bool>,
    #[serde(rename = "baseDN")]
    pub base_dn: Option<String>,
    pub user_object_class: Option<String>,
    pub user_unique_attribute: Option<String>,
    pub admin: Option<String>,
    pub password: Option<CryptoValue>,
    #[serde(flatten)]
    pub attributes: LdapAttributeChanges,
    #[serde(flatten)]
    pub options: OptionChanges,
}

// ============================================================================
// Removal
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdpRemoved {
    pub id: String,
}

// ============================================================================
// Legacy IdP configs
// ============================================================================

/// Generic config added by the pre-template generation. The type-specific
/// part follows in a separate [`OidcConfigAdded`] or [`JwtConfigAdded`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdpConfigAdded {
    pub idp_config_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub auto_register: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdpConfigChanged {
    pub idp_config_id: String,
    pub name: Option<String>,
    pub auto_register: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OidcConfigAdded {
    pub idp_config_id: String,
    pub client_id: String,
    pub client_secret: CryptoValue,
    pub issuer: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OidcConfigChanged {
    pub idp_config_id: String,
    pub client_id: Option<String>,
    pub client_secret: Option<CryptoValue>,
    pub issuer: Option<String>,
    pub scopes: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JwtConfigAdded {
    pub idp_config_id: String,
    pub jwt_endpoint: String,
    pub issuer: String,
    pub keys_endpoint: String,
    #[serde(default)]
    pub header_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JwtConfigChanged {
    pub idp_config_id: String,
    pub jwt_endpoint: Option<String>,
    pub issuer: Option<String>,
    pub keys_endpoint: Option<String>,
    pub header_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_changed_distinguishes_missing_from_empty() {
        let changed: OAuthIdpChanged = serde_json::from_value(json!({
            "id": "idp1",
            "clientId": "",
            "scopes": [],
        }))
        .unwrap();

        assert_eq!(changed.client_id.as_deref(), Some(""));
        assert_eq!(changed.scopes, Some(vec![]));
        assert!(changed.client_secret.is_none());
        assert!(changed.token_endpoint.is_none());
        assert_eq!(changed.options, OptionChanges::default());
    }

    #[test]
    fn test_flattened_options_decode() {
        let added: GoogleIdpAdded = serde_json::from_value(json!({
            "id": "idp1",
            "name": "google",
            "clientId": "c1",
            "clientSecret": { "keyId": "k1", "crypted": "AAEC" },
            "isLinkingAllowed": true,
            "isAutoUpdate": true,
        }))
        .unwrap();

        assert!(added.options.is_linking_allowed);
        assert!(added.options.is_auto_update);
        assert!(!added.options.is_creation_allowed);
        assert!(added.scopes.is_empty());
    }

    #[test]
    fn test_ldap_attribute_changes_decode() {
        let changed: LdapIdpChanged = serde_json::from_value(json!({
            "id": "idp1",
            "baseDN": "dc=example,dc=com",
            "tls": false,
            "emailAttribute": "mail",
        }))
        .unwrap();

        assert_eq!(changed.base_dn.as_deref(), Some("dc=example,dc=com"));
        assert_eq!(changed.tls, Some(false));
        assert_eq!(changed.attributes.email_attribute.as_deref(), Some("mail"));
        assert!(changed.attributes.id_attribute.is_none());
    }
}
