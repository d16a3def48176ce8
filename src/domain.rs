//! Identity provider domain enums shared by the projection and its readers.
//!
//! Each enum is persisted as a small integer. The numeric values are part of
//! the read model's contract and must never be renumbered.

use sea_query::Value;
use serde::{Deserialize, Serialize};

/// Lifecycle state of an identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i16)]
pub enum IdpState {
    Unspecified = 0,
    Active = 1,
    Inactive = 2,
    Removed = 3,
}

/// Who owns an identity provider: the instance itself or one of its orgs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i16)]
pub enum OwnerType {
    System = 0,
    Org = 1,
}

/// Type discriminant of an identity provider template.
///
/// The set is closed: every concrete variant owns exactly one satellite
/// table. Adding a provider type is a schema change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i16)]
pub enum IdpType {
    Unspecified = 0,
    Oidc = 1,
    Jwt = 2,
    OAuth = 3,
    Ldap = 4,
    Google = 5,
}

impl IdpType {
    /// All variants that own a satellite table.
    pub const CONCRETE: [IdpType; 5] = [
        IdpType::OAuth,
        IdpType::Oidc,
        IdpType::Jwt,
        IdpType::Google,
        IdpType::Ldap,
    ];

    /// Suffix of the satellite table holding this type's configuration.
    ///
    /// `None` for [`IdpType::Unspecified`], which has no satellite.
    pub fn table_suffix(self) -> Option<&'static str> {
        match self {
            IdpType::Unspecified => None,
            IdpType::OAuth => Some("oauth"),
            IdpType::Oidc => Some("oidc"),
            IdpType::Jwt => Some("jwt"),
            IdpType::Google => Some("google"),
            IdpType::Ldap => Some("ldap"),
        }
    }
}

macro_rules! impl_small_int_enum {
    ($ty:ty { $($variant:ident),+ $(,)? }) => {
        impl TryFrom<i16> for $ty {
            type Error = i16;

            fn try_from(value: i16) -> Result<Self, Self::Error> {
                $(
                    if value == <$ty>::$variant as i16 {
                        return Ok(<$ty>::$variant);
                    }
                )+
                Err(value)
            }
        }

        impl From<$ty> for Value {
            fn from(value: $ty) -> Self {
                Value::SmallInt(Some(value as i16))
            }
        }
    };
}

impl_small_int_enum!(IdpState { Unspecified, Active, Inactive, Removed });
impl_small_int_enum!(OwnerType { System, Org });
impl_small_int_enum!(IdpType { Unspecified, Oidc, Jwt, OAuth, Ldap, Google });

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idp_type_round_trips_through_small_int() {
        for idp_type in IdpType::CONCRETE {
            assert_eq!(IdpType::try_from(idp_type as i16), Ok(idp_type));
        }
        assert_eq!(IdpType::try_from(0i16), Ok(IdpType::Unspecified));
        assert_eq!(IdpType::try_from(42i16), Err(42));
    }

    #[test]
    fn test_only_unspecified_has_no_satellite() {
        assert_eq!(IdpType::Unspecified.table_suffix(), None);
        for idp_type in IdpType::CONCRETE {
            assert!(idp_type.table_suffix().is_some());
        }
    }

    #[test]
    fn test_enum_value_encoding() {
        assert_eq!(Value::from(OwnerType::Org), Value::SmallInt(Some(1)));
        assert_eq!(Value::from(IdpState::Active), Value::SmallInt(Some(1)));
        assert_eq!(Value::from(IdpType::Google), Value::SmallInt(Some(5)));
    }
}
