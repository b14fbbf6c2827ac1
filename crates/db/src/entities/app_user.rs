//! User entity: reporting citizens and investigating authorities.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Role taxonomy. `Admin` is a superset of `Authority`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Reporting citizen. Persisted as `user`.
    #[sea_orm(string_value = "user")]
    #[serde(rename = "user")]
    #[default]
    Citizen,
    #[sea_orm(string_value = "authority")]
    Authority,
    #[sea_orm(string_value = "admin")]
    Admin,
}

impl Role {
    /// Persisted and wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Citizen => "user",
            Self::Authority => "authority",
            Self::Admin => "admin",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "app_user")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Lower-cased.
    #[sea_orm(unique)]
    pub email: String,

    #[sea_orm(nullable)]
    pub name: Option<String>,

    pub role: Role,

    /// National id number (CPF), digits only.
    #[sea_orm(unique, nullable)]
    pub cpf: Option<String>,

    #[sea_orm(nullable)]
    pub phone: Option<String>,

    /// SHA-256 of the bearer token, hex encoded.
    #[sea_orm(unique, nullable)]
    #[serde(skip_serializing)]
    pub token_hash: Option<String>,

    #[sea_orm(default_value = true)]
    pub is_active: bool,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(nullable)]
    pub last_login_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
