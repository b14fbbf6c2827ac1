//! Per-day protocol sequence.

use sea_orm::entity::prelude::*;

/// One row per calendar day that has issued at least one protocol number.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "protocol_counter")]
pub struct Model {
    /// `YYYYMMDD`.
    #[sea_orm(primary_key, auto_increment = false)]
    pub day: String,

    /// Last sequence handed out for the day.
    pub last_value: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
