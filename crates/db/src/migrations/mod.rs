//! Database migrations.
//!
//! Schema migrations for the database.

#![allow(missing_docs)]

use sea_orm_migration::prelude::*;

mod m20250601_000001_create_app_user_table;
mod m20250601_000002_create_report_table;
mod m20250601_000003_create_protocol_counter_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250601_000001_create_app_user_table::Migration),
            Box::new(m20250601_000002_create_report_table::Migration),
            Box::new(m20250601_000003_create_protocol_counter_table::Migration),
        ]
    }
}
