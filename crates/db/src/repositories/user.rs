//! User repository.

use std::sync::Arc;

use crate::entities::{
    AppUser,
    app_user::{self, Role},
};
use aniseg_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect,
};

/// User repository for database operations.
#[derive(Clone)]
pub struct UserRepository {
    db: Arc<DatabaseConnection>,
}

impl UserRepository {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a user by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<app_user::Model>> {
        Ok(AppUser::find_by_id(id).one(self.db.as_ref()).await?)
    }

    /// Find a user by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<app_user::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {id} not found")))
    }

    /// Find an active user by the hash of their bearer token.
    pub async fn find_by_token_hash(&self, token_hash: &str) -> AppResult<Option<app_user::Model>> {
        Ok(AppUser::find()
            .filter(app_user::Column::TokenHash.eq(token_hash))
            .filter(app_user::Column::IsActive.eq(true))
            .one(self.db.as_ref())
            .await?)
    }

    /// Find a user by e-mail (case-insensitive).
    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<app_user::Model>> {
        Ok(AppUser::find()
            .filter(app_user::Column::Email.eq(email.to_lowercase()))
            .one(self.db.as_ref())
            .await?)
    }

    /// Create a new user.
    pub async fn create(&self, model: app_user::ActiveModel) -> AppResult<app_user::Model> {
        Ok(model.insert(self.db.as_ref()).await?)
    }

    /// Update a user.
    pub async fn update(&self, model: app_user::ActiveModel) -> AppResult<app_user::Model> {
        Ok(model.update(self.db.as_ref()).await?)
    }

    /// List users, newest first, optionally restricted to one role.
    pub async fn list(
        &self,
        role: Option<Role>,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<app_user::Model>> {
        let mut query = AppUser::find().order_by_desc(app_user::Column::CreatedAt);

        if let Some(role) = role {
            query = query.filter(app_user::Column::Role.eq(role));
        }

        Ok(query
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await?)
    }

    /// Count users holding a role.
    pub async fn count_by_role(&self, role: Role) -> AppResult<u64> {
        Ok(AppUser::find()
            .filter(app_user::Column::Role.eq(role))
            .count(self.db.as_ref())
            .await?)
    }

    /// Delete a user. Reports referencing the user are left untouched.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let result = AppUser::delete_by_id(id).exec(self.db.as_ref()).await?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("User {id} not found")));
        }

        Ok(())
    }
}
