//! User service: the session collaborator that turns a bearer token into
//! an actor, plus staff-only user management.

use aniseg_common::{AppError, AppResult, IdGenerator};
use aniseg_db::{
    entities::app_user::{self, Role},
    repositories::UserRepository,
};
use sea_orm::Set;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use validator::Validate;

use super::validation::FieldValidator;
use crate::lifecycle::{Actor, Operation, authorize};

/// Hash a bearer token for storage and lookup.
#[must_use]
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Input for provisioning a user.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserInput {
    #[validate(email, length(max = 254))]
    pub email: String,

    #[validate(length(min = 1, max = 256))]
    pub name: Option<String>,

    #[serde(default)]
    pub role: Role,

    pub cpf: Option<String>,

    pub phone: Option<String>,
}

/// Input for updating a user.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserInput {
    #[validate(email, length(max = 254))]
    pub email: Option<String>,

    #[validate(length(min = 1, max = 256))]
    pub name: Option<String>,

    /// Honored only for staff callers.
    pub role: Option<Role>,

    pub cpf: Option<String>,

    pub phone: Option<String>,
}

/// User service for business logic.
#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
    validator: FieldValidator,
    id_gen: IdGenerator,
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub const fn new(user_repo: UserRepository) -> Self {
        Self {
            user_repo,
            validator: FieldValidator::new(),
            id_gen: IdGenerator::new(),
        }
    }

    /// Authenticate a user by bearer token.
    pub async fn authenticate_by_token(&self, token: &str) -> AppResult<app_user::Model> {
        self.user_repo
            .find_by_token_hash(&hash_token(token))
            .await?
            .ok_or(AppError::Unauthorized)
    }

    /// Get a user by ID. Callers may read themselves; staff may read anyone.
    pub async fn get(&self, actor: &Actor, id: &str) -> AppResult<app_user::Model> {
        if actor.id != id {
            authorize(actor, Operation::ManageUsers, None)?;
        }
        self.user_repo.get_by_id(id).await
    }

    fn check_identifiers(&self, cpf: Option<&str>, phone: Option<&str>) -> AppResult<()> {
        if cpf.is_some_and(|c| !self.validator.is_valid_cpf(c)) {
            return Err(AppError::Validation("invalid CPF".to_string()));
        }
        if phone.is_some_and(|p| !self.validator.is_valid_phone(p)) {
            return Err(AppError::Validation("invalid phone number".to_string()));
        }
        Ok(())
    }

    fn check_role_grant(actor: &Actor, role: Role) -> AppResult<()> {
        if role == Role::Admin && actor.role != Role::Admin {
            return Err(AppError::Forbidden(
                "only an admin may grant the admin role".to_string(),
            ));
        }
        Ok(())
    }

    /// Provision a user and issue their bearer token.
    ///
    /// The plain token is returned once; only its hash is stored.
    pub async fn create(
        &self,
        actor: &Actor,
        input: CreateUserInput,
    ) -> AppResult<(app_user::Model, String)> {
        authorize(actor, Operation::ManageUsers, None)?;
        Self::check_role_grant(actor, input.role)?;
        input.validate()?;
        self.check_identifiers(input.cpf.as_deref(), input.phone.as_deref())?;

        let email = input.email.trim().to_lowercase();
        if self.user_repo.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict(format!("{email} is already registered")));
        }

        let token = self.id_gen.generate_token();
        let user = self
            .insert_user(email, input.name, input.role, input.cpf, input.phone, &token)
            .await?;

        tracing::info!(
            user_id = %user.id,
            role = user.role.as_str(),
            actor_id = %actor.id,
            "User provisioned"
        );
        Ok((user, token))
    }

    async fn insert_user(
        &self,
        email: String,
        name: Option<String>,
        role: Role,
        cpf: Option<String>,
        phone: Option<String>,
        token: &str,
    ) -> AppResult<app_user::Model> {
        let model = app_user::ActiveModel {
            id: Set(self.id_gen.generate()),
            email: Set(email),
            name: Set(name),
            role: Set(role),
            cpf: Set(cpf.map(|c| c.chars().filter(char::is_ascii_digit).collect())),
            phone: Set(phone),
            token_hash: Set(Some(hash_token(token))),
            is_active: Set(true),
            created_at: Set(chrono::Utc::now().into()),
            updated_at: Set(None),
            last_login_at: Set(None),
        };

        self.user_repo.create(model).await
    }

    /// Create the first admin from configuration if it does not exist yet.
    ///
    /// Returns `true` when an account was created.
    pub async fn ensure_bootstrap_admin(&self, email: &str, token: &str) -> AppResult<bool> {
        let email = email.trim().to_lowercase();
        if self.user_repo.find_by_email(&email).await?.is_some() {
            return Ok(false);
        }

        let user = self
            .insert_user(email, None, Role::Admin, None, None, token)
            .await?;

        tracing::info!(user_id = %user.id, "Bootstrap admin created");
        Ok(true)
    }

    /// List users (staff only).
    pub async fn list(
        &self,
        actor: &Actor,
        role: Option<Role>,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<app_user::Model>> {
        authorize(actor, Operation::ManageUsers, None)?;
        self.user_repo.list(role, limit, offset).await
    }

    /// Update a user. Callers may edit themselves; staff may edit anyone.
    pub async fn update(
        &self,
        actor: &Actor,
        id: &str,
        input: UpdateUserInput,
    ) -> AppResult<app_user::Model> {
        if actor.id != id {
            authorize(actor, Operation::ManageUsers, None)?;
        }
        input.validate()?;
        self.check_identifiers(input.cpf.as_deref(), input.phone.as_deref())?;

        let user = self.user_repo.get_by_id(id).await?;
        let mut active: app_user::ActiveModel = user.into();

        if let Some(email) = input.email {
            let email = email.trim().to_lowercase();
            if self
                .user_repo
                .find_by_email(&email)
                .await?
                .is_some_and(|other| other.id != id)
            {
                return Err(AppError::Conflict(format!("{email} is already registered")));
            }
            active.email = Set(email);
        }
        if let Some(name) = input.name {
            active.name = Set(Some(name));
        }
        if let Some(role) = input.role {
            if !actor.is_staff() {
                return Err(AppError::Forbidden("only staff may change roles".to_string()));
            }
            Self::check_role_grant(actor, role)?;
            active.role = Set(role);
        }
        if let Some(cpf) = input.cpf {
            active.cpf = Set(Some(cpf.chars().filter(char::is_ascii_digit).collect()));
        }
        if let Some(phone) = input.phone {
            active.phone = Set(Some(phone));
        }
        active.updated_at = Set(Some(chrono::Utc::now().into()));

        self.user_repo.update(active).await
    }

    /// Replace the caller's bearer token.
    pub async fn regenerate_token(&self, actor: &Actor) -> AppResult<String> {
        let user = self.user_repo.get_by_id(&actor.id).await?;
        let token = self.id_gen.generate_token();

        let mut active: app_user::ActiveModel = user.into();
        active.token_hash = Set(Some(hash_token(&token)));
        active.updated_at = Set(Some(chrono::Utc::now().into()));
        self.user_repo.update(active).await?;

        Ok(token)
    }

    /// Delete a user (staff only). Their reports are kept.
    pub async fn delete(&self, actor: &Actor, id: &str) -> AppResult<()> {
        authorize(actor, Operation::ManageUsers, None)?;
        if actor.id == id {
            return Err(AppError::BadRequest("cannot delete yourself".to_string()));
        }

        self.user_repo.delete(id).await?;
        tracing::info!(user_id = %id, actor_id = %actor.id, "User deleted");
        Ok(())
    }
}
