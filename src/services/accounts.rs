use chrono::Utc;
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    auth::{hash_password, issue_token, verify_password, RequestContext},
    config::AppConfig,
    db::with_transaction,
    entities::{cart, order, order_item, user, Cart, Order, OrderItem, User, UserModel},
    errors::ServiceError,
    gateway::PaymentGateways,
    models::{PaymentMethod, Role, ShippingAddress},
    services::{cart::CartService, orders::Page},
};

const INVALID_CREDENTIALS: &str = "Invalid email or password.";

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SignUpRequest {
    /// Blank falls back to the email's local part.
    #[serde(default)]
    #[validate(custom = "validate_display_name")]
    pub name: String,
    #[validate(email(message = "Invalid email address."))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters long."))]
    pub password: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters long."))]
    pub confirm_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SignInRequest {
    #[validate(email(message = "Invalid email address."))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters long."))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 3, message = "Name must be at least 3 characters."))]
    pub name: String,
}

/// Admin edit of another account.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 3, message = "Name must be at least 3 characters."))]
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignInResponse {
    pub token: String,
    pub user: UserModel,
}

fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.chars().count() >= 3 {
        Ok(())
    } else {
        let mut err = ValidationError::new("name_length");
        err.message = Some("Name must be at least 3 characters.".into());
        Err(err)
    }
}

/// Sign-up, sign-in and the checkout profile (address, payment method).
#[derive(Clone)]
pub struct AccountService {
    db: Arc<DatabaseConnection>,
    carts: CartService,
    config: Arc<AppConfig>,
    gateways: PaymentGateways,
}

impl AccountService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        carts: CartService,
        config: Arc<AppConfig>,
        gateways: PaymentGateways,
    ) -> Self {
        Self {
            db,
            carts,
            config,
            gateways,
        }
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn sign_up(&self, request: SignUpRequest) -> Result<UserModel, ServiceError> {
        request.validate()?;
        if request.password != request.confirm_password {
            return Err(ServiceError::ValidationError(
                "Passwords don't match.".to_string(),
            ));
        }

        let email = request.email.trim().to_lowercase();
        let db = &*self.db;

        let taken = User::find()
            .filter(user::Column::Email.eq(email.as_str()))
            .one(db)
            .await?
            .is_some();
        if taken {
            return Err(ServiceError::ValidationError(
                "Email already exists.".to_string(),
            ));
        }

        let name = match request.name.trim() {
            "" => email.split('@').next().unwrap_or_default().to_string(),
            name => name.to_string(),
        };
        let now = Utc::now();

        let created = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            email: Set(email),
            password_hash: Set(Some(hash_password(&request.password)?)),
            role: Set(Role::User),
            address: Set(None),
            payment_method: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await?;

        info!(user_id = %created.id, "User signed up");
        Ok(created)
    }

    /// Verifies credentials, issues a token and adopts the caller's session
    /// cart when there is one.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn sign_in(
        &self,
        request: SignInRequest,
        session_cart_id: Option<&str>,
    ) -> Result<SignInResponse, ServiceError> {
        request
            .validate()
            .map_err(|_| ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

        let email = request.email.trim().to_lowercase();
        let user = User::find()
            .filter(user::Column::Email.eq(email.as_str()))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

        let verified = user
            .password_hash
            .as_deref()
            .map(|hash| verify_password(&request.password, hash))
            .unwrap_or(false);
        if !verified {
            warn!(user_id = %user.id, "Rejected sign-in attempt");
            return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        let token = issue_token(
            &self.config.jwt_secret,
            self.config.jwt_expiration,
            user.id,
            &user.name,
            &user.email,
            user.role,
        )?;

        if let Some(session_cart_id) = session_cart_id {
            self.carts.claim_session_cart(session_cart_id, user.id).await?;
        }

        info!(user_id = %user.id, "User signed in");
        Ok(SignInResponse { token, user })
    }

    /// Drops the user's carts so nothing carries over to the next shopper.
    #[instrument(skip(self, ctx))]
    pub async fn sign_out(&self, ctx: &RequestContext) -> Result<(), ServiceError> {
        let current = ctx.require_user()?;
        self.carts.discard_user_carts(current.id).await?;
        info!(user_id = %current.id, "User signed out");
        Ok(())
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<UserModel, ServiceError> {
        User::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))
    }

    #[instrument(skip(self, ctx, address))]
    pub async fn update_address(
        &self,
        ctx: &RequestContext,
        address: ShippingAddress,
    ) -> Result<UserModel, ServiceError> {
        let current = ctx.require_user()?;
        address.validate()?;

        let existing = self.get_user(current.id).await?;
        let mut model: user::ActiveModel = existing.into();
        model.address = Set(Some(address));
        model.updated_at = Set(Utc::now());
        let updated = model.update(&*self.db).await?;

        info!(user_id = %updated.id, "Shipping address updated");
        Ok(updated)
    }

    #[instrument(skip(self, ctx))]
    pub async fn update_payment_method(
        &self,
        ctx: &RequestContext,
        method: &str,
    ) -> Result<UserModel, ServiceError> {
        let current = ctx.require_user()?;
        let method: PaymentMethod = method
            .parse()
            .map_err(|_| ServiceError::ValidationError("Invalid payment method".to_string()))?;
        if !self.config.accepts_payment_method(method) || !self.gateways.can_settle(method) {
            return Err(ServiceError::ValidationError(
                "Invalid payment method".to_string(),
            ));
        }

        let existing = self.get_user(current.id).await?;
        let mut model: user::ActiveModel = existing.into();
        model.payment_method = Set(Some(method));
        model.updated_at = Set(Utc::now());
        let updated = model.update(&*self.db).await?;

        info!(user_id = %updated.id, payment_method = %method, "Payment method updated");
        Ok(updated)
    }

    /// Renames the signed-in user. Email and role are not editable here.
    #[instrument(skip(self, ctx, request))]
    pub async fn update_profile(
        &self,
        ctx: &RequestContext,
        request: UpdateProfileRequest,
    ) -> Result<UserModel, ServiceError> {
        let current = ctx.require_user()?;
        request.validate()?;

        let existing = self.get_user(current.id).await?;
        let mut model: user::ActiveModel = existing.into();
        model.name = Set(request.name.trim().to_string());
        model.updated_at = Set(Utc::now());
        let updated = model.update(&*self.db).await?;

        info!(user_id = %updated.id, "Profile updated");
        Ok(updated)
    }

    /// Admin listing, newest first, optionally narrowed by name.
    #[instrument(skip(self, ctx))]
    pub async fn all_users(
        &self,
        ctx: &RequestContext,
        query: Option<&str>,
        page: u64,
    ) -> Result<Page<UserModel>, ServiceError> {
        ctx.require_admin()?;
        let page = page.max(1);
        let per_page = self.config.page_size.max(1);

        let mut select = User::find().order_by_desc(user::Column::CreatedAt);
        if let Some(query) = query.map(str::trim).filter(|q| !q.is_empty()) {
            let pattern = format!("%{}%", query.to_lowercase());
            select =
                select.filter(Expr::expr(Func::lower(Expr::col(user::Column::Name))).like(pattern));
        }

        let paginator = select.paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let data = paginator.fetch_page(page - 1).await?;
        Ok(Page::new(data, total, page, per_page))
    }

    /// Admin rename and role change. A role change takes effect on the
    /// user's next sign-in, since the role travels in the token.
    #[instrument(skip(self, ctx, request), fields(user_id = %user_id))]
    pub async fn update_user(
        &self,
        ctx: &RequestContext,
        user_id: Uuid,
        request: UpdateUserRequest,
    ) -> Result<UserModel, ServiceError> {
        ctx.require_admin()?;
        request.validate()?;

        let existing = self.get_user(user_id).await?;
        let mut model: user::ActiveModel = existing.into();
        model.name = Set(request.name.trim().to_string());
        model.role = Set(request.role);
        model.updated_at = Set(Utc::now());
        let updated = model.update(&*self.db).await?;

        info!(user_id = %updated.id, role = ?updated.role, "User updated");
        Ok(updated)
    }

    /// Removes an account together with its carts and orders. Admins cannot
    /// delete themselves.
    #[instrument(skip(self, ctx), fields(user_id = %user_id))]
    pub async fn delete_user(&self, ctx: &RequestContext, user_id: Uuid) -> Result<(), ServiceError> {
        let admin = ctx.require_admin()?;
        if admin.id == user_id {
            return Err(ServiceError::InvalidOperation(
                "You cannot delete your own account".to_string(),
            ));
        }

        with_transaction(&self.db, move |txn| {
            Box::pin(async move {
                let order_ids: Vec<Uuid> = Order::find()
                    .select_only()
                    .column(order::Column::Id)
                    .filter(order::Column::UserId.eq(user_id))
                    .into_tuple()
                    .all(txn)
                    .await?;
                if !order_ids.is_empty() {
                    OrderItem::delete_many()
                        .filter(order_item::Column::OrderId.is_in(order_ids))
                        .exec(txn)
                        .await?;
                }
                Order::delete_many()
                    .filter(order::Column::UserId.eq(user_id))
                    .exec(txn)
                    .await?;
                Cart::delete_many()
                    .filter(cart::Column::UserId.eq(user_id))
                    .exec(txn)
                    .await?;

                let deleted = User::delete_by_id(user_id).exec(txn).await?;
                if deleted.rows_affected == 0 {
                    return Err(ServiceError::NotFound("User not found".to_string()));
                }
                Ok(())
            })
        })
        .await?;

        info!(user_id = %user_id, "User deleted");
        Ok(())
    }
}
