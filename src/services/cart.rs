use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::RequestContext,
    config::PricingConfig,
    db::with_transaction,
    entities::{cart, product, Cart, CartModel, Product},
    errors::ServiceError,
    events::{Event, EventSender},
    models::{CartLine, CartLines},
    money::ZERO_PRICE,
    services::pricing::{calc_prices, CartPrices},
};

/// Key a cart is looked up by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartOwner {
    User(Uuid),
    Session(String),
}

impl CartOwner {
    /// The signed-in user wins over the anonymous session.
    pub fn from_context(ctx: &RequestContext) -> Result<Self, ServiceError> {
        if let Some(user) = ctx.user {
            return Ok(Self::User(user.id));
        }
        ctx.session_cart_id
            .clone()
            .map(Self::Session)
            .ok_or_else(|| ServiceError::InvalidOperation("Cart session not found".to_string()))
    }
}

/// Cart store: one active cart per owner key.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    pricing: PricingConfig,
    event_sender: Arc<EventSender>,
}

impl CartService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        pricing: PricingConfig,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            db,
            pricing,
            event_sender,
        }
    }

    /// Most recently touched cart for the owner, if any.
    pub async fn find_active<C: ConnectionTrait>(
        conn: &C,
        owner: &CartOwner,
    ) -> Result<Option<CartModel>, ServiceError> {
        let query = match owner {
            CartOwner::User(user_id) => Cart::find().filter(cart::Column::UserId.eq(*user_id)),
            CartOwner::Session(session_id) => {
                Cart::find().filter(cart::Column::SessionCartId.eq(session_id.as_str()))
            }
        };
        Ok(query
            .order_by_desc(cart::Column::UpdatedAt)
            .one(conn)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn get_active_cart(&self, owner: &CartOwner) -> Result<Option<CartModel>, ServiceError> {
        Self::find_active(&*self.db, owner).await
    }

    /// Empties a cart and zeroes its money fields. Runs on whatever
    /// connection or transaction it is given.
    pub async fn clear<C: ConnectionTrait>(conn: &C, cart_id: Uuid) -> Result<(), ServiceError> {
        let result = Cart::update_many()
            .col_expr(cart::Column::Items, Expr::value(CartLines::default()))
            .col_expr(cart::Column::ItemsPrice, Expr::value(ZERO_PRICE))
            .col_expr(cart::Column::ShippingPrice, Expr::value(ZERO_PRICE))
            .col_expr(cart::Column::TaxPrice, Expr::value(ZERO_PRICE))
            .col_expr(cart::Column::TotalPrice, Expr::value(ZERO_PRICE))
            .col_expr(cart::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(cart::Column::Id.eq(cart_id))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Cart {} not found", cart_id)));
        }
        Ok(())
    }

    /// Adds `qty` of a product, creating the cart on first use.
    #[instrument(skip(self, ctx), fields(product_id = %product_id))]
    pub async fn add_item(
        &self,
        ctx: &RequestContext,
        product_id: Uuid,
        qty: i32,
    ) -> Result<CartModel, ServiceError> {
        if qty < 1 {
            return Err(ServiceError::ValidationError(
                "Quantity must be at least 1".to_string(),
            ));
        }
        let owner = CartOwner::from_context(ctx)?;
        let db = &*self.db;

        let product = Product::find_by_id(product_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;

        let existing = Self::find_active(db, &owner).await?;
        let mut lines = existing
            .as_ref()
            .map(|cart| cart.items.clone())
            .unwrap_or_default();

        let new_qty = match lines.find_mut(product_id) {
            Some(line) => {
                line.qty = line
                    .qty
                    .checked_add(qty)
                    .ok_or_else(|| ServiceError::InvalidOperation("Not enough stock".to_string()))?;
                line.qty
            }
            None => {
                lines.0.push(Self::line_for(&product, qty));
                qty
            }
        };

        if new_qty > product.stock {
            return Err(ServiceError::InvalidOperation("Not enough stock".to_string()));
        }

        let prices = calc_prices(&lines.0, &self.pricing)?;
        let now = Utc::now();

        let saved = match existing {
            Some(cart) => {
                let mut model: cart::ActiveModel = cart.into();
                Self::apply(&mut model, lines, prices);
                model.updated_at = Set(now);
                model.update(db).await?
            }
            None => {
                let session_cart_id = ctx
                    .session_cart_id
                    .clone()
                    .unwrap_or_else(|| Uuid::new_v4().to_string());
                let mut model = cart::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    session_cart_id: Set(session_cart_id),
                    user_id: Set(ctx.user.map(|user| user.id)),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                };
                Self::apply(&mut model, lines, prices);
                model.insert(db).await?
            }
        };

        info!(cart_id = %saved.id, qty = new_qty, "{} added to cart", product.name);
        Ok(saved)
    }

    /// Takes one unit of a product out of the cart, dropping the line at zero.
    #[instrument(skip(self, ctx), fields(product_id = %product_id))]
    pub async fn remove_item(
        &self,
        ctx: &RequestContext,
        product_id: Uuid,
    ) -> Result<CartModel, ServiceError> {
        let owner = CartOwner::from_context(ctx)?;
        let db = &*self.db;

        let cart = Self::find_active(db, &owner)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Cart not found".to_string()))?;

        let mut lines = cart.items.clone();
        let line = lines
            .find_mut(product_id)
            .ok_or_else(|| ServiceError::NotFound("Item not found".to_string()))?;
        line.qty -= 1;
        let name = line.name.clone();
        if line.qty <= 0 {
            lines.0.retain(|line| line.product_id != product_id);
        }

        let prices = calc_prices(&lines.0, &self.pricing)?;
        let mut model: cart::ActiveModel = cart.into();
        Self::apply(&mut model, lines, prices);
        model.updated_at = Set(Utc::now());
        let saved = model.update(db).await?;

        info!(cart_id = %saved.id, "{} removed from cart", name);
        Ok(saved)
    }

    /// Hands a session cart over to a user who just signed in. The user's
    /// previous carts are deleted, not merged.
    #[instrument(skip(self))]
    pub async fn claim_session_cart(
        &self,
        session_cart_id: &str,
        user_id: Uuid,
    ) -> Result<Option<CartModel>, ServiceError> {
        let owner = CartOwner::Session(session_cart_id.to_string());
        let Some(session_cart) = Self::find_active(&*self.db, &owner).await? else {
            return Ok(None);
        };
        if session_cart.user_id == Some(user_id) {
            return Ok(Some(session_cart));
        }

        let cart_id = session_cart.id;
        let claimed = with_transaction(&self.db, move |txn| {
            Box::pin(async move {
                Cart::delete_many()
                    .filter(cart::Column::UserId.eq(user_id))
                    .filter(cart::Column::Id.ne(cart_id))
                    .exec(txn)
                    .await?;

                let mut model: cart::ActiveModel = session_cart.into();
                model.user_id = Set(Some(user_id));
                model.updated_at = Set(Utc::now());
                Ok(model.update(txn).await?)
            })
        })
        .await?;

        self.event_sender
            .send_or_log(Event::CartClaimed { cart_id, user_id })
            .await;
        info!(cart_id = %cart_id, user_id = %user_id, "Session cart claimed");
        Ok(Some(claimed))
    }

    /// Deletes every cart owned by the user (sign-out).
    #[instrument(skip(self))]
    pub async fn discard_user_carts(&self, user_id: Uuid) -> Result<u64, ServiceError> {
        let result = Cart::delete_many()
            .filter(cart::Column::UserId.eq(user_id))
            .exec(&*self.db)
            .await?;
        if result.rows_affected == 0 {
            warn!(user_id = %user_id, "No cart found for deletion");
        }
        Ok(result.rows_affected)
    }

    fn line_for(product: &product::Model, qty: i32) -> CartLine {
        CartLine {
            product_id: product.id,
            name: product.name.clone(),
            slug: product.slug.clone(),
            qty,
            image: product.images.primary().unwrap_or_default().to_string(),
            price: product.price.clone(),
        }
    }

    fn apply(model: &mut cart::ActiveModel, lines: CartLines, prices: CartPrices) {
        model.items = Set(lines);
        model.items_price = Set(prices.items_price);
        model.shipping_price = Set(prices.shipping_price);
        model.tax_price = Set(prices.tax_price);
        model.total_price = Set(prices.total_price);
    }
}
