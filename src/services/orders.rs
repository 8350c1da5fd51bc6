use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, Func},
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::RequestContext,
    db::with_transaction,
    entities::{order, order_item, product, user, Order, OrderItem, OrderItemModel, OrderModel, Product, User},
    errors::ServiceError,
    events::{Event, EventSender},
    models::{PaymentMethod, PaymentResult},
    money::{format_price, parse_price},
    services::pricing::amount_overflow,
};

/// The only user fields an order view exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderUser {
    pub name: String,
    pub email: String,
}

/// An order with its items and owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: OrderModel,
    pub order_items: Vec<OrderItemModel>,
    pub user: OrderUser,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    /// `page` is 1-based; `per_page` must be non-zero.
    pub fn new(data: Vec<T>, total: u64, page: u64, per_page: u64) -> Self {
        Self {
            data,
            total,
            page,
            per_page,
            total_pages: total.div_ceil(per_page),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesSummary {
    pub orders_count: u64,
    pub products_count: u64,
    pub users_count: u64,
    pub total_sales: String,
}

/// Order reads, admin operations and the pay transition.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    page_size: u64,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>, page_size: u64) -> Self {
        Self {
            db,
            event_sender,
            page_size: page_size.max(1),
        }
    }

    /// Loads an order with its items and the owner's name and email.
    pub async fn find_details<C: ConnectionTrait>(
        conn: &C,
        order_id: Uuid,
    ) -> Result<Option<OrderDetails>, ServiceError> {
        let Some(order) = Order::find_by_id(order_id).one(conn).await? else {
            return Ok(None);
        };
        let order_items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::Name)
            .all(conn)
            .await?;
        let user = User::find_by_id(order.user_id)
            .one(conn)
            .await?
            .map(|user| OrderUser {
                name: user.name,
                email: user.email,
            })
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;

        Ok(Some(OrderDetails {
            order,
            order_items,
            user,
        }))
    }

    /// Order detail for its owner or an admin.
    #[instrument(skip(self, ctx), fields(order_id = %order_id))]
    pub async fn get_order(
        &self,
        ctx: &RequestContext,
        order_id: Uuid,
    ) -> Result<OrderDetails, ServiceError> {
        ctx.require_user()?;
        let details = Self::find_details(&*self.db, order_id)
            .await?
            .ok_or_else(|| ServiceError::order_not_found(order_id))?;
        if !ctx.can_access(details.order.user_id) {
            return Err(ServiceError::Unauthorized(
                "Not allowed to view this order".to_string(),
            ));
        }
        Ok(details)
    }

    /// The caller's orders, newest first. Pages start at 1.
    #[instrument(skip(self, ctx))]
    pub async fn my_orders(
        &self,
        ctx: &RequestContext,
        page: u64,
    ) -> Result<Page<OrderModel>, ServiceError> {
        let current = ctx.require_user()?;
        let page = page.max(1);
        let paginator = Order::find()
            .filter(order::Column::UserId.eq(current.id))
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, self.page_size);

        let total = paginator.num_items().await?;
        let data = paginator.fetch_page(page - 1).await?;
        Ok(self.page(data, total, page))
    }

    /// Every order, optionally narrowed to owners whose name contains `query`
    /// (case-insensitive).
    #[instrument(skip(self, ctx))]
    pub async fn all_orders(
        &self,
        ctx: &RequestContext,
        query: Option<&str>,
        page: u64,
    ) -> Result<Page<OrderModel>, ServiceError> {
        ctx.require_admin()?;
        let page = page.max(1);

        let mut select = Order::find()
            .inner_join(User)
            .order_by_desc(order::Column::CreatedAt);
        if let Some(query) = query.map(str::trim).filter(|q| !q.is_empty()) {
            let pattern = format!("%{}%", query.to_lowercase());
            select = select.filter(
                Expr::expr(Func::lower(Expr::col((User, user::Column::Name)))).like(pattern),
            );
        }

        let paginator = select.paginate(&*self.db, self.page_size);
        let total = paginator.num_items().await?;
        let data = paginator.fetch_page(page - 1).await?;
        Ok(self.page(data, total, page))
    }

    #[instrument(skip(self, ctx), fields(order_id = %order_id))]
    pub async fn delete_order(&self, ctx: &RequestContext, order_id: Uuid) -> Result<(), ServiceError> {
        ctx.require_admin()?;

        with_transaction(&self.db, move |txn| {
            Box::pin(async move {
                OrderItem::delete_many()
                    .filter(order_item::Column::OrderId.eq(order_id))
                    .exec(txn)
                    .await?;
                let deleted = Order::delete_by_id(order_id).exec(txn).await?;
                if deleted.rows_affected == 0 {
                    return Err(ServiceError::order_not_found(order_id));
                }
                Ok(())
            })
        })
        .await?;

        self.event_sender.send_or_log(Event::OrderDeleted(order_id)).await;
        info!(order_id = %order_id, "Order deleted");
        Ok(())
    }

    /// Admin settles a cash-on-delivery order; no provider receipt exists.
    #[instrument(skip(self, ctx), fields(order_id = %order_id))]
    pub async fn mark_paid_cash_on_delivery(
        &self,
        ctx: &RequestContext,
        order_id: Uuid,
    ) -> Result<OrderDetails, ServiceError> {
        ctx.require_admin()?;
        let order = self.load(order_id).await?;
        if order.payment_method != PaymentMethod::CashOnDelivery {
            return Err(ServiceError::InvalidOperation(format!(
                "Order {} is paid through {}",
                order_id, order.payment_method
            )));
        }
        self.pay_transition(order_id, None).await
    }

    #[instrument(skip(self, ctx), fields(order_id = %order_id))]
    pub async fn mark_delivered(
        &self,
        ctx: &RequestContext,
        order_id: Uuid,
    ) -> Result<OrderDetails, ServiceError> {
        ctx.require_admin()?;
        let order = self.load(order_id).await?;
        if !order.is_paid {
            return Err(ServiceError::precondition(
                "Order is not paid",
                format!("/order/{}", order_id),
            ));
        }
        if order.is_delivered {
            return Err(ServiceError::InvalidOperation(
                "Order is already delivered".to_string(),
            ));
        }

        Order::update_many()
            .col_expr(order::Column::IsDelivered, Expr::value(true))
            .col_expr(order::Column::DeliveredAt, Expr::value(Some(Utc::now())))
            .filter(order::Column::Id.eq(order_id))
            .exec(&*self.db)
            .await?;

        self.event_sender.send_or_log(Event::OrderDelivered(order_id)).await;
        self.event_sender.send_or_log(Event::OrderInvalidated(order_id)).await;
        info!(order_id = %order_id, "Order delivered");

        Self::find_details(&*self.db, order_id)
            .await?
            .ok_or_else(|| ServiceError::order_not_found(order_id))
    }

    /// Marks an order paid and takes its quantities out of stock, once.
    ///
    /// The paid flag flips through a conditional update inside the same
    /// transaction as the stock decrements, so of two concurrent calls only
    /// one commits; the other fails with `AlreadyPaid` and changes nothing.
    /// Stock is not floored at zero.
    #[instrument(skip(self, payment_result), fields(order_id = %order_id))]
    pub async fn pay_transition(
        &self,
        order_id: Uuid,
        payment_result: Option<PaymentResult>,
    ) -> Result<OrderDetails, ServiceError> {
        let order = self.load(order_id).await?;
        if order.is_paid {
            return Err(ServiceError::AlreadyPaid(order_id));
        }

        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;

        with_transaction(&self.db, move |txn| {
            Box::pin(async move {
                let mut flip = Order::update_many()
                    .col_expr(order::Column::IsPaid, Expr::value(true))
                    .col_expr(order::Column::PaidAt, Expr::value(Some(Utc::now())));
                if let Some(result) = payment_result {
                    flip = flip.col_expr(order::Column::PaymentResult, Expr::value(result));
                }
                let flipped = flip
                    .filter(order::Column::Id.eq(order_id))
                    .filter(order::Column::IsPaid.eq(false))
                    .exec(txn)
                    .await?;
                if flipped.rows_affected == 0 {
                    return Err(ServiceError::AlreadyPaid(order_id));
                }

                for item in &items {
                    let updated = Product::update_many()
                        .col_expr(
                            product::Column::Stock,
                            Expr::col(product::Column::Stock).sub(item.qty),
                        )
                        .filter(product::Column::Id.eq(item.product_id))
                        .exec(txn)
                        .await?;
                    if updated.rows_affected == 0 {
                        return Err(ServiceError::NotFound(format!(
                            "Product {} not found",
                            item.product_id
                        )));
                    }

                    if let Some(product) = Product::find_by_id(item.product_id).one(txn).await? {
                        if product.stock < 0 {
                            warn!(
                                product_id = %product.id,
                                stock = product.stock,
                                "Stock went negative after payment"
                            );
                        }
                    }
                }
                Ok(())
            })
        })
        .await?;

        self.event_sender.send_or_log(Event::OrderPaid(order_id)).await;
        info!(order_id = %order_id, "Order paid");

        Self::find_details(&*self.db, order_id)
            .await?
            .ok_or_else(|| ServiceError::order_not_found(order_id))
    }

    #[instrument(skip(self, ctx))]
    pub async fn sales_summary(&self, ctx: &RequestContext) -> Result<SalesSummary, ServiceError> {
        ctx.require_admin()?;
        let db = &*self.db;

        let orders_count = Order::find().count(db).await?;
        let products_count = Product::find().count(db).await?;
        let users_count = User::find().count(db).await?;

        let totals: Vec<String> = Order::find()
            .select_only()
            .column(order::Column::TotalPrice)
            .into_tuple()
            .all(db)
            .await?;
        let mut total_sales = Decimal::ZERO;
        for total in &totals {
            total_sales = total_sales
                .checked_add(parse_price(total)?)
                .ok_or_else(amount_overflow)?;
        }

        Ok(SalesSummary {
            orders_count,
            products_count,
            users_count,
            total_sales: format_price(total_sales),
        })
    }

    async fn load(&self, order_id: Uuid) -> Result<OrderModel, ServiceError> {
        Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::order_not_found(order_id))
    }

    fn page<T>(&self, data: Vec<T>, total: u64, page: u64) -> Page<T> {
        Page::new(data, total, page, self.page_size)
    }
}
