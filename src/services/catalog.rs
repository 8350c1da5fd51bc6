use chrono::Utc;
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::RequestContext,
    entities::{order_item, product, OrderItem, Product, ProductModel},
    errors::ServiceError,
    models::ImageList,
    money::validate_price,
    services::orders::Page,
};

/// How many products the storefront home page shows.
pub const LATEST_PRODUCTS_LIMIT: u64 = 4;

/// Admin product form, used for both create and update.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProductRequest {
    #[validate(length(min = 3, message = "Name must be at least 3 characters."))]
    pub name: String,
    #[validate(length(min = 3, message = "Slug must be at least 3 characters."))]
    pub slug: String,
    #[validate(length(min = 3, message = "Category must be at least 3 characters."))]
    pub category: String,
    #[validate(length(min = 3, message = "Brand must be at least 3 characters."))]
    pub brand: String,
    #[validate(length(min = 3, message = "Description must be at least 3 characters."))]
    pub description: String,
    #[validate(range(min = 0, message = "Stock cannot be negative."))]
    pub stock: i32,
    #[validate(length(min = 1, message = "Product must have at least one image."))]
    pub images: Vec<String>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub banner: Option<String>,
    #[validate(custom = "validate_price")]
    pub price: String,
}

#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    page_size: u64,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>, page_size: u64) -> Self {
        Self {
            db,
            page_size: page_size.max(1),
        }
    }

    #[instrument(skip(self, ctx, request), fields(slug = %request.slug))]
    pub async fn create_product(
        &self,
        ctx: &RequestContext,
        request: ProductRequest,
    ) -> Result<ProductModel, ServiceError> {
        ctx.require_admin()?;
        request.validate()?;

        if self.find_by_slug(&request.slug).await?.is_some() {
            return Err(Self::slug_taken(&request.slug));
        }

        let mut model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        Self::apply(&mut model, request);
        let created = model.insert(&*self.db).await?;

        info!(product_id = %created.id, "Product created");
        Ok(created)
    }

    /// Replaces every editable field, stock included.
    #[instrument(skip(self, ctx, request), fields(product_id = %product_id))]
    pub async fn update_product(
        &self,
        ctx: &RequestContext,
        product_id: Uuid,
        request: ProductRequest,
    ) -> Result<ProductModel, ServiceError> {
        ctx.require_admin()?;
        request.validate()?;

        let existing = self.get_product(product_id).await?;
        if let Some(other) = self.find_by_slug(&request.slug).await? {
            if other.id != product_id {
                return Err(Self::slug_taken(&request.slug));
            }
        }

        let mut model: product::ActiveModel = existing.into();
        Self::apply(&mut model, request);
        let updated = model.update(&*self.db).await?;

        info!(product_id = %updated.id, "Product updated");
        Ok(updated)
    }

    /// Products that already appear on an order cannot be deleted.
    #[instrument(skip(self, ctx), fields(product_id = %product_id))]
    pub async fn delete_product(
        &self,
        ctx: &RequestContext,
        product_id: Uuid,
    ) -> Result<(), ServiceError> {
        ctx.require_admin()?;
        let db = &*self.db;
        self.get_product(product_id).await?;

        let ordered = OrderItem::find()
            .filter(order_item::Column::ProductId.eq(product_id))
            .count(db)
            .await?;
        if ordered > 0 {
            return Err(ServiceError::InvalidOperation(
                "Product has orders and cannot be deleted".to_string(),
            ));
        }

        Product::delete_by_id(product_id).exec(db).await?;
        info!(product_id = %product_id, "Product deleted");
        Ok(())
    }

    /// Admin listing, newest first, optionally narrowed by name
    /// (case-insensitive contains).
    #[instrument(skip(self, ctx))]
    pub async fn all_products(
        &self,
        ctx: &RequestContext,
        query: Option<&str>,
        page: u64,
    ) -> Result<Page<ProductModel>, ServiceError> {
        ctx.require_admin()?;
        let page = page.max(1);

        let mut select = Product::find().order_by_desc(product::Column::CreatedAt);
        if let Some(query) = query.map(str::trim).filter(|q| !q.is_empty()) {
            let pattern = format!("%{}%", query.to_lowercase());
            select = select
                .filter(Expr::expr(Func::lower(Expr::col(product::Column::Name))).like(pattern));
        }

        let paginator = select.paginate(&*self.db, self.page_size);
        let total = paginator.num_items().await?;
        let data = paginator.fetch_page(page - 1).await?;
        Ok(Page::new(data, total, page, self.page_size))
    }

    pub async fn get_product(&self, product_id: Uuid) -> Result<ProductModel, ServiceError> {
        Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))
    }

    pub async fn get_product_by_slug(&self, slug: &str) -> Result<ProductModel, ServiceError> {
        self.find_by_slug(slug)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))
    }

    /// Newest products first.
    pub async fn latest_products(&self, limit: u64) -> Result<Vec<ProductModel>, ServiceError> {
        Ok(Product::find()
            .order_by_desc(product::Column::CreatedAt)
            .limit(limit)
            .all(&*self.db)
            .await?)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<ProductModel>, ServiceError> {
        Ok(Product::find()
            .filter(product::Column::Slug.eq(slug))
            .one(&*self.db)
            .await?)
    }

    fn slug_taken(slug: &str) -> ServiceError {
        ServiceError::ValidationError(format!("Slug '{}' is already in use", slug))
    }

    fn apply(model: &mut product::ActiveModel, request: ProductRequest) {
        model.name = Set(request.name);
        model.slug = Set(request.slug);
        model.category = Set(request.category);
        model.brand = Set(request.brand);
        model.description = Set(request.description);
        model.stock = Set(request.stock);
        model.price = Set(request.price);
        model.images = Set(ImageList(request.images));
        model.is_featured = Set(request.is_featured);
        model.banner = Set(request.banner);
    }
}
