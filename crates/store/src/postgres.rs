use async_trait::async_trait;
use chrono::NaiveDate;
use common::{
    BrandId, CartId, CartItemId, CategoryId, Money, OrderId, OrderItemId, OrderStatus, OrderUuid,
    ProductId, ReviewId, UserId, WishlistId, WishlistItemId,
};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::model::{
    Address, Brand, Cart, CartLine, Category, NewOrder, NewProduct, NewReview, NewUser, Order,
    OrderLine, Product, ProductFilter, ProductPatch, Review, ReviewPatch, Role, User, Wishlist,
    WishlistEntry,
};
use crate::{Result, Store, StoreError};

const USER_COLUMNS: &str =
    "id, full_name, email, phone, role, address, city, state, zip_code, active, created_at";

const PRODUCT_COLUMNS: &str = "id, name, description, sku, image, price, original_price, \
     stock_quantity, weight, active, category_id, brand_id, created_at, updated_at";

const ORDER_COLUMNS: &str = "id, uuid, user_id, status, created_at, order_date, delivery_date, \
     total_amount, shipping_address, shipping_city, shipping_state, shipping_zip_code, notes";

const REVIEW_SELECT: &str = r#"
    SELECT r.id, r.product_id, r.user_id, u.full_name AS user_name, r.rating, r.title,
           r.comment, r.created_at, r.updated_at
    FROM reviews r
    LEFT JOIN users u ON u.id = r.user_id
"#;

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("database migrations applied");
        Ok(())
    }

    fn row_to_user(row: &PgRow) -> Result<User> {
        Ok(User {
            id: UserId::new(row.try_get("id")?),
            full_name: row.try_get("full_name")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            role: Role::parse(&row.try_get::<String, _>("role")?),
            address: Address {
                address: row.try_get("address")?,
                city: row.try_get("city")?,
                state: row.try_get("state")?,
                zip_code: row.try_get("zip_code")?,
            },
            active: row.try_get("active")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_product(row: &PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::new(row.try_get("id")?),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            sku: row.try_get("sku")?,
            image: row.try_get("image")?,
            price: Money::new(row.try_get("price")?),
            original_price: row
                .try_get::<Option<Decimal>, _>("original_price")?
                .map(Money::new),
            stock_quantity: to_u32(row.try_get("stock_quantity")?, "stock_quantity")?,
            weight: row.try_get("weight")?,
            active: row.try_get("active")?,
            category_id: row
                .try_get::<Option<i64>, _>("category_id")?
                .map(CategoryId::new),
            brand_id: row.try_get::<Option<i64>, _>("brand_id")?.map(BrandId::new),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_cart_line(row: &PgRow) -> Result<CartLine> {
        Ok(CartLine {
            id: CartItemId::new(row.try_get("id")?),
            product_id: ProductId::new(row.try_get("product_id")?),
            quantity: to_u32(row.try_get("quantity")?, "quantity")?,
            added_at: row.try_get("added_at")?,
            product_name: row.try_get("name")?,
            product_image: row.try_get("image")?,
            current_price: Money::new(row.try_get("price")?),
            stock_available: to_u32(row.try_get("stock_quantity")?, "stock_quantity")?,
        })
    }

    fn row_to_review(row: &PgRow) -> Result<Review> {
        let rating: i16 = row.try_get("rating")?;
        Ok(Review {
            id: ReviewId::new(row.try_get("id")?),
            product_id: ProductId::new(row.try_get("product_id")?),
            user_id: UserId::new(row.try_get("user_id")?),
            user_name: row.try_get("user_name")?,
            rating: u8::try_from(rating)
                .map_err(|_| StoreError::Corrupt(format!("rating out of range: {rating}")))?,
            title: row.try_get("title")?,
            comment: row.try_get("comment")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn cart_lines(&self, cart_id: CartId) -> Result<Vec<CartLine>> {
        let rows = sqlx::query(
            r#"
            SELECT ci.id, ci.product_id, ci.quantity, ci.added_at,
                   p.name, p.image, p.price, p.stock_quantity
            FROM cart_items ci
            JOIN products p ON p.id = ci.product_id
            WHERE ci.cart_id = $1
            ORDER BY ci.id ASC
            "#,
        )
        .bind(cart_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_cart_line).collect()
    }

    async fn cart_from_row(&self, row: PgRow) -> Result<Cart> {
        let id = CartId::new(row.try_get("id")?);
        Ok(Cart {
            id,
            user_id: UserId::new(row.try_get("user_id")?),
            lines: self.cart_lines(id).await?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn order_from_row(&self, row: PgRow) -> Result<Order> {
        let id = OrderId::new(row.try_get("id")?);
        let status: String = row.try_get("status")?;

        let line_rows = sqlx::query(
            r#"
            SELECT oi.id, oi.product_id, oi.unit_price, oi.quantity, p.name, p.image
            FROM order_items oi
            LEFT JOIN products p ON p.id = oi.product_id
            WHERE oi.order_id = $1
            ORDER BY oi.id ASC
            "#,
        )
        .bind(id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        let lines = line_rows
            .iter()
            .map(|r| {
                Ok(OrderLine {
                    id: OrderItemId::new(r.try_get("id")?),
                    product_id: r.try_get::<Option<i64>, _>("product_id")?.map(ProductId::new),
                    product_name: r.try_get("name")?,
                    product_image: r.try_get("image")?,
                    unit_price: Money::new(r.try_get("unit_price")?),
                    quantity: to_u32(r.try_get("quantity")?, "quantity")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Order {
            id,
            uuid: OrderUuid::from_uuid(row.try_get::<Uuid, _>("uuid")?),
            user_id: row.try_get::<Option<i64>, _>("user_id")?.map(UserId::new),
            status: status
                .parse()
                .map_err(|e: common::UnknownStatus| StoreError::Corrupt(e.to_string()))?,
            created_at: row.try_get("created_at")?,
            order_date: row.try_get("order_date")?,
            delivery_date: row.try_get("delivery_date")?,
            total_amount: Money::new(row.try_get("total_amount")?),
            shipping: Address {
                address: row.try_get("shipping_address")?,
                city: row.try_get("shipping_city")?,
                state: row.try_get("shipping_state")?,
                zip_code: row.try_get("shipping_zip_code")?,
            },
            notes: row.try_get("notes")?,
            lines,
        })
    }

    async fn wishlist_from_row(&self, row: PgRow) -> Result<Wishlist> {
        let id = WishlistId::new(row.try_get("id")?);
        let rows = sqlx::query(
            r#"
            SELECT wi.id, wi.product_id, wi.added_at,
                   p.name, p.image, p.price, p.original_price, p.stock_quantity
            FROM wishlist_items wi
            JOIN products p ON p.id = wi.product_id
            WHERE wi.wishlist_id = $1
            ORDER BY wi.id ASC
            "#,
        )
        .bind(id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        let entries = rows
            .iter()
            .map(|r| {
                Ok(WishlistEntry {
                    id: WishlistItemId::new(r.try_get("id")?),
                    product_id: ProductId::new(r.try_get("product_id")?),
                    product_name: r.try_get("name")?,
                    product_image: r.try_get("image")?,
                    price: Money::new(r.try_get("price")?),
                    original_price: r
                        .try_get::<Option<Decimal>, _>("original_price")?
                        .map(Money::new),
                    stock_quantity: to_u32(r.try_get("stock_quantity")?, "stock_quantity")?,
                    added_at: r.try_get("added_at")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Wishlist {
            id,
            user_id: UserId::new(row.try_get("user_id")?),
            entries,
        })
    }

    /// Explains why a status compare-and-swap matched no row.
    async fn status_mismatch(
        conn: &mut PgConnection,
        id: OrderId,
        expected: OrderStatus,
    ) -> StoreError {
        let actual: std::result::Result<Option<String>, sqlx::Error> =
            sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
                .bind(id.as_i64())
                .fetch_optional(conn)
                .await;

        match actual {
            Ok(Some(status)) => match status.parse::<OrderStatus>() {
                Ok(actual) => StoreError::StatusConflict {
                    order_id: id,
                    expected,
                    actual,
                },
                Err(e) => StoreError::Corrupt(e.to_string()),
            },
            Ok(None) => StoreError::NotFound {
                entity: "Order",
                id: id.as_i64(),
            },
            Err(e) => StoreError::Database(e),
        }
    }
}

fn to_u32(value: i32, column: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{column} is negative: {value}")))
}

fn to_i32(value: u32, column: &str) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| StoreError::Corrupt(format!("{column} does not fit a column: {value}")))
}

fn unique_violation(e: sqlx::Error, constraint: &str) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.constraint() == Some(constraint)
    {
        return StoreError::UniqueViolation(constraint.to_string());
    }
    StoreError::Database(e)
}

#[async_trait]
impl Store for PostgresStore {
    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO users (full_name, email, phone, role, address, city, state, zip_code)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.full_name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(user.role.as_str())
        .bind(&user.address.address)
        .bind(&user.address.city)
        .bind(&user.address.state)
        .bind(&user.address.zip_code)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "users_email_key"))?;

        Self::row_to_user(&row)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    async fn insert_category(&self, name: &str, description: Option<&str>) -> Result<Category> {
        let row = sqlx::query(
            "INSERT INTO categories (name, description) VALUES ($1, $2) RETURNING id, name, description",
        )
        .bind(name)
        .bind(description)
        .fetch_one(&self.pool)
        .await?;

        Ok(Category {
            id: CategoryId::new(row.try_get("id")?),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
        })
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query("SELECT id, name, description FROM categories ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(Category {
                    id: CategoryId::new(row.try_get("id")?),
                    name: row.try_get("name")?,
                    description: row.try_get("description")?,
                })
            })
            .collect()
    }

    async fn insert_brand(&self, name: &str) -> Result<Brand> {
        let row = sqlx::query("INSERT INTO brands (name) VALUES ($1) RETURNING id, name")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;

        Ok(Brand {
            id: BrandId::new(row.try_get("id")?),
            name: row.try_get("name")?,
        })
    }

    async fn list_brands(&self) -> Result<Vec<Brand>> {
        let rows = sqlx::query("SELECT id, name FROM brands ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(Brand {
                    id: BrandId::new(row.try_get("id")?),
                    name: row.try_get("name")?,
                })
            })
            .collect()
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO products (name, description, sku, image, price, original_price,
                                  stock_quantity, weight, category_id, brand_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.sku)
        .bind(&product.image)
        .bind(product.price.amount())
        .bind(product.original_price.map(|m| m.amount()))
        .bind(to_i32(product.stock_quantity, "stock_quantity")?)
        .bind(product.weight)
        .bind(product.category_id.map(|id| id.as_i64()))
        .bind(product.brand_id.map(|id| id.as_i64()))
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_product(&row)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_product).transpose()
    }

    async fn list_products(&self, filter: ProductFilter) -> Result<Vec<Product>> {
        let mut sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE 1=1");
        let mut param_count = 0;

        // Build dynamic query
        if !filter.include_inactive {
            sql.push_str(" AND active = TRUE");
        }
        if filter.category_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND category_id = ${param_count}"));
        }
        if filter.brand_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND brand_id = ${param_count}"));
        }
        if filter.search.is_some() {
            param_count += 1;
            sql.push_str(&format!(
                " AND (name ILIKE ${param_count} OR description ILIKE ${param_count})"
            ));
        }
        sql.push_str(" ORDER BY id ASC");

        let mut query = sqlx::query(&sql);
        if let Some(category_id) = filter.category_id {
            query = query.bind(category_id.as_i64());
        }
        if let Some(brand_id) = filter.brand_id {
            query = query.bind(brand_id.as_i64());
        }
        if let Some(term) = filter.search {
            query = query.bind(format!("%{term}%"));
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_product).collect()
    }

    async fn update_product(&self, id: ProductId, patch: ProductPatch) -> Result<Option<Product>> {
        let stock = patch
            .stock_quantity
            .map(|s| to_i32(s, "stock_quantity"))
            .transpose()?;

        let row = sqlx::query(&format!(
            r#"
            UPDATE products SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                sku = COALESCE($4, sku),
                image = COALESCE($5, image),
                price = COALESCE($6, price),
                original_price = COALESCE($7, original_price),
                stock_quantity = COALESCE($8, stock_quantity),
                weight = COALESCE($9, weight),
                active = COALESCE($10, active),
                category_id = COALESCE($11, category_id),
                brand_id = COALESCE($12, brand_id),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(id.as_i64())
        .bind(patch.name)
        .bind(patch.description)
        .bind(patch.sku)
        .bind(patch.image)
        .bind(patch.price.map(|m| m.amount()))
        .bind(patch.original_price.map(|m| m.amount()))
        .bind(stock)
        .bind(patch.weight)
        .bind(patch.active)
        .bind(patch.category_id.map(|c| c.as_i64()))
        .bind(patch.brand_id.map(|b| b.as_i64()))
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_product).transpose()
    }

    async fn get_cart(&self, user_id: UserId) -> Result<Option<Cart>> {
        let row = sqlx::query("SELECT id, user_id, created_at, updated_at FROM carts WHERE user_id = $1")
            .bind(user_id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.cart_from_row(row).await?)),
            None => Ok(None),
        }
    }

    async fn get_or_create_cart(&self, user_id: UserId) -> Result<Cart> {
        // The no-op update makes RETURNING yield the existing row on conflict
        let row = sqlx::query(
            r#"
            INSERT INTO carts (user_id) VALUES ($1)
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING id, user_id, created_at, updated_at
            "#,
        )
        .bind(user_id.as_i64())
        .fetch_one(&self.pool)
        .await?;

        self.cart_from_row(row).await
    }

    async fn save_cart_line(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartLine> {
        let mut tx = self.pool.begin().await?;

        let touched = sqlx::query("UPDATE carts SET updated_at = NOW() WHERE id = $1")
            .bind(cart_id.as_i64())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if touched == 0 {
            return Err(StoreError::NotFound {
                entity: "Cart",
                id: cart_id.as_i64(),
            });
        }

        let product_exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM products WHERE id = $1)")
                .bind(product_id.as_i64())
                .fetch_one(&mut *tx)
                .await?;
        if !product_exists {
            return Err(StoreError::NotFound {
                entity: "Product",
                id: product_id.as_i64(),
            });
        }

        let item_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO cart_items (cart_id, product_id, quantity) VALUES ($1, $2, $3)
            ON CONFLICT (cart_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity
            RETURNING id
            "#,
        )
        .bind(cart_id.as_i64())
        .bind(product_id.as_i64())
        .bind(to_i32(quantity, "quantity")?)
        .fetch_one(&mut *tx)
        .await?;

        let row = sqlx::query(
            r#"
            SELECT ci.id, ci.product_id, ci.quantity, ci.added_at,
                   p.name, p.image, p.price, p.stock_quantity
            FROM cart_items ci
            JOIN products p ON p.id = ci.product_id
            WHERE ci.id = $1
            "#,
        )
        .bind(item_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Self::row_to_cart_line(&row)
    }

    async fn remove_cart_line(&self, cart_id: CartId, item_id: CartItemId) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND cart_id = $2")
            .bind(item_id.as_i64())
            .bind(cart_id.as_i64())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if removed > 0 {
            sqlx::query("UPDATE carts SET updated_at = NOW() WHERE id = $1")
                .bind(cart_id.as_i64())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(removed > 0)
    }

    async fn clear_cart(&self, cart_id: CartId) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart_id.as_i64())
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE carts SET updated_at = NOW() WHERE id = $1")
            .bind(cart_id.as_i64())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    #[tracing::instrument(
        skip(self, new_order),
        fields(user_id = %new_order.user_id, cart_id = %new_order.cart_id, lines = new_order.lines.len())
    )]
    async fn place_order(&self, new_order: NewOrder) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        // Holding the cart row serializes checkout against concurrent cart edits
        let cart: Option<i64> =
            sqlx::query_scalar("SELECT id FROM carts WHERE id = $1 FOR UPDATE")
                .bind(new_order.cart_id.as_i64())
                .fetch_optional(&mut *tx)
                .await?;
        if cart.is_none() {
            return Err(StoreError::NotFound {
                entity: "Cart",
                id: new_order.cart_id.as_i64(),
            });
        }

        // Lock product rows in id order so concurrent checkouts can't deadlock
        let mut decrements: Vec<_> = new_order
            .lines
            .iter()
            .map(|l| (l.product_id, l.quantity))
            .collect();
        decrements.sort_by_key(|(product_id, _)| *product_id);

        for (product_id, quantity) in decrements {
            let updated = sqlx::query(
                r#"
                UPDATE products
                SET stock_quantity = stock_quantity - $1, updated_at = NOW()
                WHERE id = $2 AND stock_quantity >= $1
                "#,
            )
            .bind(to_i32(quantity, "quantity")?)
            .bind(product_id.as_i64())
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if updated == 0 {
                let exists: bool =
                    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM products WHERE id = $1)")
                        .bind(product_id.as_i64())
                        .fetch_one(&mut *tx)
                        .await?;
                // Dropping the transaction rolls back earlier decrements
                tracing::debug!(%product_id, quantity, exists, "stock decrement rejected");
                return Err(if exists {
                    StoreError::InsufficientStock {
                        product_id,
                        requested: quantity,
                    }
                } else {
                    StoreError::NotFound {
                        entity: "Product",
                        id: product_id.as_i64(),
                    }
                });
            }
        }

        let order_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO orders (uuid, user_id, status, created_at, order_date, total_amount,
                                shipping_address, shipping_city, shipping_state,
                                shipping_zip_code, notes)
            VALUES ($1, $2, $3, $4, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            "#,
        )
        .bind(new_order.uuid.as_uuid())
        .bind(new_order.user_id.as_i64())
        .bind(OrderStatus::Open.as_str())
        .bind(new_order.order_date)
        .bind(new_order.total_amount.amount())
        .bind(&new_order.shipping.address)
        .bind(&new_order.shipping.city)
        .bind(&new_order.shipping.state)
        .bind(&new_order.shipping.zip_code)
        .bind(&new_order.notes)
        .fetch_one(&mut *tx)
        .await?;

        for line in &new_order.lines {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, product_id, unit_price, quantity)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(order_id)
            .bind(line.product_id.as_i64())
            .bind(line.unit_price.amount())
            .bind(to_i32(line.quantity, "quantity")?)
            .execute(&mut *tx)
            .await?;
        }

        // Only the lines that were ordered; anything added or changed since stays
        for line in &new_order.lines {
            sqlx::query(
                "DELETE FROM cart_items WHERE cart_id = $1 AND product_id = $2 AND quantity = $3",
            )
            .bind(new_order.cart_id.as_i64())
            .bind(line.product_id.as_i64())
            .bind(to_i32(line.quantity, "quantity")?)
            .execute(&mut *tx)
            .await?;
        }
        sqlx::query("UPDATE carts SET updated_at = NOW() WHERE id = $1")
            .bind(new_order.cart_id.as_i64())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::debug!(order_id, "order placed");

        let order_id = OrderId::new(order_id);
        self.get_order(order_id)
            .await?
            .ok_or_else(|| StoreError::Corrupt(format!("order {order_id} missing after commit")))
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.order_from_row(row).await?)),
            None => Ok(None),
        }
    }

    async fn get_order_by_uuid(&self, uuid: OrderUuid) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE uuid = $1"))
            .bind(uuid.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.order_from_row(row).await?)),
            None => Ok(None),
        }
    }

    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY id DESC"
        ))
        .bind(user_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(self.order_from_row(row).await?);
        }
        Ok(orders)
    }

    #[tracing::instrument(skip(self))]
    async fn update_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        status: OrderStatus,
        delivery_date: Option<NaiveDate>,
    ) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        let updated = sqlx::query(
            r#"
            UPDATE orders
            SET status = $3, delivery_date = COALESCE($4, delivery_date)
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id.as_i64())
        .bind(expected.as_str())
        .bind(status.as_str())
        .bind(delivery_date)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(Self::status_mismatch(&mut conn, id, expected).await);
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn cancel_order(&self, id: OrderId, expected: OrderStatus) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query("UPDATE orders SET status = $3 WHERE id = $1 AND status = $2")
            .bind(id.as_i64())
            .bind(expected.as_str())
            .bind(OrderStatus::Canceled.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if updated == 0 {
            return Err(Self::status_mismatch(&mut tx, id, expected).await);
        }

        // Lines whose product was removed have a NULL product_id and are skipped
        sqlx::query(
            r#"
            UPDATE products p
            SET stock_quantity = p.stock_quantity + oi.quantity, updated_at = NOW()
            FROM (
                SELECT product_id, SUM(quantity) AS quantity
                FROM order_items
                WHERE order_id = $1 AND product_id IS NOT NULL
                GROUP BY product_id
            ) oi
            WHERE p.id = oi.product_id
            "#,
        )
        .bind(id.as_i64())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::debug!(order_id = %id, "order canceled and restocked");
        Ok(())
    }

    async fn insert_review(&self, review: NewReview) -> Result<Review> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO reviews (product_id, user_id, rating, title, comment)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(review.product_id.as_i64())
        .bind(review.user_id.as_i64())
        .bind(i16::from(review.rating))
        .bind(&review.title)
        .bind(&review.comment)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "reviews_user_id_product_id_key"))?;

        let id = ReviewId::new(id);
        self.get_review(id)
            .await?
            .ok_or_else(|| StoreError::Corrupt(format!("review {id} missing after insert")))
    }

    async fn get_review(&self, id: ReviewId) -> Result<Option<Review>> {
        let row = sqlx::query(&format!("{REVIEW_SELECT} WHERE r.id = $1"))
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_review).transpose()
    }

    async fn find_review(&self, user_id: UserId, product_id: ProductId) -> Result<Option<Review>> {
        let row = sqlx::query(&format!(
            "{REVIEW_SELECT} WHERE r.user_id = $1 AND r.product_id = $2"
        ))
        .bind(user_id.as_i64())
        .bind(product_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_review).transpose()
    }

    async fn list_reviews_for_product(&self, product_id: ProductId) -> Result<Vec<Review>> {
        let rows = sqlx::query(&format!(
            "{REVIEW_SELECT} WHERE r.product_id = $1 ORDER BY r.created_at DESC, r.id DESC"
        ))
        .bind(product_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_review).collect()
    }

    async fn update_review(&self, id: ReviewId, patch: ReviewPatch) -> Result<Option<Review>> {
        let updated = sqlx::query(
            r#"
            UPDATE reviews
            SET rating = $2, title = $3, comment = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .bind(i16::from(patch.rating))
        .bind(&patch.title)
        .bind(&patch.comment)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Ok(None);
        }
        self.get_review(id).await
    }

    async fn delete_review(&self, id: ReviewId) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }

    async fn get_wishlist(&self, user_id: UserId) -> Result<Option<Wishlist>> {
        let row = sqlx::query("SELECT id, user_id FROM wishlists WHERE user_id = $1")
            .bind(user_id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.wishlist_from_row(row).await?)),
            None => Ok(None),
        }
    }

    async fn get_or_create_wishlist(&self, user_id: UserId) -> Result<Wishlist> {
        let row = sqlx::query(
            r#"
            INSERT INTO wishlists (user_id) VALUES ($1)
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING id, user_id
            "#,
        )
        .bind(user_id.as_i64())
        .fetch_one(&self.pool)
        .await?;

        self.wishlist_from_row(row).await
    }

    async fn add_wishlist_item(
        &self,
        wishlist_id: WishlistId,
        product_id: ProductId,
    ) -> Result<bool> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO wishlist_items (wishlist_id, product_id) VALUES ($1, $2)
            ON CONFLICT (wishlist_id, product_id) DO NOTHING
            "#,
        )
        .bind(wishlist_id.as_i64())
        .bind(product_id.as_i64())
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(inserted > 0)
    }

    async fn remove_wishlist_item(
        &self,
        wishlist_id: WishlistId,
        product_id: ProductId,
    ) -> Result<bool> {
        let removed =
            sqlx::query("DELETE FROM wishlist_items WHERE wishlist_id = $1 AND product_id = $2")
                .bind(wishlist_id.as_i64())
                .bind(product_id.as_i64())
                .execute(&self.pool)
                .await?
                .rows_affected();
        Ok(removed > 0)
    }

    async fn clear_wishlist(&self, wishlist_id: WishlistId) -> Result<()> {
        sqlx::query("DELETE FROM wishlist_items WHERE wishlist_id = $1")
            .bind(wishlist_id.as_i64())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
