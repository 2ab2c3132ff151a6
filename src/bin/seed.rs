use anyhow::Context;
use storefront_api::{
    db::{create_pool, run_migrations},
    services::auth_service::hash_password,
};
use uuid::Uuid;

struct SeedProduct {
    name: &'static str,
    description: &'static str,
    price: i64,
    old_price: Option<i64>,
    brand: &'static str,
    category: &'static str,
    stock: i32,
    featured: bool,
    new_arrival: bool,
    best_seller: bool,
}

const CATEGORIES: &[(&str, &str, Option<&str>)] = &[
    ("Electronics", "electronics", None),
    ("Phones", "phones", Some("electronics")),
    ("Audio", "audio", Some("electronics")),
    ("Apparel", "apparel", None),
];

const PRODUCTS: &[SeedProduct] = &[
    SeedProduct {
        name: "Ferris Phone X",
        description: "A pocket computer with a crab on the back",
        price: 7_500_000,
        old_price: Some(8_000_000),
        brand: "Ferris",
        category: "phones",
        stock: 25,
        featured: true,
        new_arrival: true,
        best_seller: false,
    },
    SeedProduct {
        name: "Async Earbuds",
        description: "Wireless earbuds that never block",
        price: 950_000,
        old_price: None,
        brand: "Tokio",
        category: "audio",
        stock: 80,
        featured: false,
        new_arrival: true,
        best_seller: true,
    },
    SeedProduct {
        name: "Borrow Checker Hoodie",
        description: "Warm hoodie, lifetime guaranteed",
        price: 550_000,
        old_price: Some(650_000),
        brand: "Rustacean",
        category: "apparel",
        stock: 50,
        featured: true,
        new_arrival: false,
        best_seller: true,
    },
    SeedProduct {
        name: "Zero Cost Tee",
        description: "Abstractions included at no extra charge",
        price: 180_000,
        old_price: None,
        brand: "Rustacean",
        category: "apparel",
        stock: 120,
        featured: false,
        new_arrival: false,
        best_seller: false,
    },
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
    let pool = create_pool(&database_url, 2).await?;
    run_migrations(&pool).await?;

    let admin_id = ensure_user(&pool, "Store", "Admin", "admin@example.com", "Admin123!", "admin").await?;
    let user_id = ensure_user(&pool, "Demo", "Shopper", "user@example.com", "User1234!", "user").await?;
    seed_categories(&pool).await?;
    seed_products(&pool).await?;
    seed_address(&pool, user_id).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    first_name: &str,
    last_name: &str,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password)?;

    let (user_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, first_name, last_name, email, password_hash, role)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(first_name)
    .bind(last_name)
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await?;

    sqlx::query("INSERT INTO carts (id, user_id) VALUES ($1, $2) ON CONFLICT (user_id) DO NOTHING")
        .bind(Uuid::new_v4())
        .bind(user_id)
        .execute(pool)
        .await?;

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn seed_categories(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    // Parents precede children in CATEGORIES.
    for &(name, slug, parent) in CATEGORIES {
        sqlx::query(
            r#"
            INSERT INTO categories (id, name, slug, parent_id)
            VALUES ($1, $2, $3, (SELECT id FROM categories WHERE slug = $4))
            ON CONFLICT (slug) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(slug)
        .bind(parent)
        .execute(pool)
        .await?;
    }
    println!("Seeded categories");
    Ok(())
}

async fn seed_products(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    for product in PRODUCTS {
        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, description, price, old_price, brand, category_id, stock,
                featured, is_new_arrival, is_best_seller
            )
            VALUES ($1, $2, $3, $4, $5, $6, (SELECT id FROM categories WHERE slug = $7), $8, $9, $10, $11)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(product.name)
        .bind(product.description)
        .bind(product.price)
        .bind(product.old_price)
        .bind(product.brand)
        .bind(product.category)
        .bind(product.stock)
        .bind(product.featured)
        .bind(product.new_arrival)
        .bind(product.best_seller)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}

async fn seed_address(pool: &sqlx::PgPool, user_id: Uuid) -> anyhow::Result<()> {
    let (existing,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM addresses WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    if existing > 0 {
        return Ok(());
    }

    sqlx::query(
        r#"
        INSERT INTO addresses (id, user_id, name, address, city, zip_code, is_default)
        VALUES ($1, $2, 'Home', 'Jl. Sudirman No. 1', 'Jakarta', '10220', TRUE)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .execute(pool)
    .await?;
    println!("Seeded address");
    Ok(())
}
