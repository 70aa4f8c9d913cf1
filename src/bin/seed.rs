use chrono::Duration;
use storefront_api::{
    config::AppConfig,
    db::{DbPool, create_pool, orm_from_pool, run_migrations},
    domain::Role,
    middleware::auth::sign_token,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url, 2).await?;
    run_migrations(&orm_from_pool(&pool)).await?;

    let admin_id = ensure_user(&pool, "admin@example.com", "Admin", Role::Admin).await?;
    let seller_id = ensure_user(&pool, "seller@example.com", "Seller", Role::Seller).await?;
    let user_id = ensure_user(&pool, "user@example.com", "Shopper", Role::User).await?;
    seed_products(&pool, seller_id).await?;

    // Identity lives outside this service; these tokens stand in for it locally.
    let ttl = Duration::days(7);
    for (label, id, role) in [
        ("admin", admin_id, Role::Admin),
        ("seller", seller_id, Role::Seller),
        ("user", user_id, Role::User),
    ] {
        let token = sign_token(&config.jwt_secret, id, role, ttl)?;
        println!("{label} ({id}): {token}");
    }

    println!("Seed completed");
    Ok(())
}

async fn ensure_user(pool: &DbPool, email: &str, name: &str, role: Role) -> anyhow::Result<Uuid> {
    let (user_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, name, role)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(name)
    .bind(role.as_str())
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn seed_products(pool: &DbPool, seller_id: Uuid) -> anyhow::Result<()> {
    // Prices in paisa.
    let products = [
        ("Lawn Kurta", "Unstitched three-piece summer lawn", 450_000_i64, 40),
        ("Peshawari Chappal", "Hand-stitched leather sandals", 650_000, 25),
        ("Ajrak Shawl", "Block-printed cotton shawl from Sindh", 280_000, 60),
        ("Pink Salt Lamp", "Himalayan rock salt lamp", 190_000, 3),
    ];

    for (name, desc, price, stock) in products {
        sqlx::query(
            r#"
            INSERT INTO products (id, seller_id, name, description, price, stock)
            SELECT $1, $2, $3, $4, $5, $6
            WHERE NOT EXISTS (SELECT 1 FROM products WHERE name = $3 AND seller_id = $2)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(seller_id)
        .bind(name)
        .bind(desc)
        .bind(price)
        .bind(stock)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
