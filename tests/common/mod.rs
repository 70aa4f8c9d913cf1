#![allow(dead_code)]

use std::time::Duration;

use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, Set};
use storefront_api::{
    config::AppConfig,
    db::{create_pool, run_migrations},
    domain::{PaymentMethod, Role},
    dto::{cart::AddToCartRequest, orders::CreateOrderRequest, payments::SettlePaymentRequest},
    entity::{products, users::ActiveModel as UserActive},
    middleware::auth::AuthUser,
    services::{cart_service, inventory_service, payment_simulator::PaymentSimulator},
    state::AppState,
};
use uuid::Uuid;

pub fn test_config(database_url: String) -> AppConfig {
    AppConfig {
        database_url,
        host: "127.0.0.1".into(),
        port: 0,
        db_max_connections: 10,
        jwt_secret: "test-secret".into(),
        payment_delay_min: Duration::ZERO,
        payment_delay_max: Duration::ZERO,
        demo_mode: true,
    }
}

/// Connects to the test database, or returns `None` so the caller can skip
/// when no database is configured.
pub async fn setup_state() -> anyhow::Result<Option<AppState>> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration tests.");
            return Ok(None);
        }
    };

    let pool = create_pool(&database_url, 10).await?;
    let mut state = AppState::new(pool, test_config(database_url));
    state.payments = PaymentSimulator::instant();

    // Tests in one binary start together; concurrent CREATE TABLE IF NOT
    // EXISTS can still collide on the catalog, so retry briefly.
    let mut attempts = 0;
    loop {
        match run_migrations(&state.orm).await {
            Ok(()) => break,
            Err(err) if attempts < 5 => {
                attempts += 1;
                eprintln!("migration attempt {attempts} failed: {err}");
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            Err(err) => return Err(err),
        }
    }

    Ok(Some(state))
}

pub async fn create_user(state: &AppState, role: Role) -> anyhow::Result<AuthUser> {
    let id = Uuid::new_v4();
    UserActive {
        id: Set(id),
        email: Set(format!("{id}@test.local")),
        name: Set(format!("{role} {id}")),
        role: Set(role.as_str().to_string()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(AuthUser::new(id, role))
}

pub async fn create_product(
    state: &AppState,
    seller: &AuthUser,
    price: i64,
    stock: i32,
) -> anyhow::Result<products::Model> {
    let id = Uuid::new_v4();
    let product = products::ActiveModel {
        id: Set(id),
        seller_id: Set(seller.user_id),
        name: Set(format!("Test product {id}")),
        description: Set(Some("Integration test product".into())),
        price: Set(price),
        stock: Set(stock),
        is_active: Set(true),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(product)
}

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    quantity: i32,
) -> anyhow::Result<()> {
    cart_service::add_item(
        &state.pool,
        user,
        AddToCartRequest {
            product_id,
            quantity: Some(quantity),
        },
    )
    .await?;
    Ok(())
}

pub async fn stock_of(state: &AppState, product_id: Uuid) -> anyhow::Result<i32> {
    inventory_service::current_stock(&state.orm, product_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("product {product_id} missing"))
}

pub fn order_request(method: PaymentMethod) -> CreateOrderRequest {
    CreateOrderRequest {
        payment_method: method,
        shipping_address: "House 12, Street 4, F-7, Islamabad".into(),
        phone: "03001234567".into(),
        notes: None,
    }
}

pub fn wallet_payment(order_id: Uuid) -> SettlePaymentRequest {
    SettlePaymentRequest {
        order_id,
        phone: Some("03001234567".into()),
        mpin: Some("1234".into()),
        ..Default::default()
    }
}
