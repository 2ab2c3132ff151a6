#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, EntityTrait, Set};
use storefront_api::{
    config::{AppConfig, MidtransConfig},
    db::{create_pool, run_migrations},
    dto::{cart::AddToCartRequest, users::AddressRequest},
    entity::{Products, categories, products, users},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    payment::{Notification, PaymentGateway, PaymentIntent, StatusReport, TransactionRequest},
    services::{cart_service, user_service},
    state::AppState,
};
use uuid::Uuid;

pub fn test_config(database_url: &str) -> AppConfig {
    AppConfig {
        database_url: database_url.to_string(),
        host: "127.0.0.1".into(),
        port: 0,
        db_max_connections: 10,
        jwt_secret: "test-access-secret".into(),
        jwt_refresh_secret: "test-refresh-secret".into(),
        jwt_expires_in_hours: 1,
        jwt_refresh_expires_in_days: 1,
        default_shipping_fee: 10,
        midtrans: MidtransConfig::default(),
    }
}

/// In-memory gateway: hands out predictable tokens and replays whatever
/// status report a test has scripted for an order.
#[derive(Default)]
pub struct ScriptedGateway {
    fail_create: AtomicBool,
    reports: Mutex<HashMap<String, StatusReport>>,
    created: Mutex<Vec<TransactionRequest>>,
}

impl ScriptedGateway {
    pub fn fail_next_creates(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn script(
        &self,
        order_id: Uuid,
        transaction_status: &str,
        fraud_status: Option<&str>,
        gross_amount: Option<&str>,
        event_time: Option<NaiveDateTime>,
    ) {
        let report = StatusReport {
            order_id: order_id.to_string(),
            transaction_id: Some(format!("trx-{order_id}")),
            transaction_status: transaction_status.to_string(),
            fraud_status: fraud_status.map(str::to_string),
            gross_amount: gross_amount.map(str::to_string),
            event_time,
        };
        self.reports
            .lock()
            .expect("reports lock")
            .insert(order_id.to_string(), report);
    }

    pub fn created(&self) -> Vec<TransactionRequest> {
        self.created.lock().expect("created lock").clone()
    }

    fn report_for(&self, order_id: &str) -> AppResult<StatusReport> {
        self.reports
            .lock()
            .expect("reports lock")
            .get(order_id)
            .cloned()
            .ok_or_else(|| AppError::not_found("Payment transaction"))
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn create_transaction(&self, request: &TransactionRequest) -> AppResult<PaymentIntent> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(AppError::Upstream("scripted failure".into()));
        }
        self.created
            .lock()
            .expect("created lock")
            .push(request.clone());
        let order_id = &request.transaction_details.order_id;
        Ok(PaymentIntent {
            token: format!("tok-{order_id}"),
            redirect_url: format!("https://pay.test/{order_id}"),
        })
    }

    async fn verify_notification(&self, notification: &Notification) -> AppResult<StatusReport> {
        self.report_for(&notification.order_id)
    }

    async fn transaction_status(&self, order_id: &str) -> AppResult<StatusReport> {
        self.report_for(order_id)
    }
}

/// Connect to the test database, or `None` when no URL is configured.
pub async fn setup() -> anyhow::Result<Option<(AppState, Arc<ScriptedGateway>)>> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run database tests.");
            return Ok(None);
        }
    };

    let pool = create_pool(&database_url, 10).await?;
    run_migrations(&pool).await?;

    let gateway = Arc::new(ScriptedGateway::default());
    let state = AppState::new(pool, test_config(&database_url), gateway.clone());
    Ok(Some((state, gateway)))
}

fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

pub async fn create_user(state: &AppState, role: &str) -> anyhow::Result<AuthUser> {
    let user = users::ActiveModel {
        id: Set(Uuid::new_v4()),
        first_name: Set("Test".into()),
        last_name: Set("Shopper".into()),
        email: Set(format!("{}@example.test", short_id())),
        phone: Set(None),
        password_hash: Set("unused".into()),
        role: Set(role.into()),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(AuthUser {
        user_id: user.id,
        role: user.role,
    })
}

pub async fn create_category(state: &AppState) -> anyhow::Result<Uuid> {
    let slug = format!("cat-{}", short_id());
    let category = categories::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(slug.clone()),
        slug: Set(slug),
        description: Set(None),
        image: Set(None),
        parent_id: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(category.id)
}

pub async fn create_product(
    state: &AppState,
    category_id: Uuid,
    price: i64,
    stock: i32,
) -> anyhow::Result<Uuid> {
    let product = products::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(format!("Product {}", short_id())),
        description: Set(Some("test product".into())),
        price: Set(price),
        old_price: Set(None),
        image: Set(Some("/img/test.png".into())),
        images: Set(serde_json::json!([])),
        brand: Set(Some("Acme".into())),
        category_id: Set(category_id),
        stock: Set(stock),
        featured: Set(false),
        is_new_arrival: Set(false),
        is_best_seller: Set(false),
        specifications: Set(serde_json::json!({})),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(product.id)
}

pub async fn stock_of(state: &AppState, product_id: Uuid) -> anyhow::Result<i32> {
    let product = Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| anyhow::anyhow!("product {product_id} missing"))?;
    Ok(product.stock)
}

pub fn address_request(name: &str, is_default: Option<bool>) -> AddressRequest {
    AddressRequest {
        name: name.into(),
        address: "Jl. Merdeka No. 10".into(),
        city: "Bandung".into(),
        zip_code: "40111".into(),
        is_default,
    }
}

pub async fn create_address(state: &AppState, user: &AuthUser) -> anyhow::Result<Uuid> {
    let resp = user_service::create_address(state, user, address_request("Home", None)).await?;
    Ok(resp.data.expect("address").id)
}

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    quantity: i32,
) -> anyhow::Result<()> {
    cart_service::add_item(
        state,
        user,
        AddToCartRequest {
            product_id,
            quantity: Some(quantity),
        },
    )
    .await?;
    Ok(())
}
