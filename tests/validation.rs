use serde_json::json;
use storefront_api::{
    dto::{
        auth::RegisterRequest,
        cart::AddToCartRequest,
        categories::{CreateCategoryRequest, UpdateCategoryRequest},
        products::UpdateProductRequest,
        users::{AddressRequest, PaymentMethodRequest},
    },
    error::AppError,
    response::Meta,
    routes::params::{HighlightQuery, Pagination},
};

fn bad_request_message<T>(result: Result<T, AppError>) -> String {
    match result {
        Err(AppError::BadRequest(message)) => message,
        Err(other) => panic!("expected BadRequest, got {other:?}"),
        Ok(_) => panic!("expected BadRequest, got Ok"),
    }
}

fn register(password: &str, phone: Option<&str>) -> RegisterRequest {
    serde_json::from_value(json!({
        "first_name": "Jane",
        "last_name": "Doe",
        "email": "jane@example.com",
        "password": password,
        "phone": phone,
    }))
    .expect("register body")
}

#[tokio::test]
async fn registration_enforces_password_strength() {
    assert!(register("Secret123!", None).validate().is_ok());

    let message = bad_request_message(register("Sh0rt!", None).validate());
    assert_eq!(message, "Password must be at least 8 characters long");

    let message = bad_request_message(register("secret1234", None).validate());
    assert!(message.starts_with("Password must contain"));
}

#[tokio::test]
async fn registration_checks_phone_when_given() {
    assert!(register("Secret123!", Some("+628123456789")).validate().is_ok());
    let message = bad_request_message(register("Secret123!", Some("12-34")).validate());
    assert_eq!(message, "Please provide a valid phone number");
}

#[tokio::test]
async fn cart_quantity_defaults_to_one() {
    let request: AddToCartRequest = serde_json::from_value(json!({
        "product_id": "6b0f6f64-3f0b-4d5e-9a43-2f1f3d1c8a10",
    }))
    .expect("cart body");
    assert_eq!(request.quantity().expect("quantity"), 1);

    let request: AddToCartRequest = serde_json::from_value(json!({
        "product_id": "6b0f6f64-3f0b-4d5e-9a43-2f1f3d1c8a10",
        "quantity": 0,
    }))
    .expect("cart body");
    assert!(matches!(request.quantity(), Err(AppError::BadRequest(_))));
}

#[tokio::test]
async fn category_slugs_are_lowercase_words() {
    let request = CreateCategoryRequest {
        name: "Laptops".into(),
        slug: "gaming-laptops".into(),
        description: None,
        image: None,
        parent_id: None,
    };
    assert!(request.validate().is_ok());

    let request = CreateCategoryRequest {
        slug: "Gaming Laptops".into(),
        ..request
    };
    let message = bad_request_message(request.validate());
    assert_eq!(
        message,
        "Slug can only contain lowercase letters, numbers, and hyphens"
    );
}

#[tokio::test]
async fn null_parent_differs_from_absent_parent() {
    let absent: UpdateCategoryRequest = serde_json::from_value(json!({ "name": "Phones" }))
        .expect("update body");
    assert_eq!(absent.parent_id, None);

    let detach: UpdateCategoryRequest =
        serde_json::from_value(json!({ "parent_id": null })).expect("update body");
    assert_eq!(detach.parent_id, Some(None));

    let product: UpdateProductRequest =
        serde_json::from_value(json!({ "old_price": null })).expect("update body");
    assert_eq!(product.old_price, Some(None));
}

#[tokio::test]
async fn product_updates_reject_negative_numbers_and_non_object_specs() {
    let update: UpdateProductRequest =
        serde_json::from_value(json!({ "price": -1 })).expect("update body");
    assert_eq!(
        bad_request_message(update.validate()),
        "Price must be a non-negative number"
    );

    let update: UpdateProductRequest =
        serde_json::from_value(json!({ "specifications": ["ram", "16GB"] })).expect("update body");
    assert_eq!(
        bad_request_message(update.validate()),
        "Specifications must be an object"
    );

    let update: UpdateProductRequest =
        serde_json::from_value(json!({ "specifications": { "ram": "16GB" }, "stock": 0 }))
            .expect("update body");
    assert!(update.validate().is_ok());
}

#[tokio::test]
async fn addresses_need_a_numeric_zip_code() {
    let address = AddressRequest {
        name: "Home".into(),
        address: "1 Main Street".into(),
        city: "Springfield".into(),
        zip_code: "12345".into(),
        is_default: None,
    };
    assert!(address.validate().is_ok());

    let address = AddressRequest {
        zip_code: "12A45".into(),
        ..address
    };
    assert_eq!(
        bad_request_message(address.validate()),
        "Please provide a valid zip code"
    );
}

#[tokio::test]
async fn payment_method_type_is_read_from_type_field() {
    let method: PaymentMethodRequest = serde_json::from_value(json!({
        "type": "E_WALLET",
        "details": { "provider": "gopay" },
    }))
    .expect("payment method body");
    assert!(method.validate().is_ok());

    let method: PaymentMethodRequest = serde_json::from_value(json!({
        "type": "BANK_TRANSFER",
        "details": "account 123",
    }))
    .expect("payment method body");
    assert!(matches!(method.validate(), Err(AppError::BadRequest(_))));

    let unknown = serde_json::from_value::<PaymentMethodRequest>(json!({
        "type": "CASH",
        "details": {},
    }));
    assert!(unknown.is_err());
}

#[tokio::test]
async fn pagination_is_clamped() {
    assert_eq!(Pagination::default().normalize(), (1, 10, 0));
    assert_eq!(Pagination::new(3, 20).normalize(), (3, 20, 40));
    assert_eq!(Pagination::new(0, 1000).normalize(), (1, 100, 0));
    assert_eq!(Pagination::new(-2, 0).normalize(), (1, 1, 0));

    assert_eq!(HighlightQuery::default().limit(), 8);
    assert_eq!(HighlightQuery { limit: Some(500) }.limit(), 100);
}

#[tokio::test]
async fn meta_counts_pages() {
    let meta = Meta::new(1, 10, 21);
    assert_eq!(meta.pages, Some(3));
    assert_eq!(Meta::new(1, 10, 0).pages, Some(0));
    assert_eq!(Meta::new(2, 10, 20).pages, Some(2));
}
