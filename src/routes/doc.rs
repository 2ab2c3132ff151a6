use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{AuthResponse, LoginRequest, RefreshRequest, RegisterRequest, UpdatePasswordRequest},
        cart::{AddToCartRequest, CartLine, CartView, UpdateCartItemRequest},
        categories::{
            CategoryDetail, CategoryList, CategoryNode, CategoryProducts, CreateCategoryRequest,
            UpdateCategoryRequest,
        },
        orders::{
            CheckoutResponse, CreateOrderRequest, OrderList, OrderWithItems,
            UpdateOrderStatusRequest,
        },
        payments::{CreatePaymentRequest, PaymentIntentResponse, ReconcileResult},
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
        users::{
            AddressList, AddressRequest, PaymentMethodList, PaymentMethodRequest,
            UpdateProfileRequest,
        },
    },
    entity::enums::{OrderStatus, PaymentMethodType, PaymentStatus},
    models::{Address, Category, CategorySummary, Order, OrderItem, PaymentMethod, Product, User},
    payment::{Notification, PaymentIntent},
    response::{ApiResponse, Meta},
    routes::{auth, cart, categories, health, orders, payments, products, users},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        health::readiness,
        auth::register,
        auth::login,
        auth::refresh,
        auth::me,
        auth::update_password,
        auth::logout,
        users::get_profile,
        users::update_profile,
        users::list_addresses,
        users::create_address,
        users::update_address,
        users::delete_address,
        users::list_payment_methods,
        users::create_payment_method,
        users::delete_payment_method,
        categories::list_categories,
        categories::get_category,
        categories::category_products,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        products::list_products,
        products::search_products,
        products::featured_products,
        products::new_arrivals,
        products::best_sellers,
        products::deals,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        cart::get_cart,
        cart::add_item,
        cart::update_item,
        cart::remove_item,
        cart::clear_cart,
        orders::list_orders,
        orders::create_order,
        orders::get_order,
        orders::cancel_order,
        orders::update_order_status,
        payments::create_payment,
        payments::webhook,
        payments::payment_status
    ),
    components(
        schemas(
            User,
            Category,
            CategorySummary,
            Product,
            Order,
            OrderItem,
            Address,
            PaymentMethod,
            OrderStatus,
            PaymentStatus,
            PaymentMethodType,
            RegisterRequest,
            LoginRequest,
            RefreshRequest,
            UpdatePasswordRequest,
            AuthResponse,
            UpdateProfileRequest,
            AddressRequest,
            AddressList,
            PaymentMethodRequest,
            PaymentMethodList,
            CreateCategoryRequest,
            UpdateCategoryRequest,
            CategoryNode,
            CategoryList,
            CategoryDetail,
            CategoryProducts,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            AddToCartRequest,
            UpdateCartItemRequest,
            CartLine,
            CartView,
            CreateOrderRequest,
            UpdateOrderStatusRequest,
            CheckoutResponse,
            OrderWithItems,
            OrderList,
            CreatePaymentRequest,
            PaymentIntent,
            PaymentIntentResponse,
            Notification,
            ReconcileResult,
            health::HealthData,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<CartView>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness"),
        (name = "Auth", description = "Registration, login and tokens"),
        (name = "Users", description = "Profile, addresses and saved payment methods"),
        (name = "Categories", description = "Category tree"),
        (name = "Products", description = "Product catalog"),
        (name = "Cart", description = "Shopping cart"),
        (name = "Orders", description = "Checkout and order lifecycle"),
        (name = "Payments", description = "Payment gateway integration"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
