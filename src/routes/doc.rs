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
    domain::{OrderStatus, PaymentMethod, PaymentStatus, Role},
    dto::{
        cart::{AddToCartRequest, CartLine, CartProduct, CartView, UpdateCartItemRequest},
        orders::{CreateOrderRequest, OrderList, OrderWithItems, UpdateOrderStatusRequest},
        payments::{
            PaymentMethodInfo, PaymentMethodList, PaymentReceipt, PaymentVerification,
            SettlePaymentRequest,
        },
        products::{CreateProductRequest, InventoryAdjustRequest, ProductList, UpdateProductRequest},
    },
    models::{Order, OrderItem, Product},
    response::{ApiResponse, Meta},
    routes::{admin, cart, health, orders, params, payments, products as product_routes, seller},
    services::payment_simulator::{CardDetails, PaymentResult},
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
        product_routes::list_products,
        product_routes::get_product,
        product_routes::create_product,
        product_routes::update_product,
        cart::get_cart,
        cart::add_to_cart,
        cart::update_cart_item,
        cart::remove_cart_item,
        cart::clear_cart,
        orders::list_orders,
        orders::create_order,
        orders::get_order,
        orders::cancel_order,
        orders::update_order_status,
        payments::list_methods,
        payments::settle_payment,
        payments::verify_payment,
        seller::list_seller_orders,
        admin::list_all_orders,
        admin::list_low_stock,
        admin::adjust_inventory
    ),
    components(
        schemas(
            Role,
            OrderStatus,
            PaymentStatus,
            PaymentMethod,
            Product,
            Order,
            OrderItem,
            CartView,
            CartLine,
            CartProduct,
            AddToCartRequest,
            UpdateCartItemRequest,
            CreateOrderRequest,
            UpdateOrderStatusRequest,
            OrderWithItems,
            OrderList,
            CreateProductRequest,
            UpdateProductRequest,
            InventoryAdjustRequest,
            ProductList,
            SettlePaymentRequest,
            PaymentResult,
            CardDetails,
            PaymentReceipt,
            PaymentVerification,
            PaymentMethodInfo,
            PaymentMethodList,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            params::LowStockQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<CartView>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<PaymentReceipt>,
            ApiResponse<PaymentVerification>,
            ApiResponse<PaymentMethodList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Products", description = "Catalog endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Order lifecycle endpoints"),
        (name = "Payments", description = "Simulated payment endpoints"),
        (name = "Seller", description = "Seller endpoints"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
