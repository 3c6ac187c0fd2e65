use axum::Router;

pub mod assignments;
pub mod cylinders;
pub mod employees;
pub mod products;
pub mod purchases;
pub mod sales;
pub mod stock;
pub mod system;

/// Router for every stock endpoint except `/health`.
pub fn router() -> Router {
    Router::new()
        .nest("/stock", stock::router())
        .nest("/products", products::router())
        .nest("/purchases", purchases::router())
        .nest("/sales", sales::router())
        .nest("/cylinders", cylinders::router())
        .nest("/assignments", assignments::router())
        .nest("/employees", employees::router())
}
