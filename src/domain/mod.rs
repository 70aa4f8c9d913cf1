//! Enums shared by the cart, order and payment services. They are stored as
//! upper-case text columns and parsed back on read.

pub mod order_status;
pub mod payment_method;
pub mod role;

pub use order_status::{OrderStatus, PaymentStatus};
pub use payment_method::PaymentMethod;
pub use role::Role;
