// Storefront workflow services
pub mod accounts;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod orders;
pub mod payments;
pub mod pricing;

pub use accounts::AccountService;
pub use cart::{CartOwner, CartService};
pub use catalog::CatalogService;
pub use checkout::{CheckoutBlocker, CheckoutOutcome, CheckoutService};
pub use orders::{OrderDetails, OrderService};
pub use payments::PaymentService;
