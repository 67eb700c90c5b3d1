//! Business logic services for storefront.
//!
//! # Services
//!
//! - `auth` - Sign-in state machine, login/logout, auth form validation
//! - `cart` - Session cart snapshot kept in step with the backend
//! - `checkout` - Multi-step checkout wizard
//! - `lists` - Session-held wishlist and compare tray
//! - `notifications` - Toasts and loading flags
//! - `validation` - Field-level form validation helpers

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod lists;
pub mod notifications;
pub mod validation;

pub use auth::{AuthError, AuthService, AuthState};
pub use cart::CartService;
pub use checkout::{CheckoutError, CheckoutService};
pub use lists::ProductList;
pub use notifications::{NotificationCenter, Toast, ToastLevel};
pub use validation::FieldErrors;
