//! Status and role enums shared with the backend.

use serde::{Deserialize, Serialize};

/// Order lifecycle status as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Returned,
    /// Any status this storefront does not know about yet.
    #[serde(other)]
    Unknown,
}

impl OrderStatus {
    /// Whether the backend accepts a cancellation request for this status.
    #[must_use]
    pub const fn is_cancellable(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }

    /// Human readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Confirmed => "Confirmed",
            Self::Processing => "Processing",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
            Self::Returned => "Returned",
            Self::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Payment method chosen at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Cash on delivery.
    Cod,
    BankTransfer,
    EWallet,
}

impl PaymentMethod {
    /// All methods offered at checkout, in display order.
    pub const ALL: [Self; 3] = [Self::Cod, Self::BankTransfer, Self::EWallet];

    /// Wire code, also used as the HTML form value.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Cod => "COD",
            Self::BankTransfer => "BANK_TRANSFER",
            Self::EWallet => "E_WALLET",
        }
    }

    /// Human readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Cod => "Cash on delivery",
            Self::BankTransfer => "Bank transfer",
            Self::EWallet => "E-wallet",
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("invalid payment method: {s}"))
    }
}

/// User role.
///
/// The backend is inconsistent about prefixes (`ADMIN` vs `ROLE_ADMIN`), so
/// parsing accepts both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    User,
    Admin,
}

impl Role {
    /// Parse a backend role string; unknown roles are treated as `User`.
    #[must_use]
    pub fn from_backend(s: &str) -> Self {
        let s = s.trim();
        let bare = s
            .strip_prefix("ROLE_")
            .or_else(|| s.strip_prefix("role_"))
            .unwrap_or(s);
        if bare.eq_ignore_ascii_case("admin") {
            Self::Admin
        } else {
            Self::User
        }
    }
}

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatSender {
    User,
    Bot,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn role_parsing_accepts_both_prefixes() {
        assert_eq!(Role::from_backend("ADMIN"), Role::Admin);
        assert_eq!(Role::from_backend("ROLE_ADMIN"), Role::Admin);
        assert_eq!(Role::from_backend("role_admin"), Role::Admin);
        assert_eq!(Role::from_backend("ROLE_USER"), Role::User);
        assert_eq!(Role::from_backend("MODERATOR"), Role::User);
    }

    #[test]
    fn unknown_order_status_does_not_fail_decoding() {
        let status: OrderStatus = serde_json::from_str("\"ON_HOLD\"").unwrap();
        assert_eq!(status, OrderStatus::Unknown);
        let status: OrderStatus = serde_json::from_str("\"SHIPPED\"").unwrap();
        assert_eq!(status, OrderStatus::Shipped);
    }

    #[test]
    fn only_early_orders_are_cancellable() {
        assert!(OrderStatus::Pending.is_cancellable());
        assert!(OrderStatus::Confirmed.is_cancellable());
        assert!(!OrderStatus::Shipped.is_cancellable());
    }

    #[test]
    fn payment_method_round_trips_form_codes() {
        assert_eq!("cod".parse::<PaymentMethod>(), Ok(PaymentMethod::Cod));
        assert_eq!(
            "BANK_TRANSFER".parse::<PaymentMethod>(),
            Ok(PaymentMethod::BankTransfer)
        );
        assert!("CRYPTO".parse::<PaymentMethod>().is_err());
    }
}
