//! # Order State Machine
//!
//! An order carries a payment status and an order status. Both only move
//! forward:
//!
//! ```text
//!  account without company          account with company
//!  ┌──────────────────────┐         ┌──────────────────────┐
//!  │ Pending / Pending    │         │ Delayed / Approved   │
//!  └──────────┬───────────┘         └──────────────────────┘
//!             │ session reports "paid"      (no payment path)
//!             ▼
//!  ┌──────────────────────┐
//!  │ Approved / Approved  │
//!  └──────────────────────┘
//!             session could not be created:
//!  Pending / Pending ──────────────────────▶ Rejected / Cancelled
//! ```
//!
//! Fulfillment states (`InProcess`, `Shipped`, `Refunded`) exist for the admin
//! listing but are driven elsewhere.

use crate::account::Account;
use serde::{Deserialize, Serialize};

/// Payment status of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Awaiting hosted checkout
    Pending,
    /// Invoiced company order, paid later
    Delayed,
    /// Payment captured
    Approved,
    /// Payment could not be started or was refused
    Rejected,
}

impl PaymentStatus {
    fn rank(self) -> u8 {
        match self {
            PaymentStatus::Pending => 0,
            PaymentStatus::Delayed => 1,
            PaymentStatus::Approved | PaymentStatus::Rejected => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Delayed => "delayed",
            PaymentStatus::Approved => "approved",
            PaymentStatus::Rejected => "rejected",
        }
    }
}

/// Fulfillment status of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Approved,
    InProcess,
    Shipped,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    fn rank(self) -> u8 {
        match self {
            OrderStatus::Pending => 0,
            OrderStatus::Approved => 1,
            OrderStatus::InProcess => 2,
            OrderStatus::Shipped => 3,
            OrderStatus::Cancelled | OrderStatus::Refunded => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Approved => "approved",
            OrderStatus::InProcess => "in_process",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }
}

/// Combined payment + order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderState {
    pub payment: PaymentStatus,
    pub order: OrderStatus,
}

impl OrderState {
    pub const PENDING: OrderState = OrderState {
        payment: PaymentStatus::Pending,
        order: OrderStatus::Pending,
    };

    pub const INVOICED: OrderState = OrderState {
        payment: PaymentStatus::Delayed,
        order: OrderStatus::Approved,
    };

    pub const PAID: OrderState = OrderState {
        payment: PaymentStatus::Approved,
        order: OrderStatus::Approved,
    };

    pub const ABANDONED: OrderState = OrderState {
        payment: PaymentStatus::Rejected,
        order: OrderStatus::Cancelled,
    };

    pub const fn new(payment: PaymentStatus, order: OrderStatus) -> Self {
        Self { payment, order }
    }

    /// Starting state for an order placed by `account`
    pub fn initial(account: &Account) -> Self {
        if account.is_deferred() {
            Self::INVOICED
        } else {
            Self::PENDING
        }
    }

    /// Whether moving to `next` keeps both statuses moving forward.
    ///
    /// Staying put is allowed; a lateral move between two different
    /// statuses of the same rank is not.
    pub fn can_advance_to(&self, next: OrderState) -> bool {
        fn forward(cur: u8, nxt: u8, same: bool) -> bool {
            same || nxt > cur
        }

        forward(
            self.payment.rank(),
            next.payment.rank(),
            self.payment == next.payment,
        ) && forward(self.order.rank(), next.order.rank(), self.order == next.order)
    }

    /// Target state once the gateway reports the session as paid.
    ///
    /// `None` when the payment path does not apply: invoiced orders, and
    /// orders that were already rejected.
    pub fn on_payment_confirmed(&self) -> Option<OrderState> {
        match self.payment {
            PaymentStatus::Pending => Some(Self::PAID),
            PaymentStatus::Approved => Some(*self),
            PaymentStatus::Delayed | PaymentStatus::Rejected => None,
        }
    }

    /// Target state when no payment session could be created
    pub fn on_session_failed(&self) -> Option<OrderState> {
        if *self == Self::PENDING {
            Some(Self::ABANDONED)
        } else {
            None
        }
    }

    /// Whether the order is still waiting on the hosted checkout
    pub fn awaits_payment(&self) -> bool {
        self.payment == PaymentStatus::Pending
    }
}
