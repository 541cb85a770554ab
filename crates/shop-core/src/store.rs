//! # Stores
//!
//! Typed data access per aggregate: carts, orders and accounts. The checkout
//! service only talks to these traits; `MemoryStore` implements all three
//! over `tokio::sync::RwLock`-guarded tables.

use crate::account::Account;
use crate::cart::{CartLine, CartLineId};
use crate::error::{ShopError, ShopResult};
use crate::order::{NewOrderDetail, NewOrderHeader, OrderDetail, OrderHeader, OrderId};
use crate::status::OrderState;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Cart line persistence
#[async_trait]
pub trait CartStore: Send + Sync {
    /// All lines for an account, in insertion order
    async fn lines_for(&self, account_id: &str) -> ShopResult<Vec<CartLine>>;

    async fn get_line(&self, id: CartLineId) -> ShopResult<CartLine>;

    /// Add copies of a product, merging into an existing line for the same product
    async fn add(&self, account_id: &str, product_id: &str, quantity: u32)
        -> ShopResult<CartLine>;

    async fn set_quantity(&self, id: CartLineId, quantity: u32) -> ShopResult<CartLine>;

    async fn remove(&self, id: CartLineId) -> ShopResult<()>;

    /// Delete every line of an account, returning how many were removed
    async fn clear(&self, account_id: &str) -> ShopResult<usize>;
}

/// Order header + detail persistence
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist a header and assign its ID
    async fn insert_header(&self, header: NewOrderHeader) -> ShopResult<OrderHeader>;

    /// Persist details for an existing header
    async fn insert_details(
        &self,
        order_id: OrderId,
        details: Vec<NewOrderDetail>,
    ) -> ShopResult<Vec<OrderDetail>>;

    async fn get(&self, id: OrderId) -> ShopResult<OrderHeader>;

    async fn details(&self, id: OrderId) -> ShopResult<Vec<OrderDetail>>;

    async fn list(&self) -> ShopResult<Vec<OrderHeader>>;

    /// Record the hosted checkout session (and payment intent, when known)
    async fn set_payment_refs(
        &self,
        id: OrderId,
        session_id: &str,
        payment_intent_id: Option<&str>,
    ) -> ShopResult<()>;

    /// Compare-and-swap the order state.
    ///
    /// Applies `next` only if the stored state equals `expected` and the move
    /// is forward. Returns the state stored after the call and whether it
    /// changed.
    async fn transition(
        &self,
        id: OrderId,
        expected: OrderState,
        next: OrderState,
    ) -> ShopResult<(OrderState, bool)>;
}

/// Account lookup
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get(&self, id: &str) -> ShopResult<Account>;
}

/// Shared handles to the three stores
#[derive(Clone)]
pub struct Stores {
    pub carts: Arc<dyn CartStore>,
    pub orders: Arc<dyn OrderStore>,
    pub accounts: Arc<dyn AccountStore>,
}

impl Stores {
    /// All three stores backed by one in-memory store
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            carts: store.clone(),
            orders: store.clone(),
            accounts: store,
        }
    }
}

#[derive(Default)]
struct CartTable {
    next_id: CartLineId,
    lines: BTreeMap<CartLineId, CartLine>,
}

#[derive(Default)]
struct OrderTable {
    next_id: OrderId,
    next_detail_id: u64,
    headers: BTreeMap<OrderId, OrderHeader>,
    details: BTreeMap<OrderId, Vec<OrderDetail>>,
}

/// In-memory store for carts, orders and accounts
#[derive(Default)]
pub struct MemoryStore {
    carts: RwLock<CartTable>,
    orders: RwLock<OrderTable>,
    accounts: RwLock<HashMap<String, Account>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with accounts
    pub fn with_accounts(accounts: impl IntoIterator<Item = Account>) -> Self {
        let accounts = accounts.into_iter().map(|a| (a.id.clone(), a)).collect();
        Self {
            accounts: RwLock::new(accounts),
            ..Self::default()
        }
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn lines_for(&self, account_id: &str) -> ShopResult<Vec<CartLine>> {
        let table = self.carts.read().await;
        Ok(table
            .lines
            .values()
            .filter(|l| l.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn get_line(&self, id: CartLineId) -> ShopResult<CartLine> {
        let table = self.carts.read().await;
        table
            .lines
            .get(&id)
            .cloned()
            .ok_or_else(|| ShopError::not_found("cart line", id))
    }

    async fn add(
        &self,
        account_id: &str,
        product_id: &str,
        quantity: u32,
    ) -> ShopResult<CartLine> {
        let mut table = self.carts.write().await;

        if let Some(line) = table
            .lines
            .values_mut()
            .find(|l| l.account_id == account_id && l.product_id == product_id)
        {
            line.quantity = line.quantity.saturating_add(quantity);
            return Ok(line.clone());
        }

        table.next_id += 1;
        let line = CartLine {
            id: table.next_id,
            account_id: account_id.to_string(),
            product_id: product_id.to_string(),
            quantity,
        };
        table.lines.insert(line.id, line.clone());
        Ok(line)
    }

    async fn set_quantity(&self, id: CartLineId, quantity: u32) -> ShopResult<CartLine> {
        let mut table = self.carts.write().await;
        let line = table
            .lines
            .get_mut(&id)
            .ok_or_else(|| ShopError::not_found("cart line", id))?;
        line.quantity = quantity;
        Ok(line.clone())
    }

    async fn remove(&self, id: CartLineId) -> ShopResult<()> {
        let mut table = self.carts.write().await;
        table
            .lines
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| ShopError::not_found("cart line", id))
    }

    async fn clear(&self, account_id: &str) -> ShopResult<usize> {
        let mut table = self.carts.write().await;
        let before = table.lines.len();
        table.lines.retain(|_, l| l.account_id != account_id);
        Ok(before - table.lines.len())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert_header(&self, header: NewOrderHeader) -> ShopResult<OrderHeader> {
        let mut table = self.orders.write().await;
        table.next_id += 1;
        let header = OrderHeader::from_draft(table.next_id, header);
        table.headers.insert(header.id, header.clone());
        Ok(header)
    }

    async fn insert_details(
        &self,
        order_id: OrderId,
        details: Vec<NewOrderDetail>,
    ) -> ShopResult<Vec<OrderDetail>> {
        let mut table = self.orders.write().await;
        if !table.headers.contains_key(&order_id) {
            return Err(ShopError::not_found("order", order_id));
        }

        let mut stored = Vec::with_capacity(details.len());
        for d in details {
            table.next_detail_id += 1;
            stored.push(OrderDetail {
                id: table.next_detail_id,
                order_id,
                product_id: d.product_id,
                title: d.title,
                unit_price: d.unit_price,
                quantity: d.quantity,
            });
        }

        table
            .details
            .entry(order_id)
            .or_default()
            .extend(stored.iter().cloned());
        Ok(stored)
    }

    async fn get(&self, id: OrderId) -> ShopResult<OrderHeader> {
        let table = self.orders.read().await;
        table
            .headers
            .get(&id)
            .cloned()
            .ok_or_else(|| ShopError::not_found("order", id))
    }

    async fn details(&self, id: OrderId) -> ShopResult<Vec<OrderDetail>> {
        let table = self.orders.read().await;
        if !table.headers.contains_key(&id) {
            return Err(ShopError::not_found("order", id));
        }
        Ok(table.details.get(&id).cloned().unwrap_or_default())
    }

    async fn list(&self) -> ShopResult<Vec<OrderHeader>> {
        let table = self.orders.read().await;
        Ok(table.headers.values().cloned().collect())
    }

    async fn set_payment_refs(
        &self,
        id: OrderId,
        session_id: &str,
        payment_intent_id: Option<&str>,
    ) -> ShopResult<()> {
        let mut table = self.orders.write().await;
        let header = table
            .headers
            .get_mut(&id)
            .ok_or_else(|| ShopError::not_found("order", id))?;

        header.session_id = Some(session_id.to_string());
        if let Some(intent) = payment_intent_id {
            header.payment_intent_id = Some(intent.to_string());
        }
        Ok(())
    }

    async fn transition(
        &self,
        id: OrderId,
        expected: OrderState,
        next: OrderState,
    ) -> ShopResult<(OrderState, bool)> {
        let mut table = self.orders.write().await;
        let header = table
            .headers
            .get_mut(&id)
            .ok_or_else(|| ShopError::not_found("order", id))?;

        let current = header.state();
        if current != expected || current == next {
            return Ok((current, false));
        }
        if !current.can_advance_to(next) {
            return Err(ShopError::InvalidState(format!(
                "order {} cannot move from {:?} to {:?}",
                id, current, next
            )));
        }

        header.set_state(next);
        if next == OrderState::PAID {
            header.payment_date = Some(Utc::now());
        }
        Ok((next, true))
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn get(&self, id: &str) -> ShopResult<Account> {
        let accounts = self.accounts.read().await;
        accounts
            .get(id)
            .cloned()
            .ok_or_else(|| ShopError::not_found("account", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::ShippingDetails;
    use crate::product::{Currency, Price};

    fn header(account_id: &str) -> NewOrderHeader {
        NewOrderHeader {
            account_id: account_id.into(),
            order_date: Utc::now(),
            total: Price::from_cents(2000, Currency::EUR),
            state: OrderState::PENDING,
            shipping: ShippingDetails::default(),
        }
    }

    #[tokio::test]
    async fn test_cart_add_merges_same_product() {
        let store = MemoryStore::new();
        let first = store.add("u1", "p", 2).await.unwrap();
        let merged = store.add("u1", "p", 3).await.unwrap();
        store.add("u2", "p", 1).await.unwrap();

        assert_eq!(first.id, merged.id);
        assert_eq!(merged.quantity, 5);
        assert_eq!(store.lines_for("u1").await.unwrap().len(), 1);
        assert_eq!(store.lines_for("u2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cart_clear_only_touches_one_account() {
        let store = MemoryStore::new();
        store.add("u1", "a", 1).await.unwrap();
        store.add("u1", "b", 1).await.unwrap();
        store.add("u2", "a", 1).await.unwrap();

        assert_eq!(store.clear("u1").await.unwrap(), 2);
        assert!(store.lines_for("u1").await.unwrap().is_empty());
        assert_eq!(store.lines_for("u2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_cart_line() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.get_line(99).await,
            Err(ShopError::NotFound { .. })
        ));
        assert!(store.remove(99).await.is_err());
        assert!(store.set_quantity(99, 1).await.is_err());
    }

    #[tokio::test]
    async fn test_details_require_header() {
        let store = MemoryStore::new();
        let detail = NewOrderDetail {
            product_id: "p".into(),
            title: "P".into(),
            unit_price: Price::from_cents(1000, Currency::EUR),
            quantity: 2,
        };

        let orphan = store.insert_details(42, vec![detail.clone()]).await;
        assert!(matches!(orphan, Err(ShopError::NotFound { .. })));

        let order = store.insert_header(header("u1")).await.unwrap();
        let stored = store.insert_details(order.id, vec![detail]).await.unwrap();
        assert_eq!(stored[0].order_id, order.id);
        assert_eq!(store.details(order.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_transition_compare_and_swap() {
        let store = MemoryStore::new();
        let order = store.insert_header(header("u1")).await.unwrap();

        let (state, changed) = store
            .transition(order.id, OrderState::PENDING, OrderState::PAID)
            .await
            .unwrap();
        assert!(changed);
        assert_eq!(state, OrderState::PAID);

        // a second caller that still believes the order is pending loses
        let (state, changed) = store
            .transition(order.id, OrderState::PENDING, OrderState::PAID)
            .await
            .unwrap();
        assert!(!changed);
        assert_eq!(state, OrderState::PAID);

        let stored = OrderStore::get(&store, order.id).await.unwrap();
        assert!(stored.payment_date.is_some());
    }

    #[tokio::test]
    async fn test_transition_rejects_regression() {
        let store = MemoryStore::new();
        let order = store.insert_header(header("u1")).await.unwrap();
        store
            .transition(order.id, OrderState::PENDING, OrderState::PAID)
            .await
            .unwrap();

        let result = store
            .transition(order.id, OrderState::PAID, OrderState::PENDING)
            .await;
        assert!(matches!(result, Err(ShopError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_concurrent_transitions_advance_once() {
        let store = Arc::new(MemoryStore::new());
        let order = store.insert_header(header("u1")).await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .transition(order.id, OrderState::PENDING, OrderState::PAID)
                        .await
                        .unwrap()
                        .1
                })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_account_lookup() {
        let store = MemoryStore::with_accounts([Account::company(
            "corp",
            7,
            ShippingDetails::default(),
        )]);

        assert!(AccountStore::get(&store, "corp")
            .await
            .unwrap()
            .is_deferred());
        assert!(matches!(
            AccountStore::get(&store, "nobody").await,
            Err(ShopError::NotFound { .. })
        ));
    }
}
