use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use super::{OrderStore, StoreError, StoreResult};
use crate::models::{NewOrder, NewOrderItem, Order, OrderId, OrderItem, OrderItemId};

/// Process-local order store. Ids start at 1 and are never reused.
#[derive(Default)]
pub struct InMemoryOrderStore {
    tables: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    orders: BTreeMap<OrderId, Order>,
    items: BTreeMap<OrderItemId, OrderItem>,
    last_order_id: i64,
    last_item_id: i64,
}

impl Tables {
    fn next_order_id(&mut self) -> OrderId {
        self.last_order_id += 1;
        OrderId::from(self.last_order_id)
    }

    fn next_item_id(&mut self) -> OrderItemId {
        self.last_item_id += 1;
        OrderItemId::from(self.last_item_id)
    }

    fn insert_item(&mut self, item: NewOrderItem) -> OrderItem {
        let id = self.next_item_id();
        let item = item.with_id(id);
        self.items.insert(id, item.clone());
        item
    }

    fn overwrite_order(&mut self, order: &Order) -> StoreResult<()> {
        match self.orders.get_mut(&order.id) {
            Some(row) => {
                *row = order.clone();
                Ok(())
            }
            None => Err(StoreError::MissingOrder(order.id)),
        }
    }
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert_order(&self, order: NewOrder) -> StoreResult<Order> {
        let mut tables = self.tables.lock().await;
        let id = tables.next_order_id();
        let order = order.with_id(id);
        tables.orders.insert(id, order.clone());
        Ok(order)
    }

    async fn save_order(&self, order: &Order) -> StoreResult<()> {
        self.tables.lock().await.overwrite_order(order)
    }

    async fn find_order(&self, id: OrderId) -> StoreResult<Option<Order>> {
        Ok(self.tables.lock().await.orders.get(&id).cloned())
    }

    async fn order_exists(&self, id: OrderId) -> StoreResult<bool> {
        Ok(self.tables.lock().await.orders.contains_key(&id))
    }

    async fn delete_order(&self, id: OrderId) -> StoreResult<()> {
        self.tables.lock().await.orders.remove(&id);
        Ok(())
    }

    async fn find_all_orders(&self) -> StoreResult<Vec<Order>> {
        Ok(self.tables.lock().await.orders.values().cloned().collect())
    }

    async fn find_orders_by_customer(&self, customer_id: i64) -> StoreResult<Vec<Order>> {
        let tables = self.tables.lock().await;
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|o| o.customer_id == customer_id)
            .cloned()
            .collect();

        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn insert_item(&self, item: NewOrderItem) -> StoreResult<OrderItem> {
        Ok(self.tables.lock().await.insert_item(item))
    }

    async fn find_items(&self, order_id: OrderId) -> StoreResult<Vec<OrderItem>> {
        Ok(self
            .tables
            .lock()
            .await
            .items
            .values()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn delete_item(&self, id: OrderItemId) -> StoreResult<()> {
        self.tables.lock().await.items.remove(&id);
        Ok(())
    }

    async fn replace_items_atomically(
        &self,
        order: &Order,
        items: Vec<NewOrderItem>,
    ) -> StoreResult<Vec<OrderItem>> {
        // One lock for the whole unit, so readers see before or after only
        let mut tables = self.tables.lock().await;
        if !tables.orders.contains_key(&order.id) {
            return Err(StoreError::MissingOrder(order.id));
        }

        tables.items.retain(|_, item| item.order_id != order.id);
        let inserted: Vec<OrderItem> = items.into_iter().map(|i| tables.insert_item(i)).collect();
        tables.overwrite_order(order)?;

        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    fn item(order_id: OrderId, menu_item_id: i64) -> NewOrderItem {
        NewOrderItem {
            order_id,
            menu_item_id,
            quantity: 1,
            price: Some(dec!(1.00)),
        }
    }

    #[tokio::test]
    async fn test_ids_are_assigned_on_insert() {
        let store = InMemoryOrderStore::new();
        let first = store.insert_order(NewOrder::stub(1, 1, Utc::now())).await.unwrap();
        let second = store.insert_order(NewOrder::stub(1, 1, Utc::now())).await.unwrap();

        assert_eq!(first.id.get(), 1);
        assert_eq!(second.id.get(), 2);
        assert!(store.order_exists(first.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_customer_orders_newest_first_with_id_tiebreak() {
        let store = InMemoryOrderStore::new();
        let base = Utc::now();

        let old = store.insert_order(NewOrder::stub(5, 1, base)).await.unwrap();
        let tie_a = store
            .insert_order(NewOrder::stub(5, 1, base + Duration::seconds(10)))
            .await
            .unwrap();
        let tie_b = store
            .insert_order(NewOrder::stub(5, 1, base + Duration::seconds(10)))
            .await
            .unwrap();
        store.insert_order(NewOrder::stub(6, 1, base)).await.unwrap();

        let ids: Vec<OrderId> = store
            .find_orders_by_customer(5)
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.id)
            .collect();

        assert_eq!(ids, vec![tie_b.id, tie_a.id, old.id]);
    }

    #[tokio::test]
    async fn test_save_of_missing_order_is_rejected() {
        let store = InMemoryOrderStore::new();
        let ghost = NewOrder::stub(1, 1, Utc::now()).with_id(OrderId::from(99));

        let err = store.save_order(&ghost).await.unwrap_err();
        assert!(matches!(err, StoreError::MissingOrder(id) if id.get() == 99));
    }

    #[tokio::test]
    async fn test_atomic_replace_swaps_items_and_order() {
        let store = InMemoryOrderStore::new();
        let mut order = store.insert_order(NewOrder::stub(1, 1, Utc::now())).await.unwrap();
        store.insert_item(item(order.id, 1)).await.unwrap();
        store.insert_item(item(order.id, 2)).await.unwrap();

        order.total_amount = dec!(1.00);
        let inserted = store
            .replace_items_atomically(&order, vec![item(order.id, 3)])
            .await
            .unwrap();

        let items = store.find_items(order.id).await.unwrap();
        assert_eq!(items, inserted);
        assert_eq!(items[0].menu_item_id, 3);
        assert_eq!(
            store.find_order(order.id).await.unwrap().unwrap().total_amount,
            dec!(1.00)
        );
    }

    #[tokio::test]
    async fn test_items_of_other_orders_are_untouched() {
        let store = InMemoryOrderStore::new();
        let a = store.insert_order(NewOrder::stub(1, 1, Utc::now())).await.unwrap();
        let b = store.insert_order(NewOrder::stub(1, 1, Utc::now())).await.unwrap();
        store.insert_item(item(a.id, 1)).await.unwrap();
        store.insert_item(item(b.id, 2)).await.unwrap();

        store.replace_items_atomically(&a, vec![]).await.unwrap();

        assert!(store.find_items(a.id).await.unwrap().is_empty());
        assert_eq!(store.find_items(b.id).await.unwrap().len(), 1);
    }
}
