use crate::domain::Order;
use crate::error::OrderError;
use crate::events::outbox_dispatcher;
use crate::repo::OrderReader;
use outbox::{
    ChangeTracker, CurrentUser, OutboxRepository, TrackedEntity, TransactionalStore, UnitOfWork,
};
use std::sync::Arc;
use uuid::Uuid;

/// Order use cases; every change commits through the unit of work
pub struct OrderService<St: TransactionalStore> {
    store: Arc<St>,
    uow: UnitOfWork<St>,
}

impl<St, Sess> OrderService<St>
where
    St: TransactionalStore<Session = Sess>
        + OutboxRepository<Session = Sess>
        + OrderReader
        + 'static,
    Sess: Send + 'static,
    Order: TrackedEntity<Sess>,
{
    pub fn new(store: Arc<St>, current_user: Arc<dyn CurrentUser>) -> Self {
        let dispatcher = Arc::new(outbox_dispatcher(Arc::clone(&store)));
        let uow = UnitOfWork::new(Arc::clone(&store), dispatcher, current_user);
        Self { store, uow }
    }

    pub async fn place_order(&self, customer_id: &str, total_cents: i64) -> Result<Order, OrderError> {
        let mut order = Order::place(customer_id, total_cents)?;

        let mut tracker = ChangeTracker::<Sess>::new();
        tracker.add(&mut order);
        self.uow.commit(tracker).await?;

        tracing::info!(
            order_id = %order.id,
            customer_id = %order.customer_id,
            total_cents = order.total_cents,
            "Order placed"
        );

        Ok(order)
    }

    pub async fn cancel_order(&self, order_id: Uuid, reason: &str) -> Result<Order, OrderError> {
        let mut order = self
            .store
            .find_order(order_id)
            .await?
            .ok_or(OrderError::NotFound(order_id))?;

        order.cancel(reason)?;

        let mut tracker = ChangeTracker::<Sess>::new();
        tracker.modify(&mut order);
        self.uow.commit(tracker).await?;

        tracing::info!(order_id = %order.id, reason = %reason, "Order cancelled");

        Ok(order)
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<Order, OrderError> {
        self.store
            .find_order(order_id)
            .await?
            .ok_or(OrderError::NotFound(order_id))
    }
}
