use crate::backend::{Query, StoreError, Table, TableStore};

/// Cheapest round trip the store contract allows.
pub(crate) async fn ping(store: &dyn TableStore) -> Result<(), StoreError> {
    store.select(&Query::table(Table::Profiles).limit(1)).await?;
    Ok(())
}
