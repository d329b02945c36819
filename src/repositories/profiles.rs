use serde::Serialize;

use crate::backend::store::{decode, decode_all, encode};
use crate::backend::{Query, Row, StoreError, Table, TableStore};
use crate::db::models::Profile;
use crate::db::types::{Gender, Role};

#[derive(Debug, Clone, Serialize)]
pub(crate) struct NewProfile {
    pub(crate) id: String,
    pub(crate) email: String,
    pub(crate) full_name: String,
    pub(crate) role: Role,
    pub(crate) department: Option<String>,
    pub(crate) reg_number: Option<String>,
    pub(crate) gender: Option<Gender>,
}

pub(crate) async fn find_by_id(
    store: &dyn TableStore,
    id: &str,
) -> Result<Option<Profile>, StoreError> {
    let row = store.select_optional(&Query::table(Table::Profiles).eq("id", id)).await?;
    row.map(decode).transpose()
}

pub(crate) async fn find_by_email(
    store: &dyn TableStore,
    email: &str,
) -> Result<Option<Profile>, StoreError> {
    let rows = store.select(&Query::table(Table::Profiles).eq("email", email).limit(1)).await?;
    rows.into_iter().next().map(decode).transpose()
}

pub(crate) async fn list(
    store: &dyn TableStore,
    role: Option<Role>,
) -> Result<Vec<Profile>, StoreError> {
    let mut query = Query::table(Table::Profiles).order_desc("created_at");
    if let Some(role) = role {
        query = query.eq("role", role.as_str());
    }
    decode_all(store.select(&query).await?)
}

pub(crate) async fn insert(store: &dyn TableStore, profile: &NewProfile) -> Result<Profile, StoreError> {
    decode(store.insert_one(Table::Profiles, encode(profile)?).await?)
}

pub(crate) async fn update(
    store: &dyn TableStore,
    id: &str,
    patch: Row,
) -> Result<Option<Profile>, StoreError> {
    let rows = store.update(&Query::table(Table::Profiles).eq("id", id), patch).await?;
    rows.into_iter().next().map(decode).transpose()
}

pub(crate) async fn delete(store: &dyn TableStore, id: &str) -> Result<u64, StoreError> {
    store.delete(&Query::table(Table::Profiles).eq("id", id)).await
}

pub(crate) async fn count(store: &dyn TableStore, role: Option<Role>) -> Result<u64, StoreError> {
    let mut query = Query::table(Table::Profiles);
    if let Some(role) = role {
        query = query.eq("role", role.as_str());
    }
    store.count(&query).await
}
