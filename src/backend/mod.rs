pub(crate) mod error;
pub(crate) mod gotrue;
pub(crate) mod identity;
pub(crate) mod local_identity;
pub(crate) mod postgres;
pub(crate) mod query;
pub(crate) mod rest;
pub(crate) mod store;

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgConnectOptions;
use tokio::sync::RwLock;

use crate::core::config::{BackendMode, SecuritySettings, Settings, SupabaseSettings};
use crate::db;

pub(crate) use error::{IdentityError, StoreError};
pub(crate) use identity::IdentityProvider;
pub(crate) use query::{Query, Row, Table};
pub(crate) use store::TableStore;

/// A connected pair of collaborators: table persistence and identity.
#[derive(Clone)]
pub(crate) struct Backend {
    store: Arc<dyn TableStore>,
    identity: Arc<dyn IdentityProvider>,
}

impl Backend {
    pub(crate) fn new(store: Arc<dyn TableStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { store, identity }
    }

    pub(crate) fn store(&self) -> &dyn TableStore {
        self.store.as_ref()
    }

    pub(crate) fn identity(&self) -> &dyn IdentityProvider {
        self.identity.as_ref()
    }
}

pub(crate) trait BackendConnector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Builds fresh clients. Must not reuse sockets from a previous backend.
    fn connect(&self) -> Result<Backend, StoreError>;
}

/// Lazily connected, resettable backend. Cloned into every request via state.
#[derive(Clone)]
pub(crate) struct BackendHandle {
    connector: Arc<dyn BackendConnector>,
    current: Arc<RwLock<Option<Backend>>>,
}

impl BackendHandle {
    pub(crate) fn new(connector: Arc<dyn BackendConnector>) -> Self {
        Self { connector, current: Arc::new(RwLock::new(None)) }
    }

    pub(crate) fn from_settings(settings: &Settings) -> Result<Self, StoreError> {
        Ok(Self::new(connector_from_settings(settings)?))
    }

    pub(crate) async fn get(&self) -> Result<Backend, StoreError> {
        if let Some(backend) = self.current.read().await.as_ref() {
            return Ok(backend.clone());
        }

        let mut guard = self.current.write().await;
        if let Some(backend) = guard.as_ref() {
            return Ok(backend.clone());
        }

        let backend = self.connector.connect()?;
        *guard = Some(backend.clone());
        tracing::info!(backend = self.connector.name(), "Backend clients initialised");
        Ok(backend)
    }

    /// Drops the cached clients so the next `get` reconnects from scratch.
    pub(crate) async fn reset(&self) {
        let mut guard = self.current.write().await;
        *guard = None;
        metrics::counter!("backend_resets_total").increment(1);
        tracing::warn!(backend = self.connector.name(), "Backend clients reset");
    }

    pub(crate) fn name(&self) -> &'static str {
        self.connector.name()
    }
}

pub(crate) fn connector_from_settings(
    settings: &Settings,
) -> Result<Arc<dyn BackendConnector>, StoreError> {
    match settings.backend().mode {
        BackendMode::Supabase => {
            Ok(Arc::new(SupabaseConnector { settings: settings.supabase().clone() }))
        }
        BackendMode::Postgres => {
            let options = db::connect_options(settings)?;
            Ok(Arc::new(PostgresConnector { options, security: settings.security().clone() }))
        }
    }
}

pub(crate) struct SupabaseConnector {
    settings: SupabaseSettings,
}

impl BackendConnector for SupabaseConnector {
    fn name(&self) -> &'static str {
        "supabase"
    }

    fn connect(&self) -> Result<Backend, StoreError> {
        let service_key = self.settings.service_key.clone().ok_or_else(|| {
            StoreError::Configuration(
                "SUPABASE_SERVICE_KEY must be set for table access".to_string(),
            )
        })?;
        let client = http_client(&self.settings)?;

        let store = rest::RestStore::new(client.clone(), &self.settings.url, service_key.clone());
        let identity = gotrue::GoTrueIdentity::new(
            client,
            &self.settings.url,
            self.settings.anon_key.clone(),
            service_key,
        );

        Ok(Backend::new(Arc::new(store), Arc::new(identity)))
    }
}

pub(crate) struct PostgresConnector {
    options: PgConnectOptions,
    security: SecuritySettings,
}

impl BackendConnector for PostgresConnector {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn connect(&self) -> Result<Backend, StoreError> {
        let store: Arc<dyn TableStore> =
            Arc::new(postgres::PgStore::new(db::lazy_pool(self.options.clone())));
        let identity = local_identity::LocalIdentity::new(store.clone(), self.security.clone());

        Ok(Backend::new(store, Arc::new(identity)))
    }
}

/// The hosted runtime cannot open IPv6 sockets; binding the local side to
/// 0.0.0.0 keeps every connection on IPv4.
pub(crate) fn http_client(settings: &SupabaseSettings) -> Result<reqwest::Client, StoreError> {
    let mut builder = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(settings.timeout_seconds));
    if settings.force_ipv4 {
        builder = builder.local_address(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    }
    builder.build().map_err(StoreError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{CountingConnector, MemoryStore};

    #[tokio::test]
    async fn handle_connects_once_until_reset() {
        let connector = CountingConnector::new(MemoryStore::new());
        let handle = BackendHandle::new(Arc::new(connector.clone()));

        handle.get().await.expect("first");
        handle.get().await.expect("second");
        assert_eq!(connector.connections(), 1);

        handle.reset().await;
        handle.get().await.expect("after reset");
        assert_eq!(connector.connections(), 2);
    }

    #[tokio::test]
    async fn concurrent_first_use_connects_once() {
        let connector = CountingConnector::new(MemoryStore::new());
        let handle = BackendHandle::new(Arc::new(connector.clone()));

        let (a, b) = tokio::join!(handle.get(), handle.get());
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(connector.connections(), 1);
    }
}
