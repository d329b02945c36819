use std::sync::Arc;

use crate::backend::BackendHandle;
use crate::core::{config::Settings, redis::RedisHandle};

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    backend: BackendHandle,
    redis: RedisHandle,
}

impl AppState {
    pub(crate) fn new(settings: Settings, backend: BackendHandle, redis: RedisHandle) -> Self {
        Self { inner: Arc::new(InnerState { settings, backend, redis }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn backend(&self) -> &BackendHandle {
        &self.inner.backend
    }

    pub(crate) fn redis(&self) -> &RedisHandle {
        &self.inner.redis
    }
}
