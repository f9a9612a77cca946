use std::time::Instant;

use serde_json::Value;

use crate::{
    cycler,
    data_loaders::config::AppConfig,
    error,
    host::{ConsumerHub, FileConsumers, LocalAlarms, ThemeCatalog, ThemeHost},
    info,
    ipc::error_response,
    popup::{self, PopupRequest, PopupSession},
    router,
    store::{JsonFileStore, KeyValueStore, StateStore},
    DEBUG_NAME,
};

/// Everything the request loop and the alarm poller share.
pub struct Runtime<S: KeyValueStore, T: ThemeHost, H: ConsumerHub> {
    pub store: StateStore<S>,
    pub alarms: LocalAlarms,
    pub themes: T,
    pub consumers: H,
    pub session: PopupSession,
    log_requests: bool,
}

pub type LocalRuntime = Runtime<JsonFileStore, ThemeCatalog, FileConsumers>;

impl LocalRuntime {
    pub fn from_config(config: &AppConfig) -> Self {
        info!("[{}] Storage at {}", DEBUG_NAME, config.storage_path().display());
        info!("[{}] Theme catalog at {}", DEBUG_NAME, config.catalog_path().display());

        Runtime::new(
            StateStore::new(JsonFileStore::new(config.storage_path())),
            ThemeCatalog::new(config.catalog_path()),
            FileConsumers::new(config.consumer_paths()),
            config.settings.diagnostics.log_requests,
        )
    }
}

impl<S: KeyValueStore, T: ThemeHost, H: ConsumerHub> Runtime<S, T, H> {
    pub fn new(store: StateStore<S>, themes: T, consumers: H, log_requests: bool) -> Self {
        Self {
            store,
            alarms: LocalAlarms::new(),
            themes,
            consumers,
            session: PopupSession::new(),
            log_requests,
        }
    }

    /// Reinstalls the cycle alarm for whatever group was active last run.
    pub fn resume(&mut self) {
        match router::restore_cycle_alarm(&self.store, &mut self.alarms) {
            Ok(Some(minutes)) => info!("[{}] Cycling every {} minute(s)", DEBUG_NAME, minutes),
            Ok(None) => info!("[{}] No cycle alarm for the active group", DEBUG_NAME),
            Err(e) => error!("[{}] Could not read state to restore alarm: {e:#}", DEBUG_NAME),
        }
    }

    /// Background requests first, then popup requests. `None` means the
    /// message matched neither and gets no reply.
    pub fn handle_message(&mut self, message: &Value) -> Option<Value> {
        if self.log_requests {
            info!("[{}][IPC] <- {}", DEBUG_NAME, message);
        }

        let reply = match router::dispatch(message, &mut self.store, &mut self.alarms, &self.consumers) {
            Ok(Some(response)) => serde_json::to_value(response).map_err(anyhow::Error::from),
            Ok(None) => match PopupRequest::parse(message) {
                Some(request) => popup::handle(&request, &mut self.store, &mut self.themes, &mut self.session)
                    .and_then(|r| serde_json::to_value(r).map_err(anyhow::Error::from)),
                None => return None,
            },
            Err(e) => Err(e),
        };

        match reply {
            Ok(value) => Some(value),
            Err(e) => {
                error!("[{}][IPC] Request failed: {e:#}", DEBUG_NAME);
                Some(error_response(&e))
            }
        }
    }

    /// Fires every alarm that is due.
    pub fn tick_alarms(&mut self, now: Instant) {
        for name in self.alarms.due(now) {
            if let Err(e) = cycler::on_alarm(&name, &mut self.store, &self.consumers) {
                error!("[{}][ALARM] '{}' failed: {e:#}", DEBUG_NAME, name);
            }
        }
    }
}
