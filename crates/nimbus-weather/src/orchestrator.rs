//! Stale-while-revalidate refresh pipeline.
//!
//! A load shows whatever is cached straight away and refreshes it in a
//! detached task. Only when nothing is cached does a load wait on the
//! network, and only then can a failure reach the display.
//!
//! Loads are not serialized. Every trigger starts its own run, runs race on
//! the cache and the display, and the last write wins.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::cache::SnapshotCache;
use crate::clock::Clock;
use crate::display::{DisplayState, WeatherDisplay};
use crate::geocode::PlaceNamer;
use crate::location::LocationResolver;
use crate::provider::WeatherFetcher;
use crate::types::WeatherError;

pub const NO_DATA_MESSAGE: &str = "Unable to load weather data.";
pub const CACHED_FALLBACK_WARNING: &str = "Using cached data. Unable to fetch latest.";
pub const OFFLINE_WARNING: &str = "You are offline. Weather may be out of date.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    Online,
    Offline,
}

/// Anything that asks for weather to be (re)loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Initial,
    Refresh,
    Retry,
    Scheduled,
    Connectivity(ConnectivityEvent),
}

/// Result of one `load_weather` run
#[derive(Debug)]
pub struct LoadOutcome {
    pub state: DisplayState,
    /// Detached refresh started after a cache hit. Dropping it does not
    /// cancel the refresh.
    pub background: Option<JoinHandle<()>>,
}

struct Inner {
    resolver: LocationResolver,
    fetcher: Arc<dyn WeatherFetcher>,
    namer: Arc<dyn PlaceNamer>,
    cache: SnapshotCache,
    clock: Arc<dyn Clock>,
    display: Arc<dyn WeatherDisplay>,
    state: Mutex<DisplayState>,
}

#[derive(Clone)]
pub struct RefreshOrchestrator {
    inner: Arc<Inner>,
}

impl RefreshOrchestrator {
    pub fn new(
        resolver: LocationResolver,
        fetcher: Arc<dyn WeatherFetcher>,
        namer: Arc<dyn PlaceNamer>,
        cache: SnapshotCache,
        clock: Arc<dyn Clock>,
        display: Arc<dyn WeatherDisplay>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                resolver,
                fetcher,
                namer,
                cache,
                clock,
                display,
                state: Mutex::new(DisplayState::Idle),
            }),
        }
    }

    pub fn state(&self) -> DisplayState {
        *self.inner.state.lock()
    }

    fn set_state(&self, state: DisplayState) {
        *self.inner.state.lock() = state;
    }

    /// Primary load sequence (initial load, refresh, retry, back online).
    ///
    /// With a cached entry, fresh or stale, it is rendered under its stored
    /// label before any network call and a background refresh is started.
    /// Without one, the fetch runs inline and its failure ends in
    /// `ErrorNoData`, unless a concurrent run stored a snapshot in the
    /// meantime.
    pub async fn load_weather(&self) -> LoadOutcome {
        let display = &self.inner.display;

        self.set_state(DisplayState::Loading);
        display.set_loading(true);

        if let Some(entry) = self.inner.cache.read() {
            let now = self.inner.clock.now_ms();
            tracing::info!(
                fresh = self.inner.cache.is_fresh(&entry, now),
                age_ms = entry.age_ms(now),
                "Using cached weather data"
            );

            display.show_weather(&entry.snapshot, &entry.label);
            self.set_state(DisplayState::Displaying);
            display.set_loading(false);

            return LoadOutcome {
                state: DisplayState::Displaying,
                background: Some(self.refresh_in_background()),
            };
        }

        let state = match self.fetch_and_store().await {
            Ok(()) => DisplayState::Displaying,
            Err(e) => self.fall_back(e),
        };

        self.set_state(state);
        display.set_loading(false);

        LoadOutcome {
            state,
            background: None,
        }
    }

    /// Fire-and-forget refresh. Success re-renders silently; failure is
    /// only logged and leaves the display untouched. An `Offline` state is
    /// kept until connectivity returns.
    pub fn refresh_in_background(&self) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            match this.fetch_and_store().await {
                Ok(()) => {
                    let mut state = this.inner.state.lock();
                    if *state != DisplayState::Offline {
                        *state = DisplayState::Displaying;
                    }
                    tracing::info!("Background weather refresh complete");
                }
                Err(e) => {
                    tracing::warn!("Background weather refresh failed: {}", e);
                }
            }
        })
    }

    pub async fn on_online(&self) -> LoadOutcome {
        tracing::info!("Connectivity restored; reloading weather");
        self.load_weather().await
    }

    /// Surfaces the offline warning. No cache access, no network.
    pub fn on_offline(&self) {
        tracing::warn!("Connectivity lost");
        let previous = std::mem::replace(&mut *self.inner.state.lock(), DisplayState::Offline);
        if previous == DisplayState::Loading {
            self.inner.display.set_loading(false);
        }
        self.inner.display.show_warning(OFFLINE_WARNING);
    }

    /// Start handling a trigger without waiting for it. Returns the handle
    /// of the spawned load, or `None` when the trigger completes inline.
    pub fn dispatch(&self, trigger: Trigger) -> Option<JoinHandle<LoadOutcome>> {
        tracing::debug!(?trigger, "Dispatching trigger");
        match trigger {
            Trigger::Connectivity(ConnectivityEvent::Offline) => {
                self.on_offline();
                None
            }
            Trigger::Connectivity(ConnectivityEvent::Online) => {
                let this = self.clone();
                Some(tokio::spawn(async move { this.on_online().await }))
            }
            Trigger::Initial | Trigger::Refresh | Trigger::Retry | Trigger::Scheduled => {
                let this = self.clone();
                Some(tokio::spawn(async move { this.load_weather().await }))
            }
        }
    }

    async fn fetch_and_store(&self) -> Result<(), WeatherError> {
        let coords = self.inner.resolver.resolve().await;
        let snapshot = self.inner.fetcher.fetch(coords).await?;
        let label = self.inner.namer.name_for(coords).await;

        self.inner
            .cache
            .write(&snapshot, coords, &label, self.inner.clock.now_ms());
        self.inner.display.show_weather(&snapshot, &label);
        Ok(())
    }

    /// Failure on the no-cache path. The second cache read only succeeds if
    /// another run stored a snapshot while this one was fetching.
    fn fall_back(&self, error: WeatherError) -> DisplayState {
        tracing::error!("Failed to fetch weather: {} ({})", error, error.user_message());

        match self.inner.cache.read() {
            Some(entry) => {
                self.inner.display.show_weather(&entry.snapshot, &entry.label);
                self.inner.display.show_warning(CACHED_FALLBACK_WARNING);
                DisplayState::DisplayingWithWarning
            }
            None => {
                self.inner.display.show_error(NO_DATA_MESSAGE);
                DisplayState::ErrorNoData
            }
        }
    }
}
