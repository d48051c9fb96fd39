//! Weather core for Nimbus
//!
//! Fetches current conditions from Open-Meteo, keeps the last snapshot on
//! disk, and drives a display through a stale-while-revalidate refresh
//! policy that tolerates slow networks, API failures and offline periods.

pub mod cache;
pub mod clock;
pub mod display;
pub mod geocode;
pub mod location;
pub mod orchestrator;
pub mod provider;
pub mod storage;
pub mod types;

pub use cache::{CacheEntry, SnapshotCache};
pub use clock::{Clock, SystemClock};
pub use display::{DisplayState, WeatherDisplay};
pub use geocode::{PlaceNamer, ReverseGeocoder};
pub use location::{
    IpLocationSource, LocationResolver, LocationSource, NoLocationSource, StaticLocationSource,
};
pub use orchestrator::{ConnectivityEvent, LoadOutcome, RefreshOrchestrator, Trigger};
pub use provider::{WeatherFetcher, WeatherProvider};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
pub use types::*;
