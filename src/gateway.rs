//! BLE gateway between a host runtime and the native adapter.
//!
//! The gateway turns host commands into guarded native calls and turns
//! native callbacks into [`GatewayEvent`]s. It does not own the adapter's
//! power state; it only observes and reports it.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::ble::uuids::parse_service_filters;
use crate::ble::{AdapterState, NativeAdapter};
use crate::config::GatewayConfig;
use crate::error::Result;
use crate::events::{AdapterStatus, CallbackHandle, Device, EventName, GatewayEvent, Payload};
use crate::guard;

/// Bridges host commands and native adapter callbacks.
pub struct BleGateway {
    /// Native adapter, `None` when the platform has no BLE support.
    adapter: Option<Arc<dyn NativeAdapter>>,
    /// Addresses already reported in the current scan session.
    discovered: Mutex<HashSet<String>>,
    /// Whether a scan started through this gateway is running.
    is_scanning: AtomicBool,
    /// Event channel.
    event_tx: broadcast::Sender<GatewayEvent>,
    /// Configuration.
    config: GatewayConfig,
    /// Callback ID counter.
    callback_counter: AtomicU64,
}

impl BleGateway {
    /// Create a gateway with the default configuration.
    pub fn new(adapter: Option<Arc<dyn NativeAdapter>>) -> Self {
        let config = GatewayConfig::default();
        let (event_tx, _) = broadcast::channel(config.event_capacity);
        Self::from_parts(adapter, config, event_tx)
    }

    /// Create a gateway with a custom configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_config(
        adapter: Option<Arc<dyn NativeAdapter>>,
        config: GatewayConfig,
    ) -> Result<Self> {
        config.validate()?;
        let (event_tx, _) = broadcast::channel(config.event_capacity);
        Ok(Self::from_parts(adapter, config, event_tx))
    }

    fn from_parts(
        adapter: Option<Arc<dyn NativeAdapter>>,
        config: GatewayConfig,
        event_tx: broadcast::Sender<GatewayEvent>,
    ) -> Self {
        if adapter.is_none() {
            info!("No Bluetooth adapter available, commands will report unsupported");
        }

        Self {
            adapter,
            discovered: Mutex::new(HashSet::new()),
            is_scanning: AtomicBool::new(false),
            event_tx,
            config,
            callback_counter: AtomicU64::new(0),
        }
    }

    /// Full host-visible event names keyed by their constant names.
    pub fn constants(&self) -> HashMap<&'static str, String> {
        EventName::ALL
            .iter()
            .map(|name| (name.constant_key(), self.config.event_name(*name)))
            .collect()
    }

    /// Emit `state-changed` for the adapter's live state.
    ///
    /// Never fails: a missing adapter reports `disabled`.
    pub fn notify_current_state(&self) {
        let enabled = self
            .adapter
            .as_deref()
            .map(|a| a.is_enabled())
            .unwrap_or(false);

        let status = if enabled {
            AdapterStatus::Enabled
        } else {
            AdapterStatus::Disabled
        };

        debug!("Current adapter state: {}", status);
        self.emit(GatewayEvent::state(status));
    }

    /// Handle an adapter power-state broadcast from the platform.
    ///
    /// Only settled states are reported.
    pub fn on_adapter_state_broadcast(&self, state: AdapterState) {
        let status = match state {
            AdapterState::On => AdapterStatus::Enabled,
            AdapterState::Off => AdapterStatus::Disabled,
            other => {
                trace!("Ignoring adapter state {}", other);
                return;
            }
        };

        info!("Bluetooth adapter {}", status);
        self.emit(GatewayEvent::state(status));
    }

    /// Start a scan filtered by service UUIDs.
    ///
    /// `None` or an empty slice scans for every device. Emits `scan-started`,
    /// or `scan-started` with an error payload.
    pub fn start_scan(&self, service_uuids: Option<&[Uuid]>) {
        let filters = service_uuids.unwrap_or_default();

        guard::run(
            self.adapter.as_deref(),
            |adapter| self.begin_scan(adapter, filters),
            |e| self.emit_error(EventName::ScanStarted, e),
        );
    }

    /// Start a scan from UUID strings supplied by the host.
    ///
    /// The strings are parsed inside the guarded action, so a malformed
    /// entry is reported as a `scan-started` error and no scan starts.
    pub fn start_scan_with_strings<S: AsRef<str>>(&self, service_uuids: Option<&[S]>) {
        guard::run(
            self.adapter.as_deref(),
            |adapter| {
                let filters = parse_service_filters(service_uuids)?;
                self.begin_scan(adapter, &filters)
            },
            |e| self.emit_error(EventName::ScanStarted, e),
        );
    }

    fn begin_scan(&self, adapter: &dyn NativeAdapter, filters: &[Uuid]) -> Result<()> {
        info!("Starting BLE scan ({} service filters)", filters.len());
        adapter.start_scan(filters)?;
        self.is_scanning.store(true, Ordering::SeqCst);
        self.emit(GatewayEvent::bare(EventName::ScanStarted));
        Ok(())
    }

    /// Stop the active scan and end the discovery session.
    ///
    /// Emits `scan-stopped`, or `scan-stopped` with an error payload.
    pub fn stop_scan(&self) {
        guard::run(
            self.adapter.as_deref(),
            |adapter| {
                info!("Stopping BLE scan");
                adapter.stop_scan()?;
                self.is_scanning.store(false, Ordering::SeqCst);

                // Clear and announce under the discovery lock so that every
                // device-discovered event lands on one side of scan-stopped.
                let mut discovered = self.discovered.lock();
                debug!("Clearing {} discovered addresses", discovered.len());
                discovered.clear();
                self.emit(GatewayEvent::bare(EventName::ScanStopped));
                Ok(())
            },
            |e| self.emit_error(EventName::ScanStopped, e),
        );
    }

    /// Wait for `delay`, then stop the scan.
    pub async fn stop_scan_after(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
        self.stop_scan();
    }

    /// Handle an advertisement from the native scan callback.
    ///
    /// The first advertisement for an address in a session emits
    /// `device-discovered`; repeats are dropped.
    pub fn on_device_discovered(&self, device: Device) {
        trace!(
            "Advertisement from \"{}\" @{}",
            device.display_name(),
            device.address
        );

        let mut discovered = self.discovered.lock();
        if discovered.contains(&device.address) {
            return;
        }

        info!(
            "Discovered device: \"{}\" @{}",
            device.display_name(),
            device.address
        );
        discovered.insert(device.address.clone());
        self.emit(GatewayEvent::device(device));
    }

    /// Connect to a device. Not implemented: no native call, no event.
    pub fn connect(&self, device: &Device) {
        self.unimplemented_action("connect", device);
    }

    /// Disconnect from a device. Not implemented: no native call, no event.
    pub fn disconnect(&self, device: &Device) {
        self.unimplemented_action("disconnect", device);
    }

    /// Discover a device's services. Not implemented: no native call, no event.
    pub fn discover_services(&self, device: &Device) {
        self.unimplemented_action("discover_services", device);
    }

    fn unimplemented_action(&self, command: &str, device: &Device) {
        guard::run(
            self.adapter.as_deref(),
            |_adapter| {
                debug!("{} requested for {}, not implemented", command, device.address);
                Ok(())
            },
            |e| debug!("{} unavailable for {}: {}", command, device.address, e),
        );
    }

    /// Check if a scan started through this gateway is still running.
    pub fn is_scanning(&self) -> bool {
        self.is_scanning.load(Ordering::SeqCst)
    }

    /// Number of distinct addresses seen in the current session.
    pub fn discovered_count(&self) -> usize {
        self.discovered.lock().len()
    }

    /// Whether the adapter handle exists at all.
    pub fn has_adapter(&self) -> bool {
        self.adapter.is_some()
    }

    /// Subscribe to gateway events.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.event_tx.subscribe()
    }

    /// Register a callback for every gateway event.
    ///
    /// Must be called from within a tokio runtime.
    pub fn on_event<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(GatewayEvent) + Send + Sync + 'static,
    {
        let callback_id = self.callback_counter.fetch_add(1, Ordering::SeqCst);
        let mut rx = self.event_tx.subscribe();

        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => callback(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("Event callback lagged, skipped {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        CallbackHandle::new(callback_id, handle)
    }

    /// Register a callback for adapter state changes, then report the
    /// current state.
    ///
    /// Must be called from within a tokio runtime.
    pub fn on_state_changed<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(AdapterStatus) + Send + Sync + 'static,
    {
        let handle = self.on_event(move |event| {
            if let Payload::State(status) = event.payload {
                callback(status);
            }
        });
        self.notify_current_state();
        handle
    }

    fn emit_error(&self, name: EventName, error: crate::error::Error) {
        self.emit(GatewayEvent::error(name, error.to_string()));
    }

    fn emit(&self, event: GatewayEvent) {
        trace!("Emitting {}: {:?}", event.name, event.payload);
        // No subscribers is not an error.
        let _ = self.event_tx.send(event);
    }
}

impl std::fmt::Debug for BleGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BleGateway")
            .field("has_adapter", &self.has_adapter())
            .field("is_scanning", &self.is_scanning())
            .field("discovered", &self.discovered_count())
            .field("config", &self.config)
            .finish()
    }
}
