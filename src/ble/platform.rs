//! btleplug-backed native adapter.
//!
//! Wraps the first adapter of the platform's btleplug `Manager`. Native calls
//! are spawned on a private tokio runtime without waiting for them, and a
//! background pump forwards central events to an attached [`BleGateway`].

use btleplug::api::{
    BDAddr, Central, CentralEvent, CentralState, Manager as _, Peripheral as _, ScanFilter,
};
use btleplug::platform::{Adapter, Manager, PeripheralId};
use futures::stream::{Stream, StreamExt};
use parking_lot::Mutex;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::runtime::{Handle, Runtime};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::ble::adapter::{AdapterState, NativeAdapter};
use crate::config::GatewayConfig;
use crate::error::{Error, Result};
use crate::events::Device;
use crate::gateway::BleGateway;

impl From<CentralState> for AdapterState {
    fn from(state: CentralState) -> Self {
        match state {
            CentralState::PoweredOn => AdapterState::On,
            CentralState::PoweredOff => AdapterState::Off,
            _ => AdapterState::Unknown,
        }
    }
}

/// A central event reduced to what the gateway cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PumpEvent<I> {
    /// Adapter power state changed.
    State(AdapterState),
    /// A peripheral advertised (first sighting or update).
    Advertisement(I),
    /// Anything else.
    Ignored,
}

impl From<CentralEvent> for PumpEvent<PeripheralId> {
    fn from(event: CentralEvent) -> Self {
        match event {
            CentralEvent::StateUpdate(state) => Self::State(state.into()),
            CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                Self::Advertisement(id)
            }
            other => {
                trace!("Ignoring central event: {:?}", other);
                Self::Ignored
            }
        }
    }
}

/// Gateway the pump reports to, set by [`BtleplugAdapter::attach`].
type GatewaySlot = Arc<Mutex<Weak<BleGateway>>>;

/// Apply one pump event.
///
/// The enabled flag is tracked even before a gateway is attached; devices
/// are only looked up when there is a gateway to report them to.
pub(crate) async fn apply_event<I, F, Fut>(
    event: PumpEvent<I>,
    enabled: &AtomicBool,
    gateway: Option<Arc<BleGateway>>,
    lookup: F,
) where
    F: FnOnce(I) -> Fut,
    Fut: Future<Output = Option<Device>>,
{
    match event {
        PumpEvent::State(state) => {
            enabled.store(state == AdapterState::On, Ordering::SeqCst);
            if let Some(gateway) = gateway {
                gateway.on_adapter_state_broadcast(state);
            }
        }
        PumpEvent::Advertisement(id) => {
            let Some(gateway) = gateway else {
                return;
            };
            if let Some(device) = lookup(id).await {
                gateway.on_device_discovered(device);
            }
        }
        PumpEvent::Ignored => {}
    }
}

/// Build a device from advertised properties.
///
/// CoreBluetooth hides MAC addresses and reports all zeroes; the platform
/// peripheral id stands in for the address then.
pub(crate) fn device_from_properties(
    address: BDAddr,
    local_name: Option<String>,
    id: &impl Display,
) -> Device {
    let address = if address == BDAddr::default() {
        id.to_string()
    } else {
        address.to_string()
    };
    Device::new(address, local_name)
}

/// Issue a native call on `runtime` without waiting for it.
///
/// The outcome is only logged: success or failure of the scan itself is not
/// observable to the host beyond this point.
pub(crate) fn spawn_native<F, E>(runtime: &Handle, command: &'static str, call: F)
where
    F: Future<Output = std::result::Result<(), E>> + Send + 'static,
    E: Display + Send + 'static,
{
    runtime.spawn(async move {
        match call.await {
            Ok(()) => debug!("Native {} issued", command),
            Err(e) => error!("Native {} failed: {}", command, e),
        }
    });
}

pub(crate) fn build_runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("ble-gateway")
        .enable_all()
        .build()
        .map_err(|e| Error::Internal(format!("failed to build runtime: {e}")))
}

/// Native adapter backed by btleplug.
///
/// Scan calls return as soon as they are spawned, so the adapter can be
/// driven from plain threads and from inside async tasks alike.
pub struct BtleplugAdapter {
    /// Runtime that drives btleplug futures and the event pump.
    runtime: Option<Runtime>,
    /// The btleplug adapter.
    adapter: Adapter,
    /// Last power state seen from the platform.
    enabled: Arc<AtomicBool>,
    /// Gateway receiving pump events.
    gateway: GatewaySlot,
    /// Handle to the event pump task.
    pump_handle: Option<JoinHandle<()>>,
}

impl BtleplugAdapter {
    /// Open the platform's first BLE adapter.
    ///
    /// Returns `Ok(None)` when the platform has no usable adapter. Opening
    /// runs on a helper thread and blocks the caller until it finishes.
    ///
    /// # Errors
    ///
    /// Returns an error if the private runtime cannot be built or the adapter
    /// list or event stream cannot be read.
    pub fn new() -> Result<Option<Self>> {
        std::thread::Builder::new()
            .name("ble-gateway-open".to_string())
            .spawn(Self::open)
            .map_err(|e| Error::Internal(format!("failed to spawn adapter thread: {e}")))?
            .join()
            .map_err(|_| Error::Internal("adapter thread panicked".to_string()))?
    }

    fn open() -> Result<Option<Self>> {
        let runtime = build_runtime()?;

        let opened = runtime.block_on(async {
            let manager = match Manager::new().await {
                Ok(manager) => manager,
                Err(e) => {
                    warn!("Bluetooth manager unavailable: {}", e);
                    return Ok(None);
                }
            };

            let adapter = match manager.adapters().await?.into_iter().next() {
                Some(adapter) => adapter,
                None => return Ok(None),
            };

            info!(
                "Using Bluetooth adapter: {:?}",
                adapter.adapter_info().await.ok()
            );

            // Subscribe before the snapshot so no StateUpdate falls between them.
            let events = adapter.events().await?;
            let state = adapter.adapter_state().await.unwrap_or(CentralState::Unknown);
            Ok::<_, Error>(Some((adapter, events, AdapterState::from(state))))
        })?;

        let Some((adapter, events, state)) = opened else {
            info!("No Bluetooth adapter found");
            runtime.shutdown_background();
            return Ok(None);
        };

        debug!("Initial adapter state: {}", state);

        let enabled = Arc::new(AtomicBool::new(state == AdapterState::On));
        let gateway: GatewaySlot = Arc::new(Mutex::new(Weak::new()));
        let pump_handle = runtime.spawn(Self::pump(
            events,
            adapter.clone(),
            enabled.clone(),
            gateway.clone(),
        ));

        Ok(Some(Self {
            runtime: Some(runtime),
            adapter,
            enabled,
            gateway,
            pump_handle: Some(pump_handle),
        }))
    }

    /// Forward central events to `gateway` from now on.
    ///
    /// Only a weak reference is kept. Attaching again replaces the target.
    pub fn attach(&self, gateway: &Arc<BleGateway>) {
        *self.gateway.lock() = Arc::downgrade(gateway);
    }

    fn runtime(&self) -> Result<&Runtime> {
        self.runtime
            .as_ref()
            .ok_or_else(|| Error::Internal("adapter runtime shut down".to_string()))
    }

    async fn pump<S>(mut events: S, adapter: Adapter, enabled: Arc<AtomicBool>, gateway: GatewaySlot)
    where
        S: Stream<Item = CentralEvent> + Unpin + Send + 'static,
    {
        while let Some(event) = events.next().await {
            let target = gateway.lock().upgrade();
            apply_event(PumpEvent::from(event), &enabled, target, |id| {
                Self::load_device(&adapter, id)
            })
            .await;
        }

        debug!("Adapter event pump ended");
    }

    /// Read a peripheral's address and advertised name.
    async fn load_device(adapter: &Adapter, id: PeripheralId) -> Option<Device> {
        let peripheral = match adapter.peripheral(&id).await {
            Ok(p) => p,
            Err(e) => {
                trace!("Failed to get peripheral: {}", e);
                return None;
            }
        };

        let properties = match peripheral.properties().await {
            Ok(Some(p)) => p,
            _ => return None,
        };

        Some(device_from_properties(
            properties.address,
            properties.local_name,
            &id,
        ))
    }
}

impl NativeAdapter for BtleplugAdapter {
    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn start_scan(&self, service_uuids: &[Uuid]) -> Result<()> {
        let adapter = self.adapter.clone();
        let filter = ScanFilter {
            services: service_uuids.to_vec(),
        };
        spawn_native(self.runtime()?.handle(), "start_scan", async move {
            adapter.start_scan(filter).await
        });
        Ok(())
    }

    fn stop_scan(&self) -> Result<()> {
        let adapter = self.adapter.clone();
        spawn_native(self.runtime()?.handle(), "stop_scan", async move {
            adapter.stop_scan().await
        });
        Ok(())
    }
}

impl Drop for BtleplugAdapter {
    fn drop(&mut self) {
        if let Some(handle) = self.pump_handle.take() {
            handle.abort();
        }
        // Safe to call from async contexts, unlike dropping the runtime.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Build a gateway wired to the platform's BLE adapter.
///
/// A platform without an adapter still yields a gateway; its commands report
/// "Bluetooth not supported".
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the platform stack
/// cannot be opened.
pub fn platform_gateway(config: GatewayConfig) -> Result<Arc<BleGateway>> {
    let native = BtleplugAdapter::new()?.map(Arc::new);
    let handle = native.clone().map(|a| a as Arc<dyn NativeAdapter>);
    let gateway = Arc::new(BleGateway::with_config(handle, config)?);

    if let Some(native) = native {
        native.attach(&gateway);
    }

    Ok(gateway)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{AdapterStatus, EventName, GatewayEvent};
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tokio::sync::broadcast;

    fn drain(rx: &mut broadcast::Receiver<GatewayEvent>) -> Vec<GatewayEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Issues scan calls the same way `BtleplugAdapter` does.
    struct SpawningAdapter {
        runtime: Option<Runtime>,
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    impl SpawningAdapter {
        fn new() -> Self {
            Self {
                runtime: Some(build_runtime().unwrap()),
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn record(&self, command: &'static str) {
            let calls = self.calls.clone();
            let handle = self.runtime.as_ref().unwrap().handle();
            spawn_native(handle, command, async move {
                calls.lock().push(command);
                Ok::<(), Error>(())
            });
        }
    }

    impl NativeAdapter for SpawningAdapter {
        fn is_enabled(&self) -> bool {
            true
        }

        fn start_scan(&self, _service_uuids: &[Uuid]) -> Result<()> {
            self.record("start_scan");
            Ok(())
        }

        fn stop_scan(&self) -> Result<()> {
            self.record("stop_scan");
            Ok(())
        }
    }

    impl Drop for SpawningAdapter {
        fn drop(&mut self) {
            if let Some(runtime) = self.runtime.take() {
                runtime.shutdown_background();
            }
        }
    }

    #[test]
    fn test_central_state_mapping() {
        assert_eq!(AdapterState::from(CentralState::PoweredOn), AdapterState::On);
        assert_eq!(AdapterState::from(CentralState::PoweredOff), AdapterState::Off);
        assert_eq!(AdapterState::from(CentralState::Unknown), AdapterState::Unknown);
    }

    #[test]
    fn test_state_update_becomes_state_event() {
        let event = PumpEvent::from(CentralEvent::StateUpdate(CentralState::PoweredOn));
        assert_eq!(event, PumpEvent::State(AdapterState::On));
    }

    #[test]
    fn test_device_address_falls_back_to_id() {
        let hidden = device_from_properties(BDAddr::default(), None, &"peripheral-7");
        assert_eq!(hidden, Device::new("peripheral-7", None));

        let visible = device_from_properties(
            BDAddr::from([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]),
            Some("Sensor".to_string()),
            &"peripheral-7",
        );
        assert_eq!(
            visible,
            Device::new("AA:BB:CC:DD:EE:FF", Some("Sensor".to_string()))
        );
    }

    #[tokio::test]
    async fn test_state_tracked_before_attach() {
        let enabled = AtomicBool::new(false);

        apply_event(
            PumpEvent::<String>::State(AdapterState::On),
            &enabled,
            None,
            |_| async { None },
        )
        .await;
        assert!(enabled.load(Ordering::SeqCst));

        apply_event(
            PumpEvent::<String>::State(AdapterState::Unknown),
            &enabled,
            None,
            |_| async { None },
        )
        .await;
        assert!(!enabled.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_advertisement_without_gateway_skips_lookup() {
        let enabled = AtomicBool::new(true);
        let looked_up = AtomicBool::new(false);

        apply_event(
            PumpEvent::Advertisement("peripheral-1".to_string()),
            &enabled,
            None,
            |_| async {
                looked_up.store(true, Ordering::SeqCst);
                None
            },
        )
        .await;

        assert!(!looked_up.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_repeated_advertisements_reach_gateway_once() {
        let gateway = Arc::new(BleGateway::new(None));
        let mut rx = gateway.subscribe();
        let enabled = AtomicBool::new(true);

        for event in [
            PumpEvent::Advertisement("peripheral-1".to_string()),
            PumpEvent::Advertisement("peripheral-1".to_string()),
            PumpEvent::Ignored,
            PumpEvent::State(AdapterState::Off),
        ] {
            apply_event(event, &enabled, Some(gateway.clone()), |id| async move {
                Some(Device::new(id, Some("Tag".to_string())))
            })
            .await;
        }

        assert_eq!(
            drain(&mut rx),
            vec![
                GatewayEvent::device(Device::new("peripheral-1", Some("Tag".to_string()))),
                GatewayEvent::state(AdapterStatus::Disabled),
            ]
        );
        assert!(!enabled.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_spawned_scan_calls_work_inside_runtime() {
        let adapter = Arc::new(SpawningAdapter::new());
        let calls = adapter.calls.clone();
        let gateway = BleGateway::new(Some(adapter as Arc<dyn NativeAdapter>));
        let mut rx = gateway.subscribe();

        gateway.start_scan(None);
        gateway.stop_scan_after(Duration::from_millis(5)).await;

        assert_eq!(
            drain(&mut rx),
            vec![
                GatewayEvent::bare(EventName::ScanStarted),
                GatewayEvent::bare(EventName::ScanStopped),
            ]
        );

        for _ in 0..100 {
            if calls.lock().len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(*calls.lock(), vec!["start_scan", "stop_scan"]);
    }

    #[test]
    fn test_adapter_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BtleplugAdapter>();
    }
}
