//! # Printer Transport Layer
//!
//! This module manages the Bluetooth LE link to the printer.
//!
//! ## Available Transports
//!
//! - [`ble`]: btleplug-backed BLE central (feature `ble`, default)
//! - [`mock`]: in-memory transport for tests and dry runs
//!
//! ## Boundary
//!
//! The platform's BLE stack is consumed through two narrow traits:
//! [`PrinterLink`] (one peripheral: connect, characteristics, writes,
//! disconnect observation) and [`DeviceScanner`] (the device picker and
//! the list of previously known devices). [`ConnectionManager`] builds
//! the session semantics on top: a single in-flight connect attempt, a
//! single held characteristic, and a broadcast stream of user-visible
//! connection notices.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::NimboError;

#[cfg(feature = "ble")]
pub mod ble;
pub mod mock;

#[cfg(feature = "ble")]
pub use ble::{BleLink, BleScanner};

/// Capacity of the connection notice channel. Notices are transient
/// UI-facing events; slow subscribers may lag and lose old ones.
const NOTICE_CAPACITY: usize = 16;

/// Properties of one GATT characteristic, as discovered on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacteristicProfile {
    pub uuid: Uuid,
    /// Supports write-without-response
    pub write_without_response: bool,
    /// Supports notifications
    pub notify: bool,
}

impl CharacteristicProfile {
    /// The printer speaks over the one characteristic that supports both
    /// unacknowledged writes and notifications.
    pub fn is_printer_channel(&self) -> bool {
        self.write_without_response && self.notify
    }
}

/// Scan criteria for the device picker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceFilter {
    /// Keep devices whose advertised name starts with this prefix
    pub name_prefix: Option<String>,
    /// Keep devices advertising any of these services
    pub services: Vec<Uuid>,
}

impl DeviceFilter {
    /// Does an advertised device name pass the prefix filter?
    pub fn matches_name(&self, name: &str) -> bool {
        match &self.name_prefix {
            Some(prefix) => name.starts_with(prefix.as_str()),
            None => true,
        }
    }
}

/// One BLE peripheral, as seen by the connection manager.
#[async_trait]
pub trait PrinterLink: Send + Sync {
    /// Advertised device name.
    fn name(&self) -> String;

    /// Connect the GATT server and discover services.
    async fn open(&self) -> Result<(), NimboError>;

    /// Does the underlying device currently report a live link?
    async fn is_open(&self) -> bool;

    /// The characteristics discovered on the peripheral.
    async fn characteristics(&self) -> Result<Vec<CharacteristicProfile>, NimboError>;

    /// Subscribe to notifications on `characteristic`.
    async fn subscribe(&self, characteristic: Uuid) -> Result<(), NimboError>;

    /// Unacknowledged write to `characteristic`.
    async fn write_without_response(
        &self,
        characteristic: Uuid,
        payload: &[u8],
    ) -> Result<(), NimboError>;

    /// Resolves when the peripheral drops the link. Used by the
    /// connection manager's disconnect watcher.
    async fn wait_disconnected(&self);
}

/// The platform device picker.
#[async_trait]
pub trait DeviceScanner: Send + Sync {
    /// Scan for a device matching `filter` and return the first hit.
    async fn request_device(&self, filter: &DeviceFilter)
    -> Result<Arc<dyn PrinterLink>, NimboError>;

    /// Previously authorized/known devices, for silent reconnection.
    async fn known_devices(
        &self,
        filter: &DeviceFilter,
    ) -> Result<Vec<Arc<dyn PrinterLink>>, NimboError>;
}

/// User-visible connection events (the data source for status toasts;
/// presentation is the caller's concern).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionNotice {
    Connected { device: String },
    Disconnected { device: String },
    AutoConnectFailed { device: String },
}

#[derive(Clone)]
struct ActiveLink {
    link: Arc<dyn PrinterLink>,
    characteristic: Uuid,
}

/// # Connection Manager
///
/// The process-wide singleton resource for the printer link: at most one
/// connect attempt in flight, at most one peripheral/characteristic pair
/// held. Clones share the same state, so a clone can be handed to
/// background tasks.
#[derive(Clone)]
pub struct ConnectionManager {
    active: Arc<Mutex<Option<ActiveLink>>>,
    connecting: Arc<AtomicBool>,
    notices: broadcast::Sender<ConnectionNotice>,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionManager {
    pub fn new() -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            active: Arc::new(Mutex::new(None)),
            connecting: Arc::new(AtomicBool::new(false)),
            notices,
        }
    }

    /// # Connect to a Device
    ///
    /// Opens the link, selects the one characteristic supporting both
    /// write-without-response and notify, subscribes to notifications,
    /// and installs a disconnect watcher.
    ///
    /// Returns `Ok(false)` without side effects when another connect
    /// attempt is already in flight. A connected device is replaced by a
    /// later successful connect.
    ///
    /// ## Errors
    ///
    /// - [`NimboError::Transport`] when the link cannot be opened
    /// - [`NimboError::CharacteristicNotFound`] when no characteristic
    ///   has both required properties; fatal for this attempt
    pub async fn connect(&self, link: Arc<dyn PrinterLink>) -> Result<bool, NimboError> {
        if self.connecting.swap(true, Ordering::SeqCst) {
            debug!("connect: attempt already in progress, ignoring");
            return Ok(false);
        }

        let result = self.connect_inner(link).await;
        self.connecting.store(false, Ordering::SeqCst);
        result.map(|()| true)
    }

    async fn connect_inner(&self, link: Arc<dyn PrinterLink>) -> Result<(), NimboError> {
        let device = link.name();
        info!("connecting to {device}");

        link.open().await?;

        let characteristic = link
            .characteristics()
            .await?
            .into_iter()
            .find(CharacteristicProfile::is_printer_channel)
            .ok_or(NimboError::CharacteristicNotFound)?;

        link.subscribe(characteristic.uuid).await?;

        *self.active.lock().expect("connection state lock poisoned") = Some(ActiveLink {
            link: Arc::clone(&link),
            characteristic: characteristic.uuid,
        });
        info!("connected to {device} on {}", characteristic.uuid);
        let _ = self.notices.send(ConnectionNotice::Connected {
            device: device.clone(),
        });

        self.spawn_disconnect_watcher(link, device);
        Ok(())
    }

    /// Watch for the peripheral dropping and clear the held link when it
    /// does. A newer connect may have replaced the link by then; only the
    /// watcher's own link is cleared.
    fn spawn_disconnect_watcher(&self, link: Arc<dyn PrinterLink>, device: String) {
        let active = Arc::clone(&self.active);
        let notices = self.notices.clone();
        tokio::spawn(async move {
            link.wait_disconnected().await;

            let mut held = active.lock().expect("connection state lock poisoned");
            let is_current = held
                .as_ref()
                .is_some_and(|a| Arc::ptr_eq(&a.link, &link));
            if is_current {
                *held = None;
                drop(held);
                warn!("printer {device} disconnected");
                let _ = notices.send(ConnectionNotice::Disconnected { device });
            }
        });
    }

    /// Run the device picker and connect to the first matching printer.
    pub async fn discover_and_connect(
        &self,
        scanner: &dyn DeviceScanner,
        filter: &DeviceFilter,
    ) -> Result<bool, NimboError> {
        let link = scanner.request_device(filter).await?;
        self.connect(link).await
    }

    /// # Silent Auto-Connect
    ///
    /// Attempts to reuse the first previously known device without
    /// prompting. Failure is non-fatal: it logs, emits a notice, and
    /// returns `false`.
    pub async fn auto_connect(&self, scanner: &dyn DeviceScanner, filter: &DeviceFilter) -> bool {
        let links = match scanner.known_devices(filter).await {
            Ok(links) => links,
            Err(e) => {
                debug!("auto-connect: enumerating known devices failed: {e}");
                return false;
            }
        };
        let Some(link) = links.into_iter().next() else {
            debug!("auto-connect: no known devices");
            return false;
        };

        let device = link.name();
        info!("auto-connecting to {device}");
        match self.connect(link).await {
            Ok(true) => true,
            Ok(false) => false,
            Err(e) => {
                warn!("auto-connect to {device} failed: {e}");
                let _ = self
                    .notices
                    .send(ConnectionNotice::AutoConnectFailed { device });
                false
            }
        }
    }

    /// True only when a characteristic is held **and** the device still
    /// reports a live link: the device can drop without the handle
    /// having been cleared yet on every path.
    pub async fn is_connected(&self) -> bool {
        let active = self
            .active
            .lock()
            .expect("connection state lock poisoned")
            .clone();
        match active {
            Some(a) => a.link.is_open().await,
            None => false,
        }
    }

    /// Subscribe to connection notices.
    pub fn subscribe_notices(&self) -> broadcast::Receiver<ConnectionNotice> {
        self.notices.subscribe()
    }

    /// The held link and characteristic, with the liveness check applied.
    pub(crate) async fn require_connected(
        &self,
    ) -> Result<(Arc<dyn PrinterLink>, Uuid), NimboError> {
        let active = self
            .active
            .lock()
            .expect("connection state lock poisoned")
            .clone();
        match active {
            Some(a) if a.link.is_open().await => Ok((a.link, a.characteristic)),
            _ => Err(NimboError::NotConnected),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{MockLink, MockScanner};
    use super::*;
    use std::time::Duration;

    fn arc_link(link: MockLink) -> Arc<dyn PrinterLink> {
        Arc::new(link)
    }

    #[tokio::test]
    async fn test_connect_selects_dual_property_characteristic() {
        let link = Arc::new(
            MockLink::new("D110-TEST").with_characteristics(vec![
                CharacteristicProfile {
                    uuid: Uuid::from_u128(1),
                    write_without_response: true,
                    notify: false,
                },
                CharacteristicProfile {
                    uuid: Uuid::from_u128(2),
                    write_without_response: false,
                    notify: true,
                },
                CharacteristicProfile {
                    uuid: Uuid::from_u128(3),
                    write_without_response: true,
                    notify: true,
                },
            ]),
        );

        let manager = ConnectionManager::new();
        let connected = manager
            .connect(link.clone() as Arc<dyn PrinterLink>)
            .await
            .unwrap();

        assert!(connected);
        assert!(manager.is_connected().await);
        assert_eq!(link.subscriptions(), vec![Uuid::from_u128(3)]);
    }

    #[tokio::test]
    async fn test_connect_without_suitable_characteristic_fails() {
        let link = arc_link(MockLink::new("D110-TEST").with_characteristics(vec![
            CharacteristicProfile {
                uuid: Uuid::from_u128(1),
                write_without_response: true,
                notify: false,
            },
        ]));

        let manager = ConnectionManager::new();
        let err = manager.connect(link).await.unwrap_err();
        assert!(matches!(err, NimboError::CharacteristicNotFound));
        assert!(!manager.is_connected().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reentrant_connect_returns_false() {
        let slow = arc_link(MockLink::new("D110-A").with_open_delay(Duration::from_millis(200)));
        let manager = ConnectionManager::new();

        let first = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.connect(slow).await })
        };
        tokio::task::yield_now().await;

        // The first attempt is still inside open(); this one must bail out.
        let second = manager
            .connect(arc_link(MockLink::new("D110-B")))
            .await
            .unwrap();
        assert!(!second);

        assert!(first.await.unwrap().unwrap());
        assert!(manager.is_connected().await);
    }

    #[tokio::test]
    async fn test_disconnect_clears_state_and_notifies() {
        let link = Arc::new(MockLink::new("D110-TEST"));
        let manager = ConnectionManager::new();
        let mut notices = manager.subscribe_notices();

        manager
            .connect(link.clone() as Arc<dyn PrinterLink>)
            .await
            .unwrap();
        assert_eq!(
            notices.recv().await.unwrap(),
            ConnectionNotice::Connected {
                device: "D110-TEST".into()
            }
        );

        link.trigger_disconnect();
        assert_eq!(
            notices.recv().await.unwrap(),
            ConnectionNotice::Disconnected {
                device: "D110-TEST".into()
            }
        );
        assert!(!manager.is_connected().await);
    }

    #[tokio::test]
    async fn test_is_connected_requires_live_link() {
        let link = Arc::new(MockLink::new("D110-TEST"));
        let manager = ConnectionManager::new();
        manager
            .connect(link.clone() as Arc<dyn PrinterLink>)
            .await
            .unwrap();

        // Drop the link without giving the watcher a chance to run: the
        // characteristic handle is still held, but the device is gone.
        link.set_open(false);
        assert!(!manager.is_connected().await);
    }

    #[tokio::test]
    async fn test_discover_and_connect_applies_filter() {
        let scanner = MockScanner::new(vec![
            Arc::new(MockLink::new("JBL Speaker")),
            Arc::new(MockLink::new("D110-PRINTER")),
        ]);
        let filter = DeviceFilter {
            name_prefix: Some("D".into()),
            services: vec![],
        };

        let manager = ConnectionManager::new();
        assert!(
            manager
                .discover_and_connect(&scanner, &filter)
                .await
                .unwrap()
        );
        assert!(manager.is_connected().await);
    }

    #[tokio::test]
    async fn test_auto_connect_failure_is_non_fatal() {
        let scanner = MockScanner::new(vec![]);
        let manager = ConnectionManager::new();
        let filter = DeviceFilter::default();

        assert!(!manager.auto_connect(&scanner, &filter).await);
        assert!(!manager.is_connected().await);
    }

    #[tokio::test]
    async fn test_auto_connect_reuses_known_device() {
        let scanner = MockScanner::new(vec![Arc::new(MockLink::new("D110-KNOWN"))]);
        let manager = ConnectionManager::new();

        assert!(
            manager
                .auto_connect(&scanner, &DeviceFilter::default())
                .await
        );
        assert!(manager.is_connected().await);
    }
}
