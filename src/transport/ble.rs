//! # Bluetooth LE Transport
//!
//! btleplug-backed implementations of [`DeviceScanner`] and
//! [`PrinterLink`] for talking to the printer as a BLE central.
//!
//! ## Scanning
//!
//! D-series printers advertise a short name (`D110…`) plus one of two
//! vendor serial services. [`BleScanner::request_device`] scans with the
//! service filter for a fixed window and returns the first peripheral
//! whose name passes the prefix filter. [`BleScanner::known_devices`]
//! skips scanning and only consults peripherals the adapter already
//! knows, which is what silent auto-reconnect wants at startup.
//!
//! ## Writes
//!
//! All frames go out as unacknowledged writes
//! ([`WriteType::WithoutResponse`]); flow control is the driver's pacing
//! delays, not the ATT layer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, CharPropFlags, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::stream::StreamExt;
use log::{debug, warn};
use uuid::Uuid;

use crate::error::NimboError;
use crate::transport::{CharacteristicProfile, DeviceFilter, DeviceScanner, PrinterLink};

/// Default scan window for the device picker.
const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(5);

fn transport_err(e: btleplug::Error) -> NimboError {
    NimboError::Transport(e.to_string())
}

/// BLE central scanner over the first system Bluetooth adapter.
pub struct BleScanner {
    adapter: Adapter,
    scan_timeout: Duration,
}

impl BleScanner {
    /// Open the first Bluetooth adapter on the system.
    pub async fn new() -> Result<Self, NimboError> {
        let manager = Manager::new().await.map_err(transport_err)?;
        let adapter = manager
            .adapters()
            .await
            .map_err(transport_err)?
            .into_iter()
            .next()
            .ok_or_else(|| NimboError::Transport("no Bluetooth adapter found".into()))?;
        Ok(Self {
            adapter,
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
        })
    }

    /// Set how long `request_device` scans before giving up.
    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    /// Scan for the configured window and return every matching printer.
    pub async fn discover(
        &self,
        filter: &DeviceFilter,
    ) -> Result<Vec<Arc<dyn PrinterLink>>, NimboError> {
        self.adapter
            .start_scan(ScanFilter {
                services: filter.services.clone(),
            })
            .await
            .map_err(transport_err)?;
        tokio::time::sleep(self.scan_timeout).await;
        if let Err(e) = self.adapter.stop_scan().await {
            warn!("stopping scan failed: {e}");
        }

        Ok(self
            .matching_links(filter)
            .await?
            .into_iter()
            .map(|link| Arc::new(link) as Arc<dyn PrinterLink>)
            .collect())
    }

    /// Wrap every adapter-known peripheral that passes the name filter.
    async fn matching_links(&self, filter: &DeviceFilter) -> Result<Vec<BleLink>, NimboError> {
        let mut links = Vec::new();
        for peripheral in self.adapter.peripherals().await.map_err(transport_err)? {
            let Some(name) = local_name(&peripheral).await else {
                continue;
            };
            if filter.matches_name(&name) {
                debug!("found {name}");
                links.push(BleLink {
                    adapter: self.adapter.clone(),
                    peripheral,
                    name,
                });
            }
        }
        Ok(links)
    }
}

/// The advertised local name, if the peripheral has one.
async fn local_name(peripheral: &Peripheral) -> Option<String> {
    peripheral
        .properties()
        .await
        .ok()
        .flatten()
        .and_then(|props| props.local_name)
}

#[async_trait]
impl DeviceScanner for BleScanner {
    async fn request_device(
        &self,
        filter: &DeviceFilter,
    ) -> Result<Arc<dyn PrinterLink>, NimboError> {
        self.discover(filter)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| NimboError::Transport("no matching printer found".into()))
    }

    async fn known_devices(
        &self,
        filter: &DeviceFilter,
    ) -> Result<Vec<Arc<dyn PrinterLink>>, NimboError> {
        Ok(self
            .matching_links(filter)
            .await?
            .into_iter()
            .map(|link| Arc::new(link) as Arc<dyn PrinterLink>)
            .collect())
    }
}

/// One BLE peripheral.
pub struct BleLink {
    adapter: Adapter,
    peripheral: Peripheral,
    name: String,
}

impl BleLink {
    fn characteristic_by_uuid(
        &self,
        uuid: Uuid,
    ) -> Result<btleplug::api::Characteristic, NimboError> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == uuid)
            .ok_or_else(|| NimboError::Transport(format!("characteristic {uuid} not present")))
    }
}

#[async_trait]
impl PrinterLink for BleLink {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn open(&self) -> Result<(), NimboError> {
        self.peripheral.connect().await.map_err(transport_err)?;
        self.peripheral
            .discover_services()
            .await
            .map_err(transport_err)
    }

    async fn is_open(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    async fn characteristics(&self) -> Result<Vec<CharacteristicProfile>, NimboError> {
        Ok(self
            .peripheral
            .characteristics()
            .into_iter()
            .map(|c| CharacteristicProfile {
                uuid: c.uuid,
                write_without_response: c.properties.contains(CharPropFlags::WRITE_WITHOUT_RESPONSE),
                notify: c.properties.contains(CharPropFlags::NOTIFY),
            })
            .collect())
    }

    async fn subscribe(&self, characteristic: Uuid) -> Result<(), NimboError> {
        let c = self.characteristic_by_uuid(characteristic)?;
        self.peripheral.subscribe(&c).await.map_err(transport_err)
    }

    async fn write_without_response(
        &self,
        characteristic: Uuid,
        payload: &[u8],
    ) -> Result<(), NimboError> {
        let c = self.characteristic_by_uuid(characteristic)?;
        self.peripheral
            .write(&c, payload, WriteType::WithoutResponse)
            .await
            .map_err(|e| NimboError::Transport(format!("write failed: {e}")))
    }

    async fn wait_disconnected(&self) {
        let id = self.peripheral.id();
        let mut events = match self.adapter.events().await {
            Ok(events) => events,
            Err(e) => {
                // Without an event stream there is nothing to observe;
                // writes will still fail once the link drops.
                warn!("adapter event stream unavailable: {e}");
                std::future::pending::<()>().await;
                unreachable!()
            }
        };

        while let Some(event) = events.next().await {
            if let CentralEvent::DeviceDisconnected(dropped) = event {
                if dropped == id {
                    return;
                }
            }
        }
    }
}

// Exercising this module needs a physical printer; the protocol and
// driver logic is covered through transport::mock instead.
