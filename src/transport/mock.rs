//! # Mock Transport
//!
//! In-memory [`PrinterLink`]/[`DeviceScanner`] implementations for tests
//! and dry runs: every write is recorded, write failures can be scripted,
//! and disconnects can be triggered at will.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::NimboError;
use crate::transport::{CharacteristicProfile, DeviceFilter, DeviceScanner, PrinterLink};

/// The characteristic a healthy mock printer exposes.
pub const MOCK_CHARACTERISTIC: Uuid = Uuid::from_u128(0x6e40_0002);

/// A scriptable in-memory printer link.
pub struct MockLink {
    name: String,
    characteristics: Vec<CharacteristicProfile>,
    open: AtomicBool,
    open_delay: Duration,
    /// Fail the write once this many have succeeded.
    fail_after: Mutex<Option<usize>>,
    writes: Mutex<Vec<(Uuid, Vec<u8>)>>,
    subscriptions: Mutex<Vec<Uuid>>,
    disconnected_tx: watch::Sender<bool>,
}

impl MockLink {
    /// A link advertising one printer-suitable characteristic.
    pub fn new(name: &str) -> Self {
        let (disconnected_tx, _) = watch::channel(false);
        Self {
            name: name.to_string(),
            characteristics: vec![CharacteristicProfile {
                uuid: MOCK_CHARACTERISTIC,
                write_without_response: true,
                notify: true,
            }],
            open: AtomicBool::new(false),
            open_delay: Duration::ZERO,
            fail_after: Mutex::new(None),
            writes: Mutex::new(Vec::new()),
            subscriptions: Mutex::new(Vec::new()),
            disconnected_tx,
        }
    }

    /// Replace the advertised characteristics.
    pub fn with_characteristics(mut self, characteristics: Vec<CharacteristicProfile>) -> Self {
        self.characteristics = characteristics;
        self
    }

    /// Make `open` take this long (for in-flight connect tests).
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    /// Fail every write after `count` have succeeded.
    pub fn with_write_failure_after(self, count: usize) -> Self {
        *self.fail_after.lock().expect("mock lock poisoned") = Some(count);
        self
    }

    /// Force the link state (bypassing the disconnect event).
    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }

    /// Drop the link and fire the disconnect event.
    pub fn trigger_disconnect(&self) {
        self.open.store(false, Ordering::SeqCst);
        let _ = self.disconnected_tx.send(true);
    }

    /// Every successful write so far, in order.
    pub fn writes(&self) -> Vec<(Uuid, Vec<u8>)> {
        self.writes.lock().expect("mock lock poisoned").clone()
    }

    /// Payloads of every successful write, in order.
    pub fn written_payloads(&self) -> Vec<Vec<u8>> {
        self.writes()
            .into_iter()
            .map(|(_, payload)| payload)
            .collect()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().expect("mock lock poisoned").len()
    }

    /// Characteristics subscribed to, in order.
    pub fn subscriptions(&self) -> Vec<Uuid> {
        self.subscriptions.lock().expect("mock lock poisoned").clone()
    }
}

#[async_trait]
impl PrinterLink for MockLink {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn open(&self) -> Result<(), NimboError> {
        if !self.open_delay.is_zero() {
            tokio::time::sleep(self.open_delay).await;
        }
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn characteristics(&self) -> Result<Vec<CharacteristicProfile>, NimboError> {
        Ok(self.characteristics.clone())
    }

    async fn subscribe(&self, characteristic: Uuid) -> Result<(), NimboError> {
        self.subscriptions
            .lock()
            .expect("mock lock poisoned")
            .push(characteristic);
        Ok(())
    }

    async fn write_without_response(
        &self,
        characteristic: Uuid,
        payload: &[u8],
    ) -> Result<(), NimboError> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(NimboError::Transport("link is closed".into()));
        }

        let mut writes = self.writes.lock().expect("mock lock poisoned");
        if let Some(limit) = *self.fail_after.lock().expect("mock lock poisoned") {
            if writes.len() >= limit {
                return Err(NimboError::Transport("simulated write failure".into()));
            }
        }
        writes.push((characteristic, payload.to_vec()));
        Ok(())
    }

    async fn wait_disconnected(&self) {
        let mut rx = self.disconnected_tx.subscribe();
        if *rx.borrow() {
            return;
        }
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                return;
            }
        }
    }
}

/// A scanner over a fixed set of mock links.
pub struct MockScanner {
    links: Vec<Arc<dyn PrinterLink>>,
}

impl MockScanner {
    pub fn new(links: Vec<Arc<dyn PrinterLink>>) -> Self {
        Self { links }
    }

    fn matching(&self, filter: &DeviceFilter) -> Vec<Arc<dyn PrinterLink>> {
        self.links
            .iter()
            .filter(|link| filter.matches_name(&link.name()))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl DeviceScanner for MockScanner {
    async fn request_device(
        &self,
        filter: &DeviceFilter,
    ) -> Result<Arc<dyn PrinterLink>, NimboError> {
        self.matching(filter)
            .into_iter()
            .next()
            .ok_or_else(|| NimboError::Transport("no matching device found".into()))
    }

    async fn known_devices(
        &self,
        filter: &DeviceFilter,
    ) -> Result<Vec<Arc<dyn PrinterLink>>, NimboError> {
        Ok(self.matching(filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_writes_are_recorded_in_order() {
        let link = MockLink::new("D110-TEST");
        link.open().await.unwrap();

        link.write_without_response(MOCK_CHARACTERISTIC, &[1])
            .await
            .unwrap();
        link.write_without_response(MOCK_CHARACTERISTIC, &[2, 3])
            .await
            .unwrap();

        assert_eq!(link.written_payloads(), vec![vec![1], vec![2, 3]]);
    }

    #[tokio::test]
    async fn test_write_fails_when_closed() {
        let link = MockLink::new("D110-TEST");
        let err = link
            .write_without_response(MOCK_CHARACTERISTIC, &[1])
            .await
            .unwrap_err();
        assert!(matches!(err, NimboError::Transport(_)));
        assert_eq!(link.write_count(), 0);
    }

    #[tokio::test]
    async fn test_scripted_write_failure() {
        let link = MockLink::new("D110-TEST").with_write_failure_after(2);
        link.open().await.unwrap();

        for _ in 0..2 {
            link.write_without_response(MOCK_CHARACTERISTIC, &[0])
                .await
                .unwrap();
        }
        let err = link
            .write_without_response(MOCK_CHARACTERISTIC, &[0])
            .await
            .unwrap_err();
        assert!(matches!(err, NimboError::Transport(_)));
        assert_eq!(link.write_count(), 2);
    }

    #[tokio::test]
    async fn test_wait_disconnected_resolves_after_trigger() {
        let link = Arc::new(MockLink::new("D110-TEST"));
        link.open().await.unwrap();

        let waiter = {
            let link = Arc::clone(&link);
            tokio::spawn(async move { link.wait_disconnected().await })
        };
        tokio::task::yield_now().await;

        link.trigger_disconnect();
        waiter.await.unwrap();
        assert!(!link.is_open().await);
    }

    #[tokio::test]
    async fn test_scanner_filters_by_name() {
        let scanner = MockScanner::new(vec![
            Arc::new(MockLink::new("JBL Speaker")),
            Arc::new(MockLink::new("D110-PRINTER")),
        ]);
        let filter = DeviceFilter {
            name_prefix: Some("D".into()),
            services: vec![],
        };

        let device = scanner.request_device(&filter).await.unwrap();
        assert_eq!(device.name(), "D110-PRINTER");
    }
}
