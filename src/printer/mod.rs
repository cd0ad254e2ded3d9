//! # Print Session Driver
//!
//! This module orchestrates one print job end to end:
//!
//! ```text
//! Idle -> Resolving -> Configuring -> Streaming -> Finalizing -> Done | Failed
//!         (cache or    (setup +       (row frames,  (end page,
//!          render)      dimensions +   paced)        end print)
//!                       quantity)
//! ```
//!
//! ## Pacing
//!
//! Every characteristic write is followed by a mandatory delay
//! ([`PrinterConfig::control_pacing`] / [`PrinterConfig::row_pacing`]).
//! The firmware's receive buffer overruns without it; the delays are part
//! of the protocol contract, not an optimization.
//!
//! ## Failure
//!
//! Any write failure aborts the remaining frames of the job and surfaces
//! the transport error. There is no retry and no partial resume; the
//! caller decides what to tell the operator. Jobs are not queued either:
//! callers sequence jobs themselves and give the printer a moment
//! between jobs.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::cache::PacketCache;
use crate::condition::Condition;
use crate::error::NimboError;
use crate::protocol::frame;
use crate::render::label::{LabelRenderer, RenderLabel};
use crate::transport::{ConnectionManager, PrinterLink};

pub mod config;

pub use config::PrinterConfig;

/// Phases of one print job, in order. Logged as the job advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Resolving,
    Configuring,
    Streaming,
    Finalizing,
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobPhase::Resolving => "resolving",
            JobPhase::Configuring => "configuring",
            JobPhase::Streaming => "streaming",
            JobPhase::Finalizing => "finalizing",
        };
        f.write_str(name)
    }
}

/// # Printer Session
///
/// The owned resource object for one printer: connection manager, packet
/// cache and rasterizer live here rather than in module-level state, so
/// the one-session-per-page constraint is explicit and each test builds
/// its own instance.
pub struct PrinterSession {
    config: PrinterConfig,
    connection: ConnectionManager,
    cache: PacketCache,
    renderer: Arc<dyn RenderLabel>,
}

impl PrinterSession {
    /// A session with the production rasterizer.
    pub fn new(config: PrinterConfig) -> Self {
        Self::with_renderer(config, Arc::new(LabelRenderer::default()))
    }

    /// A session with a custom rasterizer (tests substitute counting or
    /// stub renderers here).
    pub fn with_renderer(config: PrinterConfig, renderer: Arc<dyn RenderLabel>) -> Self {
        Self {
            config,
            connection: ConnectionManager::new(),
            cache: PacketCache::new(),
            renderer,
        }
    }

    pub fn config(&self) -> &PrinterConfig {
        &self.config
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn cache(&self) -> &PacketCache {
        &self.cache
    }

    /// # Print One Label
    ///
    /// Resolves the row packets for `(product_code, condition_label)`
    /// from the cache (rendering on a miss), then drives the full frame
    /// sequence with per-write pacing.
    ///
    /// ## Errors
    ///
    /// - [`NimboError::NotConnected`] before any I/O or cache mutation
    ///   when the transport is down
    /// - [`NimboError::UnsupportedCondition`] for a label outside
    ///   `CN`/`FB`/`B`, before any I/O
    /// - [`NimboError::Render`] when a cache miss fails to render
    /// - [`NimboError::Transport`] on the first failed write; the rest of
    ///   the job is abandoned
    pub async fn print_label(
        &self,
        product_code: &str,
        condition_label: &str,
        quantity: u8,
    ) -> Result<(), NimboError> {
        let (link, characteristic) = self.connection.require_connected().await?;
        let condition = Condition::from_wire_label(condition_label)
            .ok_or_else(|| NimboError::UnsupportedCondition(condition_label.to_string()))?;

        debug!("print {product_code}{condition_label} x{quantity}: {}", JobPhase::Resolving);
        let packets = match self.cache.get(product_code, condition) {
            Some(packets) => {
                debug!("cache hit for {product_code} ({})", condition.key());
                packets
            }
            None => {
                info!("cache miss for {product_code} ({}); rendering now", condition.key());
                let packets = self.renderer.render(product_code, condition_label)?;
                self.cache
                    .put(product_code, condition, Arc::clone(&packets));
                packets
            }
        };

        let cfg = &self.config;

        debug!("print {product_code}{condition_label}: {}", JobPhase::Configuring);
        let control = [
            frame::build(frame::SET_DENSITY, &[cfg.density]),
            frame::build(frame::SET_LABEL_TYPE, &[cfg.label_type]),
            frame::build(frame::START_PRINT, &[1]),
            frame::build(frame::START_PAGE, &[1]),
            frame::set_dimension(cfg.label_height, cfg.label_width),
            frame::set_quantity(quantity),
        ];
        for bytes in &control {
            write_paced(&*link, characteristic, bytes, cfg.control_pacing).await?;
        }

        debug!(
            "print {product_code}{condition_label}: {} ({} rows)",
            JobPhase::Streaming,
            packets.len()
        );
        for bytes in packets.iter() {
            write_paced(&*link, characteristic, bytes, cfg.row_pacing).await?;
        }

        debug!("print {product_code}{condition_label}: {}", JobPhase::Finalizing);
        for bytes in [
            frame::build(frame::END_PAGE, &[1]),
            frame::build(frame::END_PRINT, &[1]),
        ] {
            write_paced(&*link, characteristic, &bytes, cfg.control_pacing).await?;
        }

        info!("printed {product_code}{condition_label} x{quantity}");
        Ok(())
    }

    /// # Precache All Conditions
    ///
    /// Sequentially renders and stores the packet sets for every
    /// condition of `product_code`, pausing briefly between renders to
    /// yield the executor. Skipped when the cache is already primed for
    /// this code. Any render failure resets the whole cache; a later
    /// hit must never serve a truncated set.
    pub async fn precache(&self, product_code: &str) {
        self.precacher().run(product_code.to_string()).await;
    }

    /// Run [`Self::precache`] as a background task. The returned handle
    /// lets callers (and tests) await completion deterministically.
    pub fn spawn_precache(&self, product_code: &str) -> JoinHandle<()> {
        let precacher = self.precacher();
        let product_code = product_code.to_string();
        tokio::spawn(precacher.run(product_code))
    }

    fn precacher(&self) -> Precacher {
        Precacher {
            renderer: Arc::clone(&self.renderer),
            cache: self.cache.clone(),
            pause: self.config.precache_pause,
        }
    }
}

/// Write one frame and wait out its pacing delay.
async fn write_paced(
    link: &dyn PrinterLink,
    characteristic: Uuid,
    bytes: &[u8],
    pacing: Duration,
) -> Result<(), NimboError> {
    link.write_without_response(characteristic, bytes).await?;
    tokio::time::sleep(pacing).await;
    Ok(())
}

/// The shareable half of a precache run: everything it needs, detached
/// from the session so it can live in a spawned task.
struct Precacher {
    renderer: Arc<dyn RenderLabel>,
    cache: PacketCache,
    pause: Duration,
}

impl Precacher {
    async fn run(self, product_code: String) {
        if self.cache.is_primed(&product_code) {
            debug!("precache: {product_code} already primed");
            return;
        }

        debug!("precache: rendering all conditions for {product_code}");
        self.cache.clear();

        for condition in Condition::ALL {
            match self.renderer.render(&product_code, condition.wire_label()) {
                Ok(packets) => self.cache.put(&product_code, condition, packets),
                Err(e) => {
                    warn!("precache for {product_code} failed: {e}; resetting cache");
                    self.cache.clear();
                    return;
                }
            }
            tokio::time::sleep(self.pause).await;
        }

        info!("precache: {product_code} ready for all conditions");
    }
}
