use anyhow::{anyhow, Result};
use log::{debug, error, info, trace};
use smart_leds::{brightness, RGB8};
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::StripConfig;
use crate::serial::open_port;

/// Write timeout on the strip's serial port.
const WRITE_TIMEOUT: Duration = Duration::from_millis(1000);

/// The LED driver a node latches its buffer into.
pub trait LedStrip {
    /// Push a full buffer to the physical strip.
    fn latch(&mut self, pixels: &[RGB8]) -> Result<()>;

    /// Scale every following latch by `level` / 255.
    fn set_global_brightness(&mut self, level: u8);
}

/// Strip behind a serial pixel controller (Adalight or AWA framing).
///
/// Latching never blocks on the port: frames queue up for a writer thread,
/// which skips straight to the newest queued frame on every write.
pub struct SerialStrip {
    config: StripConfig,
    brightness: u8,
    sender: Option<Sender<Vec<RGB8>>>,
    frames_sent: Arc<AtomicU64>,
    worker_handle: Option<thread::JoinHandle<()>>,
}

impl SerialStrip {
    pub fn open(config: StripConfig) -> Result<Self> {
        let port = open_port(&config.port, config.baud_rate, WRITE_TIMEOUT)?;
        info!(
            "✓ Opened strip on {} ({:?} @ {} baud, {} LEDs, {:?})",
            config.port, config.protocol, config.baud_rate, config.led_count, config.pixel_format
        );
        Ok(Self::with_writer(config, port))
    }

    /// Drive the strip through any byte sink.
    pub fn with_writer<W>(config: StripConfig, writer: W) -> Self
    where
        W: Write + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel::<Vec<RGB8>>();
        let frames_sent = Arc::new(AtomicU64::new(0));

        let worker_config = config.clone();
        let worker_frames_sent = Arc::clone(&frames_sent);
        let worker_handle = thread::spawn(move || {
            writer_thread(writer, receiver, worker_config, worker_frames_sent);
        });

        SerialStrip {
            brightness: config.brightness,
            config,
            sender: Some(sender),
            frames_sent,
            worker_handle: Some(worker_handle),
        }
    }

    /// Get number of frames written to the port
    #[cfg(test)]
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    /// Flush queued frames, blank the strip and stop the writer.
    pub fn stop(&mut self) {
        self.sender.take();
        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.join();
            debug!(
                "Strip on {} stopped after {} frames",
                self.config.port,
                self.frames_sent.load(Ordering::Relaxed)
            );
        }
    }
}

impl LedStrip for SerialStrip {
    fn latch(&mut self, pixels: &[RGB8]) -> Result<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| anyhow!("strip on {} is stopped", self.config.port))?;
        let scaled: Vec<RGB8> = brightness(pixels.iter().copied(), self.brightness).collect();

        sender
            .send(scaled)
            .map_err(|_| anyhow!("strip on {} is disconnected", self.config.port))
    }

    fn set_global_brightness(&mut self, level: u8) {
        self.brightness = level;
    }
}

impl Drop for SerialStrip {
    fn drop(&mut self) {
        self.stop();
    }
}

fn writer_thread<W: Write>(
    mut writer: W,
    receiver: Receiver<Vec<RGB8>>,
    config: StripConfig,
    frames_sent: Arc<AtomicU64>,
) {
    while let Ok(mut pixels) = receiver.recv() {
        // Only the newest queued frame matters
        let mut skipped = 0;
        while let Ok(newer) = receiver.try_recv() {
            pixels = newer;
            skipped += 1;
        }
        if skipped > 0 {
            debug!("[{}] Skipped {} stale frames", config.port, skipped);
        }

        if let Err(e) = write_frame(&mut writer, &config, pixels) {
            error!("✗ Serial error on {}: {}", config.port, e);
            error!("✗ Strip {} is now disconnected", config.port);
            return;
        }
        frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    // Sender gone: leave the strip dark
    let blank = vec![RGB8::default(); config.led_count];
    let _ = write_frame(&mut writer, &config, blank);
}

fn write_frame<W: Write>(
    writer: &mut W,
    config: &StripConfig,
    pixels: Vec<RGB8>,
) -> std::io::Result<()> {
    let data = config.pixel_format.encode(pixels);
    let frame = config
        .protocol
        .build_frame(&data, config.pixel_format.stride());

    if log::log_enabled!(log::Level::Trace) {
        let hex: String = frame
            .iter()
            .take(30)
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(" ");
        trace!("[{}] Sending frame: {} bytes, first 30: {}", config.port, frame.len(), hex);
    }

    writer.write_all(&frame)?;
    writer.flush()
}
