use anyhow::{Context, Result};
use log::{debug, error, info};
use std::fmt::Display;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::command::parse_local;
use crate::config::{Config, Role};
use crate::dispatcher::Dispatcher;
use crate::error::RelayError;
use crate::interpreter::Interpreter;
use crate::radio::{ReceivedFrame, UdpRadio};
use crate::routing::RoutingTable;
use crate::serial::{open_port, LineReader};
use crate::strip::{LedStrip, SerialStrip};

/// Counters reported by the heartbeat.
#[derive(Default)]
pub struct Stats {
    accepted: AtomicU64,
    rejected: AtomicU64,
}

impl Stats {
    fn record<T, E>(&self, result: &Result<T, E>) {
        let counter = if result.is_ok() { &self.accepted } else { &self.rejected };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

/// One board's main loop in the configured role.
pub struct Node {
    config: Config,
    running: Arc<AtomicBool>,
    stats: Arc<Stats>,
}

impl Node {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        Ok(Node {
            config,
            running: Arc::new(AtomicBool::new(true)),
            stats: Arc::new(Stats::default()),
        })
    }

    /// Get a clone of the running flag for signal handlers
    pub fn get_running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Run until the running flag is cleared.
    pub fn run(&self) -> Result<()> {
        info!("==================================");
        info!("  {:?} node starting...", self.config.role);
        info!("==================================");

        match self.config.role {
            Role::Master => self.run_master(),
            Role::Slave => self.run_slave(),
            Role::Standalone => self.run_standalone(),
        }
    }

    fn run_master(&self) -> Result<()> {
        let serial = self.config.serial.as_ref().context("missing serial config")?;
        let radio_config = self.config.radio.as_ref().context("missing radio config")?;

        let routes = RoutingTable::new(self.config.boxes.clone()).map_err(anyhow::Error::msg)?;
        let num_boxes = routes.num_boxes();
        let radio = UdpRadio::bind(radio_config)?;
        let mut dispatcher = Dispatcher::new(routes, radio);

        let registered = dispatcher.register_peers();
        info!("{} of {} boxes registered", registered, num_boxes);

        let port = open_port(&serial.port, serial.baud_rate, self.config.poll_interval())?;
        let mut ack = port.try_clone().context("Failed to clone serial port")?;
        let mut lines = LineReader::new(port);

        info!("System ready, waiting for serial commands on {}", serial.port);
        info!("Command format: box_id:1,led_id:66 or box_id,led_id,r,g,b");

        self.spawn_heartbeat();
        serve_lines(&mut lines, &mut ack, &self.running, &self.stats, |line| {
            dispatcher.dispatch(line)
        })
    }

    fn run_slave(&self) -> Result<()> {
        let strip_config = self.config.strip.as_ref().context("missing strip config")?;
        let radio_config = self.config.radio.as_ref().context("missing radio config")?;

        let strip = SerialStrip::open(strip_config.clone())?;
        let mut interpreter =
            Interpreter::new(strip_config.led_count, strip_config.brightness, strip);
        info!("Strip ({} LEDs) initialized", strip_config.led_count);

        let radio = UdpRadio::bind(radio_config)?;
        info!("[Key info] This device's radio address: {}", radio.address());
        info!("Add this address to the master's routing table");

        let frames = radio.start_receiver(Arc::clone(&self.running))?;
        info!("System ready, waiting for master commands...");

        self.spawn_heartbeat();
        let result = relay_frames(
            &mut interpreter,
            &frames,
            &self.running,
            self.config.poll_interval(),
            &self.stats,
        );

        info!("Turning off LEDs...");
        interpreter.blank();
        interpreter.strip_mut().stop();
        result
    }

    fn run_standalone(&self) -> Result<()> {
        let serial = self.config.serial.as_ref().context("missing serial config")?;
        let strip_config = self.config.strip.as_ref().context("missing strip config")?;

        let strip = SerialStrip::open(strip_config.clone())?;
        let mut interpreter =
            Interpreter::new(strip_config.led_count, strip_config.brightness, strip);
        info!("Strip ({} LEDs) initialized", strip_config.led_count);

        let port = open_port(&serial.port, serial.baud_rate, self.config.poll_interval())?;
        let mut ack = port.try_clone().context("Failed to clone serial port")?;
        let mut lines = LineReader::new(port);

        info!("System ready, waiting for serial commands on {}", serial.port);
        info!("Command format: clear, fill,r,g,b or index,r,g,b");

        self.spawn_heartbeat();
        let result = serve_lines(&mut lines, &mut ack, &self.running, &self.stats, |line| {
            match parse_local(line)? {
                Some(command) => interpreter.apply_local(&command).map(Some),
                None => Ok(None),
            }
        });

        info!("Turning off LEDs...");
        interpreter.blank();
        interpreter.strip_mut().stop();
        result
    }

    /// Spawn the periodic "still alive" report.
    fn spawn_heartbeat(&self) {
        let stats = Arc::clone(&self.stats);
        let running = Arc::clone(&self.running);
        let period = self.config.heartbeat();

        thread::spawn(move || {
            let mut last = (0u64, 0u64);

            while running.load(Ordering::Relaxed) {
                thread::sleep(period);

                let current = (stats.accepted(), stats.rejected());
                info!(
                    "[Stats] Still alive: {} accepted (+{}), {} rejected (+{})",
                    current.0,
                    current.0 - last.0,
                    current.1,
                    current.1 - last.1
                );
                last = current;
            }
        });
    }
}

/// Read operator lines until stopped, answering each non-blank line with
/// exactly one `OK ...` or `ERR ...` line.
fn serve_lines<R, W, T, F>(
    lines: &mut LineReader<R>,
    out: &mut W,
    running: &AtomicBool,
    stats: &Stats,
    mut handle: F,
) -> Result<()>
where
    R: Read,
    W: Write,
    T: Display,
    F: FnMut(&str) -> Result<Option<T>, RelayError>,
{
    while running.load(Ordering::Relaxed) {
        for line in lines.poll().context("Serial read failed")? {
            debug!("Serial command: {:?}", line.trim());

            let result = handle(&line);
            let ack = match &result {
                Ok(None) => continue,
                Ok(Some(done)) => format!("OK {}", done),
                Err(e) => {
                    error!("Dropped command {:?}: {}", line.trim(), e);
                    format!("ERR {}", e)
                }
            };
            stats.record(&result);

            if let Err(e) = writeln!(out, "{}", ack).and_then(|_| out.flush()) {
                error!("✗ Failed to write acknowledgment: {}", e);
            }
        }
    }

    Ok(())
}

/// Apply received frames in arrival order until stopped. Waits at most
/// `poll` for each frame so the running flag is always observed.
fn relay_frames<S: LedStrip>(
    interpreter: &mut Interpreter<S>,
    frames: &Receiver<ReceivedFrame>,
    running: &AtomicBool,
    poll: Duration,
    stats: &Stats,
) -> Result<()> {
    while running.load(Ordering::Relaxed) {
        match frames.recv_timeout(poll) {
            Ok(frame) => {
                debug!("Frame of {} bytes from {}", frame.payload.len(), frame.source);
                let result = interpreter.apply_bytes(&frame.payload);
                stats.record(&result);
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                if running.load(Ordering::Relaxed) {
                    anyhow::bail!("Radio receiver stopped unexpectedly");
                }
                break;
            }
        }
    }

    Ok(())
}
