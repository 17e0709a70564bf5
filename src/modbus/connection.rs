use crate::prelude::*;

use async_trait::async_trait;
use net2::TcpStreamExt;
use rand::Rng;
use std::io;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time;
use tokio_modbus::client::{tcp, Context, Reader};
use tokio_modbus::slave::{Slave, SlaveContext};

const BACKOFF_START: Duration = Duration::from_millis(500);
const BACKOFF_EXPO_BASE: f64 = 1.2;
const BACKOFF_MAX: Duration = Duration::from_secs(30);
const BACKOFF_RANDOM_MULTIPLIER: Duration = Duration::from_millis(100);

/// Factory default device address of the vendor's inverters.
const DEFAULT_SLAVE_ID: u8 = 126;

/// A Modbus TCP connection that reconnects when the carrier is lost.
///
/// A read against an unresponsive or disconnected peer drops the session,
/// dials again with backoff and retries the same read; the caller only ever
/// observes a successful read, a protocol error or [`Error::Closed`] after
/// [`Connection::close`].
pub struct Connection {
    addr: String,
    slave: Slave,
    config: ModbusConfig,
    cancel: CancellationToken,
    ctx: Option<Context>,
}

impl Connection {
    /// Connects to the given `host:port` using Modbus TCP.
    ///
    /// Returns once a first working session exists. Dial failures are
    /// retried with backoff until the connection is closed.
    pub async fn connect(addr: impl Into<String>) -> Result<Self> {
        Self::connect_with(addr, ModbusConfig::default()).await
    }

    pub async fn connect_with(addr: impl Into<String>, config: ModbusConfig) -> Result<Self> {
        Self::connect_with_shutdown(addr, config, CancellationToken::new()).await
    }

    /// Like [`Connection::connect_with`], with an externally held cancel
    /// signal bounding the reconnect loop.
    pub async fn connect_with_shutdown(
        addr: impl Into<String>,
        config: ModbusConfig,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let mut conn = Self {
            addr: addr.into(),
            slave: Slave(DEFAULT_SLAVE_ID),
            config,
            cancel,
            ctx: None,
        };
        conn.reconnect().await?;
        Ok(conn)
    }

    /// Sets the slave id (device address) of following requests.
    pub fn set_slave_id(&mut self, id: u8) {
        self.slave = Slave(id);
        if let Some(ctx) = self.ctx.as_mut() {
            ctx.set_slave(self.slave);
        }
    }

    /// Handle cancelling an in-progress reconnect loop from another task.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Closes the transport and cancels any in-progress reconnect loop.
    /// Safe to call more than once.
    pub fn close(&mut self) {
        self.cancel.cancel();
        self.ctx = None;
    }

    async fn reconnect(&mut self) -> Result<()> {
        self.ctx = None;
        let mut attempt = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Closed);
            }

            match Self::dial(self.addr.as_str(), self.slave, &self.config).await {
                Ok(ctx) => {
                    info!("connected to {}", self.addr);
                    self.ctx = Some(ctx);
                    return Ok(());
                }
                Err(err) => {
                    let delay = backoff_delay(attempt);
                    debug!(
                        "couldn't connect to {}: {}, retrying in {:?}",
                        self.addr, err, delay
                    );
                    attempt += 1;

                    tokio::select! {
                        _ = self.cancel.cancelled() => return Err(Error::Closed),
                        _ = time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    async fn dial(addr: &str, slave: Slave, config: &ModbusConfig) -> io::Result<Context> {
        let stream = time::timeout(config.dial_timeout(), TcpStream::connect(addr))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "dial timed out"))??;

        let stream = stream.into_std()?;
        stream.set_keepalive(Some(config.keepalive()))?;
        let stream = TcpStream::from_std(stream)?;

        Ok(tcp::attach_slave(stream, slave))
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Delay before reconnect attempt `i`: `min(500ms * 1.2^i, 30s)` plus up to
/// 100ms of random jitter. The attempt counter resets on a successful
/// connect.
fn backoff_delay(attempt: i32) -> Duration {
    let start = BACKOFF_START.as_millis() as f64;
    let capped = (start * BACKOFF_EXPO_BASE.powi(attempt)).min(BACKOFF_MAX.as_millis() as f64);
    let jitter = rand::thread_rng().gen_range(0.0..BACKOFF_RANDOM_MULTIPLIER.as_millis() as f64);
    Duration::from_millis((capped + jitter) as u64)
}

/// A peer that closed or reset the socket between two reads surfaces as one
/// of these kinds on the next use.
fn is_carrier_lost(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::TimedOut
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
    )
}

#[async_trait]
impl RegisterRead for Connection {
    async fn read_registers(&mut self, address: u16, quantity: u16) -> Result<Vec<u16>> {
        loop {
            if self.ctx.is_none() {
                self.reconnect().await?;
            }
            let Some(ctx) = self.ctx.as_mut() else {
                continue;
            };

            let response = time::timeout(
                self.config.read_timeout(),
                ctx.read_holding_registers(address, quantity),
            )
            .await;

            match response {
                Err(_) => {
                    debug!("read of register {} timed out, reconnecting", address);
                    self.ctx = None;
                }
                Ok(Err(tokio_modbus::Error::Transport(err))) if is_carrier_lost(&err) => {
                    debug!("lost carrier to {} ({}), reconnecting", self.addr, err);
                    self.ctx = None;
                }
                Ok(Err(err)) => return Err(Error::Modbus(err)),
                Ok(Ok(Err(exception))) => return Err(Error::Exception(exception)),
                Ok(Ok(Ok(words))) => return Ok(words),
            }
        }
    }
}
