//! Linux packet sink backed by `pnet_datalink`'s raw L2 channel.
//!
//! `pnet_datalink`'s receive API is blocking with no timeout knob of its
//! own beyond a fixed per-call value, so this sink runs one dedicated
//! reader thread per instance that polls with a short internal timeout
//! and forwards frames over a bounded channel — the same poll-with-
//! deadline shape used for the software watchdog's monitor thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::Sender;
use pnet_datalink::Channel::Ethernet;
use svts_common::{SvtsError, SvtsResult};

use crate::{PacketSink, MAX_FRAME_LEN};

/// How often the reader thread re-checks the stop flag between frames.
const READER_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Packet sink bound to one named Linux network interface.
pub struct LinuxDatalinkSink {
    mac: [u8; 6],
    tx: Box<dyn pnet_datalink::DataLinkSender>,
    frame_rx: crossbeam_channel::Receiver<Vec<u8>>,
    reader_handle: Option<thread::JoinHandle<()>>,
    stop: Arc<AtomicBool>,
}

impl LinuxDatalinkSink {
    /// Open the named interface for raw L2 I/O.
    ///
    /// Resolves `mac_address()` from the interface's own hardware address.
    pub fn open(iface_name: &str) -> SvtsResult<Self> {
        let interface = pnet_datalink::interfaces()
            .into_iter()
            .find(|i| i.name == iface_name)
            .ok_or_else(|| SvtsError::IfaceDown(format!("no such interface: {iface_name}")))?;

        let mac = interface.mac.ok_or_else(|| {
            SvtsError::IfaceDown(format!("interface {iface_name} has no hardware address"))
        })?;

        let mut config = pnet_datalink::Config::default();
        config.read_timeout = Some(READER_POLL_INTERVAL);

        let (tx, rx) = match pnet_datalink::channel(&interface, config) {
            Ok(Ethernet(tx, rx)) => (tx, rx),
            Ok(_) => {
                return Err(SvtsError::Internal(
                    "unsupported datalink channel type".to_string(),
                ))
            }
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(SvtsError::IoPermission(format!(
                    "opening {iface_name}: {e}"
                )))
            }
            Err(e) => return Err(SvtsError::IfaceDown(format!("opening {iface_name}: {e}"))),
        };

        let stop = Arc::new(AtomicBool::new(false));
        let (frame_tx, frame_rx) = crossbeam_channel::bounded(64);
        let reader_stop = Arc::clone(&stop);
        let reader_handle = thread::Builder::new()
            .name(format!("svts-sink-rx-{iface_name}"))
            .spawn(move || reader_loop(rx, &frame_tx, &reader_stop))
            .map_err(|e| SvtsError::Internal(format!("failed to spawn reader thread: {e}")))?;

        Ok(Self {
            mac: mac.octets(),
            tx,
            frame_rx,
            reader_handle: Some(reader_handle),
            stop,
        })
    }
}

fn reader_loop(
    mut rx: Box<dyn pnet_datalink::DataLinkReceiver>,
    frame_tx: &Sender<Vec<u8>>,
    stop: &Arc<AtomicBool>,
) {
    while !stop.load(Ordering::Relaxed) {
        match rx.next() {
            Ok(bytes) => {
                if frame_tx.try_send(bytes.to_vec()).is_err() {
                    tracing::warn!("inbound frame dropped: reader outrunning consumer");
                }
            }
            Err(ref e)
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::WouldBlock =>
            {
                continue;
            }
            Err(e) => {
                tracing::error!(error = %e, "sink reader thread exiting on fatal error");
                break;
            }
        }
    }
}

impl PacketSink for LinuxDatalinkSink {
    fn mac_address(&self) -> [u8; 6] {
        self.mac
    }

    fn write(&mut self, frame: &[u8]) -> SvtsResult<()> {
        if frame.len() > MAX_FRAME_LEN {
            return Err(SvtsError::TooLarge {
                size: frame.len(),
                limit: MAX_FRAME_LEN,
            });
        }
        match self.tx.send_to(frame, None) {
            Some(Ok(())) => Ok(()),
            Some(Err(e)) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                Err(SvtsError::IoPermission(e.to_string()))
            }
            Some(Err(e)) => Err(SvtsError::IoTransient(e.to_string())),
            None => Err(SvtsError::IoTransient(
                "send_to produced no result".to_string(),
            )),
        }
    }

    fn read(&mut self, timeout: Duration) -> SvtsResult<Option<Vec<u8>>> {
        match self.frame_rx.recv_timeout(timeout) {
            Ok(frame) => Ok(Some(frame)),
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => Ok(None),
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                Err(SvtsError::IfaceDown("reader thread exited".to_string()))
            }
        }
    }

    fn close(&mut self) -> SvtsResult<()> {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.reader_handle.take() {
            let _ = handle.join();
        }
        Ok(())
    }
}

impl Drop for LinuxDatalinkSink {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
