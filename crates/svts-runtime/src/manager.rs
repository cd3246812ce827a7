//! Publisher manager (component I): create/read/update/delete SV
//! streams, each backed by its own [`SvPublisher`]. Holds the shared
//! worker pool and sink factory template used to start every instance.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use svts_common::config::StreamConfig;
use svts_common::{SvtsError, SvtsResult};
use svts_signal::{ChannelKind, ChannelPhasor, Harmonic, PhasorState};
use svts_sink::PacketSink;
use tracing::info;

use crate::pool::WorkerPool;
use crate::publisher::{PublisherStatus, SinkFactory, SvPublisher};

/// Builds a sink for a given `StreamConfig`; typically binds to a named
/// interface (or, in tests, always returns a fresh `SimulatedSink`).
pub type SinkBuilder = Arc<dyn Fn(&StreamConfig) -> SvtsResult<Box<dyn PacketSink>> + Send + Sync>;

/// Owns every active SV stream and the shared resources (worker pool,
/// sink builder) needed to start new ones.
pub struct PublisherManager {
    pool: Arc<WorkerPool>,
    sink_builder: SinkBuilder,
    stop_timeout: Duration,
    streams: Mutex<HashMap<String, Arc<SvPublisher>>>,
}

impl PublisherManager {
    /// Construct a manager backed by the given worker pool and sink
    /// factory template.
    #[must_use]
    pub fn new(pool: Arc<WorkerPool>, sink_builder: SinkBuilder, stop_timeout: Duration) -> Self {
        Self {
            pool,
            sink_builder,
            stop_timeout,
            streams: Mutex::new(HashMap::new()),
        }
    }

    /// Create a new, not-started stream. Rejects a duplicate `stream_id`
    /// or an invalid config with no partial state left behind.
    pub fn create_stream(&self, config: StreamConfig) -> SvtsResult<()> {
        let stream_id = config.stream_id.clone();
        let mut streams = self.streams.lock().unwrap();
        if streams.contains_key(&stream_id) {
            return Err(SvtsError::ConfigInvalid(format!(
                "stream '{stream_id}' already exists"
            )));
        }
        let sink_builder = Arc::clone(&self.sink_builder);
        let factory: SinkFactory = {
            let config = config.clone();
            Box::new(move || sink_builder(&config))
        };
        let publisher = SvPublisher::new(
            stream_id.clone(),
            config,
            Arc::clone(&self.pool),
            factory,
            self.stop_timeout,
        )?;
        streams.insert(stream_id, Arc::new(publisher));
        Ok(())
    }

    /// Look up a stream by id.
    #[must_use]
    pub fn get(&self, stream_id: &str) -> Option<Arc<SvPublisher>> {
        self.streams.lock().unwrap().get(stream_id).cloned()
    }

    /// List every known stream id.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        self.streams.lock().unwrap().keys().cloned().collect()
    }

    /// Start a stream's tick task.
    pub fn start(&self, stream_id: &str) -> SvtsResult<()> {
        self.stream(stream_id)?.start()
    }

    /// Stop a stream's tick task.
    pub fn stop(&self, stream_id: &str) -> SvtsResult<()> {
        self.stream(stream_id)?.stop()
    }

    /// Replace a stream's `StreamConfig` snapshot without disturbing a
    /// running tick loop; the next tick reads the new values.
    pub fn update_config(&self, stream_id: &str, config: StreamConfig) -> SvtsResult<()> {
        self.stream(stream_id)?.set_config(config)
    }

    /// Merge a partial phasor update into a stream's driving state
    /// (`updatePhasors`).
    pub fn update_phasors(&self, stream_id: &str, partial: &[(ChannelKind, ChannelPhasor)]) -> SvtsResult<()> {
        self.stream(stream_id)?.update_phasors(partial);
        Ok(())
    }

    /// Replace one channel's harmonic set on a stream (`updateHarmonics`).
    pub fn update_harmonics(&self, stream_id: &str, kind: ChannelKind, harmonics: Vec<Harmonic>) -> SvtsResult<()> {
        self.stream(stream_id)?.update_harmonics(kind, harmonics);
        Ok(())
    }

    /// Current phasor snapshot driving a stream.
    pub fn phasor_state(&self, stream_id: &str) -> SvtsResult<Arc<PhasorState>> {
        Ok(self.stream(stream_id)?.phasor_state())
    }

    /// Current lifecycle status of a stream.
    pub fn status(&self, stream_id: &str) -> SvtsResult<PublisherStatus> {
        Ok(self.stream(stream_id)?.status())
    }

    /// Stop (if running) and remove a stream entirely.
    pub fn delete_stream(&self, stream_id: &str) -> SvtsResult<()> {
        let publisher = self.streams.lock().unwrap().remove(stream_id);
        match publisher {
            Some(publisher) => {
                if matches!(publisher.status(), PublisherStatus::Running | PublisherStatus::Stopping) {
                    publisher.stop()?;
                }
                info!(stream_id, "stream deleted");
                Ok(())
            }
            None => Err(SvtsError::ConfigInvalid(format!("stream '{stream_id}' not found"))),
        }
    }

    /// Stop every running stream, in no particular order.
    pub fn stop_all(&self) {
        let streams: Vec<Arc<SvPublisher>> = self.streams.lock().unwrap().values().cloned().collect();
        for publisher in streams {
            if matches!(publisher.status(), PublisherStatus::Running | PublisherStatus::Stopping) {
                let _ = publisher.stop();
            }
        }
    }

    fn stream(&self, stream_id: &str) -> SvtsResult<Arc<SvPublisher>> {
        self.streams
            .lock()
            .unwrap()
            .get(stream_id)
            .cloned()
            .ok_or_else(|| SvtsError::ConfigInvalid(format!("stream '{stream_id}' not found")))
    }
}
