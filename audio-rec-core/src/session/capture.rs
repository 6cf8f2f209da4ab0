use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{after, never, select, unbounded, Receiver, TryRecvError};

use crate::models::artifact::{Artifact, ArtifactReady, PlayableRef};
use crate::models::audio_models::{AudioSource, CaptureDiagnostics, MediaKind};
use crate::models::config::CaptureConfiguration;
use crate::models::error::CaptureError;
use crate::models::state::{CaptureSnapshot, CaptureState};
use crate::playback::registry::PlaybackRegistry;
use crate::processing::chunk_buffer::ChunkBuffer;
use crate::session::cancel::CancelToken;
use crate::session::slot::{SessionSlot, SlotGuard};
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::device_provider::{DeviceStream, DeviceStreamProvider, StreamErrors};
use crate::traits::encoder::{Encoder, EncoderEvent, EncoderEvents};

/// Audio capture session: device acquisition → chunk capture → one artifact.
///
/// Generic over the device backend and the encoder. All state lives on the
/// thread that owns the session; encoder output arrives through a per-cycle
/// event channel and is applied in order by `process_events` or
/// `wait_until_idle`.
///
/// ```text
/// [Provider] → [DeviceStream] → callback → [Encoder] → events → [ChunkBuffer]
///                                                                   ↓ finalize
///                          [PlaybackRegistry] ← [Artifact] → delegates (export, ...)
/// ```
pub struct CaptureSession<P: DeviceStreamProvider, E: Encoder> {
    provider: P,
    encoder: E,
    config: CaptureConfiguration,
    state: CaptureState,
    chunks: ChunkBuffer,
    stream: Option<P::Stream>,
    events: Option<Receiver<EncoderEvent>>,
    device_errors: Option<Receiver<CaptureError>>,
    slot: SessionSlot,
    slot_guard: Option<SlotGuard>,
    artifact: Option<Arc<Artifact>>,
    playable_reference: Option<PlayableRef>,
    playback: PlaybackRegistry,
    delegates: Vec<Arc<dyn CaptureDelegate>>,
    recording_started: Option<Instant>,
    last_error: Option<CaptureError>,
    diagnostics: CaptureDiagnostics,
}

impl<P: DeviceStreamProvider, E: Encoder> CaptureSession<P, E> {
    pub fn new(provider: P, encoder: E, config: CaptureConfiguration) -> Result<Self, CaptureError> {
        config.validate().map_err(CaptureError::ConfigurationFailed)?;
        Ok(Self {
            provider,
            encoder,
            config,
            state: CaptureState::Idle,
            chunks: ChunkBuffer::new(),
            stream: None,
            events: None,
            device_errors: None,
            slot: SessionSlot::global(),
            slot_guard: None,
            artifact: None,
            playable_reference: None,
            playback: PlaybackRegistry::new(),
            delegates: Vec::new(),
            recording_started: None,
            last_error: None,
            diagnostics: CaptureDiagnostics::default(),
        })
    }

    pub fn subscribe(&mut self, delegate: Arc<dyn CaptureDelegate>) {
        self.delegates.push(delegate);
    }

    pub fn set_playback_registry(&mut self, registry: PlaybackRegistry) {
        self.playback = registry;
    }

    pub fn playback_registry(&self) -> &PlaybackRegistry {
        &self.playback
    }

    /// Replace the exclusivity slot. Only takes effect while idle.
    pub fn set_session_slot(&mut self, slot: SessionSlot) -> Result<(), CaptureError> {
        if !self.state.is_idle() {
            return Err(CaptureError::InvalidState(
                "can only change slot while idle".into(),
            ));
        }
        self.slot = slot;
        Ok(())
    }

    pub fn config(&self) -> &CaptureConfiguration {
        &self.config
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state.is_recording()
    }

    pub fn artifact(&self) -> Option<Arc<Artifact>> {
        self.artifact.clone()
    }

    pub fn playable_reference(&self) -> Option<PlayableRef> {
        self.playable_reference.clone()
    }

    pub fn snapshot(&self) -> CaptureSnapshot {
        CaptureSnapshot {
            state: self.state,
            recording: self.state.is_recording(),
            artifact: self.artifact.clone(),
            playable_reference: self.playable_reference.clone(),
        }
    }

    pub fn diagnostics(&self) -> CaptureDiagnostics {
        self.diagnostics.clone()
    }

    /// Time since the current recording was granted (zero when not recording).
    pub fn elapsed(&self) -> Duration {
        self.recording_started
            .map(|started| started.elapsed())
            .unwrap_or_default()
    }

    pub fn available_sources(&self) -> Result<Vec<AudioSource>, CaptureError> {
        self.provider.available_sources()
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Request the input device and start recording.
    ///
    /// Transitions: idle → requesting → recording, or back to idle on
    /// failure. Blocks for as long as the provider waits on the user;
    /// cancel through `cancel` from another thread.
    pub fn start(&mut self, cancel: &CancelToken) -> Result<(), CaptureError> {
        if !self.state.is_idle() {
            log::warn!("start ignored while {}", self.state.as_str());
            return Err(CaptureError::InvalidState(format!(
                "cannot start while {}",
                self.state.as_str()
            )));
        }

        let guard = match self.slot.try_claim() {
            Ok(guard) => guard,
            Err(e) => return Err(self.abort_cycle(e)),
        };
        self.slot_guard = Some(guard);
        self.last_error = None;
        self.set_state(CaptureState::Requesting);

        if !self.provider.is_available() {
            return Err(self.abort_cycle(CaptureError::DeviceUnavailable));
        }
        let acquired = self
            .provider
            .acquire(MediaKind::Audio, self.config.device_id.as_deref(), cancel)
            .and_then(|mut stream| match cancel.check() {
                Ok(()) => Ok(stream),
                Err(e) => {
                    stream.release();
                    Err(e)
                }
            });
        let mut stream = match acquired {
            Ok(stream) => stream,
            Err(e) => return Err(self.abort_cycle(e)),
        };

        let (sender, receiver) = unbounded();
        let (error_sender, error_receiver) = unbounded();
        self.chunks.clear();
        if let Err(e) = bind_encoder(
            &mut self.encoder,
            &mut stream,
            EncoderEvents::new(sender),
            StreamErrors::new(error_sender),
        ) {
            stream.release();
            return Err(self.abort_cycle(e));
        }

        let source = stream.source();
        self.stream = Some(stream);
        self.events = Some(receiver);
        self.device_errors = Some(error_receiver);
        self.recording_started = Some(Instant::now());
        self.set_state(CaptureState::Recording);
        log::info!("recording from {} ({})", source.name, source.id);
        Ok(())
    }

    /// Ask the encoder to flush. Safe no-op unless recording.
    ///
    /// Transitions: recording → finalizing. The device stream is released
    /// here; the artifact appears once the encoder's `Done` is processed.
    pub fn stop(&mut self) -> Result<(), CaptureError> {
        if !self.state.is_recording() {
            log::debug!("stop ignored while {}", self.state.as_str());
            return Ok(());
        }

        self.set_state(CaptureState::Finalizing);
        if let Err(e) = self.encoder.flush() {
            return Err(self.abort_cycle(as_encoder_failure(e)));
        }
        self.release_stream();
        Ok(())
    }

    /// Stop, then block until the encoder delivers its final chunk.
    ///
    /// Returns `None` if the session was not recording.
    pub fn stop_and_finalize(&mut self) -> Result<Option<Arc<Artifact>>, CaptureError> {
        if !self.state.is_recording() {
            return Ok(None);
        }
        self.stop()?;
        let timeout = self.config.finalize_timeout;
        self.wait_until_idle(timeout)
    }

    /// Apply every encoder event already queued, without blocking.
    ///
    /// Also enforces `max_duration_secs`. Returns the number of events handled.
    pub fn process_events(&mut self) -> usize {
        let mut handled = 0;
        while let Some(error) = self.next_device_error() {
            self.handle_device_error(error);
            handled += 1;
        }
        while let Some(receiver) = self.events.clone() {
            match receiver.try_recv() {
                Ok(event) => {
                    self.handle_event(event);
                    handled += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.handle_disconnect();
                    break;
                }
            }
        }
        self.check_stream_liveness();
        self.enforce_max_duration();
        handled
    }

    /// Block on the event channel until the session is idle.
    ///
    /// Returns the artifact produced while waiting, if any. If the cycle
    /// fails while waiting, that error is returned. A timeout during
    /// finalizing fails the cycle with `Timeout`; a timeout while still
    /// recording returns `Timeout` and leaves the recording running.
    pub fn wait_until_idle(&mut self, timeout: Duration) -> Result<Option<Arc<Artifact>>, CaptureError> {
        // An unrepresentable deadline (e.g. `Duration::MAX`) means wait forever.
        let deadline = Instant::now().checked_add(timeout);
        let completed_before = self.diagnostics.cycles_completed;
        let failed_before = self.diagnostics.cycles_failed;

        while !self.state.is_idle() {
            self.check_stream_liveness();
            self.enforce_max_duration();
            let Some(receiver) = self.events.clone() else {
                break;
            };
            let device_errors = self.device_errors.clone().unwrap_or_else(never);

            let now = Instant::now();
            let mut wait = match deadline {
                Some(deadline) if now >= deadline => return Err(self.on_wait_timeout()),
                Some(deadline) => Some(deadline - now),
                None => None,
            };
            if let Some(until_max) = self.time_until_max_duration() {
                let until_max = until_max.max(Duration::from_millis(1));
                wait = Some(wait.map_or(until_max, |w| w.min(until_max)));
            }
            let timer = wait.map(after).unwrap_or_else(never);

            select! {
                recv(receiver) -> event => match event {
                    Ok(event) => self.handle_event(event),
                    Err(_) => self.handle_disconnect(),
                },
                recv(device_errors) -> error => match error {
                    Ok(error) => self.handle_device_error(error),
                    Err(_) => self.device_errors = None,
                },
                recv(timer) -> _ => {}
            }
        }

        if self.diagnostics.cycles_failed > failed_before {
            return Err(self
                .last_error
                .clone()
                .unwrap_or_else(|| CaptureError::Unknown("capture failed".into())));
        }
        if self.diagnostics.cycles_completed > completed_before {
            return Ok(self.artifact.clone());
        }
        Ok(None)
    }

    // --- Internal helpers ---

    fn handle_event(&mut self, event: EncoderEvent) {
        match event {
            EncoderEvent::Chunk(bytes) => {
                if !self.state.accepts_chunks() {
                    self.drop_stale("encoder chunk");
                    return;
                }
                log::debug!("chunk {} ({} bytes)", self.chunks.len() + 1, bytes.len());
                self.diagnostics.chunks_received += 1;
                self.diagnostics.bytes_received += bytes.len() as u64;
                self.chunks.push(bytes);
            }
            EncoderEvent::Done => match self.state {
                CaptureState::Finalizing => self.finalize(),
                CaptureState::Recording => {
                    log::warn!("encoder finished without a stop request; finalizing");
                    self.set_state(CaptureState::Finalizing);
                    self.finalize();
                }
                _ => self.drop_stale("encoder done"),
            },
            EncoderEvent::Failed(reason) => {
                if self.state.is_idle() {
                    self.drop_stale("encoder failure");
                    return;
                }
                self.abort_cycle(CaptureError::EncoderFailure(reason));
            }
        }
    }

    fn handle_disconnect(&mut self) {
        self.events = None;
        if !self.state.is_idle() {
            self.abort_cycle(CaptureError::EncoderFailure(
                "encoder closed its event stream before finishing".into(),
            ));
        }
    }

    fn next_device_error(&mut self) -> Option<CaptureError> {
        let receiver = self.device_errors.as_ref()?;
        match receiver.try_recv() {
            Ok(error) => Some(error),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.device_errors = None;
                None
            }
        }
    }

    fn handle_device_error(&mut self, error: CaptureError) {
        if self.state.is_idle() {
            self.drop_stale("device error");
            return;
        }
        self.abort_cycle(error);
    }

    /// A recording whose stream stopped delivering cannot be finalized.
    fn check_stream_liveness(&mut self) {
        if !self.state.is_recording() {
            return;
        }
        if self.stream.as_ref().is_some_and(|stream| !stream.is_live()) {
            self.abort_cycle(CaptureError::DeviceUnavailable);
        }
    }

    fn drop_stale(&mut self, kind: &str) {
        log::warn!("dropping stale {} while {}", kind, self.state.as_str());
        self.diagnostics.stale_events_dropped += 1;
    }

    /// Assemble the artifact, publish it, return to idle, then notify.
    fn finalize(&mut self) {
        let duration_secs = self.elapsed().as_secs_f64();
        let artifact = Arc::new(Artifact::assemble(
            self.chunks.take(),
            &self.config.media_type,
            self.encoder.media_type(),
            duration_secs,
        ));
        let playable_reference = self.playback.publish(Arc::clone(&artifact));

        self.artifact = Some(Arc::clone(&artifact));
        self.playable_reference = Some(playable_reference.clone());
        self.release_stream();
        self.close_channels();
        self.recording_started = None;
        self.diagnostics.cycles_completed += 1;
        self.slot_guard = None;
        self.set_state(CaptureState::Idle);

        log::info!(
            "artifact {} ready: {} bytes in {} chunks, {:.2}s, {}",
            artifact.id(),
            artifact.len(),
            artifact.chunk_count(),
            duration_secs,
            playable_reference
        );

        let ready = ArtifactReady {
            artifact,
            playable_reference,
        };
        for delegate in &self.delegates {
            delegate.on_artifact_ready(&ready);
        }
    }

    /// Tear down the attempt in progress and return to idle.
    fn abort_cycle(&mut self, error: CaptureError) -> CaptureError {
        match error {
            CaptureError::Cancelled => log::info!("device request cancelled"),
            ref e => log::error!("capture attempt failed while {}: {}", self.state.as_str(), e),
        }

        let was_active = !self.state.is_idle();
        self.release_stream();
        self.close_channels();
        self.chunks.clear();
        self.recording_started = None;
        self.slot_guard = None;
        self.last_error = Some(error.clone());
        if was_active {
            self.diagnostics.cycles_failed += 1;
            self.set_state(CaptureState::Idle);
        }

        for delegate in &self.delegates {
            delegate.on_error(&error);
        }
        error
    }

    fn on_wait_timeout(&mut self) -> CaptureError {
        if self.state == CaptureState::Finalizing {
            log::error!("encoder did not finish within the finalize timeout");
            self.abort_cycle(CaptureError::Timeout)
        } else {
            CaptureError::Timeout
        }
    }

    fn time_until_max_duration(&self) -> Option<Duration> {
        if !self.state.is_recording() {
            return None;
        }
        let max = Duration::try_from_secs_f64(self.config.max_duration_secs?).ok()?;
        Some(max.saturating_sub(self.elapsed()))
    }

    fn enforce_max_duration(&mut self) {
        if self.time_until_max_duration() == Some(Duration::ZERO) {
            log::info!("max duration reached, stopping");
            if let Err(e) = self.stop() {
                log::debug!("auto-stop ended the cycle: {}", e);
            }
        }
    }

    /// Drop this cycle's channels, counting whatever was still queued.
    fn close_channels(&mut self) {
        let mut stale = 0;
        if let Some(events) = self.events.take() {
            stale += events.try_iter().count();
        }
        if let Some(errors) = self.device_errors.take() {
            stale += errors.try_iter().count();
        }
        if stale > 0 {
            log::warn!("dropping {} stale events queued after the cycle ended", stale);
            self.diagnostics.stale_events_dropped += stale as u64;
        }
    }

    fn release_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.release();
            log::debug!("device stream released");
        }
    }

    fn set_state(&mut self, new_state: CaptureState) {
        if self.state == new_state {
            return;
        }
        log::debug!("capture state {} -> {}", self.state.as_str(), new_state.as_str());
        self.state = new_state;
        for delegate in &self.delegates {
            delegate.on_state_changed(new_state);
        }
    }
}

impl<P: DeviceStreamProvider, E: Encoder> Drop for CaptureSession<P, E> {
    fn drop(&mut self) {
        self.release_stream();
    }
}

/// Bind, arm and feed the encoder from a freshly granted stream.
fn bind_encoder<E: Encoder, S: DeviceStream>(
    encoder: &mut E,
    stream: &mut S,
    events: EncoderEvents,
    errors: StreamErrors,
) -> Result<(), CaptureError> {
    let callback = encoder.bind(stream.format(), events)?;
    encoder.begin()?;
    stream.start(callback, errors)
}

fn as_encoder_failure(error: CaptureError) -> CaptureError {
    match error {
        CaptureError::EncoderFailure(_) => error,
        other => CaptureError::EncoderFailure(other.to_string()),
    }
}
