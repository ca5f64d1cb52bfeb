use anyhow::Result;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::{
    sync::{
        Arc, Mutex,
        mpsc::{Receiver, TryRecvError},
    },
    thread,
    time::{Duration, Instant},
};

use elantp::{Settings, TouchpadSession};

use super::dispatch::Outputs;
use crate::config::{Knob, Profile, SourceConfig};
use crate::input::{self, SampleSource};

const IDLE_SLEEP: Duration = Duration::from_millis(4);
const REOPEN_INTERVAL: Duration = Duration::from_secs(2);

pub enum PipelineMsg {
    Profile(Box<Profile>),
    Knob(Knob),
    Shutdown,
}

/// What `status` reports about the running engine.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineStatus {
    pub source: Option<String>,
    pub frames: u64,
    pub rotation: u16,
    pub pending_rotation: u16,
    pub gesture: String,
}

/// Profiles are persisted state, so their rotation applies even while
/// runtime rotation changes are disabled. It still waits for a release.
fn apply_profile(session: &mut TouchpadSession, settings: &Settings) {
    session.apply_settings(settings);
    if session.pending_rotation() != settings.rotation {
        session.set_rotation_enabled(true);
        session.set_rotation(settings.rotation);
        session.set_rotation_enabled(settings.rotation_enable);
    }
}

struct SourceSlot {
    cfg: SourceConfig,
    src: Option<Box<dyn SampleSource>>,
    last_attempt: Option<Instant>,
}

impl SourceSlot {
    fn new(cfg: SourceConfig) -> Self {
        Self {
            cfg,
            src: None,
            last_attempt: None,
        }
    }

    /// Opens the source if it is closed and the retry interval has passed.
    fn ensure_open(&mut self, settings: &Settings) {
        if self.src.is_some() || self.last_attempt.is_some_and(|t| t.elapsed() < REOPEN_INTERVAL) {
            return;
        }
        let first = self.last_attempt.is_none();
        self.last_attempt = Some(Instant::now());
        match input::open_source(&self.cfg, settings.width, settings.height) {
            Ok(src) => {
                info!("reading samples from {}", src.describe());
                self.src = Some(src);
            }
            Err(e) if first => warn!("input source unavailable, retrying: {e}"),
            Err(e) => debug!("input source still unavailable: {e}"),
        }
    }

    fn replace(&mut self, cfg: SourceConfig) {
        if cfg != self.cfg {
            info!("input source changed");
            self.cfg = cfg;
            self.src = None;
            self.last_attempt = None;
        }
    }
}

pub fn run_pipeline(
    profile: Profile,
    rx: Receiver<PipelineMsg>,
    status: Arc<Mutex<PipelineStatus>>,
) -> Result<()> {
    let mut settings = profile.touchpad.clone();
    let mut session = TouchpadSession::new(settings.clone());
    let mut outputs = Outputs::new(settings.width, settings.height);
    let mut source = SourceSlot::new(profile.source);
    let mut frames: u64 = 0;

    loop {
        loop {
            match rx.try_recv() {
                Ok(PipelineMsg::Profile(p)) => {
                    settings = p.touchpad.clone();
                    apply_profile(&mut session, &settings);
                    outputs.resize(settings.width, settings.height);
                    if let Some(src) = source.src.as_mut() {
                        src.set_surface(settings.width, settings.height);
                    }
                    source.replace(p.source);
                    debug!("pipeline: profile applied");
                }
                Ok(PipelineMsg::Knob(knob)) => {
                    knob.apply(&mut session);
                    debug!("pipeline: {knob:?}");
                }
                Ok(PipelineMsg::Shutdown) | Err(TryRecvError::Disconnected) => {
                    info!("pipeline: stopping after {frames} frames");
                    return Ok(());
                }
                Err(TryRecvError::Empty) => break,
            }
        }

        source.ensure_open(&settings);
        let Some(src) = source.src.as_mut() else {
            thread::sleep(IDLE_SLEEP * 25);
            continue;
        };

        match src.poll() {
            Ok(Some(raw)) => {
                for event in session.process(&raw) {
                    if let Err(e) = outputs.dispatch(&event) {
                        error!("output failed: {e}");
                    }
                }
                frames += 1;
                if let Ok(mut st) = status.lock() {
                    st.source = Some(src.describe());
                    st.frames = frames;
                    st.rotation = session.rotation().degrees();
                    st.pending_rotation = session.pending_rotation().degrees();
                    st.gesture = format!("{:?}", session.gesture());
                }
            }
            Ok(None) => thread::sleep(IDLE_SLEEP),
            Err(e) => {
                warn!("input source lost: {e}");
                source.src = None;
                if let Ok(mut st) = status.lock() {
                    st.source = None;
                }
            }
        }
    }
}
