use anyhow::{Result, anyhow};
use log::{debug, error, info, warn};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde_json::{Value, json};
use signal_hook::{
    consts::{SIGINT, SIGTERM},
    iterator::Signals,
};
use std::{
    io::{BufRead, BufReader, Write},
    os::unix::net::{UnixListener, UnixStream},
    path::Path,
    sync::{
        Arc, Mutex,
        mpsc::{self, Receiver, Sender},
    },
    thread,
    time::Duration,
};

use elantp::Settings;

use super::pipeline::{PipelineMsg, PipelineStatus, run_pipeline};
use super::runtime::socket_path;
use crate::config::{DaemonConfigState, Knob, Profile};

const REPLY_TIMEOUT: Duration = Duration::from_secs(2);

enum IpcMsg {
    Request { req: Value, reply: Sender<Value> },
    Reload,
    Shutdown,
}

pub fn run_daemon() -> Result<()> {
    // socket
    let sock = socket_path()?;
    if sock.exists() {
        if UnixStream::connect(&sock).is_ok() {
            return Err(anyhow!("elantp daemon already running at {}", sock.display()));
        }
        let _ = std::fs::remove_file(&sock);
    }
    let listener = UnixListener::bind(&sock)?;
    info!("daemon: listening on {}", sock.display());

    // state
    let mut state = DaemonState::new()?;
    info!("daemon: active profile '{}'", state.cfg.active_name);

    let (tx_req, rx_req) = mpsc::channel::<IpcMsg>();
    let _watcher = match watch_profiles(&state.cfg.profiles_dir, tx_req.clone()) {
        Ok(w) => Some(w),
        Err(e) => {
            warn!("profile watching disabled: {e}");
            None
        }
    };
    spawn_signal_listener(tx_req.clone())?;

    let pipeline = PipelineThread::start(state.cfg.profile.clone())?;

    // accept loop
    listener.set_nonblocking(true)?;
    let result = serve(&listener, &mut state, &pipeline, &tx_req, &rx_req);

    pipeline.stop();
    let _ = std::fs::remove_file(&sock);
    info!("daemon: stopped");
    result
}

fn serve(
    listener: &UnixListener,
    state: &mut DaemonState,
    pipeline: &PipelineThread,
    tx_req: &Sender<IpcMsg>,
    rx_req: &Receiver<IpcMsg>,
) -> Result<()> {
    loop {
        match listener.accept() {
            Ok((stream, _)) => {
                let tx = tx_req.clone();
                thread::spawn(move || {
                    if let Err(e) = handle_client(stream, tx) {
                        error!("ipc client error: {e}");
                    }
                });
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(e) => warn!("accept failed: {e}"),
        }

        let mut reload = false;
        while let Ok(msg) = rx_req.try_recv() {
            match msg {
                IpcMsg::Request { req, reply } => {
                    let (resp, shutdown) = state.respond(&req, pipeline);
                    let _ = reply.send(resp);
                    if shutdown {
                        return Ok(());
                    }
                }
                // editors write several events per save; reload once per batch
                IpcMsg::Reload => reload = true,
                IpcMsg::Shutdown => return Ok(()),
            }
        }
        if reload {
            if let Err(e) = state.reload(pipeline) {
                error!("reload failed, keeping last good profile: {e}");
            }
        }

        thread::sleep(Duration::from_millis(5));
    }
}

/// Reads one JSON request line and writes back the daemon's answer.
fn handle_client(mut stream: UnixStream, tx_req: Sender<IpcMsg>) -> Result<()> {
    stream.set_nonblocking(false)?;
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if line.trim().is_empty() {
        return Ok(());
    }

    let resp = match serde_json::from_str::<Value>(&line) {
        Ok(req) => {
            let (reply, rx) = mpsc::channel();
            tx_req
                .send(IpcMsg::Request { req, reply })
                .map_err(|_| anyhow!("daemon is shutting down"))?;
            rx.recv_timeout(REPLY_TIMEOUT)
                .unwrap_or_else(|_| json!({"ok": false, "error": "daemon did not answer"}))
        }
        Err(e) => json!({"ok": false, "error": format!("bad request: {e}")}),
    };

    writeln!(stream, "{resp}")?;
    Ok(())
}

struct DaemonState {
    cfg: DaemonConfigState,
    /// Profile settings with runtime knobs applied.
    live: Settings,
}

fn ok(data: Value) -> Value {
    json!({"ok": true, "data": data})
}

fn fail(e: impl std::fmt::Display) -> Value {
    json!({"ok": false, "error": e.to_string()})
}

impl DaemonState {
    fn new() -> Result<Self> {
        let cfg = DaemonConfigState::load_or_install_default()?;
        let live = cfg.profile.touchpad.clone();
        Ok(Self { cfg, live })
    }

    fn publish(&mut self, pipeline: &PipelineThread) {
        self.live = self.cfg.profile.touchpad.clone();
        pipeline.send(PipelineMsg::Profile(Box::new(self.cfg.profile.clone())));
    }

    fn reload(&mut self, pipeline: &PipelineThread) -> Result<()> {
        self.cfg.reload()?;
        self.publish(pipeline);
        info!("profile '{}' reloaded", self.cfg.active_name);
        Ok(())
    }

    fn set_knob(&mut self, name: &str, value: &str, pipeline: &PipelineThread) -> Result<Settings> {
        let knob = Knob::parse(name, value)?;
        if let Knob::Rotation(_) = knob {
            if !self.live.rotation_enable {
                return Err(anyhow!("rotation is locked, set rotation_enable first"));
            }
        }
        let mut next = self.live.clone();
        knob.apply_to(&mut next);
        next.validate()?;
        knob.check_bounds(&next)?;
        self.live = next;
        pipeline.send(PipelineMsg::Knob(knob));
        info!("set {name} = {value}");
        Ok(self.live.clone())
    }

    /// Answers one request; the flag asks the daemon to stop.
    fn respond(&mut self, req: &Value, pipeline: &PipelineThread) -> (Value, bool) {
        let op = req.get("op").and_then(|v| v.as_str()).unwrap_or("");
        let arg = |key: &str| req.get(key).and_then(|v| v.as_str()).unwrap_or("");

        let resp = match op {
            "status" => ok(json!({
                "pid": std::process::id(),
                "active_profile": self.cfg.active_name,
                "socket": socket_path().ok(),
                "devices": self.cfg.detected_devices,
                "settings": self.live,
                "engine": pipeline.status(),
            })),
            "reload" => match self.reload(pipeline) {
                Ok(()) => ok(json!({"active_profile": self.cfg.active_name})),
                Err(e) => fail(e),
            },
            "use" => match self.cfg.set_active(arg("profile")) {
                Ok(()) => {
                    self.publish(pipeline);
                    info!("switched active profile to {}", self.cfg.active_name);
                    ok(json!({"active_profile": self.cfg.active_name}))
                }
                Err(e) => fail(e),
            },
            "list" => ok(json!({
                "profiles": self.cfg.list_profiles(),
                "active": self.cfg.active_name,
            })),
            "doctor" => ok(self.cfg.doctor_report()),
            "set" => match self.set_knob(arg("knob"), arg("value"), pipeline) {
                Ok(settings) => ok(json!({"settings": settings})),
                Err(e) => fail(e),
            },
            "shutdown" => return (ok(json!("shutting down")), true),
            _ => fail(format!("unknown op: {op}")),
        };
        (resp, false)
    }
}

struct PipelineThread {
    tx: Sender<PipelineMsg>,
    status: Arc<Mutex<PipelineStatus>>,
    handle: thread::JoinHandle<()>,
}

impl PipelineThread {
    fn start(profile: Profile) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let status = Arc::new(Mutex::new(PipelineStatus {
            rotation: profile.touchpad.rotation.degrees(),
            pending_rotation: profile.touchpad.rotation.degrees(),
            ..PipelineStatus::default()
        }));
        let shared = status.clone();
        let handle = thread::Builder::new()
            .name("pipeline".into())
            .spawn(move || {
                if let Err(e) = run_pipeline(profile, rx, shared) {
                    error!("touch pipeline failed: {e}");
                }
            })?;
        Ok(Self { tx, status, handle })
    }

    fn send(&self, msg: PipelineMsg) {
        if self.tx.send(msg).is_err() {
            warn!("touch pipeline is not running");
        }
    }

    fn status(&self) -> PipelineStatus {
        self.status
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    fn stop(self) {
        let _ = self.tx.send(PipelineMsg::Shutdown);
        if self.handle.join().is_err() {
            error!("touch pipeline panicked");
        }
    }
}

/// Requests a reload whenever a profile file changes.
fn watch_profiles(dir: &Path, tx: Sender<IpcMsg>) -> Result<RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        let event = match res {
            Ok(event) => event,
            Err(e) => {
                warn!("profile watch error: {e}");
                return;
            }
        };
        let relevant = matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        ) && event
            .paths
            .iter()
            .any(|p| p.extension().is_some_and(|ext| ext == "toml"));
        if relevant {
            debug!("profiles changed: {:?}", event.paths);
            let _ = tx.send(IpcMsg::Reload);
        }
    })?;
    watcher.watch(dir, RecursiveMode::NonRecursive)?;
    info!("watching {}", dir.display());
    Ok(watcher)
}

fn spawn_signal_listener(tx: Sender<IpcMsg>) -> Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    thread::Builder::new()
        .name("signals".into())
        .spawn(move || {
            if let Some(sig) = signals.forever().next() {
                info!("daemon: caught signal {sig}, shutting down");
                let _ = tx.send(IpcMsg::Shutdown);
            }
        })?;
    Ok(())
}

// client helper
pub fn client_request(req: Value) -> Result<Value> {
    let sock = socket_path()?;
    if !sock.exists() {
        return Err(anyhow!(
            "elantp daemon is not running (socket missing at {})",
            sock.display()
        ));
    }
    let mut stream = UnixStream::connect(sock)?;
    let line = serde_json::to_string(&req)? + "\n";
    stream.write_all(line.as_bytes())?;
    let mut reader = BufReader::new(stream);
    let mut resp = String::new();
    reader.read_line(&mut resp)?;
    let v: Value = serde_json::from_str(&resp)?;
    Ok(v)
}

