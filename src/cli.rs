use anyhow::{Result, anyhow};
use pico_args::Arguments;
use serde::Deserialize;
use std::{
    env, fs,
    io::{self, BufRead, BufReader, Write},
    path::PathBuf,
    process::Command,
};

use elantp::{KeyCode, ManualClock, PointerReport, RawSample, Rotation, Settings, TouchpadSession};

use crate::config::{KNOBS, Profile};
use crate::ipc;

/// Frame period assumed when a recording carries no timestamps.
const REPLAY_PERIOD_MS: u64 = 10;

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // Hidden daemon mode (spawned by `start`)
    if pargs.contains("--daemon") {
        return ipc::run_daemon();
    }

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            match topic {
                Some(t) => print_subcmd_help(&t),
                None => print_help(),
            }
            Ok(())
        }

        Some("start") => {
            let exe = env::current_exe()?;
            let child = Command::new(exe).arg("--daemon").spawn()?;
            println!("elantp: started daemon (pid={})", child.id());
            Ok(())
        }

        Some("stop") => request(serde_json::json!({"op":"shutdown"})),
        Some("status") => request(serde_json::json!({"op":"status"})),
        Some("reload") => request(serde_json::json!({"op":"reload"})),
        Some("list") => request(serde_json::json!({"op":"list"})),
        Some("doctor") => request(serde_json::json!({"op":"doctor"})),

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: elantp use <profile_name>"))?;
            request(serde_json::json!({"op":"use","profile":name}))
        }

        Some("set") => {
            let usage = || anyhow!("usage: elantp set <{}> <value>", KNOBS.join("|"));
            let knob: String = pargs.free_from_str().map_err(|_| usage())?;
            let value: String = pargs.free_from_str().map_err(|_| usage())?;
            request(serde_json::json!({"op":"set","knob":knob,"value":value}))
        }

        Some("emit") => emit(&mut pargs),

        Some("replay") => {
            let rotation: Option<Rotation> = pargs.opt_value_from_str("--rotation")?;
            let profile: Option<PathBuf> = pargs.opt_value_from_str("--profile")?;
            let file: PathBuf = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: elantp replay [--profile FILE] [--rotation DEG] <recording.jsonl>"))?;

            let mut settings = match profile {
                Some(p) => Profile::parse(&fs::read_to_string(&p)?)
                    .map_err(|e| anyhow!("{}: {e}", p.display()))?
                    .touchpad,
                None => Settings::default(),
            };
            if let Some(r) = rotation {
                settings.rotation = r;
            }
            let input = BufReader::new(
                fs::File::open(&file).map_err(|e| anyhow!("{}: {e}", file.display()))?,
            );
            let stdout = io::stdout();
            let frames = replay(input, settings, stdout.lock())?;
            log::info!("replayed {frames} frames from {}", file.display());
            Ok(())
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

fn request(req: serde_json::Value) -> Result<()> {
    let r = ipc::client_request(req)?;
    print_response(&r);
    Ok(())
}

fn emit(pargs: &mut Arguments) -> Result<()> {
    // usage:
    //   elantp emit click right
    //   elantp emit move 20 -10
    //   elantp emit scroll 3
    //   elantp emit key down
    let what: String = pargs
        .free_from_str()
        .map_err(|_| anyhow!("usage: elantp emit <click|move|scroll|key> ..."))?;
    let mut sink = crate::actions::UinputSink::new()?;
    match what.as_str() {
        "click" => {
            let btn: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: elantp emit click <left|right|middle>"))?;
            sink.click(&btn)?;
            println!("ok: clicked {btn}");
        }
        "move" => {
            let usage = || anyhow!("usage: elantp emit move <dx> <dy>");
            let dx: i32 = pargs.free_from_str().map_err(|_| usage())?;
            let dy: i32 = pargs.free_from_str().map_err(|_| usage())?;
            sink.pointer(&PointerReport {
                dx,
                dy,
                ..PointerReport::default()
            })?;
            println!("ok: moved {dx},{dy}");
        }
        "scroll" => {
            let steps: i32 = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: elantp emit scroll <steps>"))?;
            sink.pointer(&PointerReport {
                wheel: steps,
                ..PointerReport::default()
            })?;
            println!("ok: scrolled vertical {steps}");
        }
        "key" => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: elantp emit key <up|down|left|right|enter>"))?;
            let key = parse_key(&name)?;
            sink.key(key, true)?;
            sink.key(key, false)?;
            println!("ok: sent key {name}");
        }
        other => return Err(anyhow!("unknown emit kind: {other}")),
    }
    Ok(())
}

fn parse_key(name: &str) -> Result<KeyCode> {
    match name.to_ascii_lowercase().as_str() {
        "up" => Ok(KeyCode::Up),
        "down" => Ok(KeyCode::Down),
        "left" => Ok(KeyCode::Left),
        "right" => Ok(KeyCode::Right),
        "enter" => Ok(KeyCode::Enter),
        other => Err(anyhow!("unsupported key: {other}")),
    }
}

/// One line of a recording. `t` is milliseconds since the start.
#[derive(Debug, Deserialize)]
struct RecordedFrame {
    #[serde(default)]
    t: Option<u64>,
    #[serde(flatten)]
    sample: RawSample,
}

/// Runs a JSON-lines recording through a fresh session and writes every
/// emitted event as a JSON line. Blank lines and `#` comments are skipped.
fn replay(input: impl BufRead, settings: Settings, mut out: impl Write) -> Result<usize> {
    let clock = ManualClock::new();
    let mut session = TouchpadSession::with_clock(settings, clock.clone());
    let mut now = 0;
    let mut frames = 0;

    for (lineno, line) in input.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let frame: RecordedFrame = serde_json::from_str(line)
            .map_err(|e| anyhow!("line {}: {e}", lineno + 1))?;
        now = match frame.t {
            Some(t) => t.max(now),
            None if frames == 0 => 0,
            None => now + REPLAY_PERIOD_MS,
        };
        clock.set(now);
        frames += 1;

        for event in session.process(&frame.sample) {
            let line = serde_json::json!({"t": now, "event": event});
            writeln!(out, "{line}")?;
        }
    }
    Ok(frames)
}

fn print_help() {
    println!(
        r#"elantp - ELAN touchpad gesture daemon

USAGE:
  elantp help [command]                   Show general or command-specific help
  elantp start                            Start the daemon
  elantp stop                             Stop the daemon
  elantp status                           Show daemon and engine state
  elantp reload                           Reload active profile
  elantp use <name>                       Switch active profile
  elantp list                             List profiles
  elantp doctor                           Diagnose permissions/devices
  elantp set <knob> <value>               Change a runtime setting
  elantp emit click <left|right|middle>   Emit a mouse click
  elantp emit move <dx> <dy>              Emit relative pointer motion
  elantp emit scroll <steps>              Emit vertical scroll (+/- steps)
  elantp emit key <up|down|left|right|enter>
                                          Emit a key press and release
  elantp replay [--profile FILE] [--rotation DEG] <recording.jsonl>
                                          Run recorded samples through the engine

TIPS:
  - Run in the foreground with: elantp --daemon   (RUST_LOG=debug for detail)
  - Profiles: ~/.config/elantp/profiles
  - Active profile pointer: ~/.config/elantp/active
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "start" => println!("usage: elantp start\nStarts the background daemon."),
        "stop" => println!("usage: elantp stop\nStops the running daemon."),
        "status" => println!(
            "usage: elantp status\nShows active profile, live settings, input source, devices, socket, PID."
        ),
        "reload" => println!(
            "usage: elantp reload\nReloads the current profile; keeps last good on error.\nRuntime knobs are reset to the profile values."
        ),
        "use" => {
            println!("usage: elantp use <name>\nSwitches active profile to <name> and reloads.")
        }
        "list" => println!("usage: elantp list\nLists available profiles and the active one."),
        "doctor" => println!(
            "usage: elantp doctor\nChecks permissions, the configured source and detected multitouch devices."
        ),
        "set" => println!(
            "usage: elantp set <knob> <value>\n\nknobs:\n  rotation         0|90|180|270 (needs rotation_enable; applied after release)\n  rotation_enable  on|off\n  cursor_speed     slow|normal|fast\n  edge_width       surface units\n  one_finger_mode  relative|absolute\n  home_mode        on|off\n  cursor           x,y in screen coordinates"
        ),
        "emit" => println!(
            "usage:\n  elantp emit click <left|right|middle>\n  elantp emit move <dx> <dy>\n  elantp emit scroll <steps>\n  elantp emit key <up|down|left|right|enter>"
        ),
        "replay" => println!(
            "usage: elantp replay [--profile FILE] [--rotation DEG] <recording.jsonl>\n\nEach line is a raw sample, optionally timestamped:\n  {{\"t\": 0, \"count\": 1, \"fingers\": [{{\"x\": 2000, \"y\": 1200}}, {{\"x\": 0, \"y\": 0}}]}}\nWithout \"t\" frames are {REPLAY_PERIOD_MS} ms apart. Events are printed as JSON lines."
        ),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
