//! mpv backend
//!
//! Each camera gets its own mpv process embedded into the camera's surface
//! with `--wid`. Geometry and stream changes go over mpv's JSON IPC socket so
//! a resize never restarts the process.

use serde_json::{Value, json};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

use super::{Attachment, Player, Stream};
use crate::config::{PlayerConfig, WindowConfig};
use crate::error::PlayerError;
use crate::layout::{Rect, Size};

/// How often to look for the IPC socket while mpv starts up
const READY_POLL: Duration = Duration::from_millis(50);

/// mpv process rendering one camera
///
/// Keeps the default no-op `redraw`: mpv owns its child window and repaints
/// it on expose by itself.
pub struct MpvPlayer {
    surface: u32,
    main_url: String,
    sub_url: Option<String>,
    socket_path: PathBuf,
    child: Option<Child>,
    ipc: Option<UnixStream>,
    /// Url currently loaded, if any
    loaded: Option<String>,
}

impl MpvPlayer {
    /// Start mpv inside `surface` and wait until its IPC socket accepts commands
    pub fn spawn(
        surface: u32,
        window: &WindowConfig,
        player: &PlayerConfig,
    ) -> Result<Self, PlayerError> {
        let socket_path = socket_path(surface);
        let _ = std::fs::remove_file(&socket_path);

        let args = command_args(surface, &socket_path, window, player);
        debug!("Spawning {} {:?}", player.binary, args);

        let mut child = Command::new(&player.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| PlayerError::Spawn {
                binary: player.binary.clone(),
                source,
            })?;

        let ipc = match wait_for_socket(&mut child, &socket_path, player.startup_timeout_ms) {
            Ok(stream) => stream,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                let _ = std::fs::remove_file(&socket_path);
                return Err(e);
            }
        };

        spawn_reply_drain(surface, &ipc)?;
        info!("Player for surface {} ready (pid {})", surface, child.id());

        let mut player = Self {
            surface,
            main_url: window.main.clone(),
            sub_url: window.sub.clone(),
            socket_path,
            child: Some(child),
            ipc: Some(ipc),
            loaded: None,
        };
        player.send(&json!({ "command": ["disable_event", "all"] }))?;
        Ok(player)
    }

    fn send(&mut self, command: &Value) -> Result<(), PlayerError> {
        let Some(ipc) = self.ipc.as_mut() else {
            return Ok(());
        };
        let mut line = serde_json::to_vec(command).map_err(std::io::Error::from)?;
        line.push(b'\n');
        ipc.write_all(&line)?;
        Ok(())
    }

    fn url_for(&self, stream: Stream) -> &str {
        match stream {
            Stream::Main => &self.main_url,
            Stream::Sub => self.sub_url.as_deref().unwrap_or(&self.main_url),
        }
    }
}

impl Player for MpvPlayer {
    fn attach(&mut self, attachment: &Attachment) -> Result<(), PlayerError> {
        let mut commands = geometry_commands(attachment);

        let url = self.url_for(attachment.stream).to_string();
        if self.loaded.as_deref() != Some(url.as_str()) {
            debug!("Surface {} loading {:?} stream", self.surface, attachment.stream);
            commands.push(json!({ "command": ["loadfile", url, "replace"] }));
            self.loaded = Some(url);
        }

        for command in &commands {
            self.send(command)?;
        }
        Ok(())
    }

    fn release(&mut self) {
        if self.ipc.is_some() {
            if let Err(e) = self.send(&json!({ "command": ["quit"] })) {
                trace!("Player {} quit request failed: {}", self.surface, e);
            }
        }
        self.ipc = None;

        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
            debug!("Player for surface {} stopped", self.surface);
        }

        let _ = std::fs::remove_file(&self.socket_path);
    }
}

impl Drop for MpvPlayer {
    fn drop(&mut self) {
        self.release();
    }
}

fn socket_path(surface: u32) -> PathBuf {
    let runtime_dir = dirs::runtime_dir().unwrap_or_else(std::env::temp_dir);
    runtime_dir.join(format!(
        "x-ipc-viewer-{}-{}.sock",
        std::process::id(),
        surface
    ))
}

fn command_args(
    surface: u32,
    socket_path: &std::path::Path,
    window: &WindowConfig,
    player: &PlayerConfig,
) -> Vec<String> {
    let mut args = vec![
        format!("--wid={}", surface),
        format!("--input-ipc-server={}", socket_path.display()),
        "--idle=yes".to_string(),
        "--force-window=yes".to_string(),
        "--really-quiet".to_string(),
        "--no-osc".to_string(),
        "--osd-level=0".to_string(),
        "--input-default-bindings=no".to_string(),
        "--input-vo-keyboard=no".to_string(),
        "--input-cursor=no".to_string(),
        "--cursor-autohide=no".to_string(),
    ];

    if player.gpu {
        args.push("--vo=gpu".to_string());
        args.push("--hwdec=auto".to_string());
    } else {
        args.push("--vo=x11".to_string());
        args.push("--hwdec=no".to_string());
    }

    if window.low_latency {
        args.push("--profile=low-latency".to_string());
        args.push("--untimed".to_string());
    }

    args.extend(window.flags.iter().cloned());
    args
}

/// Property updates placing the active stream inside its region
fn geometry_commands(attachment: &Attachment) -> Vec<Value> {
    let (left, right, top, bottom) = margin_ratios(attachment.active_rect(), attachment.size);
    vec![
        json!({ "command": ["set_property", "background-color", format!("#{:06x}", attachment.background & 0xffffff)] }),
        json!({ "command": ["set_property", "video-margin-ratio-left", left] }),
        json!({ "command": ["set_property", "video-margin-ratio-right", right] }),
        json!({ "command": ["set_property", "video-margin-ratio-top", top] }),
        json!({ "command": ["set_property", "video-margin-ratio-bottom", bottom] }),
    ]
}

/// Fraction of the surface left free on each side of `rect`
fn margin_ratios(rect: Rect, size: Size) -> (f64, f64, f64, f64) {
    if size.width == 0 || size.height == 0 || rect.is_empty() {
        return (0.0, 0.0, 0.0, 0.0);
    }
    let w = size.width as f64;
    let h = size.height as f64;
    let left = rect.x as f64 / w;
    let top = rect.y as f64 / h;
    let right = (w - rect.x as f64 - rect.width as f64) / w;
    let bottom = (h - rect.y as f64 - rect.height as f64) / h;
    (
        left.clamp(0.0, 1.0),
        right.clamp(0.0, 1.0),
        top.clamp(0.0, 1.0),
        bottom.clamp(0.0, 1.0),
    )
}

fn wait_for_socket(
    child: &mut Child,
    socket_path: &std::path::Path,
    timeout_ms: u64,
) -> Result<UnixStream, PlayerError> {
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        if let Ok(stream) = UnixStream::connect(socket_path) {
            return Ok(stream);
        }
        if let Some(status) = child.try_wait()? {
            return Err(PlayerError::Ipc(std::io::Error::other(format!(
                "player exited during startup ({})",
                status
            ))));
        }
        if Instant::now() >= deadline {
            return Err(PlayerError::Timeout(timeout_ms));
        }
        std::thread::sleep(READY_POLL);
    }
}

/// mpv answers every command; read the replies so its socket never fills up
fn spawn_reply_drain(surface: u32, ipc: &UnixStream) -> Result<(), PlayerError> {
    let reader = ipc.try_clone()?;
    std::thread::Builder::new()
        .name(format!("mpv-ipc-{}", surface))
        .spawn(move || {
            for line in BufReader::new(reader).lines() {
                match line {
                    Ok(line) => trace!("mpv[{}]: {}", surface, line),
                    Err(e) => {
                        warn!("mpv[{}] ipc read failed: {}", surface, e);
                        break;
                    }
                }
            }
            trace!("mpv[{}] ipc closed", surface);
        })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(stream: Stream) -> Attachment {
        Attachment {
            surface: 42,
            size: Size::new(800, 600),
            main: Rect::new(0, 0, 800, 600),
            sub: Rect::new(200, 150, 400, 300),
            background: 0x102030,
            stream,
        }
    }

    #[test]
    fn test_command_args() {
        let window = WindowConfig {
            main: "rtsp://cam/main".into(),
            flags: vec!["--no-audio".into()],
            low_latency: true,
            ..Default::default()
        };
        let player = PlayerConfig {
            gpu: true,
            ..Default::default()
        };
        let args = command_args(42, std::path::Path::new("/tmp/s.sock"), &window, &player);

        assert_eq!(args[0], "--wid=42");
        assert_eq!(args[1], "--input-ipc-server=/tmp/s.sock");
        assert!(args.contains(&"--hwdec=auto".to_string()));
        assert!(args.contains(&"--profile=low-latency".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("--no-audio"));
    }

    #[test]
    fn test_cpu_output() {
        let args = command_args(
            1,
            std::path::Path::new("/tmp/s.sock"),
            &WindowConfig::default(),
            &PlayerConfig::default(),
        );
        assert!(args.contains(&"--vo=x11".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("--profile")));
    }

    #[test]
    fn test_margin_ratios() {
        let a = attachment(Stream::Sub);
        assert_eq!(margin_ratios(a.active_rect(), a.size), (0.25, 0.25, 0.25, 0.25));

        let a = attachment(Stream::Main);
        assert_eq!(margin_ratios(a.active_rect(), a.size), (0.0, 0.0, 0.0, 0.0));

        assert_eq!(
            margin_ratios(Rect::new(0, 0, 10, 10), Size::new(0, 0)),
            (0.0, 0.0, 0.0, 0.0)
        );
    }

    #[test]
    fn test_geometry_commands_background() {
        let commands = geometry_commands(&attachment(Stream::Main));
        assert_eq!(commands.len(), 5);
        assert_eq!(commands[0]["command"][2], "#102030");
    }

    #[test]
    fn test_spawn_missing_binary() {
        let player = PlayerConfig {
            binary: "/nonexistent/x-ipc-viewer-player".into(),
            ..Default::default()
        };
        let result = MpvPlayer::spawn(7, &WindowConfig::default(), &player);
        assert!(matches!(result, Err(PlayerError::Spawn { .. })));
    }
}
