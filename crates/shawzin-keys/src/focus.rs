//! Target window tracking
//!
//! Key events are only sent while the game window has input focus. The
//! window system is queried on every check; nothing is cached between
//! calls because the user can switch windows at any time.

use crate::error::{Error, Result};
use std::path::PathBuf;
use std::process::Command;

/// Opaque window identity as reported by the window system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(pub u64);

impl std::fmt::Display for WindowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Host window system operations
pub trait WindowSystem: Send {
    /// Find a window whose title contains `title`
    fn find_window(&self, title: &str) -> Result<Option<WindowId>>;

    /// Window that currently has input focus
    fn focused_window(&self) -> Result<Option<WindowId>>;

    /// Raise and focus a window
    fn activate(&self, window: WindowId) -> Result<()>;
}

/// Window system access through the `xdotool` command (X11)
pub struct XdotoolWindows {
    xdotool: PathBuf,
}

impl XdotoolWindows {
    /// Locate `xdotool` in PATH
    pub fn new() -> Result<Self> {
        let xdotool = which::which("xdotool").map_err(|e| {
            Error::Window(format!("xdotool not found in PATH ({}). Please install xdotool.", e))
        })?;
        log::debug!("Using xdotool: {}", xdotool.display());
        Ok(Self { xdotool })
    }

    fn run(&self, args: &[&str]) -> Result<Option<String>> {
        let output = Command::new(&self.xdotool).args(args).output()?;
        if !output.status.success() {
            // xdotool exits with 1 when a search matches nothing
            log::debug!(
                "xdotool {:?} exited with {:?}: {}",
                args,
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()))
    }
}

impl WindowSystem for XdotoolWindows {
    fn find_window(&self, title: &str) -> Result<Option<WindowId>> {
        match self.run(&["search", "--name", title])? {
            Some(stdout) => Ok(parse_window_ids(&stdout).into_iter().next()),
            None => Ok(None),
        }
    }

    fn focused_window(&self) -> Result<Option<WindowId>> {
        match self.run(&["getactivewindow"])? {
            Some(stdout) => Ok(parse_window_ids(&stdout).into_iter().next()),
            None => Ok(None),
        }
    }

    fn activate(&self, window: WindowId) -> Result<()> {
        let id = window.0.to_string();
        match self.run(&["windowactivate", "--sync", &id])? {
            Some(_) => Ok(()),
            None => Err(Error::Window(format!("failed to activate window {}", window))),
        }
    }
}

/// Parse the decimal window ids xdotool prints, one per line
pub fn parse_window_ids(stdout: &str) -> Vec<WindowId> {
    stdout
        .lines()
        .filter_map(|line| line.trim().parse::<u64>().ok())
        .map(WindowId)
        .collect()
}

/// Window system for hosts without a focus query: every window is focused
pub struct UncheckedWindows;

impl WindowSystem for UncheckedWindows {
    fn find_window(&self, _title: &str) -> Result<Option<WindowId>> {
        Ok(Some(WindowId(0)))
    }

    fn focused_window(&self) -> Result<Option<WindowId>> {
        Ok(Some(WindowId(0)))
    }

    fn activate(&self, _window: WindowId) -> Result<()> {
        Ok(())
    }
}

/// Answers whether the captured target window has focus
pub struct FocusGate {
    windows: Box<dyn WindowSystem>,
    target: Option<WindowId>,
}

impl FocusGate {
    pub fn new(windows: Box<dyn WindowSystem>) -> Self {
        Self { windows, target: None }
    }

    /// Captured target window
    pub fn target(&self) -> Option<WindowId> {
        self.target
    }

    /// Capture a target window
    pub fn set_target(&mut self, window: WindowId) {
        self.target = Some(window);
    }

    /// Forget the target window
    pub fn clear_target(&mut self) {
        self.target = None;
    }

    /// Find a window by title
    pub fn find(&self, title: &str) -> Result<WindowId> {
        self.windows
            .find_window(title)?
            .ok_or_else(|| Error::WindowNotFound(title.to_string()))
    }

    /// Bring a window to the front
    pub fn activate(&self, window: WindowId) -> Result<()> {
        self.windows.activate(window)
    }

    /// Whether the target window currently has input focus
    ///
    /// A failing window query counts as "not focused".
    pub fn is_target_focused(&self) -> bool {
        let Some(target) = self.target else {
            return false;
        };
        match self.windows.focused_window() {
            Ok(focused) => focused == Some(target),
            Err(e) => {
                log::warn!("Focus query failed: {}", e);
                false
            }
        }
    }
}

/// Window system with a scriptable focused window
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct FakeWindows {
    pub windows: std::sync::Arc<std::sync::Mutex<Vec<(String, WindowId)>>>,
    pub focused: std::sync::Arc<std::sync::Mutex<Option<WindowId>>>,
}

#[cfg(test)]
impl FakeWindows {
    pub fn with_window(title: &str, id: u64) -> Self {
        let fake = Self::default();
        fake.windows.lock().unwrap().push((title.to_string(), WindowId(id)));
        fake
    }

    pub fn focus(&self, window: Option<WindowId>) {
        *self.focused.lock().unwrap() = window;
    }
}

#[cfg(test)]
impl WindowSystem for FakeWindows {
    fn find_window(&self, title: &str) -> Result<Option<WindowId>> {
        Ok(self
            .windows
            .lock()
            .unwrap()
            .iter()
            .find(|(t, _)| t.contains(title))
            .map(|(_, id)| *id))
    }

    fn focused_window(&self) -> Result<Option<WindowId>> {
        Ok(*self.focused.lock().unwrap())
    }

    fn activate(&self, window: WindowId) -> Result<()> {
        self.focus(Some(window));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_window_ids() {
        assert_eq!(
            parse_window_ids("Defaulting to search window name\n62914561\n 71303174 \n"),
            vec![WindowId(62914561), WindowId(71303174)]
        );
        assert!(parse_window_ids("").is_empty());
    }

    #[test]
    fn test_no_target_is_unfocused() {
        let gate = FocusGate::new(Box::new(UncheckedWindows));
        assert!(!gate.is_target_focused());
    }

    #[test]
    fn test_focus_follows_window_system() {
        let fake = FakeWindows::with_window("Warframe", 7);
        let mut gate = FocusGate::new(Box::new(fake.clone()));
        let target = gate.find("Warframe").unwrap();
        gate.set_target(target);

        fake.focus(Some(WindowId(3)));
        assert!(!gate.is_target_focused());

        fake.focus(Some(WindowId(7)));
        assert!(gate.is_target_focused());

        gate.clear_target();
        assert!(!gate.is_target_focused());
    }

    #[test]
    fn test_missing_window() {
        let gate = FocusGate::new(Box::new(FakeWindows::default()));
        assert!(matches!(gate.find("Warframe"), Err(Error::WindowNotFound(_))));
    }

    #[test]
    fn test_activate_focuses() {
        let fake = FakeWindows::with_window("Warframe", 9);
        let mut gate = FocusGate::new(Box::new(fake));
        let target = gate.find("Warframe").unwrap();
        gate.set_target(target);
        gate.activate(target).unwrap();
        assert!(gate.is_target_focused());
    }
}
