// GUI file selection. The blocking `rfd` dialog runs on its own worker
// thread and hands its single result back through a one-slot channel,
// then exits; the caller waits with a bounded timeout so a wedged dialog
// never stalls the interactive loop. There is no other shared state and
// nothing to lock.

use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use log::warn;

use crate::error::{Error, Result};

/// First wait for the dialog before fallbacks are offered.
pub const FIRST_WAIT: Duration = Duration::from_secs(20);
/// Extra grace period when the user opts to keep waiting.
pub const EXTENDED_WAIT: Duration = Duration::from_secs(60);

/// One-time startup probe: can a file dialog be shown at all? The result
/// is carried as a flag by the interactive loop instead of probing again
/// per operation.
pub fn picker_available() -> bool {
    if cfg!(any(target_os = "windows", target_os = "macos")) {
        return true;
    }
    std::env::var_os("DISPLAY").is_some() || std::env::var_os("WAYLAND_DISPLAY").is_some()
}

/// Handle to a dialog in flight. The worker produces exactly one value
/// (possibly an empty selection) and exits.
pub struct PendingSelection {
    receiver: mpsc::Receiver<Vec<PathBuf>>,
}

/// Open the multi-file picker on a worker thread. Cancelling the dialog
/// arrives as an empty selection.
pub fn open_picker() -> PendingSelection {
    let (sender, receiver) = mpsc::sync_channel(1);
    thread::spawn(move || {
        let picked = rfd::FileDialog::new()
            .set_title("Select file(s) to upload")
            .pick_files()
            .unwrap_or_default();
        if sender.send(picked).is_err() {
            warn!("file picker result arrived after the caller gave up");
        }
    });
    PendingSelection { receiver }
}

impl PendingSelection {
    /// Wait up to `timeout` for the dialog result. A timeout leaves the
    /// worker running, so a later `wait` can still pick the result up.
    pub fn wait(&self, timeout: Duration) -> Result<Vec<PathBuf>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(paths) => Ok(paths),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(Error::DialogTimeout(timeout.as_secs())),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Error::UserInput(
                "the file dialog closed without a selection; enter the path manually".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_times_out_when_nothing_is_sent() {
        let (_sender, receiver) = mpsc::sync_channel::<Vec<PathBuf>>(1);
        let pending = PendingSelection { receiver };
        match pending.wait(Duration::from_millis(10)) {
            Err(Error::DialogTimeout(_)) => {}
            other => panic!("expected a timeout, got {:?}", other.map(|p| p.len())),
        }
    }

    #[test]
    fn wait_returns_the_single_handoff_value() {
        let (sender, receiver) = mpsc::sync_channel(1);
        let pending = PendingSelection { receiver };
        sender.send(vec![PathBuf::from("/tmp/a.txt")]).unwrap();
        let paths = pending.wait(Duration::from_millis(10)).unwrap();
        assert_eq!(paths, vec![PathBuf::from("/tmp/a.txt")]);
    }

    #[test]
    fn a_dead_worker_is_an_error_not_a_hang() {
        let (sender, receiver) = mpsc::sync_channel::<Vec<PathBuf>>(1);
        let pending = PendingSelection { receiver };
        drop(sender);
        match pending.wait(Duration::from_millis(10)) {
            Err(Error::UserInput(_)) => {}
            other => panic!("expected an input error, got {:?}", other.map(|p| p.len())),
        }
    }
}
