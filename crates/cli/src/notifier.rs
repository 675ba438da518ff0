use std::process::Command;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};

/// Engagement edge, tagged with the frame it was detected on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Notification {
    Started { frame: usize },
    Ended { frame: usize },
}

impl Notification {
    fn name(&self) -> &'static str {
        match self {
            Notification::Started { .. } => "start",
            Notification::Ended { .. } => "end",
        }
    }

    fn frame(&self) -> usize {
        match self {
            Notification::Started { frame } | Notification::Ended { frame } => *frame,
        }
    }
}

/// Shell commands run for each edge; `None` only logs.
#[derive(Clone, Debug, Default)]
pub struct Hooks {
    pub on_start: Option<String>,
    pub on_end: Option<String>,
}

/// Background sink for engagement events.
///
/// Detector callbacks only enqueue; logging and hook execution happen on a
/// dedicated thread so frame processing never waits on a child process.
pub struct Notifier {
    tx: Sender<Notification>,
    handle: JoinHandle<usize>,
}

impl Notifier {
    pub fn spawn(hooks: Hooks) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = std::thread::spawn(move || run(rx, &hooks));
        Self { tx, handle }
    }

    /// Handle for a detector callback.
    pub fn sender(&self) -> Sender<Notification> {
        self.tx.clone()
    }

    /// Drain pending events, stop the thread and return how many were handled.
    ///
    /// Every sender handed out must be dropped first, or this blocks.
    pub fn shutdown(self) -> usize {
        drop(self.tx);
        match self.handle.join() {
            Ok(handled) => handled,
            Err(_) => {
                log::error!("notifier thread panicked");
                0
            }
        }
    }
}

fn run(rx: Receiver<Notification>, hooks: &Hooks) -> usize {
    let mut handled = 0;
    for event in rx {
        log::info!("gaze {} at frame {}", event.name(), event.frame());
        let hook = match event {
            Notification::Started { .. } => hooks.on_start.as_deref(),
            Notification::Ended { .. } => hooks.on_end.as_deref(),
        };
        if let Some(command) = hook {
            run_hook(command, &event);
        }
        handled += 1;
    }
    handled
}

fn run_hook(command: &str, event: &Notification) {
    let status = Command::new("sh")
        .arg("-c")
        .arg(command)
        .env("GAZE_EVENT", event.name())
        .env("GAZE_FRAME", event.frame().to_string())
        .status();
    match status {
        Ok(s) if s.success() => log::debug!("{} hook finished", event.name()),
        Ok(s) => log::warn!("{} hook exited with {s}", event.name()),
        Err(e) => log::warn!("{} hook could not run: {e}", event.name()),
    }
}
