// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Narration worker: one thread speaks queued status messages in order.
//
// The frame loop only ever calls `enqueue`, which never blocks. Speech
// failures are logged and the next message is spoken as usual.

use std::sync::mpsc;
use std::thread::JoinHandle;

use scanwerk_bridge::SpeechSink;
use scanwerk_core::error::Result;
use tracing::{debug, info, warn};

enum NarrationMessage {
    Say(String),
    Shutdown,
}

/// Handle to the narration thread.
pub struct Narrator {
    sender: Option<mpsc::Sender<NarrationMessage>>,
    worker: Option<JoinHandle<usize>>,
}

impl Narrator {
    /// Start the worker thread speaking through `sink`.
    pub fn spawn(mut sink: Box<dyn SpeechSink>) -> Result<Self> {
        let (sender, receiver) = mpsc::channel::<NarrationMessage>();
        let worker = std::thread::Builder::new()
            .name("narration".into())
            .spawn(move || {
                let mut spoken = 0usize;
                while let Ok(message) = receiver.recv() {
                    match message {
                        NarrationMessage::Say(text) => {
                            if let Err(err) = sink.speak(&text) {
                                warn!(error = %err, "narration failed");
                            }
                            spoken += 1;
                        }
                        NarrationMessage::Shutdown => break,
                    }
                }
                debug!(spoken, "narration worker finished");
                spoken
            })?;

        info!("narration worker started");
        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    /// A narrator that drops everything, for when narration is switched off.
    pub fn silent() -> Self {
        Self {
            sender: None,
            worker: None,
        }
    }

    /// Queue `text` to be spoken after everything already queued.
    pub fn enqueue(&self, text: impl Into<String>) {
        let Some(sender) = &self.sender else {
            return;
        };
        if sender.send(NarrationMessage::Say(text.into())).is_err() {
            warn!("narration worker is gone; message dropped");
        }
    }

    /// Let the queue drain, stop the worker, and return how many messages
    /// it handled.
    pub fn shutdown(mut self) -> usize {
        self.stop()
    }

    fn stop(&mut self) -> usize {
        if let Some(sender) = self.sender.take() {
            // A closed channel means the worker has already exited.
            let _ = sender.send(NarrationMessage::Shutdown);
        }
        match self.worker.take().map(JoinHandle::join) {
            Some(Ok(spoken)) => spoken,
            Some(Err(_)) => {
                warn!("narration worker panicked");
                0
            }
            None => 0,
        }
    }
}

impl Drop for Narrator {
    fn drop(&mut self) {
        self.stop();
    }
}
