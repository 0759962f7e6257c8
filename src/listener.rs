use crate::models::PipelineEvent;
use tokio::sync::mpsc::UnboundedSender;

/// Receives the outward notifications of one run. Called from the worker
/// task, in the order things happen.
pub trait PipelineListener: Send + Sync {
    fn on_progress(&self, percent: u8);
    fn on_log(&self, line: &str);
    fn on_finished(&self, success: bool, message: &str);
}

/// Forwards notifications into a channel; a dropped receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: UnboundedSender<PipelineEvent>,
}

impl ChannelListener {
    pub fn new(tx: UnboundedSender<PipelineEvent>) -> Self {
        Self { tx }
    }
}

impl PipelineListener for ChannelListener {
    fn on_progress(&self, percent: u8) {
        let _ = self.tx.send(PipelineEvent::Progress(percent));
    }

    fn on_log(&self, line: &str) {
        let _ = self.tx.send(PipelineEvent::Log(line.to_string()));
    }

    fn on_finished(&self, success: bool, message: &str) {
        let _ = self.tx.send(PipelineEvent::Finished {
            success,
            message: message.to_string(),
        });
    }
}
