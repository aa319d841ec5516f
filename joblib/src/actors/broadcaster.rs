mod actor;
mod messages;

use crate::events::LogEvent;
use crate::stream::LogStream;
use actor::Actor;
use messages::Message;

use tokio::sync::{
    mpsc::{self, UnboundedReceiver},
    oneshot,
};

/// A `Broadcaster` keeps a job's log history and fans every new line out to all subscribers.
///
/// This struct is actually an actor handle. The real work is done in the actor spawned by
/// `BroadcasterHandle::spawn`. Once the output channel closes, `drained_tx` fires: by then every
/// line has been queued on every subscriber's channel.
#[derive(Clone, Debug)]
pub struct BroadcasterHandle {
    sender: mpsc::UnboundedSender<Message>,
}

impl BroadcasterHandle {
    pub fn spawn(
        output_rx: UnboundedReceiver<LogEvent>,
        drained_tx: oneshot::Sender<()>,
        history_limit: Option<usize>,
    ) -> Self {
        let (sender, inbox) = mpsc::unbounded_channel();
        Actor::spawn(inbox, output_rx, drained_tx, history_limit);
        Self { sender }
    }

    /// Subscribe to the full log: buffered history first, then live lines.
    pub fn subscribe(&self) -> LogStream {
        let (subscriber, receiver) = mpsc::unbounded_channel();
        // if the actor is gone the message is dropped with the sender, which ends the stream
        let _ = self.sender.send(Message::Subscribe { subscriber });
        LogStream::new(receiver)
    }
}
