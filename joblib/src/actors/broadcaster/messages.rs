use crate::events::LogEvent;
use tokio::sync::mpsc;

#[derive(Debug)]
pub enum Message {
    Subscribe {
        subscriber: mpsc::UnboundedSender<LogEvent>,
    },
}
