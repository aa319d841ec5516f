use super::messages::Message;
use crate::events::LogEvent;

use std::collections::VecDeque;
use tokio::select;
use tokio::sync::{mpsc, oneshot};

pub struct Actor {
    inbox: mpsc::UnboundedReceiver<Message>,
    output_rx: mpsc::UnboundedReceiver<LogEvent>,
    history: VecDeque<LogEvent>,
    history_limit: Option<usize>,
    subscribers: Vec<mpsc::UnboundedSender<LogEvent>>,
    drained_tx: Option<oneshot::Sender<()>>,
    inbox_open: bool,
    output_pending: bool,
}

impl Actor {
    pub fn spawn(
        inbox: mpsc::UnboundedReceiver<Message>,
        output_rx: mpsc::UnboundedReceiver<LogEvent>,
        drained_tx: oneshot::Sender<()>,
        history_limit: Option<usize>,
    ) {
        let actor = Actor {
            inbox,
            output_rx,
            history: VecDeque::new(),
            history_limit,
            subscribers: Vec::new(),
            drained_tx: Some(drained_tx),
            inbox_open: true,
            output_pending: true,
        };
        tokio::spawn(async move { actor.run().await });
    }

    async fn run(mut self) {
        // keep draining output after the last handle is gone, the worker waits on `drained_tx`
        while self.inbox_open || self.output_pending {
            select! {
                maybe_msg = self.inbox.recv(), if self.inbox_open => {
                    match maybe_msg {
                        Some(Message::Subscribe { subscriber }) => self.subscribe(subscriber),
                        None => self.inbox_open = false,
                    }
                }
                maybe_line = self.output_rx.recv(), if self.output_pending => {
                    match maybe_line {
                        Some(event) => self.publish(event),
                        None => self.finish(),
                    }
                }
            }
        }
    }

    fn publish(&mut self, event: LogEvent) {
        // only retain subscribers who have not dropped
        self.subscribers.retain(|sub| sub.send(event.clone()).is_ok());
        if self.history_limit == Some(0) {
            return;
        }
        if let Some(limit) = self.history_limit {
            while self.history.len() >= limit {
                self.history.pop_front();
            }
        }
        self.history.push_back(event);
    }

    fn finish(&mut self) {
        // dropping the senders ends every subscriber's stream after the lines already queued
        self.subscribers.clear();
        self.output_pending = false;
        if let Some(drained_tx) = self.drained_tx.take() {
            let _ = drained_tx.send(());
        }
    }

    fn subscribe(&mut self, subscriber: mpsc::UnboundedSender<LogEvent>) {
        for event in &self.history {
            if subscriber.send(event.clone()).is_err() {
                return;
            }
        }
        if self.output_pending {
            self.subscribers.push(subscriber);
        }
    }
}
