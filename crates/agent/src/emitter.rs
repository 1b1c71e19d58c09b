//! Stream emitter — the ordered event channel for one request.
//!
//! Wraps the bounded sender with two guarantees the raw channel
//! doesn't give: nothing is sent after a terminal event, and a gone
//! receiver surfaces as [`Cancelled`] so the pipeline can stop doing
//! work nobody will see.

use docloom_core::event::StreamEvent;
use tokio::sync::mpsc;
use tracing::debug;

/// The consumer dropped the receiver; the request is dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

pub struct StreamEmitter {
    tx: mpsc::Sender<StreamEvent>,
    terminated: bool,
}

impl StreamEmitter {
    pub fn new(tx: mpsc::Sender<StreamEvent>) -> Self {
        Self {
            tx,
            terminated: false,
        }
    }

    /// Send one event. Blocks on a full channel (backpressure).
    ///
    /// Events after a terminal one are silently dropped — the sequence
    /// contract is enforced here rather than trusted to every call
    /// site.
    pub async fn emit(&mut self, event: StreamEvent) -> Result<(), Cancelled> {
        if self.terminated {
            debug!(event = event.event_type(), "Dropping event after terminal");
            return Ok(());
        }
        if event.is_terminal() {
            self.terminated = true;
        }
        self.tx.send(event).await.map_err(|_| Cancelled)
    }

    /// Whether a terminal event has been sent.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }
}

/// Encode an event as one JSON line (used for line-delimited wire
/// formats and logs; SSE framing lives in the gateway).
pub fn encode_line(event: &StreamEvent) -> String {
    let mut line = serde_json::to_string(event).unwrap_or_else(|_| String::from("{}"));
    line.push('\n');
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use docloom_core::event::Stage;

    #[tokio::test]
    async fn events_flow_through() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut emitter = StreamEmitter::new(tx);

        emitter
            .emit(StreamEvent::Progress {
                message: "searching".into(),
                stage: Stage::Retrieve,
            })
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "progress");
    }

    #[tokio::test]
    async fn nothing_after_terminal() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut emitter = StreamEmitter::new(tx);

        emitter
            .emit(StreamEvent::Done {
                conversation_id: "c1".into(),
            })
            .await
            .unwrap();
        assert!(emitter.is_terminated());

        // Dropped, not an error
        emitter
            .emit(StreamEvent::AnswerChunk { chunk: "late".into() })
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().event_type(), "done");
        drop(emitter);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn dropped_receiver_is_cancelled() {
        let (tx, rx) = mpsc::channel(8);
        let mut emitter = StreamEmitter::new(tx);
        drop(rx);

        let result = emitter
            .emit(StreamEvent::AnswerChunk { chunk: "x".into() })
            .await;
        assert_eq!(result, Err(Cancelled));
    }

    #[test]
    fn encode_line_is_one_json_object_per_line() {
        let line = encode_line(&StreamEvent::AnswerChunk { chunk: "hi".into() });
        assert!(line.ends_with('\n'));
        assert!(line.starts_with(r#"{"type":"answer_chunk""#));
    }
}
