// Events module
// Progress updates emitted by the pipeline

use serde::Serialize;
use tokio::sync::mpsc::Sender;

/// Progress update sent to whoever drives the pipeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ProgressUpdate {
    /// Run started
    Started { items: usize },
    /// Processing of a news item began
    NewsItem { id: u32, total: usize },
    /// A segment for this chunk is ready
    ChunkReady { news_id: u32, chunk: u32 },
    /// The chunk was dropped, the run continues
    ChunkSkipped {
        news_id: u32,
        chunk: u32,
        reason: String,
    },
    /// Building the single narration track
    MixingNarration,
    /// Handing segments to the encoder
    Exporting { segments: usize },
    /// Run finished
    Finished,
}

/// Send a progress update if anyone listens
pub async fn send_progress(sender: &Option<Sender<ProgressUpdate>>, update: ProgressUpdate) {
    if let Some(sender) = sender {
        let _ = sender.send(update).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_send_without_listener_is_noop() {
        tokio_test::block_on(send_progress(&None, ProgressUpdate::Finished));
    }

    #[test]
    fn test_updates_delivered_in_order() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = Some(tx);
        tokio_test::block_on(async {
            send_progress(&sender, ProgressUpdate::Started { items: 2 }).await;
            send_progress(&sender, ProgressUpdate::Finished).await;
        });
        assert_eq!(rx.try_recv().unwrap(), ProgressUpdate::Started { items: 2 });
        assert_eq!(rx.try_recv().unwrap(), ProgressUpdate::Finished);
    }

    #[test]
    fn test_closed_channel_is_ignored() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        tokio_test::block_on(send_progress(&Some(tx), ProgressUpdate::MixingNarration));
    }
}
