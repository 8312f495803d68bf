use crate::chat::Message;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 256;

/// A row level change, published after the write is committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowChange {
    MessageInserted(Message),
    MessageUpdated(Message),
}

impl RowChange {
    pub fn message(&self) -> &Message {
        match self {
            Self::MessageInserted(message) | Self::MessageUpdated(message) => message,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeFilter {
    All,
    Conversation(Uuid),
}

impl ChangeFilter {
    pub fn matches(&self, change: &RowChange) -> bool {
        match self {
            Self::All => true,
            Self::Conversation(conversation_id) => {
                &change.message().conversation_id == conversation_id
            }
        }
    }
}

/// In process fan-out of message changes. Delivery is best effort: a subscriber that falls
/// more than the channel capacity behind loses the overflow and is not told what it missed.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<RowChange>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }
}

impl ChangeFeed {
    pub fn publish(&self, change: RowChange) {
        //no subscribers is not an error
        let _ = self.sender.send(change);
    }

    pub fn subscribe(&self, filter: ChangeFilter) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
            filter,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Owned by the caller; dropping it (or calling `unsubscribe`) ends delivery.
#[derive(Debug)]
pub struct Subscription {
    receiver: broadcast::Receiver<RowChange>,
    filter: ChangeFilter,
}

impl Subscription {
    /// Next change matching the filter, or `None` once the feed is gone.
    pub async fn recv(&mut self) -> Option<RowChange> {
        loop {
            match self.receiver.recv().await {
                Ok(change) if self.filter.matches(&change) => return Some(change),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Subscription lagged, {} changes skipped", skipped);
                    continue;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn unsubscribe(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn message(conversation_id: Uuid, content: &str) -> Message {
        Message {
            id: Uuid::new_v4(),
            conversation_id,
            sender_id: Uuid::new_v4(),
            content: content.into(),
            created_at: Utc::now(),
            read_at: None,
        }
    }

    #[tokio::test]
    async fn filtered_subscription_only_sees_its_conversation() {
        let feed = ChangeFeed::default();
        let watched = Uuid::new_v4();
        let mut subscription = feed.subscribe(ChangeFilter::Conversation(watched));
        feed.publish(RowChange::MessageInserted(message(Uuid::new_v4(), "elsewhere")));
        feed.publish(RowChange::MessageInserted(message(watched, "hello")));
        let change = subscription.recv().await.unwrap();
        assert_eq!(change.message().content, "hello");
    }

    #[tokio::test]
    async fn unsubscribe_releases_receiver() {
        let feed = ChangeFeed::default();
        let subscription = feed.subscribe(ChangeFilter::All);
        assert_eq!(feed.subscriber_count(), 1);
        subscription.unsubscribe();
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn closed_feed_ends_subscription() {
        let feed = ChangeFeed::default();
        let mut subscription = feed.subscribe(ChangeFilter::All);
        drop(feed);
        assert!(subscription.recv().await.is_none());
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_overflow() {
        let feed = ChangeFeed::default();
        let conversation_id = Uuid::new_v4();
        let mut subscription = feed.subscribe(ChangeFilter::All);
        for i in 0..(CHANNEL_CAPACITY + 10) {
            feed.publish(RowChange::MessageInserted(message(
                conversation_id,
                &i.to_string(),
            )));
        }
        let first = subscription.recv().await.unwrap();
        assert_eq!(first.message().content, "10");
    }
}
