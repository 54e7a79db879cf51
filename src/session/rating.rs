use log::{ debug, info };
use std::path::PathBuf;

use super::{ ChatSession, SessionError };
use crate::dataset::Label;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateOutcome {
    /// The rating was recorded and the sample written to `PathBuf`.
    Saved(PathBuf),
    /// An earlier rating for this exchange stands.
    AlreadyRated(bool),
    /// The log is empty; nothing was written.
    NothingToSave,
}

impl ChatSession {
    /// Labels the latest exchange and persists the last messages as a sample.
    ///
    /// The first rating after a reply wins. `rating` is only set once the
    /// sample is on disk, so a failed write can be retried.
    pub async fn rate(&mut self, is_thumbs_up: bool) -> Result<RateOutcome, SessionError> {
        if self.is_streaming() {
            return Err(SessionError::StillStreaming);
        }
        if let Some(existing) = self.rating {
            debug!("Ignoring rating {}; already rated {}", is_thumbs_up, existing);
            return Ok(RateOutcome::AlreadyRated(existing));
        }

        let sample = self.chat_log.tail(self.settings.data_sample_size);
        if sample.is_empty() {
            return Ok(RateOutcome::NothingToSave);
        }

        let label = Label::from_thumbs_up(is_thumbs_up);
        let path = self.dataset.write_sample(label, sample).await?;
        self.rating = Some(is_thumbs_up);
        info!("Rated exchange as {} ({} messages)", label.partition(), sample.len());
        Ok(RateOutcome::Saved(path))
    }

    /// Shows or hides the plain-text transcript. Returns the new visibility.
    pub fn toggle_copy_view(&mut self) -> bool {
        self.is_copying = !self.is_copying;
        self.is_copying
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DatasetError;
    use crate::session::test_support::{ FakeChatClient, RecordingStore };
    use crate::session::SessionSettings;
    use std::sync::Arc;

    fn session_with(store: RecordingStore) -> (ChatSession, Arc<RecordingStore>) {
        let store = Arc::new(store);
        let session = ChatSession::new(
            Arc::new(FakeChatClient::replying(&["Hello", "!"])),
            store.clone(),
            SessionSettings::default()
        );
        (session, store)
    }

    async fn exchange(session: &mut ChatSession, text: &str) {
        session.submit(text).unwrap();
        while session.is_streaming() {
            session.tick().await;
        }
    }

    #[tokio::test]
    async fn test_first_rating_wins() {
        let (mut session, store) = session_with(RecordingStore::default());
        exchange(&mut session, "Hi").await;

        assert!(matches!(session.rate(true).await.unwrap(), RateOutcome::Saved(_)));
        assert_eq!(session.rate(false).await.unwrap(), RateOutcome::AlreadyRated(true));
        assert_eq!(session.rating(), Some(true));

        let samples = store.samples();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].0, Label::Good);
    }

    #[tokio::test]
    async fn test_thumbs_down_writes_bad_sample() {
        let (mut session, store) = session_with(RecordingStore::default());
        exchange(&mut session, "Hi").await;

        session.rate(false).await.unwrap();
        assert_eq!(session.rating(), Some(false));

        let samples = store.samples();
        assert_eq!(samples.len(), 1);
        let (label, messages) = &samples[0];
        assert_eq!(*label, Label::Bad);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "Hi");
        assert_eq!(messages[1].content, "Hello!");
    }

    #[tokio::test]
    async fn test_sample_is_bounded_tail() {
        let (mut session, store) = session_with(RecordingStore::default());
        for i in 0..10 {
            exchange(&mut session, &format!("q{}", i)).await;
        }
        assert_eq!(session.chat_log().len(), 20);

        session.rate(true).await.unwrap();
        let samples = store.samples();
        let messages = &samples[0].1;
        assert_eq!(messages.len(), 6);
        assert_eq!(messages[0].content, "q7");
        assert_eq!(messages[5].content, "Hello!");
    }

    #[tokio::test]
    async fn test_short_log_is_not_padded() {
        let store = Arc::new(RecordingStore::default());
        let mut session = ChatSession::new(
            Arc::new(FakeChatClient::failing_open()),
            store.clone(),
            SessionSettings::default()
        );
        exchange(&mut session, "one").await;
        exchange(&mut session, "two").await;
        assert_eq!(session.chat_log().len(), 4);

        session.rate(true).await.unwrap();
        let samples = store.samples();
        let messages = &samples[0].1;
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].content, "one");
        assert_eq!(messages[3].content, "");
    }

    #[tokio::test]
    async fn test_rating_empty_log_writes_nothing() {
        let (mut session, store) = session_with(RecordingStore::default());
        assert_eq!(session.rate(true).await.unwrap(), RateOutcome::NothingToSave);
        assert_eq!(session.rating(), None);
        assert!(store.samples().is_empty());
    }

    #[tokio::test]
    async fn test_rating_rejected_while_streaming() {
        let (mut session, store) = session_with(RecordingStore::default());
        session.submit("Hi").unwrap();
        assert!(matches!(session.rate(true).await, Err(SessionError::StillStreaming)));
        assert_eq!(session.rating(), None);
        assert!(store.samples().is_empty());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_rating_unset() {
        let (mut session, _) = session_with(RecordingStore::failing());
        exchange(&mut session, "Hi").await;

        let err = session.rate(true).await.unwrap_err();
        assert!(matches!(err, SessionError::Dataset(DatasetError::Io { .. })));
        assert_eq!(session.rating(), None);
    }

    #[tokio::test]
    async fn test_new_exchange_can_be_rated_again() {
        let (mut session, store) = session_with(RecordingStore::default());
        exchange(&mut session, "Hi").await;
        session.rate(true).await.unwrap();

        exchange(&mut session, "Again").await;
        assert_eq!(session.rating(), None);
        session.rate(false).await.unwrap();

        let labels: Vec<Label> = store.samples().into_iter().map(|(l, _)| l).collect();
        assert_eq!(labels, vec![Label::Good, Label::Bad]);
    }

    #[tokio::test]
    async fn test_copy_view_toggles_independently() {
        let (mut session, _) = session_with(RecordingStore::default());
        assert!(!session.is_copying());
        assert!(session.toggle_copy_view());

        session.submit("Hi").unwrap();
        assert!(!session.toggle_copy_view());
        assert!(session.is_streaming());
        assert_eq!(session.rating(), None);
    }
}
