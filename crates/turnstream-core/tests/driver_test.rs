#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;
    use tokio::time::{Duration, timeout};
    use tokio_util::sync::CancellationToken;
    use turnstream_core::Error;
    use turnstream_core::domain::{Role, ToolCallId, ToolCallStatus, TurnOutcome};
    use turnstream_core::protocol::RawEvent;
    use turnstream_core::session::{
        CANCELLED_MESSAGE, STREAM_ENDED_MESSAGE, SessionDriver, TurnHandle,
    };
    use turnstream_core::transport::{
        RawEventStream, ReplayTransport, Transport, TransportError, TurnConfig,
    };

    type Item = Result<RawEvent, TransportError>;

    /// Hands each opened turn a channel the test feeds by hand.
    #[derive(Default)]
    struct ChannelTransport {
        pending: Mutex<VecDeque<mpsc::UnboundedReceiver<Item>>>,
        opened: Mutex<Vec<TurnConfig>>,
    }

    impl ChannelTransport {
        fn next_turn(&self) -> mpsc::UnboundedSender<Item> {
            let (tx, rx) = mpsc::unbounded_channel();
            self.pending.lock().unwrap().push_back(rx);
            tx
        }

        fn opened(&self) -> Vec<TurnConfig> {
            self.opened.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for ChannelTransport {
        fn name(&self) -> &'static str {
            "channel"
        }

        async fn open(
            &self,
            config: TurnConfig,
            _token: CancellationToken,
        ) -> Result<RawEventStream, TransportError> {
            self.opened.lock().unwrap().push(config);
            let rx = self
                .pending
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| TransportError::Stream("no turn prepared".to_string()))?;

            Ok(Box::pin(futures::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            })))
        }
    }

    struct RefusingTransport;

    #[async_trait]
    impl Transport for RefusingTransport {
        fn name(&self) -> &'static str {
            "refusing"
        }

        async fn open(
            &self,
            _config: TurnConfig,
            _token: CancellationToken,
        ) -> Result<RawEventStream, TransportError> {
            Err(TransportError::Status {
                status: 503,
                body: "unavailable".to_string(),
            })
        }
    }

    fn setup() -> (Arc<ChannelTransport>, SessionDriver) {
        let transport = Arc::new(ChannelTransport::default());
        let driver = SessionDriver::spawn(transport.clone());
        (transport, driver)
    }

    fn text(delta: &str) -> Item {
        Ok(RawEvent::new("TEXT_MESSAGE_CONTENT").with_field("delta", delta))
    }

    fn tag(kind: &str) -> Item {
        Ok(RawEvent::new(kind))
    }

    async fn outcome(handle: TurnHandle) -> TurnOutcome {
        timeout(Duration::from_secs(5), handle.outcome())
            .await
            .expect("turn did not resolve in time")
    }

    #[tokio::test]
    async fn test_completed_turn_builds_the_assistant_message() {
        let (transport, driver) = setup();
        let wire = transport.next_turn();

        let handle = driver.submit_user_input("  What is 2+2?  ").await.unwrap();
        let turn_id = handle.turn_id().clone();
        wire.send(tag("RUN_STARTED")).unwrap();
        wire.send(text("Hel")).unwrap();
        wire.send(text("lo")).unwrap();
        wire.send(tag("RUN_FINISHED")).unwrap();

        assert_eq!(outcome(handle).await, TurnOutcome::Completed);

        let state = driver.snapshot().await.unwrap();
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[0].role, Role::User);
        assert_eq!(state.messages[0].content, "What is 2+2?");
        assert_eq!(state.messages[1].content, "Hello");
        assert!(!state.messages[1].streaming);
        assert!(!state.loading);
        assert_eq!(state.turn.as_ref().unwrap().id, turn_id);

        let opened = transport.opened();
        assert_eq!(opened.len(), 1);
        assert_eq!(opened[0].turn_id, turn_id);
        assert_eq!(opened[0].thread_id, state.thread_id);
        let request = opened[0].run_request();
        assert_eq!(request.run_id, turn_id.0);
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].content, "What is 2+2?");
    }

    #[tokio::test]
    async fn test_blank_input_is_rejected_without_state_change() {
        let (transport, driver) = setup();

        let err = driver.submit_user_input(" \n\t ").await.unwrap_err();

        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(driver.snapshot().await.unwrap().messages.is_empty());
        assert!(transport.opened().is_empty());
    }

    #[tokio::test]
    async fn test_second_submit_while_active_conflicts() {
        let (transport, driver) = setup();
        let wire = transport.next_turn();
        let handle = driver.submit_user_input("first").await.unwrap();

        let err = driver.submit_user_input("second").await.unwrap_err();

        assert!(matches!(err, Error::Conflict(_)));
        let state = driver.snapshot().await.unwrap();
        assert_eq!(state.messages.len(), 2);
        assert_eq!(transport.opened().len(), 1);

        wire.send(tag("RUN_FINISHED")).unwrap();
        assert_eq!(outcome(handle).await, TurnOutcome::Completed);

        // Free again once the first turn resolved.
        let _wire = transport.next_turn();
        assert!(driver.submit_user_input("second").await.is_ok());
    }

    #[tokio::test]
    async fn test_transport_error_fails_the_turn() {
        let (transport, driver) = setup();
        let wire = transport.next_turn();
        let handle = driver.submit_user_input("hi").await.unwrap();

        wire.send(text("partial")).unwrap();
        wire.send(Err(TransportError::Stream("connection reset".to_string())))
            .unwrap();

        let TurnOutcome::Failed { message } = outcome(handle).await else {
            panic!("expected a failed turn");
        };
        assert!(message.starts_with("Transport failure:"), "{message}");
        assert!(message.contains("connection reset"), "{message}");

        let state = driver.snapshot().await.unwrap();
        assert_eq!(state.error.as_deref(), Some(message.as_str()));
        let assistant = state.last_assistant_message().unwrap();
        assert_eq!(assistant.content, "partial");
        assert!(!assistant.streaming);
    }

    #[tokio::test]
    async fn test_stream_ending_without_terminal_event_fails_the_turn() {
        let (transport, driver) = setup();
        let wire = transport.next_turn();
        let handle = driver.submit_user_input("hi").await.unwrap();

        wire.send(text("cut off")).unwrap();
        drop(wire);

        assert_eq!(
            outcome(handle).await,
            TurnOutcome::Failed {
                message: STREAM_ENDED_MESSAGE.to_string()
            }
        );
        assert!(!driver.snapshot().await.unwrap().loading);
    }

    #[tokio::test]
    async fn test_open_failure_fails_the_turn() {
        let driver = SessionDriver::spawn(Arc::new(RefusingTransport));

        let handle = driver.submit_user_input("hi").await.unwrap();

        let TurnOutcome::Failed { message } = outcome(handle).await else {
            panic!("expected a failed turn");
        };
        assert!(message.contains("503"), "{message}");
        assert!(!driver.snapshot().await.unwrap().is_turn_active());
    }

    #[tokio::test]
    async fn test_cancel_turn_resolves_cancelled() {
        let (transport, driver) = setup();
        let mut sub = driver.subscribe().await.unwrap();
        let wire = transport.next_turn();
        let handle = driver.submit_user_input("hi").await.unwrap();
        wire.send(text("so far")).unwrap();

        // Submission, then the delta.
        for _ in 0..2 {
            timeout(Duration::from_secs(5), sub.recv()).await.unwrap();
        }

        assert!(driver.cancel_turn().await.unwrap());
        assert_eq!(outcome(handle).await, TurnOutcome::Cancelled);

        let state = driver.snapshot().await.unwrap();
        assert_eq!(state.error.as_deref(), Some(CANCELLED_MESSAGE));
        let assistant = state.last_assistant_message().unwrap();
        assert_eq!(assistant.content, "so far");
        assert!(!assistant.streaming);

        assert!(!driver.cancel_turn().await.unwrap());
    }

    #[tokio::test]
    async fn test_events_after_reset_are_discarded() {
        let (transport, driver) = setup();
        let wire = transport.next_turn();
        let handle = driver.submit_user_input("hi").await.unwrap();
        let old_thread = driver.snapshot().await.unwrap().thread_id.clone();

        let new_thread = driver.reset_thread().await.unwrap();
        assert_eq!(outcome(handle).await, TurnOutcome::Cancelled);
        assert_ne!(new_thread, old_thread);

        // The superseded turn's stream keeps talking; nothing lands.
        let _ = wire.send(text("stale"));
        let _ = wire.send(tag("RUN_FINISHED"));
        tokio::time::sleep(Duration::from_millis(50)).await;

        let state = driver.snapshot().await.unwrap();
        assert_eq!(state.thread_id, new_thread);
        assert!(state.messages.is_empty());
        assert!(state.turn.is_none());
        assert_eq!(state.error, None);
    }

    #[tokio::test]
    async fn test_one_snapshot_per_processed_event() {
        let (transport, driver) = setup();
        let mut sub = driver.subscribe().await.unwrap();
        let wire = transport.next_turn();

        let handle = driver.submit_user_input("hi").await.unwrap();
        wire.send(tag("RUN_STARTED")).unwrap();
        // Dropped by the normalizer, so never published.
        wire.send(tag("TEXT_MESSAGE_START")).unwrap();
        wire.send(text("Hi")).unwrap();
        wire.send(tag("RUN_FINISHED")).unwrap();
        assert_eq!(outcome(handle).await, TurnOutcome::Completed);

        let mut envelopes = Vec::new();
        while let Ok(envelope) = sub.rx.try_recv() {
            envelopes.push(envelope);
        }

        let seqs: Vec<_> = envelopes.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4]);
        assert!(envelopes[0].state.loading);
        assert_eq!(envelopes[2].state.messages[1].content, "Hi");
        assert!(!envelopes[3].state.loading);
    }

    #[tokio::test]
    async fn test_error_persists_until_cleared() {
        let (transport, driver) = setup();
        let wire = transport.next_turn();
        let handle = driver.submit_user_input("hi").await.unwrap();
        wire.send(Ok(RawEvent::new("RUN_ERROR").with_field("message", "boom")))
            .unwrap();
        assert_eq!(
            outcome(handle).await,
            TurnOutcome::Failed {
                message: "boom".to_string()
            }
        );

        let wire = transport.next_turn();
        let handle = driver.submit_user_input("again").await.unwrap();
        assert_eq!(
            driver.snapshot().await.unwrap().error.as_deref(),
            Some("boom")
        );
        wire.send(tag("RUN_FINISHED")).unwrap();
        assert_eq!(outcome(handle).await, TurnOutcome::Completed);

        driver.clear_error().await.unwrap();
        assert_eq!(driver.snapshot().await.unwrap().error, None);
    }

    #[tokio::test]
    async fn test_recorded_turn_replays_through_the_driver() {
        let path = concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/calculator_turn.jsonl"
        );
        let transport = ReplayTransport::from_jsonl(path).unwrap();
        let driver = SessionDriver::spawn(Arc::new(transport));

        let handle = driver.submit_user_input("What is 2+2?").await.unwrap();
        assert_eq!(outcome(handle).await, TurnOutcome::Completed);

        let state = driver.snapshot().await.unwrap();
        let assistant = state.last_assistant_message().unwrap();
        assert_eq!(assistant.content, "2 + 2 = 4");
        assert_eq!(
            assistant.reasoning_text(),
            "The user wants 2+2. I'll use the calculator."
        );
        let call = state
            .tool_calls
            .get(&ToolCallId::from_string("call_1"))
            .unwrap();
        assert_eq!(call.status, ToolCallStatus::Completed);
        assert_eq!(call.result.as_deref(), Some("4"));
    }

    #[tokio::test]
    async fn test_outcome_is_cancelled_when_driver_shuts_down() {
        let (transport, driver) = setup();
        let _wire = transport.next_turn();
        let handle = driver.submit_user_input("hi").await.unwrap();

        driver.shutdown();

        assert_eq!(outcome(handle).await, TurnOutcome::Cancelled);
        assert!(matches!(
            driver.snapshot().await,
            Err(Error::DriverStopped)
        ));
    }
}
