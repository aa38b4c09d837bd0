mod tests {
    use std::cell::RefCell;

    use embassy_time::{Duration, Instant};
    use ld_fade::request::{TryReceiveError, TrySendError};
    use ld_fade::{
        ChannelId, FadeChannel, FadeConfig, FadeError, FadePhase, FadeRequest, RequestChannel,
    };

    #[test]
    fn test_fifo_order() {
        let channel: RequestChannel<4> = RequestChannel::new();
        let sender = channel.sender();
        let receiver = channel.receiver();
        assert!(channel.is_empty());

        sender.try_send(FadeRequest::start(0, 10)).unwrap();
        sender.try_send(FadeRequest::Stop).unwrap();
        sender.try_send(FadeRequest::Finish).unwrap();
        assert_eq!(channel.len(), 3);

        assert_eq!(receiver.try_receive(), Ok(FadeRequest::start(0, 10)));
        assert_eq!(receiver.try_receive(), Ok(FadeRequest::Stop));
        assert_eq!(receiver.try_receive(), Ok(FadeRequest::Finish));
        assert_eq!(receiver.try_receive(), Err(TryReceiveError));
    }

    #[test]
    fn test_full_queue() {
        let channel: RequestChannel<2> = RequestChannel::new();
        channel.try_send(FadeRequest::Stop).unwrap();
        channel.try_send(FadeRequest::Stop).unwrap();
        assert_eq!(
            channel.try_send(FadeRequest::Finish),
            Err(TrySendError(FadeRequest::Finish))
        );
        assert_eq!(channel.len(), 2);

        channel.try_receive().unwrap();
        assert!(channel.try_send(FadeRequest::Finish).is_ok());
    }

    #[test]
    fn test_start_request() {
        assert_eq!(
            FadeRequest::start(3, 9),
            FadeRequest::Start {
                delay: Duration::from_millis(0),
                from: 3,
                to: 9,
            }
        );
    }

    #[test]
    fn test_apply_request() {
        let applied = RefCell::new(Vec::new());
        let fade = FadeChannel::new(
            ChannelId(0),
            |_: ChannelId, brightness: u8| {
                applied.borrow_mut().push(brightness);
                Ok::<(), ()>(())
            },
            FadeConfig::default(),
        );
        let now = Instant::from_millis(0);

        fade.apply_request(now, FadeRequest::start(10, 100)).unwrap();
        assert_eq!(fade.state().phase, FadePhase::Scheduled);
        fade.apply_request(now, FadeRequest::Finish).unwrap();
        assert_eq!(*applied.borrow(), [100]);
        assert_eq!(
            fade.apply_request(now, FadeRequest::start(0, 200)),
            Err(FadeError::BrightnessOutOfRange {
                value: 200,
                max: 127
            })
        );
    }

    #[test]
    fn test_drain_requests() {
        let requests: RequestChannel<8> = RequestChannel::new();
        let fade = FadeChannel::new(
            ChannelId(1),
            |_: ChannelId, _: u8| Ok::<(), ()>(()),
            FadeConfig::default(),
        );
        let sender = requests.sender();
        sender
            .try_send(FadeRequest::Start {
                delay: Duration::from_millis(100),
                from: 0,
                to: 128,
            })
            .unwrap();
        sender
            .try_send(FadeRequest::Start {
                delay: Duration::from_millis(100),
                from: 0,
                to: 50,
            })
            .unwrap();

        let rejected = fade.drain_requests(Instant::from_millis(0), &requests.receiver());
        assert_eq!(rejected, 1);
        assert!(requests.is_empty());

        let state = fade.state();
        assert_eq!(state.phase, FadePhase::Scheduled);
        assert_eq!(state.brightness_target, 50);
        assert_eq!(state.next_deadline, Some(Instant::from_millis(100)));

        sender.try_send(FadeRequest::Stop).unwrap();
        assert_eq!(fade.drain_requests(Instant::from_millis(10), &requests.receiver()), 0);
        assert!(!fade.is_active());
    }
}
