mod tests {
    use std::cell::RefCell;

    use embassy_futures::block_on;
    use embassy_futures::select::select;
    use embassy_time::{Duration, Instant, Timer};
    use ld_fade::scheduler::{run, run_with_requests, tick};
    use ld_fade::{ChannelId, FadeChannel, FadeConfig, FadeRequest, RequestChannel, TickResult};

    /// Sleep until `channel` is idle, giving up after two seconds
    async fn wait_idle<S: ld_fade::BrightnessSetter>(channel: &FadeChannel<S>) {
        let give_up = Instant::now() + Duration::from_secs(2);
        while channel.is_active() && Instant::now() < give_up {
            Timer::after_millis(5).await;
        }
    }

    #[test]
    fn test_tick_idle() {
        let channel = FadeChannel::new(
            ChannelId(0),
            |_: ChannelId, _: u8| Ok::<(), ()>(()),
            FadeConfig::default(),
        );
        assert_eq!(
            tick(&channel, Instant::from_millis(0)),
            TickResult {
                next_deadline: None,
                sleep_duration: None,
            }
        );
    }

    #[test]
    fn test_tick_sleep_duration() {
        let applied = RefCell::new(Vec::new());
        let channel = FadeChannel::new(
            ChannelId(0),
            |_: ChannelId, brightness: u8| {
                applied.borrow_mut().push(brightness);
                Ok::<(), ()>(())
            },
            FadeConfig::default(),
        );
        channel
            .start_delayed(Instant::from_millis(0), Duration::from_millis(0), 10, 100)
            .unwrap();

        let result = tick(&channel, Instant::from_millis(0));
        assert_eq!(result.next_deadline, Some(Instant::from_millis(14)));
        assert_eq!(result.sleep_duration, Some(Duration::from_millis(14)));
        assert!(applied.borrow().is_empty());

        // 6 ms late, still on schedule
        let result = tick(&channel, Instant::from_millis(20));
        assert_eq!(result.next_deadline, Some(Instant::from_millis(27)));
        assert_eq!(result.sleep_duration, Some(Duration::from_millis(7)));
        assert_eq!(*applied.borrow(), [11]);
    }

    #[test]
    fn test_tick_until_idle() {
        let applied = RefCell::new(Vec::new());
        let channel = FadeChannel::new(
            ChannelId(3),
            |_: ChannelId, brightness: u8| {
                applied.borrow_mut().push(brightness);
                Ok::<(), ()>(())
            },
            FadeConfig::default(),
        );
        channel
            .start_delayed(Instant::from_millis(0), Duration::from_millis(0), 127, 0)
            .unwrap();

        let mut now = Instant::from_millis(0);
        let mut ticks = 0;
        loop {
            let result = tick(&channel, now);
            ticks += 1;
            match result.sleep_duration {
                Some(duration) => now += duration,
                None => break,
            }
        }

        assert_eq!(now, Instant::from_millis(400));
        assert_eq!(ticks, 31);
        assert_eq!(applied.borrow().len(), 30);
        assert_eq!(applied.borrow().last(), Some(&0));
        assert!(!channel.is_active());
    }

    #[test]
    fn test_run_completes_fade() {
        let applied = RefCell::new(Vec::new());
        let channel = FadeChannel::new(
            ChannelId(0),
            |_: ChannelId, brightness: u8| {
                applied.borrow_mut().push(brightness);
                Ok::<(), ()>(())
            },
            FadeConfig::default(),
        );
        let started = Instant::now();
        channel
            .start_delayed(started, Duration::from_millis(0), 8, 127)
            .unwrap();

        block_on(select(run(&channel), wait_idle(&channel)));

        assert!(!channel.is_active());
        assert!(started.elapsed() >= Duration::from_millis(400));
        assert_eq!(applied.borrow().len(), 34);
        assert_eq!(applied.borrow().last(), Some(&127));
    }

    #[test]
    fn test_run_wakes_on_start() {
        let applied = RefCell::new(Vec::new());
        let channel = FadeChannel::new(
            ChannelId(0),
            |_: ChannelId, brightness: u8| {
                applied.borrow_mut().push(brightness);
                Ok::<(), ()>(())
            },
            FadeConfig::default(),
        );

        // the runner idles until the fade is started
        block_on(select(run(&channel), async {
            Timer::after_millis(20).await;
            channel
                .start_delayed(Instant::now(), Duration::from_millis(0), 0, 60)
                .unwrap();
            wait_idle(&channel).await;
        }));

        assert!(!channel.is_active());
        assert_eq!(applied.borrow().last(), Some(&60));
        assert!(applied.borrow().windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_run_with_requests() {
        let applied = RefCell::new(Vec::new());
        let channel = FadeChannel::new(
            ChannelId(2),
            |_: ChannelId, brightness: u8| {
                applied.borrow_mut().push(brightness);
                Ok::<(), ()>(())
            },
            FadeConfig::default(),
        );
        let requests: RequestChannel<4> = RequestChannel::new();
        let sender = requests.sender();

        block_on(select(run_with_requests(&channel, requests.receiver()), async {
            Timer::after_millis(20).await;
            sender.try_send(FadeRequest::start(100, 20)).unwrap();
            // picked up by the runner, then faded to the end
            while applied.borrow().is_empty() {
                Timer::after_millis(1).await;
            }
            wait_idle(&channel).await;
        }));

        assert!(requests.is_empty());
        assert!(!channel.is_active());
        assert_eq!(applied.borrow().last(), Some(&20));
        assert!(applied.borrow().windows(2).all(|pair| pair[0] > pair[1]));
    }
}
