//! Checks the order of cipher steps around the measurement window with an instrumented cipher.
//!
//! Every step runs on the emulated core, so the order steps are logged in is the order they ran.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use ct_chaff::{
    aes::{self, Aes},
    config::{IdlePolicy, WaitStrategy},
    derive::Passthrough,
    entropy::SeededSource,
    runtime::HostedRuntime,
    trigger::Trigger,
    BatchScheduler, Block, BlockTransform, ChaffConfig, Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Event {
    Rise,
    Fall,
    Step { lane: u8, step: usize },
}

type Log = Arc<Mutex<Vec<Event>>>;

/// AES which logs each step along with the lane it belongs to.
struct Counting {
    log: Log,
    next_lane: AtomicU8,
}

struct CountingSchedule {
    lane: u8,
    inner: aes::Schedule,
}

impl BlockTransform for Counting {
    type Schedule = CountingSchedule;

    const NAME: &'static str = "counting-aes";

    // The key chain expands lane keys in tag order.
    fn key_expand(&self, key: &[u8]) -> Result<CountingSchedule> {
        Ok(CountingSchedule {
            lane: self.next_lane.fetch_add(1, Ordering::SeqCst),
            inner: Aes.key_expand(key)?,
        })
    }

    fn raw_key<'a>(&self, schedule: &'a CountingSchedule) -> &'a [u8] {
        Aes.raw_key(&schedule.inner)
    }

    fn rounds(&self, schedule: &CountingSchedule) -> usize {
        Aes.rounds(&schedule.inner)
    }

    fn apply_round(&self, schedule: &CountingSchedule, state: &mut Block, step: usize) {
        self.log.lock().push(Event::Step { lane: schedule.lane, step });
        Aes.apply_round(&schedule.inner, state, step);
    }
}

struct Marker(Log);

impl Trigger for Marker {
    fn rise(&self) {
        self.0.lock().push(Event::Rise);
    }

    fn fall(&self) {
        self.0.lock().push(Event::Fall);
    }
}

fn campaign(lanes: usize, batches: u32, wait: WaitStrategy) -> Vec<Event> {
    let log = Log::default();
    let cipher = Counting { log: Arc::clone(&log), next_lane: AtomicU8::new(0) };
    let config = ChaffConfig {
        lanes,
        batches,
        wait,
        idle: IdlePolicy::Spin { iterations: 10 },
        ..ChaffConfig::default()
    };

    let entropy = Arc::new(SeededSource::new(ChaCha8Rng::seed_from_u64(3)));
    let runtime = Arc::new(HostedRuntime::default());
    let mut sched = BatchScheduler::from_config(&config, cipher, &Passthrough, runtime, entropy)
        .unwrap()
        .with_trigger(Marker(Arc::clone(&log)));

    sched.run().unwrap();

    let events = log.lock().clone();
    events
}

/// Splits the log into the events of each rise..fall window, checking nothing runs outside one.
fn windows(events: &[Event]) -> Vec<&[Event]> {
    let mut out = Vec::new();
    let mut start = None;

    for (i, event) in events.iter().enumerate() {
        match *event {
            Event::Rise => {
                assert!(start.is_none(), "nested rise at {}", i);
                start = Some(i + 1);
            }

            Event::Fall => {
                let s = start.take().expect("fall without rise");
                out.push(&events[s..i]);
            }

            Event::Step { lane, step } => {
                assert!(start.is_some(), "lane {} ran step {} outside the window", lane, step);
            }
        }
    }

    assert!(start.is_none());
    out
}

fn check_forced_stop(lanes: usize, wait: WaitStrategy) {
    const BATCHES: u32 = 6;
    const LAST_STEP: usize = 10;

    let events = campaign(lanes, BATCHES, wait);
    let windows = windows(&events);
    assert_eq!(windows.len(), BATCHES as usize);

    for window in windows {
        let genuine: Vec<_> = window.iter()
            .filter_map(|e| match *e {
                Event::Step { lane: 0, step } => Some(step),
                _ => None,
            })
            .collect();
        assert_eq!(genuine, (0..=LAST_STEP).collect::<Vec<_>>());

        let last = window.iter()
            .position(|e| *e == Event::Step { lane: 0, step: LAST_STEP })
            .unwrap();

        assert!(
            window[last + 1..].is_empty(),
            "steps after the genuine lane finished: {:?}",
            &window[last + 1..],
        );

        // Each lane only ever moves forward, one step at a time.
        for lane in 1..lanes as u8 {
            let steps: Vec<_> = window.iter()
                .filter_map(|e| match *e {
                    Event::Step { lane: l, step } if l == lane => Some(step),
                    _ => None,
                })
                .collect();
            assert_eq!(steps, (0..steps.len()).collect::<Vec<_>>());
        }
    }
}

#[test]
fn no_decoy_runs_after_the_genuine_lane_spin() {
    check_forced_stop(4, WaitStrategy::Spin);
}

#[test]
fn no_decoy_runs_after_the_genuine_lane_notify() {
    check_forced_stop(4, WaitStrategy::Notify);
}

#[test]
fn many_lanes() {
    check_forced_stop(12, WaitStrategy::Spin);
}

#[test]
fn baseline_runs_only_the_genuine_lane() {
    let events = campaign(1, 3, WaitStrategy::Spin);
    for window in windows(&events) {
        assert_eq!(window.len(), 11);
        assert!(window.iter().all(|e| matches!(e, Event::Step { lane: 0, .. })));
    }
}
