use burstgate::{Limiter, Slot};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_transfer_conserves_release_instants() {
    let timeframe = Duration::from_secs(10);
    let source = Limiter::new("source", 4, timeframe);
    let target = Limiter::new("target", 0, timeframe);

    // Spread the release instants out
    source.claim();
    source.claim();
    let mut before = source.reduce_to(0);
    let mut releases: Vec<Instant> = before.iter().map(Slot::earliest_release).collect();
    source.add(before.drain(..));

    let moved = source.reduce_to(2);
    assert_eq!(moved.len(), 2);
    let latest_kept = source
        .reduce_to(0)
        .iter()
        .map(Slot::earliest_release)
        .max()
        .unwrap();
    assert!(moved.iter().all(|slot| slot.earliest_release() >= latest_kept));

    target.add(moved);
    let mut after: Vec<Instant> = target
        .reduce_to(0)
        .iter()
        .map(Slot::earliest_release)
        .collect();

    // The two claimed slots moved; the two untouched ones stayed behind
    releases.sort();
    after.sort();
    assert_eq!(&releases[2..], &after[..]);
    assert_eq!(releases[0], latest_kept);
}

#[test]
fn test_rebalance_while_claiming() {
    let timeframe = Duration::from_millis(5);
    let east = Arc::new(Limiter::new("east", 6, timeframe));
    let west = Arc::new(Limiter::new("west", 2, timeframe));
    let running = Arc::new(AtomicBool::new(true));
    let claimed = Arc::new(AtomicUsize::new(0));

    let workers: Vec<_> = [Arc::clone(&east), Arc::clone(&west)]
        .into_iter()
        .map(|limiter| {
            let running = Arc::clone(&running);
            let claimed = Arc::clone(&claimed);
            thread::spawn(move || {
                while running.load(Ordering::Relaxed) {
                    if limiter
                        .claim_timeout(Duration::from_millis(50))
                        .is_ok()
                    {
                        claimed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();

    for round in 0..20 {
        let (from, to) = if round % 2 == 0 {
            (&east, &west)
        } else {
            (&west, &east)
        };
        let keep = from.size() / 2;
        to.add(from.reduce_to(keep));
        thread::sleep(Duration::from_millis(2));
    }

    running.store(false, Ordering::Relaxed);
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(east.size() + west.size(), 8);
    assert!(claimed.load(Ordering::Relaxed) > 0);
}
