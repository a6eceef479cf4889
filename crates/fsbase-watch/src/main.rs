#![warn(missing_docs)]
//! fsbase watch harness: drives a notification service with synthetic producers

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use fsbase_match::{MatcherRegistry, PathMatcher};
use fsbase_watch::{
    ChangeEvent, EventKind, NotificationService, Subscription, WatchConfig, WatchError,
    WatchResult,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DIRS: [&str; 3] = ["/export/home", "/export/logs", "/export/tmp"];
const FILES_PER_DIR: usize = 200;
const CONSUMERS: usize = 2;
const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);
const SETTLE_POLL: Duration = Duration::from_millis(10);

type Service = NotificationService<String, String>;

/// Event totals observed by the consumers.
#[derive(Debug, Default)]
struct Totals {
    delivered: AtomicU64,
    overflowed: AtomicU64,
}

impl Totals {
    /// Drains one signaled subscription and re-arms it.
    fn drain(&self, worker: &str, sub: &Subscription<String, String>) {
        for event in sub.poll_events() {
            let counter = if event.is_overflow() {
                &self.overflowed
            } else {
                &self.delivered
            };
            counter.fetch_add(u64::from(event.count()), Ordering::Relaxed);
            tracing::debug!(
                "Consumer {}: {} {} x{}",
                worker,
                sub.resource(),
                event.kind(),
                event.count()
            );
        }
        if !sub.reset() {
            tracing::debug!("Consumer {}: {} is no longer valid", worker, sub.resource());
        }
    }

    fn seen(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed) + self.overflowed.load(Ordering::Relaxed)
    }
}

/// Helps the consumers drain until every posted occurrence has been counted.
///
/// Returns false if `timeout` elapsed first.
fn settle(service: &Service, totals: &Totals, posted: u64, timeout: Duration) -> WatchResult<bool> {
    let deadline = Instant::now() + timeout;
    while totals.seen() < posted {
        if Instant::now() >= deadline {
            return Ok(false);
        }
        if let Some(sub) = service.poll_timeout(SETTLE_POLL)? {
            totals.drain("main", &sub);
        }
    }
    Ok(true)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: fsb-watch <syntax:pattern> [config.json]");
        std::process::exit(1);
    }

    let matcher: Arc<dyn PathMatcher> = Arc::from(MatcherRegistry::new().compile(&args[1])?);
    let config = match args.get(2) {
        Some(path) => WatchConfig::from_json_file(path)?,
        None => WatchConfig::default(),
    };

    tracing::info!("fsbase watch harness starting: filter={}", args[1]);

    let service: Service = NotificationService::with_config(config)?;
    let totals = Arc::new(Totals::default());

    let consumers: Vec<_> = (0..CONSUMERS)
        .map(|worker| {
            let service = service.clone();
            let totals = Arc::clone(&totals);
            let name = worker.to_string();
            thread::spawn(move || loop {
                let sub = match service.take() {
                    Ok(sub) => sub,
                    Err(WatchError::Closed) => break,
                    Err(e) => {
                        tracing::error!("Consumer {} failed: {}", name, e);
                        break;
                    }
                };
                totals.drain(&name, &sub);
            })
        })
        .collect();

    let mut producers = Vec::new();
    for dir in DIRS {
        let sub = service.register(
            dir.to_string(),
            [EventKind::Create, EventKind::Modify, EventKind::Delete],
        )?;
        let matcher = Arc::clone(&matcher);
        producers.push(thread::spawn(move || {
            let mut posted = 0u64;
            for i in 0..FILES_PER_DIR {
                let path = format!("{}/file{}.{}", sub.resource(), i, ["txt", "log"][i % 2]);
                if !matcher.matches(&path) {
                    continue;
                }
                let kind = match i % 3 {
                    0 => EventKind::Create,
                    1 => EventKind::Modify,
                    _ => EventKind::Delete,
                };
                if sub.offer(ChangeEvent::new(kind, path)) {
                    posted += 1;
                    sub.signal();
                }
            }
            posted
        }));
    }

    let mut posted = 0u64;
    for producer in producers {
        posted += producer
            .join()
            .map_err(|_| anyhow::anyhow!("producer thread panicked"))?;
    }

    if !settle(&service, &totals, posted, SETTLE_TIMEOUT)? {
        tracing::warn!(
            "Gave up waiting for consumers: {} of {} events counted",
            totals.seen(),
            posted
        );
    }
    service.close();

    for consumer in consumers {
        consumer
            .join()
            .map_err(|_| anyhow::anyhow!("consumer thread panicked"))?;
    }

    tracing::info!(
        "Posted {} events: delivered {}, collapsed into overflow {}",
        posted,
        totals.delivered.load(Ordering::Relaxed),
        totals.overflowed.load(Ordering::Relaxed)
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(capacity: usize) -> Service {
        NotificationService::with_config(WatchConfig::new(capacity)).unwrap()
    }

    #[test]
    fn test_settle_drains_everything_posted() {
        let svc = service(2);
        let sub = svc.register("/dir".to_string(), [EventKind::Modify]).unwrap();
        for i in 0..5 {
            sub.post(ChangeEvent::new(EventKind::Modify, i.to_string()));
        }
        sub.signal();

        let totals = Totals::default();
        assert!(settle(&svc, &totals, 5, Duration::from_secs(5)).unwrap());
        assert_eq!(totals.delivered.load(Ordering::Relaxed), 2);
        assert_eq!(totals.overflowed.load(Ordering::Relaxed), 3);
        assert_eq!(svc.signaled_count(), 0);
        assert_eq!(sub.state(), fsbase_watch::SubscriptionState::Ready);
    }

    #[test]
    fn test_settle_waits_for_late_events() {
        let svc = service(16);
        let sub = svc.register("/dir".to_string(), [EventKind::Create]).unwrap();
        let producer = {
            let sub = sub.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                sub.post(ChangeEvent::new(EventKind::Create, "late".to_string()));
                sub.signal();
            })
        };

        let totals = Totals::default();
        assert!(settle(&svc, &totals, 1, Duration::from_secs(5)).unwrap());
        assert_eq!(totals.seen(), 1);
        producer.join().unwrap();
    }

    #[test]
    fn test_settle_gives_up_after_timeout() {
        let svc = service(4);
        let totals = Totals::default();
        assert!(!settle(&svc, &totals, 1, Duration::from_millis(30)).unwrap());
    }

    #[test]
    fn test_settle_fails_once_closed() {
        let svc = service(4);
        svc.close();
        let totals = Totals::default();
        assert!(matches!(
            settle(&svc, &totals, 1, Duration::from_secs(1)),
            Err(WatchError::Closed)
        ));
    }
}
