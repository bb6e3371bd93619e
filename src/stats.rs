use super::*;

pub const REPORT_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Default)]
struct Counters {
    accepted: u64,
    rejected: u64,
    difficulty: f64,
    thread_rates: Vec<HashRate>,
}

/// Share counters and per-thread hash rates, written by workers and the transport and read
/// by the reporter.
#[derive(Debug)]
pub struct Stats {
    counters: Mutex<Counters>,
    hashes: AtomicU64,
    started: Instant,
}

impl Stats {
    pub fn new(threads: usize) -> Self {
        Self {
            counters: Mutex::new(Counters {
                thread_rates: vec![HashRate::ZERO; threads],
                ..Counters::default()
            }),
            hashes: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    /// Records a finished scan batch for `thread`.
    pub fn record_scan(&self, thread: usize, hashes: u64, elapsed: Duration) {
        self.hashes.fetch_add(hashes, Ordering::Relaxed);

        let rate = HashRate::measure(hashes, elapsed);

        if let Some(slot) = self.counters.lock().thread_rates.get_mut(thread) {
            *slot = rate;
        }

        debug!("thread {thread}: {hashes} hashes, {rate}");
    }

    pub fn thread_rate(&self, thread: usize) -> HashRate {
        self.counters
            .lock()
            .thread_rates
            .get(thread)
            .copied()
            .unwrap_or_default()
    }

    pub fn total_rate(&self) -> HashRate {
        self.counters.lock().thread_rates.iter().copied().sum()
    }

    pub fn total_hashes(&self) -> u64 {
        self.hashes.load(Ordering::Relaxed)
    }

    pub fn set_difficulty(&self, difficulty: f64) {
        self.counters.lock().difficulty = difficulty;
    }

    pub fn accepted(&self) -> u64 {
        self.counters.lock().accepted
    }

    pub fn rejected(&self) -> u64 {
        self.counters.lock().rejected
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn share_result(&self, accepted: bool, reason: Option<&str>) {
        let (accepted_count, total, difficulty, rate) = {
            let mut counters = self.counters.lock();

            if accepted {
                counters.accepted += 1;
            } else {
                counters.rejected += 1;
            }

            (
                counters.accepted,
                counters.accepted + counters.rejected,
                counters.difficulty,
                counters.thread_rates.iter().copied().sum::<HashRate>(),
            )
        };

        info!(
            "accepted: {accepted_count}/{total} ({:.2}%), {rate} at diff {difficulty:.0} {}",
            accepted_count as f64 * 100.0 / total as f64,
            if accepted { "(yay!!!)" } else { "(booooo)" }
        );

        if let Some(reason) = reason {
            warn!("reject reason: {reason}");
        }
    }

    pub fn status_line(&self) -> String {
        let counters = self.counters.lock();

        format!(
            "hashrate={}  accepted={}  rejected={}  diff={:.0}  uptime={}s",
            counters.thread_rates.iter().copied().sum::<HashRate>(),
            counters.accepted,
            counters.rejected,
            counters.difficulty,
            self.uptime().as_secs()
        )
    }
}

pub(crate) fn spawn_reporter(
    ctx: Arc<MiningContext>,
    cancel: CancellationToken,
    tasks: &mut JoinSet<()>,
) {
    tasks.spawn(async move {
        let mut ticker = interval(REPORT_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => info!("{}", ctx.stats.status_line()),
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero() {
        let stats = Stats::new(2);
        assert_eq!(stats.accepted(), 0);
        assert_eq!(stats.rejected(), 0);
        assert_eq!(stats.total_hashes(), 0);
        assert_eq!(stats.total_rate(), HashRate::ZERO);
    }

    #[test]
    fn scans_update_thread_rates() {
        let stats = Stats::new(2);

        stats.record_scan(0, 1000, Duration::from_secs(1));
        stats.record_scan(1, 500, Duration::from_millis(250));

        assert_eq!(stats.thread_rate(0), HashRate(1000.0));
        assert_eq!(stats.thread_rate(1), HashRate(2000.0));
        assert_eq!(stats.total_rate(), HashRate(3000.0));
        assert_eq!(stats.total_hashes(), 1500);

        stats.record_scan(0, 10, Duration::from_secs(1));
        assert_eq!(stats.thread_rate(0), HashRate(10.0));
        assert_eq!(stats.total_hashes(), 1510);
    }

    #[test]
    fn unknown_thread_is_ignored() {
        let stats = Stats::new(1);
        stats.record_scan(5, 100, Duration::from_secs(1));
        assert_eq!(stats.thread_rate(5), HashRate::ZERO);
        assert_eq!(stats.total_hashes(), 100);
    }

    #[test]
    fn share_results_are_counted() {
        let stats = Stats::new(1);

        stats.share_result(true, None);
        stats.share_result(true, None);
        stats.share_result(false, Some("Low difficulty share"));

        assert_eq!(stats.accepted(), 2);
        assert_eq!(stats.rejected(), 1);
    }

    #[test]
    fn status_line_contains_all_fields() {
        let stats = Stats::new(1);
        stats.record_scan(0, 2000, Duration::from_secs(1));
        stats.set_difficulty(65537.0);
        stats.share_result(true, None);

        let line = stats.status_line();
        assert!(line.contains("hashrate=2 KH/s"), "{line}");
        assert!(line.contains("accepted=1"), "{line}");
        assert!(line.contains("rejected=0"), "{line}");
        assert!(line.contains("diff=65537"), "{line}");
        assert!(line.contains("uptime="), "{line}");
    }
}
