use super::*;

/// How often and how patiently to retry a failing pool operation. `retries: None` retries
/// forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: Option<u32>,
    pub pause: Duration,
}

impl RetryPolicy {
    pub fn forever(pause: Duration) -> Self {
        Self {
            retries: None,
            pause,
        }
    }

    /// Whether another attempt is allowed after `failures` consecutive failures.
    pub fn allows(&self, failures: u32) -> bool {
        self.retries.is_none_or(|retries| failures <= retries)
    }

    pub fn backoff(&self) -> ConstantBuilder {
        let builder = ConstantBuilder::default().with_delay(self.pause);

        match self.retries {
            Some(retries) => builder.with_max_times(retries as usize),
            None => builder.without_max_times(),
        }
    }

    /// Sleeps for the pause unless cancelled first. Returns false on cancellation.
    pub async fn pause(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = sleep(self.pause) => true,
        }
    }
}
