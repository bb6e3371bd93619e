use {super::*, backon::Retryable};

/// Submits shares found by the workers over HTTP, one at a time, retrying each per the retry
/// policy. Shares for jobs that have since been replaced are dropped.
pub(crate) fn spawn_submitter(
    client: Arc<RpcClient>,
    ctx: Arc<MiningContext>,
    retry: RetryPolicy,
    mut solutions: mpsc::UnboundedReceiver<Solution>,
    cancel: CancellationToken,
    tasks: &mut JoinSet<()>,
) {
    tasks.spawn(async move {
        loop {
            let solution = tokio::select! {
                _ = cancel.cancelled() => break,
                solution = solutions.recv() => match solution {
                    Some(solution) => solution,
                    None => break,
                },
            };

            if !ctx.jobs.is_current(&solution.job_id) {
                debug!("Dropping share for stale job {}", solution.job_id);
                continue;
            }

            let submit = (|| client.submit(&solution))
                .retry(retry.backoff())
                .sleep(sleep)
                .when(|err: &SessionError| !err.is_fatal())
                .notify(|err: &SessionError, pause: Duration| {
                    warn!(
                        "Submitting share for job {} failed: {err}. Retrying in {}s",
                        solution.job_id,
                        pause.as_secs()
                    );
                });

            let outcome = tokio::select! {
                _ = cancel.cancelled() => break,
                outcome = submit => outcome,
            };

            match outcome {
                Ok(ShareOutcome::Accepted) => ctx.stats.share_result(true, None),
                Ok(ShareOutcome::Rejected(reason)) => {
                    ctx.stats.share_result(false, Some(&reason));
                }
                Err(err) => error!("Giving up on share for job {}: {err}", solution.job_id),
            }
        }

        debug!("Share submitter stopped");
    });
}
