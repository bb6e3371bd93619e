use {super::*, snafu::OptionExt};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum JobError {
    #[snafu(display("job {job_id} carries a blob but no target"))]
    MissingTarget { job_id: String },

    #[snafu(display("failed to apply addendum to scratchpad"))]
    Scratchpad { source: ScratchpadError },
}

impl JobError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Scratchpad { source } if source.is_fatal())
    }
}

/// One unit of work: the template to hash, the threshold a hash must meet and the id to
/// quote when submitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub job_id: String,
    pub blob: Blob,
    pub target: Target,
}

impl Job {
    /// Addendum-only templates carry no blob and so produce no job.
    pub fn from_template(template: &JobTemplate) -> Result<Option<Self>, JobError> {
        if template.blob.is_empty() {
            return Ok(None);
        }

        let target = template.target.context(MissingTargetSnafu {
            job_id: &template.job_id,
        })?;

        Ok(Some(Self {
            job_id: template.job_id.clone(),
            blob: template.blob.clone(),
            target,
        }))
    }

    /// Whether a worker holding `self` can keep scanning where it left off if handed `other`.
    /// The nonce bytes of the blob do not count.
    pub fn same_work(&self, other: &Job) -> bool {
        self.job_id == other.job_id
            && self.target == other.target
            && self.blob.same_template(other.blob.as_bytes())
    }
}

#[derive(Debug)]
struct Current {
    job: Option<Job>,
    updated: Instant,
}

/// The job shared between the transport and the workers. Every access is a copy in or a
/// copy out under the lock.
#[derive(Debug)]
pub struct JobState {
    current: Mutex<Current>,
}

impl Default for JobState {
    fn default() -> Self {
        Self {
            current: Mutex::new(Current {
                job: None,
                updated: Instant::now(),
            }),
        }
    }
}

impl JobState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current job and resets the job clock. Returns true when the new job is
    /// different work from the previous one.
    pub fn set(&self, job: Job) -> bool {
        let mut current = self.current.lock();

        let changed = current
            .job
            .as_ref()
            .is_none_or(|previous| !previous.same_work(&job));

        current.job = Some(job);
        current.updated = Instant::now();

        changed
    }

    pub fn clear(&self) {
        self.current.lock().job = None;
    }

    pub fn get(&self) -> Option<Job> {
        self.current.lock().job.clone()
    }

    pub fn is_ready(&self) -> bool {
        self.current.lock().job.is_some()
    }

    /// Whether a share found for `job_id` is still worth submitting.
    pub fn is_current(&self, job_id: &str) -> bool {
        self.current
            .lock()
            .job
            .as_ref()
            .is_some_and(|job| job.job_id == job_id)
    }

    /// Brings `local` up to date. Returns true if it was replaced, which means any nonce
    /// cursor derived from the old copy is meaningless.
    pub fn snapshot_into(&self, local: &mut Option<Job>) -> bool {
        let current = self.current.lock();

        let unchanged = match (&current.job, local.as_ref()) {
            (Some(shared), Some(mine)) => shared.same_work(mine),
            (None, None) => true,
            _ => false,
        };

        if unchanged {
            return false;
        }

        *local = current.job.clone();

        true
    }

    /// Time since the job was last set.
    pub fn age(&self) -> Duration {
        self.current.lock().updated.elapsed()
    }

    /// Pretends the job was set `by` earlier, shrinking the remaining scan budget.
    pub fn age_by(&self, by: Duration) {
        let mut current = self.current.lock();
        if let Some(updated) = current.updated.checked_sub(by) {
            current.updated = updated;
        }
    }
}
