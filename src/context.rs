use {super::*, crate::job::ScratchpadSnafu, snafu::ResultExt};

/// What installing a job template changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JobUpdate {
    /// Workers were handed different work.
    pub new_job: bool,
    /// The scratchpad fell out of sync and must be downloaded again before the job is usable.
    pub resync: bool,
}

/// Everything a mining session shares between the transport, the submission task and the
/// hashing threads.
#[derive(Debug)]
pub struct MiningContext {
    pub scratchpad: RwLock<ScratchpadStore>,
    pub jobs: JobState,
    pub stats: Stats,
    restart: Vec<AtomicBool>,
}

impl MiningContext {
    pub fn new(scratchpad: ScratchpadStore, threads: usize) -> Self {
        Self {
            scratchpad: RwLock::new(scratchpad),
            jobs: JobState::new(),
            stats: Stats::new(threads),
            restart: (0..threads).map(|_| AtomicBool::new(false)).collect(),
        }
    }

    pub fn threads(&self) -> usize {
        self.restart.len()
    }

    /// Interrupts every worker at its next chunk boundary.
    pub fn restart_workers(&self) {
        for flag in &self.restart {
            flag.store(true, Ordering::Release);
        }
    }

    pub fn take_restart(&self, thread: usize) -> bool {
        self.restart
            .get(thread)
            .is_some_and(|flag| flag.swap(false, Ordering::AcqRel))
    }

    /// Whether the transport must download the full scratchpad before asking for work.
    pub fn needs_scratchpad(&self) -> bool {
        let scratchpad = self.scratchpad.read();
        scratchpad.is_empty() || scratchpad.needs_resync()
    }

    pub fn height_info(&self) -> Option<HeightInfo> {
        self.scratchpad.read().height_info()
    }

    /// Applies the template's addendums in order, then installs its job. Any addendum that
    /// cannot be applied drops the current job and asks for a resync instead.
    pub fn install_job(&self, template: &JobTemplate) -> Result<JobUpdate, JobError> {
        if self.apply_addendums(&template.addms)? {
            self.jobs.clear();
            self.restart_workers();

            return Ok(JobUpdate {
                new_job: false,
                resync: true,
            });
        }

        let Some(job) = Job::from_template(template)? else {
            return Ok(JobUpdate::default());
        };

        if self.jobs.get().map(|current| current.target) != Some(job.target) {
            let difficulty = job.target.difficulty();
            info!("Pool set diff to {difficulty:.0}");
            self.stats.set_difficulty(difficulty);
        }

        let job_id = job.job_id.clone();

        let new_job = self.jobs.set(job);

        if new_job {
            debug!("New job {job_id}");
            self.restart_workers();
        }

        Ok(JobUpdate {
            new_job,
            resync: false,
        })
    }

    /// Returns true when the scratchpad needs a resync.
    fn apply_addendums(&self, addendums: &[Addendum]) -> Result<bool, JobError> {
        if addendums.is_empty() {
            return Ok(false);
        }

        let mut scratchpad = self.scratchpad.write();

        for addendum in addendums {
            match scratchpad.apply_addendum(addendum) {
                Ok(AddendumOutcome::Applied { from, to, words }) => {
                    info!(
                        "addendum applied: {from} -> {to} ({} quads)",
                        words / QUAD_WORDS
                    );
                }
                Ok(AddendumOutcome::Stale { incoming, current }) => {
                    debug!("Skipping addendum for height {incoming}, scratchpad at {current}");
                }
                Ok(AddendumOutcome::Resync(_)) => return Ok(true),
                Err(err) if err.is_fatal() => return Err(err).context(ScratchpadSnafu),
                Err(err) => {
                    warn!(
                        "Dropping addendum for height {} ({} words): {err}",
                        addendum.hi.height,
                        addendum.addm.len()
                    );
                    scratchpad.mark_needs_resync();
                    return Ok(true);
                }
            }
        }

        Ok(false)
    }

    /// Installs a downloaded scratchpad and drops the job, which was computed against the
    /// old one.
    pub fn replace_scratchpad(&self, words: Vec<u64>, hi: HeightInfo) -> Result<(), ScratchpadError> {
        let len = words.len();

        self.scratchpad.write().replace(words, hi)?;

        info!("Scratchpad replaced: height {}, {len} words", hi.height);

        self.jobs.clear();
        self.restart_workers();

        Ok(())
    }

    /// Saves the scratchpad on a blocking thread. Failures are logged, not returned.
    pub async fn persist(self: &Arc<Self>, path: &Path) {
        let ctx = self.clone();
        let path = path.to_path_buf();

        let result =
            task::spawn_blocking(move || ctx.scratchpad.read().save_to_disk(&path)).await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!("Failed to save scratchpad: {err}"),
            Err(err) => warn!("Scratchpad save task failed: {err}"),
        }
    }
}
