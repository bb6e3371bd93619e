use {
    super::*,
    anyhow::{Context, anyhow, bail, ensure},
    std::collections::BTreeMap,
};

const ENV_PREFIX: &str = "SCRATCHMINER_";

const CONFIG_FILE: &str = "scratchminer.toml";

/// TOML config file structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub url: Option<PoolUrl>,
    pub user: Option<String>,
    pub pass: Option<String>,
    pub userpass: Option<String>,
    pub threads: Option<usize>,
    pub retries: Option<i64>,
    pub retry_pause: Option<u64>,
    pub timeout: Option<u64>,
    pub scantime: Option<u64>,
    pub stratum_timeout: Option<u64>,
    pub no_longpoll: Option<bool>,
    pub no_stratum: Option<bool>,
    pub scratchpad_url: Option<String>,
    pub scratchpad_cache: Option<PathBuf>,
    pub quiet: Option<bool>,
    pub debug: Option<bool>,
    pub protocol_dump: Option<bool>,
}

/// Resolved configuration. Every layer produces one of these and `or` lets the higher
/// priority layer win field by field.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub config: Option<PathBuf>,
    pub config_dir: Option<PathBuf>,
    pub url: Option<PoolUrl>,
    pub user: Option<String>,
    pub pass: Option<String>,
    pub userpass: Option<String>,
    pub threads: Option<usize>,
    pub retries: Option<i64>,
    pub retry_pause: Option<u64>,
    pub timeout: Option<u64>,
    pub scantime: Option<u64>,
    pub stratum_timeout: Option<u64>,
    pub no_longpoll: bool,
    pub no_stratum: bool,
    pub scratchpad_url: Option<Url>,
    pub scratchpad_cache: Option<PathBuf>,
    pub quiet: bool,
    pub debug: bool,
    pub protocol_dump: bool,
}

impl Settings {
    /// Load settings from all sources with proper priority
    pub fn load(options: Options) -> Result<Self> {
        let mut env = BTreeMap::<String, String>::new();

        for (var, value) in env::vars_os() {
            let Some(var) = var.to_str() else {
                continue;
            };

            let Some(key) = var.strip_prefix(ENV_PREFIX) else {
                continue;
            };

            env.insert(
                key.into(),
                value.into_string().map_err(|value| {
                    anyhow!(
                        "environment variable `{var}` not valid unicode: `{}`",
                        value.to_string_lossy()
                    )
                })?,
            );
        }

        Self::merge(options, env)
    }

    pub fn merge(options: Options, env: BTreeMap<String, String>) -> Result<Self> {
        let settings = Self::from_options(&options).or(Self::from_env(&env)?);

        let config = match Self::find_config_path(&settings) {
            Some(path) => toml::from_str(
                &fs::read_to_string(&path)
                    .with_context(|| format!("failed to open config file `{}`", path.display()))?,
            )
            .with_context(|| format!("failed to deserialize config file `{}`", path.display()))?,
            None => Config::default(),
        };

        let settings = settings.or(Self::from_config(&config)?).or_defaults()?;

        settings.validate()?;

        Ok(settings)
    }

    fn find_config_path(settings: &Self) -> Option<PathBuf> {
        if let Some(path) = &settings.config {
            return Some(path.clone());
        }

        if let Some(dir) = &settings.config_dir {
            let path = dir.join(CONFIG_FILE);
            if path.exists() {
                return Some(path);
            }
        }

        let path = dirs::config_dir()?.join("scratchminer").join(CONFIG_FILE);

        path.exists().then_some(path)
    }

    pub fn from_options(options: &Options) -> Self {
        Self {
            config: options.config.clone(),
            config_dir: options.config_dir.clone(),
            url: options.url.clone(),
            user: options.user.clone(),
            pass: options.pass.clone(),
            userpass: options.userpass.clone(),
            threads: options.threads,
            retries: options.retries,
            retry_pause: options.retry_pause,
            timeout: options.timeout,
            scantime: options.scantime,
            stratum_timeout: options.stratum_timeout,
            no_longpoll: options.no_longpoll,
            no_stratum: options.no_stratum,
            scratchpad_url: options.scratchpad_url.clone(),
            scratchpad_cache: options.scratchpad_cache.clone(),
            quiet: options.quiet,
            debug: options.debug,
            protocol_dump: options.protocol_dump,
        }
    }

    pub fn from_env(env: &BTreeMap<String, String>) -> Result<Self> {
        let get_bool = |key: &str| {
            env.get(key)
                .map(|value| !value.is_empty() && value != "0" && value.to_lowercase() != "false")
                .unwrap_or_default()
        };

        let get_string = |key: &str| env.get(key).cloned();

        let get_path = |key: &str| env.get(key).map(PathBuf::from);

        fn parse<T>(env: &BTreeMap<String, String>, key: &str) -> Result<Option<T>>
        where
            T: FromStr,
            T::Err: std::error::Error + Send + Sync + 'static,
        {
            env.get(key)
                .map(|value| value.parse::<T>())
                .transpose()
                .with_context(|| {
                    format!(
                        "failed to parse environment variable {ENV_PREFIX}{key} as {}",
                        std::any::type_name::<T>()
                    )
                })
        }

        Ok(Self {
            config: get_path("CONFIG"),
            config_dir: get_path("CONFIG_DIR"),
            url: env
                .get("URL")
                .map(|url| url.parse::<PoolUrl>())
                .transpose()
                .with_context(|| format!("failed to parse environment variable {ENV_PREFIX}URL"))?,
            user: get_string("USER"),
            pass: get_string("PASS"),
            userpass: get_string("USERPASS"),
            threads: parse(env, "THREADS")?,
            retries: parse(env, "RETRIES")?,
            retry_pause: parse(env, "RETRY_PAUSE")?,
            timeout: parse(env, "TIMEOUT")?,
            scantime: parse(env, "SCANTIME")?,
            stratum_timeout: parse(env, "STRATUM_TIMEOUT")?,
            no_longpoll: get_bool("NO_LONGPOLL"),
            no_stratum: get_bool("NO_STRATUM"),
            scratchpad_url: parse(env, "SCRATCHPAD_URL")?,
            scratchpad_cache: get_path("SCRATCHPAD_CACHE"),
            quiet: get_bool("QUIET"),
            debug: get_bool("DEBUG"),
            protocol_dump: get_bool("PROTOCOL_DUMP"),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            config: None,
            config_dir: None,
            url: config.url.clone(),
            user: config.user.clone(),
            pass: config.pass.clone(),
            userpass: config.userpass.clone(),
            threads: config.threads,
            retries: config.retries,
            retry_pause: config.retry_pause,
            timeout: config.timeout,
            scantime: config.scantime,
            stratum_timeout: config.stratum_timeout,
            no_longpoll: config.no_longpoll.unwrap_or(false),
            no_stratum: config.no_stratum.unwrap_or(false),
            scratchpad_url: config
                .scratchpad_url
                .as_deref()
                .map(Url::parse)
                .transpose()
                .context("invalid scratchpad_url in config file")?,
            scratchpad_cache: config.scratchpad_cache.clone(),
            quiet: config.quiet.unwrap_or(false),
            debug: config.debug.unwrap_or(false),
            protocol_dump: config.protocol_dump.unwrap_or(false),
        })
    }

    /// Merge self with another Settings, self takes priority
    pub fn or(self, other: Self) -> Self {
        Self {
            config: self.config.or(other.config),
            config_dir: self.config_dir.or(other.config_dir),
            url: self.url.or(other.url),
            user: self.user.or(other.user),
            pass: self.pass.or(other.pass),
            userpass: self.userpass.or(other.userpass),
            threads: self.threads.or(other.threads),
            retries: self.retries.or(other.retries),
            retry_pause: self.retry_pause.or(other.retry_pause),
            timeout: self.timeout.or(other.timeout),
            scantime: self.scantime.or(other.scantime),
            stratum_timeout: self.stratum_timeout.or(other.stratum_timeout),
            no_longpoll: self.no_longpoll || other.no_longpoll,
            no_stratum: self.no_stratum || other.no_stratum,
            scratchpad_url: self.scratchpad_url.or(other.scratchpad_url),
            scratchpad_cache: self.scratchpad_cache.or(other.scratchpad_cache),
            quiet: self.quiet || other.quiet,
            debug: self.debug || other.debug,
            protocol_dump: self.protocol_dump || other.protocol_dump,
        }
    }

    fn or_defaults(self) -> Result<Self> {
        let scratchpad_cache = match self.scratchpad_cache {
            Some(path) => path,
            None => dirs::cache_dir()
                .ok_or_else(|| anyhow!("could not get cache dir"))?
                .join("scratchminer")
                .join("scratchpad.bin"),
        };

        Ok(Self {
            threads: Some(self.threads.unwrap_or_else(cpu_count)),
            retries: Some(self.retries.unwrap_or(-1)),
            retry_pause: Some(self.retry_pause.unwrap_or(30)),
            timeout: Some(self.timeout.unwrap_or(0)),
            scantime: Some(self.scantime.unwrap_or(5)),
            stratum_timeout: Some(self.stratum_timeout.unwrap_or(400)),
            scratchpad_cache: Some(scratchpad_cache),
            ..self
        })
    }

    fn validate(&self) -> Result {
        fn range(name: &str, value: Option<i64>, min: i64, max: i64) -> Result {
            if let Some(value) = value {
                ensure!(
                    (min..=max).contains(&value),
                    "{name} must be between {min} and {max}, got {value}"
                );
            }
            Ok(())
        }

        range("threads", self.threads.map(|n| n as i64), 1, 9999)?;
        range("retries", self.retries, -1, 9999)?;
        range("retry pause", self.retry_pause.map(|n| n as i64), 1, 9999)?;
        range("scantime", self.scantime.map(|n| n as i64), 1, 9999)?;
        range("timeout", self.timeout.map(|n| n as i64), 0, 99999)?;
        range(
            "stratum timeout",
            self.stratum_timeout.map(|n| n as i64),
            1,
            99999,
        )?;

        if let Some(userpass) = &self.userpass {
            ensure!(
                userpass.contains(':'),
                "userpass must have the form `user:pass`"
            );
        }

        ensure!(
            !(self.quiet && self.debug),
            "--quiet and --debug are mutually exclusive"
        );

        Ok(())
    }

    pub fn threads(&self) -> usize {
        self.threads.unwrap_or_else(cpu_count)
    }

    pub fn log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }

    pub fn scratchpad_cache(&self) -> Option<&Path> {
        self.scratchpad_cache.as_deref()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self
                .retries
                .and_then(|retries| u32::try_from(retries).ok()),
            pause: Duration::from_secs(self.retry_pause.unwrap_or(30)),
        }
    }

    /// `user` and `pass` win over `userpass`, which wins over credentials in the url.
    pub fn credentials(&self) -> (String, String) {
        let userpass = self
            .userpass
            .as_deref()
            .and_then(|userpass| userpass.split_once(':'))
            .map(|(user, pass)| (user.to_string(), pass.to_string()));

        let embedded = self.url.as_ref().and_then(PoolUrl::credentials);

        let (user, pass) = userpass.or(embedded).unwrap_or_default();

        (
            self.user.clone().unwrap_or(user),
            self.pass.clone().unwrap_or(pass),
        )
    }

    pub fn session_config(&self) -> Result<SessionConfig> {
        let Some(url) = self.url.clone() else {
            bail!("no pool url configured, pass `--url`");
        };

        if self.no_stratum && url.transport() == Transport::Stratum {
            bail!("stratum pool url `{url}` given with --no-stratum");
        }

        let (user, pass) = self.credentials();

        Ok(SessionConfig {
            url,
            user,
            pass,
            retry: self.retry_policy(),
            stratum_timeout: Duration::from_secs(self.stratum_timeout.unwrap_or(400)),
            longpoll_timeout: self
                .timeout
                .filter(|timeout| *timeout > 0)
                .map(Duration::from_secs),
            scantime: Duration::from_secs(self.scantime.unwrap_or(5)),
            longpoll: !self.no_longpoll,
            protocol_dump: self.protocol_dump,
            cache_path: self.scratchpad_cache.clone(),
        })
    }
}

fn cpu_count() -> usize {
    let mut system = System::new();
    system.refresh_cpu_all();
    system.cpus().len().max(1)
}
