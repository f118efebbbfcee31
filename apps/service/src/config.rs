use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use std::{fmt, fs, path};

use serde::Deserialize;
use thiserror::Error;

use crate::monitoring::checker::CheckKind;
use crate::monitoring::validation::validate_check_target;
use crate::notify::{EventKind, NotifierKind};
use crate::template::expand_env;

pub const LOGLEVEL: &str = "warn";
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(60);
pub const PING_TIMEOUT: Duration = Duration::from_secs(60);
pub const PORT_TIMEOUT: Duration = Duration::from_secs(5);
pub const NOTIFY_TIMEOUT: Duration = Duration::from_secs(30);

pub const CHECK_METHOD: &str = "GET";
pub const CHECK_REPEAT: Duration = Duration::from_secs(60);
pub const CHECK_EXPECTED_CODE: u16 = 200;
pub const CHECK_EXPECTED_TIME: u64 = 1000;
pub const CHECK_ALLOWED_SLOWS: u32 = 3;
pub const CHECK_ALLOWED_FAILS: u32 = 1;

pub const SUBJECT_FAIL: &str = "{check}{params} problem";
pub const SUBJECT_SLOW: &str = "{check}{params} slow";
pub const SUBJECT_FAIL_OK: &str = "{check}{params} ok";
pub const SUBJECT_SLOW_OK: &str = "{check}{params} ok";
pub const TEXT_FAIL: &str = "FAILURE:\n{check}{params}\nTime: {timestamp}\n\nResponse code: {response_code}\nError: {error}\n";
pub const TEXT_SLOW: &str = "SLOW RESPONSE:\n{check}{params}\nTime: {timestamp}\n\nResponse/Expected time: {response_time}/{expected_time}\n";
pub const TEXT_FAIL_OK: &str =
    "RECOVERED:\n{check}{params}\nTime: {timestamp}\n\nResponse code: {response_code}\n";
pub const TEXT_SLOW_OK: &str = "RECOVERED:\n{check}{params}\nTime: {timestamp}\n\nResponse/Expected time: {response_time}/{expected_time}\n";

fn default_repeat_fail() -> Vec<Duration> {
    vec![Duration::from_secs(60), Duration::from_secs(5 * 60), Duration::from_secs(10 * 60)]
}

fn default_repeat_slow() -> Vec<Duration> {
    vec![Duration::from_secs(5 * 60), Duration::ZERO]
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    ReadFailed {
        path: path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("[global] workers not defined (cur val: {0}), fix config file")]
    NoWorkers(usize),
    #[error("no checks defined, fix config file")]
    NoChecks,
    #[error("empty 'id' in {0}. check, this field is mandatory")]
    MissingCheckId(usize),
    #[error("duplicate check id {0:?}")]
    DuplicateCheck(String),
    #[error("check {id:?}: {source:#}")]
    InvalidCheck {
        id: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("check {check:?}: notification {notifier:?} in '{field}' is not defined")]
    UnknownNotifier { check: String, notifier: String, field: &'static str },
    #[error("empty 'id' for {0}. notification, this field is mandatory")]
    MissingNotifierId(usize),
    #[error("duplicate notification id {0:?}")]
    DuplicateNotifier(String),
    #[error("notification {id:?}: {reason}")]
    InvalidNotifier { id: String, reason: String },
}

/// Whole configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub global: Global,
    #[serde(default, rename = "notify")]
    pub notifiers: Vec<NotifierConfig>,
    #[serde(default, rename = "check")]
    pub checks: Vec<CheckConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Global {
    pub workers: usize,
    pub loglevel: String,
    #[serde(with = "humantime_serde")]
    pub http_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub ping_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub port_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub notify_timeout: Duration,
    /// Templates used by notifiers that do not define their own.
    pub templates: Templates,
}

/// Subject and body templates, one pair per event family.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Templates {
    pub subject_fail: String,
    pub subject_fail_ok: String,
    pub subject_slow: String,
    pub subject_slow_ok: String,
    pub text_fail: String,
    pub text_fail_ok: String,
    pub text_slow: String,
    pub text_slow_ok: String,
}

impl Templates {
    /// (subject, body) templates for an event kind.
    pub fn for_event(&self, kind: EventKind) -> (&str, &str) {
        match kind {
            EventKind::FailStart | EventKind::FailOngoing => (&self.subject_fail, &self.text_fail),
            EventKind::FailRecovered => (&self.subject_fail_ok, &self.text_fail_ok),
            EventKind::SlowStart | EventKind::SlowOngoing => (&self.subject_slow, &self.text_slow),
            EventKind::SlowRecovered => (&self.subject_slow_ok, &self.text_slow_ok),
        }
    }

    /// Fill every empty template from `global`, then from the built-in text.
    fn apply_defaults(&mut self, global: &Templates) {
        set_template(&mut self.subject_fail, &global.subject_fail, SUBJECT_FAIL);
        set_template(&mut self.subject_fail_ok, &global.subject_fail_ok, SUBJECT_FAIL_OK);
        set_template(&mut self.subject_slow, &global.subject_slow, SUBJECT_SLOW);
        set_template(&mut self.subject_slow_ok, &global.subject_slow_ok, SUBJECT_SLOW_OK);
        set_template(&mut self.text_fail, &global.text_fail, TEXT_FAIL);
        set_template(&mut self.text_fail_ok, &global.text_fail_ok, TEXT_FAIL_OK);
        set_template(&mut self.text_slow, &global.text_slow, TEXT_SLOW);
        set_template(&mut self.text_slow_ok, &global.text_slow_ok, TEXT_SLOW_OK);
    }
}

fn set_template(template: &mut String, global: &str, default: &str) {
    if template.is_empty() {
        *template = if global.is_empty() { default } else { global }.to_string();
    }
}

/// One `[[check]]` entry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    pub id: String,
    /// URL for web checks, host (optionally `host:port`) otherwise.
    pub check: String,
    #[serde(rename = "type")]
    pub kind: CheckKind,
    pub method: String,
    pub params: String,
    pub headers: BTreeMap<String, String>,
    pub port: Option<u16>,
    pub expected_code: u16,
    /// Milliseconds.
    pub expected_time: u64,
    pub look_for: String,
    #[serde(with = "humantime_serde")]
    pub repeat: Duration,
    pub allowed_fails: u32,
    pub allowed_slows: u32,
    pub notify_fail: Option<Vec<String>>,
    pub notify_slow: Option<Vec<String>>,
}

impl CheckConfig {
    pub fn new(id: impl Into<String>, check: impl Into<String>, kind: CheckKind) -> Self {
        Self { id: id.into(), check: check.into(), kind, ..Default::default() }
    }

    /// Notifiers to use when the check fails.
    pub fn notify_fail(&self) -> &[String] {
        self.notify_fail.as_deref().unwrap_or_default()
    }

    /// Notifiers to use when the check is slow.
    pub fn notify_slow(&self) -> &[String] {
        self.notify_slow.as_deref().unwrap_or_default()
    }

    pub fn expected_time(&self) -> Duration {
        Duration::from_millis(self.expected_time)
    }

    /// `host:port` for port checks.
    pub fn address(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{}", self.check, port),
            None => self.check.clone(),
        }
    }

    /// Headers in `Name: value` form, joined for display in templates.
    pub fn headers_line(&self) -> String {
        self.headers.iter().map(|(k, v)| format!("{k}: {v}")).collect::<Vec<_>>().join(", ")
    }

    /// Fill unset fields with defaults. Unset or empty notifier lists become
    /// `notifier_ids`.
    pub fn apply_defaults(&mut self, notifier_ids: &[String]) {
        if self.method.is_empty() {
            self.method = CHECK_METHOD.to_string();
        }
        if self.repeat.is_zero() {
            self.repeat = CHECK_REPEAT;
        }
        if self.expected_code == 0 {
            self.expected_code = CHECK_EXPECTED_CODE;
        }
        if self.expected_time == 0 {
            self.expected_time = CHECK_EXPECTED_TIME;
        }
        if self.allowed_fails < 1 {
            self.allowed_fails = CHECK_ALLOWED_FAILS;
        }
        if self.allowed_slows < 1 {
            self.allowed_slows = CHECK_ALLOWED_SLOWS;
        }
        for list in [&mut self.notify_fail, &mut self.notify_slow] {
            if list.as_ref().is_none_or(Vec::is_empty) {
                *list = Some(notifier_ids.to_vec());
            }
        }
    }

    fn expand_vars(&mut self) {
        self.check = expand_env(&self.check);
        self.params = expand_env(&self.params);
        for value in self.headers.values_mut() {
            *value = expand_env(value);
        }
    }
}

/// One `[[notify]]` entry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotifierKind,
    /// SMTP host for mail, webhook URL for chat.
    pub server: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub from: String,
    pub to: Vec<String>,
    pub ignore_cert: bool,
    /// Shell command template for `cmd` notifiers.
    pub cmd: String,
    #[serde(flatten)]
    pub templates: Templates,
    #[serde(deserialize_with = "duration::list")]
    pub repeat_fail: Option<Vec<Duration>>,
    #[serde(deserialize_with = "duration::list")]
    pub repeat_slow: Option<Vec<Duration>>,
}

impl NotifierConfig {
    pub fn new(id: impl Into<String>, kind: NotifierKind) -> Self {
        Self { id: id.into(), kind, ..Default::default() }
    }

    /// Escalation schedule for the fail or slow axis.
    pub fn repeat_schedule(&self, kind: EventKind) -> &[Duration] {
        let schedule = if kind.is_fail() { &self.repeat_fail } else { &self.repeat_slow };
        schedule.as_deref().unwrap_or_default()
    }

    /// Where messages end up, for log lines.
    pub fn target(&self) -> String {
        match self.kind {
            NotifierKind::Mail => self.to.join(", "),
            NotifierKind::Chat => self.server.clone(),
            NotifierKind::Cmd => self.cmd.clone(),
        }
    }

    pub fn apply_defaults(&mut self, global: &Templates) {
        if self.from.is_empty() {
            self.from = self.user.clone();
        }
        self.templates.apply_defaults(global);
        if self.repeat_fail.is_none() {
            self.repeat_fail = Some(default_repeat_fail());
        }
        if self.repeat_slow.is_none() {
            self.repeat_slow = Some(default_repeat_slow());
        }
    }

    fn expand_vars(&mut self) {
        self.user = expand_env(&self.user);
        self.pass = expand_env(&self.pass);
        self.server = expand_env(&self.server);
    }

    fn validate(&self) -> Result<(), Error> {
        let invalid = |reason: &str| {
            Err(Error::InvalidNotifier { id: self.id.clone(), reason: reason.to_string() })
        };
        match self.kind {
            NotifierKind::Mail => {
                if self.server.is_empty() {
                    return invalid("empty 'server', this field is mandatory");
                }
                if self.port == 0 {
                    return invalid("given 0 as 'port', this field must be non-zero");
                }
                if self.from.is_empty() && self.user.is_empty() {
                    return invalid("empty 'from', this field is mandatory");
                }
                if self.to.is_empty() {
                    return invalid("empty 'to', this field is mandatory");
                }
            }
            NotifierKind::Chat => {
                if let Err(e) = url::Url::parse(&expand_env(&self.server)) {
                    return invalid(&format!("'server' must be a webhook URL: {e}"));
                }
            }
            NotifierKind::Cmd => {
                if self.cmd.is_empty() {
                    return invalid("empty 'cmd', this field is mandatory");
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_title_2 = write_title_indented(2);
        let write_1 = write_indented(1);
        let write_2 = write_indented(2);

        writeln!(f, "Current Configuration State:")?;
        write_title_1(f, "Global")?;
        write_1(f, "Workers", &self.global.workers)?;
        write_1(f, "Log level", &self.global.loglevel)?;
        write_1(f, "HTTP timeout", &format!("{:?}", self.global.http_timeout))?;
        write_1(f, "Ping timeout", &format!("{:?}", self.global.ping_timeout))?;
        write_1(f, "Port timeout", &format!("{:?}", self.global.port_timeout))?;

        write_title_1(f, "Notifications")?;
        for notif in &self.notifiers {
            write_title_2(f, &notif.id)?;
            write_2(f, "Type", &notif.kind)?;
            write_2(f, "Target", &notif.target())?;
            write_2(f, "Repeat fail", &format!("{:?}", notif.repeat_schedule(EventKind::FailOngoing)))?;
            write_2(f, "Repeat slow", &format!("{:?}", notif.repeat_schedule(EventKind::SlowOngoing)))?;
        }

        write_title_1(f, "Checks")?;
        for check in &self.checks {
            write_title_2(f, &check.id)?;
            write_2(f, "Type", &check.kind)?;
            write_2(f, "Target", &check.check)?;
            write_2(f, "Repeat", &format!("{:?}", check.repeat))?;
            write_2(f, "Allowed fails/slows", &format!("{}/{}", check.allowed_fails, check.allowed_slows))?;
        }

        Ok(())
    }
}

impl Config {
    /// Read, validate and normalize the config file at `path`.
    ///
    /// ```no_run
    /// let cfg = uppe_monitor::config::Config::load("config.toml")?;
    /// println!("{}", cfg);
    /// # Ok::<(), uppe_monitor::config::Error>(())
    /// ```
    pub fn load(path: impl AsRef<path::Path>) -> Result<Self, Error> {
        let mut config = Self::read(path)?;
        config.validate()?;
        config.normalize();
        Ok(config)
    }

    /// Parse the config file without validating it.
    pub fn read(path: impl AsRef<path::Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let raw_string = fs::read_to_string(path)
            .map_err(|source| Error::ReadFailed { path: path.to_path_buf(), source })?;
        Self::parse(&raw_string)
    }

    pub fn parse(raw: &str) -> Result<Self, Error> {
        Ok(toml::from_str(raw)?)
    }

    /// Check that all mandatory fields are given and every reference resolves.
    pub fn validate(&self) -> Result<(), Error> {
        self.validate_global()?;
        self.validate_notifications()?;
        self.validate_checks()
    }

    fn validate_global(&self) -> Result<(), Error> {
        if self.global.workers == 0 {
            return Err(Error::NoWorkers(self.global.workers));
        }
        Ok(())
    }

    fn validate_checks(&self) -> Result<(), Error> {
        if self.checks.is_empty() {
            return Err(Error::NoChecks);
        }

        let notifier_ids = self.notifier_ids();
        let mut seen = HashSet::new();
        for (i, check) in self.checks.iter().enumerate() {
            if check.id.is_empty() {
                return Err(Error::MissingCheckId(i + 1));
            }
            if !seen.insert(check.id.as_str()) {
                return Err(Error::DuplicateCheck(check.id.clone()));
            }
            validate_check_target(check)
                .map_err(|source| Error::InvalidCheck { id: check.id.clone(), source })?;

            for (field, list) in [("notify_fail", &check.notify_fail), ("notify_slow", &check.notify_slow)]
            {
                let Some(list) = list else { continue };
                if let Some(missing) = list.iter().find(|id| !notifier_ids.contains(id)) {
                    return Err(Error::UnknownNotifier {
                        check: check.id.clone(),
                        notifier: missing.clone(),
                        field,
                    });
                }
            }
        }
        Ok(())
    }

    fn validate_notifications(&self) -> Result<(), Error> {
        let mut seen = HashSet::new();
        for (i, notif) in self.notifiers.iter().enumerate() {
            if notif.id.is_empty() {
                return Err(Error::MissingNotifierId(i + 1));
            }
            if !seen.insert(notif.id.as_str()) {
                return Err(Error::DuplicateNotifier(notif.id.clone()));
            }
            notif.validate()?;
        }
        Ok(())
    }

    /// Fill in default values and expand `$VAR`/`${VAR}` references.
    pub fn normalize(&mut self) {
        self.normalize_global();

        let notifier_ids = self.notifier_ids();
        for check in &mut self.checks {
            check.apply_defaults(&notifier_ids);
            check.expand_vars();
        }
        for notif in &mut self.notifiers {
            notif.apply_defaults(&self.global.templates);
            notif.expand_vars();
        }
    }

    fn normalize_global(&mut self) {
        let global = &mut self.global;
        if global.loglevel.is_empty() {
            global.loglevel = LOGLEVEL.to_string();
        }
        for (timeout, default) in [
            (&mut global.http_timeout, HTTP_TIMEOUT),
            (&mut global.ping_timeout, PING_TIMEOUT),
            (&mut global.port_timeout, PORT_TIMEOUT),
            (&mut global.notify_timeout, NOTIFY_TIMEOUT),
        ] {
            if timeout.is_zero() {
                *timeout = default;
            }
        }
    }

    fn notifier_ids(&self) -> Vec<String> {
        self.notifiers.iter().map(|n| n.id.clone()).collect()
    }
}

/// Repeat schedules: a list of humantime durations (`["1m", "5m", "0"]`).
pub mod duration {
    use std::time::Duration;

    use humantime_serde::Serde;
    use serde::{Deserialize, Deserializer};

    pub fn list<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<Duration>>, D::Error> {
        let raw: Option<Vec<Serde<Duration>>> = Option::deserialize(deserializer)?;
        Ok(raw.map(|items| items.into_iter().map(Serde::into_inner).collect()))
    }
}
