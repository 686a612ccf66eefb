use crate::error::{ProcmanError, Result};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Operating systems a [`CommandSpec`] can be scoped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Darwin,
    Freebsd,
    Linux,
    Openbsd,
    Solaris,
    Windows,
}

impl Platform {
    pub const ALL: [Platform; 6] = [
        Platform::Darwin,
        Platform::Freebsd,
        Platform::Linux,
        Platform::Openbsd,
        Platform::Solaris,
        Platform::Windows,
    ];

    /// The platform of the running host, or `None` when the host OS is not
    /// one of the supported platforms.
    pub fn current() -> Option<Self> {
        match std::env::consts::OS {
            "macos" => Some(Platform::Darwin),
            "freebsd" => Some(Platform::Freebsd),
            "linux" => Some(Platform::Linux),
            "openbsd" => Some(Platform::Openbsd),
            "solaris" => Some(Platform::Solaris),
            "windows" => Some(Platform::Windows),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Darwin => "darwin",
            Platform::Freebsd => "freebsd",
            Platform::Linux => "linux",
            Platform::Openbsd => "openbsd",
            Platform::Solaris => "solaris",
            Platform::Windows => "windows",
        }
    }

    /// Interpreter used when a spec does not provide one
    pub fn default_interpreter(&self) -> Vec<String> {
        match self {
            Platform::Windows => vec!["powershell.exe".to_string()],
            _ => vec!["/bin/bash".to_string(), "-c".to_string()],
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = ProcmanError;

    fn from_str(s: &str) -> Result<Self> {
        Platform::ALL
            .into_iter()
            .find(|platform| platform.as_str() == s)
            .ok_or_else(|| ProcmanError::configuration(format!("unknown platform `{s}`")))
    }
}

/// One platform-scoped invocation definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(
    setter(into, strip_option),
    build_fn(validate = "Self::validate")
)]
pub struct CommandSpec {
    #[builder(default, setter(custom))]
    pub platforms: BTreeSet<Platform>,
    pub command: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[builder(default, setter(custom))]
    pub interpreter: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    #[builder(default, setter(custom))]
    pub environment: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    #[builder(default, setter(custom))]
    pub sensitive_environment: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub working_directory: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub stdin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub stdin_base64: Option<String>,
}

impl CommandSpec {
    pub fn builder() -> CommandSpecBuilder {
        CommandSpecBuilder::default()
    }

    pub fn applies_to(&self, platform: Platform) -> bool {
        self.platforms.contains(&platform)
    }
}

impl CommandSpecBuilder {
    pub fn platforms<I: IntoIterator<Item = Platform>>(&mut self, iter: I) -> &mut Self {
        self.platforms = Some(iter.into_iter().collect());
        self
    }

    pub fn platform(&mut self, platform: Platform) -> &mut Self {
        self.platforms
            .get_or_insert_with(BTreeSet::new)
            .insert(platform);
        self
    }

    pub fn interpreter<S: ToString, I: IntoIterator<Item = S>>(&mut self, iter: I) -> &mut Self {
        self.interpreter = Some(iter.into_iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn env<T: ToString>(&mut self, key: T, value: T) -> &mut Self {
        let map = self.environment.get_or_insert_with(BTreeMap::new);
        map.insert(key.to_string(), value.to_string());
        self
    }

    pub fn sensitive_env<T: ToString>(&mut self, key: T, value: T) -> &mut Self {
        let map = self.sensitive_environment.get_or_insert_with(BTreeMap::new);
        map.insert(key.to_string(), value.to_string());
        self
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.platforms.as_ref().is_none_or(BTreeSet::is_empty) {
            return Err("a command needs at least one platform".to_string());
        }

        let literal = self.stdin.as_ref().and_then(|s| s.as_deref());
        let encoded = self.stdin_base64.as_ref().and_then(|s| s.as_deref());
        if literal.is_some_and(|s| !s.is_empty()) && encoded.is_some_and(|s| !s.is_empty()) {
            return Err("`stdin` and `stdin_base64` are mutually exclusive".to_string());
        }

        Ok(())
    }
}

/// Options for a synchronous, optionally retried run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct RunOptions {
    /// Total number of attempts, at least 1
    #[serde(default = "default_tries")]
    pub tries: u32,

    /// Delay between a failed attempt and the next one (in milliseconds)
    #[serde(default = "default_retry_interval_ms", alias = "retry_interval")]
    pub retry_interval_ms: u64,

    /// Wall-clock limit per attempt (in milliseconds), 0 disables the timeout
    #[serde(default = "default_timeout_ms", alias = "timeout")]
    pub timeout_ms: u64,

    /// Escalate a failing final attempt to an error diagnostic
    #[serde(default)]
    pub fail_on_error: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            tries: default_tries(),
            retry_interval_ms: default_retry_interval_ms(),
            timeout_ms: default_timeout_ms(),
            fail_on_error: false,
        }
    }
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tries(mut self, tries: u32) -> Self {
        self.tries = tries;
        self
    }

    pub fn with_retry_interval_ms(mut self, retry_interval_ms: u64) -> Self {
        self.retry_interval_ms = retry_interval_ms;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_fail_on_error(mut self, fail_on_error: bool) -> Self {
        self.fail_on_error = fail_on_error;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.tries == 0 {
            return Err(ProcmanError::configuration("tries must be at least 1"));
        }
        Ok(())
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    /// `None` when no timeout is enforced
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms != 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    pub fn retries_enabled(&self) -> bool {
        self.tries > 1
    }
}

// Default value functions for serde
fn default_tries() -> u32 {
    1
}
fn default_retry_interval_ms() -> u64 {
    500
}
fn default_timeout_ms() -> u64 {
    500
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_round_trip_names() {
        for platform in Platform::ALL {
            assert_eq!(platform.as_str().parse::<Platform>().unwrap(), platform);
        }
        assert!("macos".parse::<Platform>().is_err());
        assert!("".parse::<Platform>().is_err());
    }

    #[test]
    fn test_default_interpreter() {
        assert_eq!(
            Platform::Windows.default_interpreter(),
            vec!["powershell.exe".to_string()]
        );
        assert_eq!(
            Platform::Linux.default_interpreter(),
            vec!["/bin/bash".to_string(), "-c".to_string()]
        );
        assert_eq!(
            Platform::Darwin.default_interpreter(),
            Platform::Solaris.default_interpreter()
        );
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_current_platform() {
        assert_eq!(Platform::current(), Some(Platform::Linux));
    }

    #[test]
    fn test_builder() {
        let spec = CommandSpec::builder()
            .platforms([Platform::Linux, Platform::Darwin])
            .command("echo hi")
            .env("A", "1")
            .sensitive_env("TOKEN", "secret")
            .working_directory("/tmp")
            .build()
            .unwrap();

        assert!(spec.applies_to(Platform::Linux));
        assert!(!spec.applies_to(Platform::Windows));
        assert_eq!(spec.environment.get("A").map(String::as_str), Some("1"));
        assert_eq!(
            spec.sensitive_environment.get("TOKEN").map(String::as_str),
            Some("secret")
        );
        assert_eq!(spec.working_directory, Some(PathBuf::from("/tmp")));
        assert!(spec.interpreter.is_empty());
        assert!(spec.stdin.is_none());
    }

    #[test]
    fn test_builder_requires_platform() {
        let error = CommandSpec::builder()
            .command("echo hi")
            .build()
            .unwrap_err();
        assert!(error.to_string().contains("at least one platform"));
    }

    #[test]
    fn test_builder_rejects_both_stdin_sources() {
        let error = CommandSpec::builder()
            .platform(Platform::Linux)
            .command("cat")
            .stdin("text")
            .stdin_base64("dGV4dA==")
            .build()
            .unwrap_err();
        assert!(error.to_string().contains("mutually exclusive"));

        // An empty literal does not count as a source.
        let spec = CommandSpec::builder()
            .platform(Platform::Linux)
            .command("cat")
            .stdin("")
            .stdin_base64("dGV4dA==")
            .build();
        assert!(spec.is_ok());
    }

    #[test]
    fn test_deserialize_command_spec() {
        let json = r#"{
            "platforms": ["linux", "darwin"],
            "command": "echo $GREETING",
            "environment": {"GREETING": "hello"},
            "stdin": "payload"
        }"#;
        let spec: CommandSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.platforms.len(), 2);
        assert_eq!(spec.command, "echo $GREETING");
        assert_eq!(spec.stdin.as_deref(), Some("payload"));
        assert!(spec.sensitive_environment.is_empty());
        assert!(spec.working_directory.is_none());

        let bad = r#"{"platforms": ["plan9"], "command": "x"}"#;
        assert!(serde_json::from_str::<CommandSpec>(bad).is_err());
    }

    #[test]
    fn test_default_run_options() {
        let options = RunOptions::default();
        assert!(options.validate().is_ok());
        assert_eq!(options.tries, 1);
        assert_eq!(options.retry_interval(), Duration::from_millis(500));
        assert_eq!(options.timeout(), Some(Duration::from_millis(500)));
        assert!(!options.fail_on_error);
        assert!(!options.retries_enabled());
    }

    #[test]
    fn test_zero_timeout_disables_timeout() {
        let options = RunOptions::new().with_timeout_ms(0);
        assert_eq!(options.timeout(), None);
    }

    #[test]
    fn test_invalid_tries() {
        let error = RunOptions::new().with_tries(0).validate().unwrap_err();
        assert!(error.is_configuration());
        assert!(RunOptions::new().with_tries(3).retries_enabled());
    }

    #[test]
    fn test_run_options_serialization() {
        let options: RunOptions =
            serde_json::from_str(r#"{"tries": 3, "retry_interval": 10, "fail_on_error": true}"#)
                .unwrap();
        assert_eq!(options.tries, 3);
        assert_eq!(options.retry_interval_ms, 10);
        assert_eq!(options.timeout_ms, 500);
        assert!(options.fail_on_error);

        let json = serde_json::to_string(&options).unwrap();
        let deserialized: RunOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(options, deserialized);
    }
}
