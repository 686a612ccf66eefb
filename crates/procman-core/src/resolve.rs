//! Command resolution: picks the command that applies to a platform and turns it
//! into a ready-to-spawn [`ResolvedInvocation`].

use crate::config::{CommandSpec, Platform};
use crate::error::{ProcmanError, Result};
use base64::Engine;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

const REDACTED: &str = "<redacted>";

/// Concrete, immutable form of a [`CommandSpec`] for one platform
#[derive(Clone, PartialEq)]
pub struct ResolvedInvocation {
    argv: Vec<String>,
    env: Vec<(String, String)>,
    sensitive_keys: BTreeSet<String>,
    working_directory: Option<PathBuf>,
    stdin: Option<Vec<u8>>,
}

impl ResolvedInvocation {
    /// Program to execute (first element of the argument vector)
    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or_default()
    }

    /// Arguments after the program, the command string last
    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Merged environment, ordered by key
    pub fn env(&self) -> &[(String, String)] {
        &self.env
    }

    pub fn working_directory(&self) -> Option<&PathBuf> {
        self.working_directory.as_ref()
    }

    pub fn stdin(&self) -> Option<&[u8]> {
        self.stdin.as_deref()
    }

    /// `KEY=VALUE` entries with sensitive values masked
    pub fn redacted_env(&self) -> Vec<String> {
        self.env
            .iter()
            .map(|(key, value)| {
                if self.sensitive_keys.contains(key) {
                    format!("{key}={REDACTED}")
                } else {
                    format!("{key}={value}")
                }
            })
            .collect()
    }

    /// Build a tokio command for this invocation.
    ///
    /// The merged environment is layered over the inherited one: configured
    /// variables add to or override the host's, they never replace the whole
    /// environment, so `PATH` and friends stay visible to the interpreter.
    /// Stdin is piped only when a payload exists; stdout/stderr are left to
    /// the caller.
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(self.program());
        cmd.args(self.args());
        cmd.envs(self.env.iter().map(|(k, v)| (k, v)));

        if let Some(dir) = &self.working_directory {
            cmd.current_dir(dir);
        }

        cmd.stdin(if self.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

        cmd
    }
}

impl fmt::Debug for ResolvedInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedInvocation")
            .field("argv", &self.argv)
            .field("env", &self.redacted_env())
            .field("working_directory", &self.working_directory)
            .field("stdin_len", &self.stdin.as_ref().map(Vec::len))
            .finish()
    }
}

/// Select the first spec (in declaration order) applying to `platform` and
/// resolve it.
///
/// `Ok(None)` means no spec targets the platform; callers treat that as a
/// no-op rather than an error.
pub fn resolve(specs: &[CommandSpec], platform: Platform) -> Result<Option<ResolvedInvocation>> {
    let Some(spec) = specs.iter().find(|spec| spec.applies_to(platform)) else {
        debug!(%platform, candidates = specs.len(), "No command applies to platform");
        return Ok(None);
    };

    let invocation = resolve_spec(spec, platform)?;
    debug!(
        %platform,
        argv = ?invocation.argv,
        env = ?invocation.redacted_env(),
        "Resolved command"
    );
    Ok(Some(invocation))
}

fn resolve_spec(spec: &CommandSpec, platform: Platform) -> Result<ResolvedInvocation> {
    let mut argv = if spec.interpreter.is_empty() {
        platform.default_interpreter()
    } else {
        spec.interpreter.clone()
    };
    argv.push(spec.command.clone());

    // Sensitive values override plain ones on key collisions.
    let mut merged: BTreeMap<String, String> = spec.environment.clone();
    merged.extend(
        spec.sensitive_environment
            .iter()
            .map(|(k, v)| (k.clone(), v.clone())),
    );

    Ok(ResolvedInvocation {
        argv,
        env: merged.into_iter().collect(),
        sensitive_keys: spec.sensitive_environment.keys().cloned().collect(),
        working_directory: spec.working_directory.clone(),
        stdin: prepare_stdin(spec.stdin.as_deref(), spec.stdin_base64.as_deref())?,
    })
}

fn prepare_stdin(literal: Option<&str>, encoded: Option<&str>) -> Result<Option<Vec<u8>>> {
    let literal = literal.filter(|s| !s.is_empty());
    let encoded = encoded.filter(|s| !s.is_empty());

    match (literal, encoded) {
        (Some(_), Some(_)) => Err(ProcmanError::configuration(
            "`stdin` and `stdin_base64` are mutually exclusive stdin sources",
        )),
        (Some(text), None) => Ok(Some(text.as_bytes().to_vec())),
        (None, Some(encoded)) => Ok(Some(
            base64::engine::general_purpose::STANDARD.decode(encoded)?,
        )),
        (None, None) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(platforms: &[Platform], command: &str) -> CommandSpec {
        CommandSpec::builder()
            .platforms(platforms.iter().copied())
            .command(command)
            .build()
            .unwrap()
    }

    #[test]
    fn test_first_matching_spec_wins() {
        let specs = vec![
            spec(&[Platform::Windows], "dir"),
            spec(&[Platform::Linux, Platform::Darwin], "ls -a"),
            spec(&[Platform::Linux], "ls -l"),
        ];

        let invocation = resolve(&specs, Platform::Linux).unwrap().unwrap();
        assert_eq!(invocation.argv(), ["/bin/bash", "-c", "ls -a"]);

        let invocation = resolve(&specs, Platform::Windows).unwrap().unwrap();
        assert_eq!(invocation.program(), "powershell.exe");
        assert_eq!(invocation.args(), ["dir"]);
    }

    #[test]
    fn test_no_applicable_command() {
        let specs = vec![spec(&[Platform::Windows], "dir")];
        assert!(resolve(&specs, Platform::Openbsd).unwrap().is_none());
        assert!(resolve(&[], Platform::Linux).unwrap().is_none());
    }

    #[test]
    fn test_custom_interpreter() {
        let spec = CommandSpec::builder()
            .platform(Platform::Linux)
            .interpreter(["/usr/bin/env", "python3", "-c"])
            .command("print(1)")
            .build()
            .unwrap();

        let invocation = resolve(&[spec], Platform::Linux).unwrap().unwrap();
        assert_eq!(invocation.program(), "/usr/bin/env");
        assert_eq!(invocation.args(), ["python3", "-c", "print(1)"]);
    }

    #[test]
    fn test_environment_merge_sensitive_wins() {
        let spec = CommandSpec::builder()
            .platform(Platform::Linux)
            .command("env")
            .env("B", "plain-b")
            .env("SHARED", "plain")
            .sensitive_env("SHARED", "secret")
            .sensitive_env("A", "secret-a")
            .build()
            .unwrap();

        let invocation = resolve(&[spec], Platform::Linux).unwrap().unwrap();
        assert_eq!(
            invocation.env(),
            [
                ("A".to_string(), "secret-a".to_string()),
                ("B".to_string(), "plain-b".to_string()),
                ("SHARED".to_string(), "secret".to_string()),
            ]
        );
        assert_eq!(
            invocation.redacted_env(),
            ["A=<redacted>", "B=plain-b", "SHARED=<redacted>"]
        );

        let debug = format!("{invocation:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("plain-b"));
    }

    #[test]
    fn test_stdin_literal_and_base64() {
        assert_eq!(
            prepare_stdin(Some("hello"), None).unwrap(),
            Some(b"hello".to_vec())
        );
        assert_eq!(
            prepare_stdin(None, Some("aGVsbG8=")).unwrap(),
            Some(b"hello".to_vec())
        );
        assert_eq!(prepare_stdin(Some(""), Some("")).unwrap(), None);
        assert_eq!(prepare_stdin(None, None).unwrap(), None);
    }

    #[test]
    fn test_conflicting_stdin_is_configuration_error() {
        let mut spec = spec(&[Platform::Linux], "cat");
        spec.stdin = Some("text".to_string());
        spec.stdin_base64 = Some("dGV4dA==".to_string());

        let error = resolve(&[spec], Platform::Linux).unwrap_err();
        assert!(matches!(error, ProcmanError::Configuration(_)));
    }

    #[test]
    fn test_invalid_base64_is_decoding_error() {
        let mut spec = spec(&[Platform::Linux], "cat");
        spec.stdin_base64 = Some("%%% not base64".to_string());

        let error = resolve(&[spec], Platform::Linux).unwrap_err();
        assert!(matches!(error, ProcmanError::Decoding(_)));
    }

    #[test]
    fn test_conflict_in_skipped_spec_is_ignored() {
        let mut windows = spec(&[Platform::Windows], "type");
        windows.stdin = Some("a".to_string());
        windows.stdin_base64 = Some("Yg==".to_string());

        let specs = vec![windows, spec(&[Platform::Linux], "cat")];
        assert!(resolve(&specs, Platform::Linux).unwrap().is_some());
    }
}
