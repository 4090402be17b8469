//! `${NAME}` substitution for config files and command text.
//!
//! Config files get environment substitution before parsing. Only
//! allowlisted variables (and `PAR_AUTORUN_*` / `LC_*` prefixed ones) are
//! resolved by default so a shared config cannot leak secrets into shell
//! commands. The same placeholder syntax is reused by the pipeline's
//! variable substitution filter through [`substitute_with`].

use regex::Regex;
use std::sync::LazyLock;

/// Matches `${VAR_NAME}` or `${VAR_NAME:-default_value}`.
static VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-((?:[^}\\]|\\.)*))?}")
        .expect("variable substitution regex is a compile-time constant and must be valid")
});

/// Matches `allow_all_env_vars: true` at the top level of YAML.
static ALLOW_ALL_ENV_VARS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^allow_all_env_vars:\s*true\s*$")
        .expect("allow_all_env_vars pre-scan regex is a compile-time constant and must be valid")
});

/// Environment variables that are safe to substitute in config files.
pub const ALLOWED_ENV_VARS: &[&str] = &[
    // User / home
    "HOME",
    "USER",
    "USERNAME",
    "LOGNAME",
    "USERPROFILE", // Windows
    // Shell
    "SHELL",
    "TERM",
    "LANG",
    // XDG directories
    "XDG_CONFIG_HOME",
    "XDG_DATA_HOME",
    "XDG_STATE_HOME",
    "XDG_CACHE_HOME",
    "XDG_RUNTIME_DIR",
    // System paths
    "PATH",
    "PWD",
    "TMPDIR",
    "TEMP",
    "TMP",
    // Host
    "HOSTNAME",
    "HOST",
    // Windows paths
    "APPDATA",
    "LOCALAPPDATA",
    "COMSPEC",
];

/// Check whether a variable name is on the substitution allowlist.
pub fn is_env_var_allowed(var_name: &str) -> bool {
    ALLOWED_ENV_VARS.contains(&var_name)
        || var_name.starts_with("PAR_AUTORUN_")
        || var_name.starts_with("LC_")
}

/// Substitute `${NAME}` placeholders using `lookup`.
///
/// - `${NAME}` is replaced by `lookup(NAME)`; when that returns `None` the
///   `:-default` value is used if present, otherwise the placeholder stays.
/// - `$${NAME}` is an escape and produces the literal `${NAME}`.
pub fn substitute_with<F>(input: &str, mut lookup: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    if !input.contains("${") {
        return input.to_string();
    }

    let escaped_placeholder = "\x00ESC_DOLLAR\x00";
    let working = input.replace("$${", escaped_placeholder);

    let result = VAR_PATTERN.replace_all(&working, |caps: &regex::Captures| {
        match lookup(&caps[1]) {
            Some(value) => value,
            None => caps
                .get(2)
                .map(|m| m.as_str().replace("\\}", "}"))
                .unwrap_or_else(|| caps[0].to_string()),
        }
    });

    result.replace(escaped_placeholder, "${")
}

/// Substitute allowlisted environment variables.
pub fn substitute_variables(input: &str) -> String {
    substitute_variables_with_allowlist(input, false)
}

/// Substitute environment variables with explicit allowlist control.
///
/// When `allow_all` is `false`, non-allowlisted references are left as
/// literal text and a warning is logged.
pub fn substitute_variables_with_allowlist(input: &str, allow_all: bool) -> String {
    substitute_with(input, |name| {
        if !allow_all && !is_env_var_allowed(name) {
            log::warn!(
                "Config references non-allowlisted environment variable ${{{name}}}, skipped. \
                 Add `allow_all_env_vars: true` to your config to allow all variables."
            );
            return None;
        }
        std::env::var(name).ok()
    })
}

/// Quick pre-scan of raw YAML text for `allow_all_env_vars: true`.
///
/// The answer is needed before substitution runs, so before parsing.
pub(crate) fn pre_scan_allow_all_env_vars(raw_yaml: &str) -> bool {
    ALLOW_ALL_ENV_VARS_PATTERN.is_match(raw_yaml)
}
