//! Configuration loading helpers for the command-line runtime.
//!
//! Only flags the configuration layer understands are forwarded to
//! `ortho_config`; everything from the first other token onwards belongs to
//! clap.

use std::ffi::{OsStr, OsString};

use ortho_config::OrthoConfig;
use pulse_config::Config;

use crate::AppError;

/// Flags recognised by the configuration loader. Mirrors the fields of
/// [`Config`] plus `--config-path`.
const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--runtime-dir",
    "--log-filter",
    "--log-format",
    "--heartbeat-interval-ms",
    "--restart-grace-ms",
    "--shutdown-timeout-ms",
];

pub(crate) trait ConfigLoader {
    /// Loads configuration from the filtered configuration arguments.
    fn load(&self, args: &[OsString]) -> Result<Config, AppError>;
}

pub(crate) struct OrthoConfigLoader;

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, AppError> {
        Config::load_from_iter(args.iter().cloned()).map_err(AppError::LoadConfiguration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagAction {
    Include { needs_value: bool },
    Skip,
}

fn classify(argument: &OsStr) -> FlagAction {
    let text = argument.to_string_lossy();
    if !text.starts_with("--") {
        return FlagAction::Skip;
    }
    let (flag, has_inline_value) = match text.split_once('=') {
        Some((flag, _)) => (flag, true),
        None => (&*text, false),
    };
    if CONFIG_CLI_FLAGS.contains(&flag) {
        FlagAction::Include {
            needs_value: !has_inline_value,
        }
    } else {
        FlagAction::Skip
    }
}

/// Arguments split into the configuration prefix and the command suffix.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct ConfigArgumentSplit {
    /// Program name followed by the leading configuration flags.
    pub(crate) config_arguments: Vec<OsString>,
    /// Program name followed by everything clap should parse.
    pub(crate) command_arguments: Vec<OsString>,
}

pub(crate) fn split_config_arguments(args: &[OsString]) -> ConfigArgumentSplit {
    let Some((program, rest)) = args.split_first() else {
        return ConfigArgumentSplit {
            config_arguments: Vec::new(),
            command_arguments: Vec::new(),
        };
    };

    let mut config_arguments = vec![program.clone()];
    let mut index = 0;
    while index < rest.len() {
        match classify(&rest[index]) {
            FlagAction::Include { needs_value } => {
                config_arguments.push(rest[index].clone());
                index += 1;
                if needs_value && index < rest.len() {
                    config_arguments.push(rest[index].clone());
                    index += 1;
                }
            }
            FlagAction::Skip => break,
        }
    }

    let mut command_arguments = vec![program.clone()];
    command_arguments.extend(rest[index..].iter().cloned());
    ConfigArgumentSplit {
        config_arguments,
        command_arguments,
    }
}
