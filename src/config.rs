//! Optional TOML configuration file.
//!
//! ```toml
//! [tools]
//! krt = "/opt/atelierb-free-24.04.2/bin/krt"
//! pp_kin = "/opt/atelierb-free-24.04.2/bin/PP.kin"
//! replay_kin = "atelierb/tools/linux_x64/REPLAY.kin"
//!
//! [timeouts]
//! pp = 60
//! replay = 120
//!
//! [thresholds]
//! empty_artifact_bytes = 10
//! min_replay_output_chars = 10
//!
//! [output]
//! dir = "results"
//! jobs = 4
//! ```
//!
//! Every key is optional. Command-line flags win over the file, the file wins
//! over built-in defaults. Relative paths are taken relative to the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::engine::{MIN_REPLAY_OUTPUT_CHARS, ToolOverrides};
use crate::triage::EMPTY_ARTIFACT_THRESHOLD;
use crate::{BenchError, BenchResult};

pub const DEFAULT_PP_TIMEOUT_SECS: f64 = 60.0;
pub const DEFAULT_REPLAY_TIMEOUT_SECS: f64 = 120.0;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolsConfig {
    pub krt: Option<PathBuf>,
    pub pp_kin: Option<PathBuf>,
    pub replay_kin: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutsConfig {
    pub pp: Option<f64>,
    pub replay: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThresholdsConfig {
    pub empty_artifact_bytes: Option<u64>,
    pub min_replay_output_chars: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub dir: Option<PathBuf>,
    pub jobs: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BenchConfig {
    pub tools: ToolsConfig,
    pub timeouts: TimeoutsConfig,
    pub thresholds: ThresholdsConfig,
    pub output: OutputConfig,
}

/// Parse a config file. Relative paths inside it are resolved against its directory.
pub fn load_config(path: &Path) -> BenchResult<BenchConfig> {
    let s = std::fs::read_to_string(path).map_err(|e| BenchError::io("failed to read", path, e))?;
    let mut cfg: BenchConfig =
        toml::from_str(&s).map_err(|e| BenchError::Config { path: path.to_path_buf(), source: e })?;
    let base = path.parent().unwrap_or(Path::new(""));
    for p in [
        &mut cfg.tools.krt,
        &mut cfg.tools.pp_kin,
        &mut cfg.tools.replay_kin,
        &mut cfg.output.dir,
    ]
    .into_iter()
    .flatten()
    {
        if p.is_relative() {
            *p = base.join(&*p);
        }
    }
    Ok(cfg)
}

/// Convert a seconds value from the command line or config into a duration.
pub fn seconds(value: f64, what: &str) -> BenchResult<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| BenchError::Message(format!("invalid {what} timeout: {value}")))
}

impl BenchConfig {
    /// Tool paths from `cli`, falling back to the file.
    pub fn tool_overrides(&self, cli: &ToolOverrides) -> ToolOverrides {
        ToolOverrides {
            krt: cli.krt.clone().or_else(|| self.tools.krt.clone()),
            prove_module: cli.prove_module.clone().or_else(|| self.tools.pp_kin.clone()),
            replay_module: cli.replay_module.clone().or_else(|| self.tools.replay_kin.clone()),
        }
    }

    /// Stage timeouts. `both` (the `-t` flag) overrides the per-stage values.
    pub fn timeouts(
        &self,
        both: Option<f64>,
        pp: Option<f64>,
        replay: Option<f64>,
    ) -> BenchResult<(Duration, Duration)> {
        let pp = both.or(pp).or(self.timeouts.pp).unwrap_or(DEFAULT_PP_TIMEOUT_SECS);
        let replay = both
            .or(replay)
            .or(self.timeouts.replay)
            .unwrap_or(DEFAULT_REPLAY_TIMEOUT_SECS);
        Ok((seconds(pp, "PP")?, seconds(replay, "REPLAY")?))
    }

    pub fn empty_artifact_threshold(&self) -> u64 {
        self.thresholds.empty_artifact_bytes.unwrap_or(EMPTY_ARTIFACT_THRESHOLD)
    }

    pub fn min_replay_output_chars(&self) -> usize {
        self.thresholds.min_replay_output_chars.unwrap_or(MIN_REPLAY_OUTPUT_CHARS)
    }

    pub fn jobs(&self, cli: Option<usize>) -> usize {
        cli.or(self.output.jobs).unwrap_or(1).max(1)
    }

    pub fn output_dir(&self, cli: Option<&Path>) -> Option<PathBuf> {
        cli.map(Path::to_path_buf).or_else(|| self.output.dir.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let cfg: BenchConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, BenchConfig::default());
        let (pp, replay) = cfg.timeouts(None, None, None).unwrap();
        assert_eq!(pp, Duration::from_secs(60));
        assert_eq!(replay, Duration::from_secs(120));
        assert_eq!(cfg.empty_artifact_threshold(), 10);
        assert_eq!(cfg.min_replay_output_chars(), 10);
        assert_eq!(cfg.jobs(None), 1);
    }

    #[test]
    fn test_precedence_cli_over_file() {
        let cfg: BenchConfig = toml::from_str(
            "[timeouts]\npp = 5\nreplay = 7.5\n[output]\njobs = 3\n[tools]\nkrt = \"/cfg/krt\"\n",
        )
        .unwrap();
        assert_eq!(
            cfg.timeouts(None, None, None).unwrap(),
            (Duration::from_secs(5), Duration::from_secs_f64(7.5))
        );
        assert_eq!(
            cfg.timeouts(None, Some(1.0), None).unwrap(),
            (Duration::from_secs(1), Duration::from_secs_f64(7.5))
        );
        assert_eq!(
            cfg.timeouts(Some(2.0), Some(1.0), Some(9.0)).unwrap(),
            (Duration::from_secs(2), Duration::from_secs(2))
        );
        assert_eq!(cfg.jobs(None), 3);
        assert_eq!(cfg.jobs(Some(0)), 1);

        let cli = ToolOverrides { krt: Some("/cli/krt".into()), ..Default::default() };
        assert_eq!(cfg.tool_overrides(&cli).krt, Some(PathBuf::from("/cli/krt")));
        assert_eq!(cfg.tool_overrides(&ToolOverrides::default()).krt, Some(PathBuf::from("/cfg/krt")));
    }

    #[test]
    fn test_negative_timeout_rejected() {
        let cfg = BenchConfig::default();
        assert!(cfg.timeouts(Some(-1.0), None, None).is_err());
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.toml");
        std::fs::write(&path, "[tools]\nreplay_kin = \"tools/REPLAY.kin\"\nkrt = \"/abs/krt\"\n").unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.tools.replay_kin, Some(dir.path().join("tools/REPLAY.kin")));
        assert_eq!(cfg.tools.krt, Some(PathBuf::from("/abs/krt")));
    }

    #[test]
    fn test_unknown_key_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.toml");
        std::fs::write(&path, "[timeouts]\nstage3 = 1\n").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, BenchError::Config { .. }));
    }
}
