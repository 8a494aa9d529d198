use compio::{fs::File, io::AsyncReadExt, io::BufReader};
use hashlink::LinkedHashMap;
use saphyr::{LoadableYamlNode, Scalar, Yaml};
use snafu::prelude::*;
use std::{
    borrow::Cow,
    io::{Cursor, ErrorKind},
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};
use tracing::debug;

use crate::ext::BestEffortPathExt;
use crate::watcher::DEFAULT_RENAME_TIMEOUT;

const CONFIG_FILE_NAME: &str = "rmirror.yaml";

pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_LATENCY: Duration = Duration::from_millis(5000);
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_millis(5000);

pub fn get_config_file_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE_NAME)
}

/// Where the replica lives: an ssh destination and a directory on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub host: String,
    pub root: String,
    pub port: Option<u16>,
    pub options: Vec<String>,
}

impl FromStr for RemoteTarget {
    type Err = ConfigError;

    /// Parses `HOST:PATH`, the form accepted by `--remote`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (host, root) = value
            .split_once(':')
            .filter(|(host, root)| !host.is_empty() && !root.is_empty())
            .context(InvalidRemoteSnafu { value })?;
        Ok(Self {
            host: host.to_string(),
            root: root.to_string(),
            port: None,
            options: Vec::new(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub remote: Option<RemoteTarget>,
    pub exclude: Vec<String>,
    pub quiet_period: Duration,
    pub max_latency: Duration,
    pub rename_timeout: Duration,
    pub probe_interval: Duration,
    pub history: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote: None,
            exclude: Vec::new(),
            quiet_period: DEFAULT_QUIET_PERIOD,
            max_latency: DEFAULT_MAX_LATENCY,
            rename_timeout: DEFAULT_RENAME_TIMEOUT,
            probe_interval: DEFAULT_PROBE_INTERVAL,
            history: false,
        }
    }
}

impl SyncConfig {
    /// Reads `<root>/rmirror.yaml`, falling back to the defaults when the
    /// file does not exist.
    pub async fn read(root: &Path) -> Result<Self, ConfigError> {
        let path = get_config_file_path(root);
        match Self::from_path(path.clone()).await {
            Err(ConfigError::ReadError { source, .. }) if source.kind() == ErrorKind::NotFound => {
                debug!(
                    "No config file at {}, using defaults",
                    path.best_effort_path_display()
                );
                Ok(Self::default())
            }
            other => other,
        }
    }

    pub async fn from_path(path: PathBuf) -> Result<Self, ConfigError> {
        debug!("Opening config file: {}", path.best_effort_path_display());
        let file = File::open(&path).await.context(ReadSnafu {
            file_path: path.best_effort_path_display(),
        })?;

        let cursor = Cursor::new(file);
        let mut reader = BufReader::new(cursor);
        let res = reader.read_to_string(String::new()).await;
        match res.0 {
            Ok(n) => debug!("Successfully read config file: {n} bytes"),
            _ => {
                res.0.context(ReadSnafu {
                    file_path: path.best_effort_path_display(),
                })?;
            }
        }
        res.1.as_str().try_into()
    }

    /// Applies a `--remote HOST:PATH` override, keeping the port and ssh
    /// options from the file.
    pub fn override_remote(&mut self, target: RemoteTarget) {
        match self.remote.as_mut() {
            Some(remote) => {
                remote.host = target.host;
                remote.root = target.root;
            }
            None => self.remote = Some(target),
        }
    }

    fn parse_remote(value: &Yaml) -> Result<RemoteTarget, ConfigError> {
        let remote = value.as_mapping().context(RemoteNotMapSnafu)?;
        let host = string_value(remote, "host")?.context(MissingRemoteFieldSnafu { field: "host" })?;
        let root = string_value(remote, "root")?.context(MissingRemoteFieldSnafu { field: "root" })?;
        let port = integer_value(remote, "port")?
            .map(|port| u16::try_from(port).ok().context(InvalidValueSnafu { key: "port" }))
            .transpose()?;
        let options = string_list(remote, "options")?.unwrap_or_default();

        Ok(RemoteTarget {
            host,
            root,
            port,
            options,
        })
    }
}

impl TryFrom<&str> for SyncConfig {
    type Error = ConfigError;

    fn try_from(contents: &str) -> Result<Self, Self::Error> {
        let contents_vec =
            Yaml::load_from_str(contents).map_err(|e| ConfigError::ParseError { source: e })?;
        let Some(contents) = contents_vec.first() else {
            return Ok(Self::default());
        };

        let top_level = contents.as_mapping().context(TopLevelNotMapSnafu)?;
        let defaults = Self::default();

        Ok(Self {
            remote: top_level
                .get(&key("remote"))
                .map(Self::parse_remote)
                .transpose()?,
            exclude: string_list(top_level, "exclude")?.unwrap_or_default(),
            quiet_period: duration_value(top_level, "quiet_period_ms")?
                .unwrap_or(defaults.quiet_period),
            max_latency: duration_value(top_level, "max_latency_ms")?
                .unwrap_or(defaults.max_latency),
            rename_timeout: duration_value(top_level, "rename_timeout_ms")?
                .unwrap_or(defaults.rename_timeout),
            probe_interval: duration_value(top_level, "probe_interval_ms")?
                .unwrap_or(defaults.probe_interval),
            history: match top_level.get(&key("history")) {
                None => defaults.history,
                Some(Yaml::Value(Scalar::Boolean(enabled))) => *enabled,
                Some(_) => return InvalidValueSnafu { key: "history" }.fail(),
            },
        })
    }
}

type YamlMap<'a> = LinkedHashMap<Yaml<'a>, Yaml<'a>>;

fn key(name: &'static str) -> Yaml<'static> {
    Yaml::Value(Scalar::String(Cow::Borrowed(name)))
}

fn string_value(map: &YamlMap<'_>, name: &'static str) -> Result<Option<String>, ConfigError> {
    map.get(&key(name))
        .map(|value| {
            value
                .as_str()
                .map(str::to_string)
                .context(InvalidValueSnafu { key: name })
        })
        .transpose()
}

fn integer_value(map: &YamlMap<'_>, name: &'static str) -> Result<Option<i64>, ConfigError> {
    match map.get(&key(name)) {
        None => Ok(None),
        Some(Yaml::Value(Scalar::Integer(value))) => Ok(Some(*value)),
        Some(_) => InvalidValueSnafu { key: name }.fail(),
    }
}

fn duration_value(map: &YamlMap<'_>, name: &'static str) -> Result<Option<Duration>, ConfigError> {
    integer_value(map, name)?
        .map(|millis| {
            u64::try_from(millis)
                .map(Duration::from_millis)
                .ok()
                .context(InvalidValueSnafu { key: name })
        })
        .transpose()
}

fn string_list(map: &YamlMap<'_>, name: &'static str) -> Result<Option<Vec<String>>, ConfigError> {
    match map.get(&key(name)) {
        None => Ok(None),
        Some(Yaml::Sequence(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .context(InvalidValueSnafu { key: name })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(_) => ListExpectedSnafu { key: name }.fail(),
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    #[snafu(display("Failed to read the config file: {}", file_path))]
    ReadError {
        file_path: String,
        source: std::io::Error,
    },
    #[snafu(display("Failed to parse the config file"))]
    ParseError { source: saphyr::ScanError },
    #[snafu(display("Top level of config should be a map"))]
    TopLevelNotMap,
    #[snafu(display("Remote section should be a map"))]
    RemoteNotMap,
    #[snafu(display("Remote section is missing '{}'", field))]
    MissingRemoteField { field: &'static str },
    #[snafu(display("'{}' should be a list", key))]
    ListExpected { key: &'static str },
    #[snafu(display("Invalid value for '{}'", key))]
    InvalidValue { key: &'static str },
    #[snafu(display("Invalid remote '{}', expected HOST:PATH", value))]
    InvalidRemote { value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(contents: &str) -> Result<SyncConfig, ConfigError> {
        contents.try_into()
    }

    #[compio::test]
    async fn config_returns_error_on_nonexistent_file() {
        let result = SyncConfig::from_path(Path::new("nonexistent.yaml").to_path_buf()).await;
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[compio::test]
    async fn missing_default_file_yields_defaults() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let config = SyncConfig::read(dir.path()).await.unwrap();
        assert_eq!(config, SyncConfig::default());
    }

    #[compio::test]
    async fn default_file_is_read_from_root() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        std::fs::write(
            get_config_file_path(dir.path()),
            "exclude: [target]\nhistory: true\n",
        )
        .expect("Failed to write config");

        let config = SyncConfig::read(dir.path()).await.unwrap();
        assert_eq!(config.exclude, vec!["target".to_string()]);
        assert!(config.history);
    }

    #[test]
    fn config_returns_error_on_invalid_yaml() {
        let result = parse("invalid: yaml: content: [unclosed");
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn empty_file_yields_defaults() {
        assert_eq!(parse("").unwrap(), SyncConfig::default());
    }

    #[test]
    fn config_returns_error_when_top_level_is_not_map() {
        assert!(matches!(
            parse("- item1\n- item2"),
            Err(ConfigError::TopLevelNotMap)
        ));
        assert!(matches!(
            parse("just a string"),
            Err(ConfigError::TopLevelNotMap)
        ));
    }

    #[test]
    fn full_config_is_parsed() {
        let config = parse(
            r#"
remote:
  host: deploy@example.org
  root: /srv/mirror
  port: 2222
  options: ["-i", "/keys/id"]
exclude: [".git", "*.swp"]
quiet_period_ms: 100
max_latency_ms: 1000
rename_timeout_ms: 10
probe_interval_ms: 250
history: true
"#,
        )
        .unwrap();

        assert_eq!(
            config,
            SyncConfig {
                remote: Some(RemoteTarget {
                    host: "deploy@example.org".to_string(),
                    root: "/srv/mirror".to_string(),
                    port: Some(2222),
                    options: vec!["-i".to_string(), "/keys/id".to_string()],
                }),
                exclude: vec![".git".to_string(), "*.swp".to_string()],
                quiet_period: Duration::from_millis(100),
                max_latency: Duration::from_millis(1000),
                rename_timeout: Duration::from_millis(10),
                probe_interval: Duration::from_millis(250),
                history: true,
            }
        );
    }

    #[test]
    fn remote_must_be_a_map_with_host_and_root() {
        assert!(matches!(
            parse("remote: somewhere"),
            Err(ConfigError::RemoteNotMap)
        ));
        assert!(matches!(
            parse("remote:\n  root: /srv"),
            Err(ConfigError::MissingRemoteField { field: "host" })
        ));
    }

    #[test]
    fn exclude_must_be_a_list() {
        assert!(matches!(
            parse("exclude: .git"),
            Err(ConfigError::ListExpected { key: "exclude" })
        ));
    }

    #[test]
    fn timings_must_be_non_negative_integers() {
        assert!(matches!(
            parse("quiet_period_ms: soon"),
            Err(ConfigError::InvalidValue {
                key: "quiet_period_ms"
            })
        ));
        assert!(matches!(
            parse("max_latency_ms: -5"),
            Err(ConfigError::InvalidValue {
                key: "max_latency_ms"
            })
        ));
    }

    #[test]
    fn remote_argument_parses_host_and_path() {
        let target: RemoteTarget = "me@box:/data/mirror".parse().unwrap();
        assert_eq!(target.host, "me@box");
        assert_eq!(target.root, "/data/mirror");
        assert!(matches!(
            "no-colon".parse::<RemoteTarget>(),
            Err(ConfigError::InvalidRemote { .. })
        ));
        assert!(matches!(
            ":/path".parse::<RemoteTarget>(),
            Err(ConfigError::InvalidRemote { .. })
        ));
    }

    #[test]
    fn remote_override_keeps_port_and_options() {
        let mut config = parse("remote:\n  host: a\n  root: /x\n  port: 2200\n").unwrap();
        config.override_remote("b:/y".parse().unwrap());
        let remote = config.remote.unwrap();
        assert_eq!((remote.host.as_str(), remote.root.as_str()), ("b", "/y"));
        assert_eq!(remote.port, Some(2200));
    }
}
