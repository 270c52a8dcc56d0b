//! Service configuration read from a `name = value` file.
//!
//! Every recognized name maps to a typed setter in [`FIELDS`]. Lines with
//! unknown names are ignored and a later line overrides an earlier one for
//! the same name. All problems are collected before [`Config::parse`]
//! reports them, so one run shows every bad value at once.

use crate::error::ConfigError;
use crate::http::HttpSettings;
use sqlx::mysql::MySqlConnectOptions;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Hard ceiling for `app.thread.limit` when the file does not set one.
pub const DEFAULT_WORKER_LIMIT: usize = 100;

const MASKED: &str = "********";

/// Where the service listens for requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenAddr {
    /// `None` binds every interface.
    pub host: Option<String>,
    pub port: u16,
}

impl ListenAddr {
    /// The address in a form accepted by [`tokio::net::TcpListener::bind`].
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host.as_deref().unwrap_or("0.0.0.0"), self.port)
    }
}

impl Display for ListenAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.host {
            Some(host) => write!(f, "{}:{}", host, self.port),
            None => write!(f, ":{}", self.port),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MysqlSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl MysqlSettings {
    pub fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub host: String,
    pub port: u16,
    /// Expiry applied to every cache write.
    pub ttl: Duration,
    pub prefix: String,
}

impl CacheSettings {
    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}/", self.host, self.port)
    }
}

/// Validated, immutable service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub worker_count: usize,
    pub worker_limit: usize,
    pub listen: ListenAddr,
    pub mysql: MysqlSettings,
    pub cache: CacheSettings,
    pub http: HttpSettings,
}

impl Config {
    /// Reads and validates the file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parses and validates configuration text.
    pub fn parse(text: &str) -> Result<Self> {
        let mut draft = Draft::default();
        let mut problems = Vec::new();
        // Keyed by field so a later good value clears an earlier bad one.
        let mut invalid: BTreeMap<&'static str, ConfigError> = BTreeMap::new();

        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((name, value)) = line.split_once('=') else {
                problems.push(ConfigError::Malformed {
                    line: index + 1,
                    content: line.to_string(),
                });
                continue;
            };

            let name = name.trim();
            let value = value.trim();
            let Some(field) = FIELDS.iter().find(|field| field.name == name) else {
                continue;
            };

            match (field.set)(&mut draft, value) {
                Ok(()) => {
                    invalid.remove(field.name);
                }
                Err(reason) => {
                    invalid.insert(
                        field.name,
                        ConfigError::Invalid {
                            field: field.name,
                            value: display_value(field.name, value),
                            reason,
                        },
                    );
                }
            }
        }

        problems.extend(invalid.into_values());
        draft.finish(problems)
    }
}

impl Display for Config {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "app.thread.count = {}", self.worker_count)?;
        writeln!(f, "app.thread.limit = {}", self.worker_limit)?;
        writeln!(f, "app.socket = {}", self.listen)?;
        writeln!(f, "app.mysql.host = {}", self.mysql.host)?;
        writeln!(f, "app.mysql.port = {}", self.mysql.port)?;
        writeln!(f, "app.mysql.user = {}", self.mysql.user)?;
        writeln!(f, "app.mysql.password = {MASKED}")?;
        writeln!(f, "app.mysql.database = {}", self.mysql.database)?;
        writeln!(f, "app.cache.host = {}", self.cache.host)?;
        writeln!(f, "app.cache.port = {}", self.cache.port)?;
        writeln!(f, "app.cache.timeout = {}", self.cache.ttl.as_secs())?;
        writeln!(f, "app.cache.prefix = {}", self.cache.prefix)?;
        write!(
            f,
            "app.http.header_timeout = {}",
            self.http.header_read_timeout.as_millis()
        )
    }
}

fn display_value(name: &str, value: &str) -> String {
    if name == "app.mysql.password" {
        MASKED.to_string()
    } else {
        value.to_string()
    }
}

type Setter = fn(&mut Draft, &str) -> std::result::Result<(), String>;

struct Field {
    name: &'static str,
    set: Setter,
}

const FIELDS: &[Field] = &[
    Field { name: "app.thread.count", set: set_worker_count },
    Field { name: "app.thread.limit", set: set_worker_limit },
    Field { name: "app.socket", set: set_listen },
    Field { name: "app.mysql.host", set: set_mysql_host },
    Field { name: "app.mysql.port", set: set_mysql_port },
    Field { name: "app.mysql.user", set: set_mysql_user },
    Field { name: "app.mysql.password", set: set_mysql_password },
    Field { name: "app.mysql.database", set: set_mysql_database },
    Field { name: "app.cache.host", set: set_cache_host },
    Field { name: "app.cache.port", set: set_cache_port },
    Field { name: "app.cache.timeout", set: set_cache_ttl },
    Field { name: "app.cache.prefix", set: set_cache_prefix },
    Field { name: "app.http.header_timeout", set: set_header_timeout },
];

/// Values seen so far; `None` means the name has not appeared yet.
#[derive(Default)]
struct Draft {
    worker_count: Option<usize>,
    worker_limit: Option<usize>,
    listen: Option<ListenAddr>,
    mysql_host: Option<String>,
    mysql_port: Option<u16>,
    mysql_user: Option<String>,
    mysql_password: Option<String>,
    mysql_database: Option<String>,
    cache_host: Option<String>,
    cache_port: Option<u16>,
    cache_ttl: Option<Duration>,
    cache_prefix: Option<String>,
    header_timeout: Option<Duration>,
}

impl Draft {
    fn finish(self, mut problems: Vec<ConfigError>) -> Result<Config> {
        let worker_count = require(self.worker_count, "app.thread.count", &mut problems);
        let worker_limit = self.worker_limit.unwrap_or(DEFAULT_WORKER_LIMIT);
        let listen = require(self.listen, "app.socket", &mut problems);
        let mysql_host = require(self.mysql_host, "app.mysql.host", &mut problems);
        let mysql_port = require(self.mysql_port, "app.mysql.port", &mut problems);
        let mysql_user = require(self.mysql_user, "app.mysql.user", &mut problems);
        let mysql_password = require(self.mysql_password, "app.mysql.password", &mut problems);
        let mysql_database = require(self.mysql_database, "app.mysql.database", &mut problems);
        let cache_host = require(self.cache_host, "app.cache.host", &mut problems);
        let cache_port = require(self.cache_port, "app.cache.port", &mut problems);
        let cache_ttl = require(self.cache_ttl, "app.cache.timeout", &mut problems);

        if let Some(count) = worker_count {
            if count > worker_limit {
                problems.push(ConfigError::TooManyWorkers {
                    count,
                    limit: worker_limit,
                });
            }
        }

        match (
            worker_count,
            listen,
            mysql_host,
            mysql_port,
            mysql_user,
            mysql_password,
            mysql_database,
            cache_host,
            cache_port,
            cache_ttl,
        ) {
            (
                Some(worker_count),
                Some(listen),
                Some(host),
                Some(port),
                Some(user),
                Some(password),
                Some(database),
                Some(cache_host),
                Some(cache_port),
                Some(ttl),
            ) if problems.is_empty() => Ok(Config {
                worker_count,
                worker_limit,
                listen,
                mysql: MysqlSettings {
                    host,
                    port,
                    user,
                    password,
                    database,
                },
                cache: CacheSettings {
                    host: cache_host,
                    port: cache_port,
                    ttl,
                    prefix: self.cache_prefix.unwrap_or_default(),
                },
                http: self
                    .header_timeout
                    .map(|header_read_timeout| HttpSettings { header_read_timeout })
                    .unwrap_or_default(),
            }),
            _ if problems.len() == 1 => Err(problems.remove(0)),
            _ => Err(ConfigError::Rejected(problems)),
        }
    }
}

fn require<T>(value: Option<T>, name: &'static str, problems: &mut Vec<ConfigError>) -> Option<T> {
    if value.is_none() && !problems.iter().any(|p| names_field(p, name)) {
        problems.push(ConfigError::Missing(name));
    }
    value
}

fn names_field(problem: &ConfigError, name: &str) -> bool {
    matches!(problem, ConfigError::Invalid { field, .. } if *field == name)
}

fn parse_positive(value: &str) -> std::result::Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("must be greater than zero".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(format!("expected a positive integer: {e}")),
    }
}

fn parse_port(value: &str) -> std::result::Result<u16, String> {
    match value.parse::<u16>() {
        Ok(0) => Err("port must be between 1 and 65535".to_string()),
        Ok(port) => Ok(port),
        Err(_) => Err("port must be between 1 and 65535".to_string()),
    }
}

fn parse_non_empty(value: &str) -> std::result::Result<String, String> {
    if value.is_empty() {
        Err("must not be empty".to_string())
    } else {
        Ok(value.to_string())
    }
}

fn parse_listen(value: &str) -> std::result::Result<ListenAddr, String> {
    let Some((host, port)) = value.rsplit_once(':') else {
        return Err("expected `host:port` or `:port`".to_string());
    };
    let port = parse_port(port)?;
    let host = (!host.is_empty()).then(|| host.to_string());
    Ok(ListenAddr { host, port })
}

fn set_worker_count(draft: &mut Draft, value: &str) -> std::result::Result<(), String> {
    draft.worker_count = Some(parse_positive(value)?);
    Ok(())
}

fn set_worker_limit(draft: &mut Draft, value: &str) -> std::result::Result<(), String> {
    draft.worker_limit = Some(parse_positive(value)?);
    Ok(())
}

fn set_listen(draft: &mut Draft, value: &str) -> std::result::Result<(), String> {
    draft.listen = Some(parse_listen(value)?);
    Ok(())
}

fn set_mysql_host(draft: &mut Draft, value: &str) -> std::result::Result<(), String> {
    draft.mysql_host = Some(parse_non_empty(value)?);
    Ok(())
}

fn set_mysql_port(draft: &mut Draft, value: &str) -> std::result::Result<(), String> {
    draft.mysql_port = Some(parse_port(value)?);
    Ok(())
}

fn set_mysql_user(draft: &mut Draft, value: &str) -> std::result::Result<(), String> {
    draft.mysql_user = Some(parse_non_empty(value)?);
    Ok(())
}

fn set_mysql_password(draft: &mut Draft, value: &str) -> std::result::Result<(), String> {
    draft.mysql_password = Some(parse_non_empty(value)?);
    Ok(())
}

fn set_mysql_database(draft: &mut Draft, value: &str) -> std::result::Result<(), String> {
    draft.mysql_database = Some(parse_non_empty(value)?);
    Ok(())
}

fn set_cache_host(draft: &mut Draft, value: &str) -> std::result::Result<(), String> {
    draft.cache_host = Some(parse_non_empty(value)?);
    Ok(())
}

fn set_cache_port(draft: &mut Draft, value: &str) -> std::result::Result<(), String> {
    draft.cache_port = Some(parse_port(value)?);
    Ok(())
}

fn set_cache_ttl(draft: &mut Draft, value: &str) -> std::result::Result<(), String> {
    let secs = parse_positive(value)?;
    draft.cache_ttl = Some(Duration::from_secs(secs as u64));
    Ok(())
}

fn set_cache_prefix(draft: &mut Draft, value: &str) -> std::result::Result<(), String> {
    draft.cache_prefix = Some(value.to_string());
    Ok(())
}

/// Value in milliseconds.
fn set_header_timeout(draft: &mut Draft, value: &str) -> std::result::Result<(), String> {
    let millis = parse_positive(value)?;
    draft.header_timeout = Some(Duration::from_millis(millis as u64));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = "\
# signpost
app.thread.count = 4
app.socket = :9000
app.mysql.host = db.internal
app.mysql.port = 3306
app.mysql.user = signpost
app.mysql.password = hunter2
app.mysql.database = links
app.cache.host = cache.internal
app.cache.port = 6379
app.cache.timeout = 300
";

    #[test]
    fn parses_complete_file() {
        let config = Config::parse(FULL).unwrap();

        assert_eq!(config.worker_count, 4);
        assert_eq!(config.worker_limit, DEFAULT_WORKER_LIMIT);
        assert_eq!(config.listen, ListenAddr { host: None, port: 9000 });
        assert_eq!(config.listen.bind_addr(), "0.0.0.0:9000");
        assert_eq!(config.mysql.host, "db.internal");
        assert_eq!(config.mysql.password, "hunter2");
        assert_eq!(config.cache.ttl, Duration::from_secs(300));
        assert_eq!(config.cache.prefix, "");
        assert_eq!(config.cache.redis_url(), "redis://cache.internal:6379/");
        assert_eq!(config.http, HttpSettings::default());
    }

    #[test]
    fn header_timeout_is_configurable() {
        let text = format!("{FULL}app.http.header_timeout = 250\n");
        let config = Config::parse(&text).unwrap();
        assert_eq!(config.http.header_read_timeout, Duration::from_millis(250));
        assert!(config.to_string().contains("app.http.header_timeout = 250"));

        let zero = format!("{FULL}app.http.header_timeout = 0\n");
        assert!(matches!(
            Config::parse(&zero).unwrap_err(),
            ConfigError::Invalid {
                field: "app.http.header_timeout",
                ..
            }
        ));
    }

    #[test]
    fn whitespace_unknown_names_and_duplicates() {
        let text = format!(
            "{FULL}\n   app.cache.prefix   =   sp:   \napp.unknown = 1\napp.thread.count=8\n"
        );
        let config = Config::parse(&text).unwrap();

        assert_eq!(config.cache.prefix, "sp:");
        assert_eq!(config.worker_count, 8);
    }

    #[test]
    fn later_valid_value_clears_earlier_invalid_one() {
        let text = format!("app.mysql.port = nope\n{FULL}");
        assert!(Config::parse(&text).is_ok());
    }

    #[test]
    fn listen_address_with_host() {
        let text = FULL.replace("app.socket = :9000", "app.socket = 127.0.0.1:8080");
        let config = Config::parse(&text).unwrap();

        assert_eq!(config.listen.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(config.listen.bind_addr(), "127.0.0.1:8080");
        assert_eq!(config.listen.to_string(), "127.0.0.1:8080");
    }

    #[test]
    fn reports_every_problem() {
        let text = "\
app.thread.count = 0
app.socket = 9000
app.mysql.port = 70000
app.mysql.password = hunter2
garbage
";
        let err = Config::parse(text).unwrap_err();
        let problems = err.problems();

        let invalid: Vec<_> = problems
            .iter()
            .filter_map(|p| match p {
                ConfigError::Invalid { field, .. } => Some(*field),
                _ => None,
            })
            .collect();
        assert!(invalid.contains(&"app.thread.count"));
        assert!(invalid.contains(&"app.socket"));
        assert!(invalid.contains(&"app.mysql.port"));

        let missing: Vec<_> = problems
            .iter()
            .filter_map(|p| match p {
                ConfigError::Missing(field) => Some(*field),
                _ => None,
            })
            .collect();
        assert!(missing.contains(&"app.mysql.host"));
        assert!(missing.contains(&"app.cache.timeout"));
        assert!(!missing.contains(&"app.thread.count"));
        assert!(!missing.contains(&"app.mysql.password"));

        assert!(problems
            .iter()
            .any(|p| matches!(p, ConfigError::Malformed { line: 5, .. })));
    }

    #[test]
    fn single_problem_is_reported_directly() {
        let text = FULL.replace("app.mysql.user = signpost\n", "");
        let err = Config::parse(&text).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("app.mysql.user")));
    }

    #[test]
    fn worker_count_is_bounded_by_limit() {
        let text = FULL.replace("app.thread.count = 4", "app.thread.count = 101");
        assert!(matches!(
            Config::parse(&text).unwrap_err(),
            ConfigError::TooManyWorkers {
                count: 101,
                limit: 100
            }
        ));

        let raised = format!("{text}app.thread.limit = 200\n");
        assert_eq!(Config::parse(&raised).unwrap().worker_count, 101);
    }

    #[test]
    fn display_masks_password() {
        let config = Config::parse(FULL).unwrap();
        let rendered = config.to_string();

        assert!(rendered.contains("app.mysql.password = ********"));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("app.socket = :9000"));
    }

    #[test]
    fn invalid_password_is_masked_in_errors() {
        let err = ConfigError::Invalid {
            field: "app.mysql.password",
            value: display_value("app.mysql.password", "secret"),
            reason: "x".to_string(),
        };
        assert!(!err.to_string().contains("secret"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Config::load("/definitely/not/here.ini").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn connect_options_carry_settings() {
        let config = Config::parse(FULL).unwrap();
        let options = config.mysql.connect_options();

        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 3306);
        assert_eq!(options.get_database(), Some("links"));
    }
}
