use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::ConfigError;

const DEFAULT_POLL_SECS: u64 = 30;

/// Where configuration values come from. The process environment in
/// production, a plain map in tests.
pub trait ConfigSource {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads from `std::env`.
pub struct ProcessEnv;

impl ConfigSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl ConfigSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// A credential value. Formatting never reveals it.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("********")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("********")
    }
}

/// Per-endpoint Darwinbox API keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ApiKey {
    LeaveReport,
    LeaveAction,
    LeaveHoliday,
    LeaveBalance,
    LeaveEncashment,
    LeaveImport,
    AttendanceDailyRoster,
    AttendanceDailyStatus,
    AttendancePunches,
    AttendanceMonthly,
    AttendanceDatewiseRoster,
    AttendanceCompOff,
    AttendanceTimesheet,
    AttendanceTimesheetDatewise,
    AttendanceOvertimeDatewise,
    Employee,
    EmployeeDataset,
}

impl ApiKey {
    pub const ALL: [ApiKey; 17] = [
        ApiKey::LeaveReport,
        ApiKey::LeaveAction,
        ApiKey::LeaveHoliday,
        ApiKey::LeaveBalance,
        ApiKey::LeaveEncashment,
        ApiKey::LeaveImport,
        ApiKey::AttendanceDailyRoster,
        ApiKey::AttendanceDailyStatus,
        ApiKey::AttendancePunches,
        ApiKey::AttendanceMonthly,
        ApiKey::AttendanceDatewiseRoster,
        ApiKey::AttendanceCompOff,
        ApiKey::AttendanceTimesheet,
        ApiKey::AttendanceTimesheetDatewise,
        ApiKey::AttendanceOvertimeDatewise,
        ApiKey::Employee,
        ApiKey::EmployeeDataset,
    ];

    /// Name of the environment variable holding this key, both locally and
    /// inside the deployed runtime.
    pub fn env_name(self) -> &'static str {
        match self {
            ApiKey::LeaveReport => "LEAVE_REPORT_KEY",
            ApiKey::LeaveAction => "LEAVE_ACTION_KEY",
            ApiKey::LeaveHoliday => "LEAVE_HOLIDAY_KEY",
            ApiKey::LeaveBalance => "LEAVE_BALANCE_KEY",
            ApiKey::LeaveEncashment => "LEAVE_ENCASHMENT_KEY",
            ApiKey::LeaveImport => "LEAVE_IMPORT_KEY",
            ApiKey::AttendanceDailyRoster => "ATTENDANCE_DAILY_ROSTER_KEY",
            ApiKey::AttendanceDailyStatus => "ATTD_DAILY_STATUS_KEY",
            ApiKey::AttendancePunches => "ATTENDANCE_PUNCHES_KEY",
            ApiKey::AttendanceMonthly => "ATTENDANCE_MONTHLY_KEY",
            ApiKey::AttendanceDatewiseRoster => "ATTD_DATEWISE_ROSTER_KEY",
            ApiKey::AttendanceCompOff => "ATTD_COMPOFF_KEY",
            ApiKey::AttendanceTimesheet => "ATTENDANCE_TIMESHEET_KEY",
            ApiKey::AttendanceTimesheetDatewise => "ATTENDANCE_TIMESHEET_DATEWISE_KEY",
            ApiKey::AttendanceOvertimeDatewise => "ATTENDANCE_OVERTIME_DATEWISE_KEY",
            ApiKey::Employee => "EMP_API_KEY",
            ApiKey::EmployeeDataset => "EMP_DATASET_KEY",
        }
    }
}

pub const PROJECT_ID: &str = "PROJECT_ID";
pub const LOCATION: &str = "LOCATION";
pub const GEMINI_MODEL: &str = "GEMINI_MODEL";
pub const DARWINBOX_DOMAIN: &str = "DARWINBOX_DOMAIN";
pub const DARWINBOX_USERNAME: &str = "DARWINBOX_USERNAME";
pub const DARWINBOX_PASSWORD: &str = "DARWINBOX_PASSWORD";
pub const GOOGLE_OAUTH_ACCESS_TOKEN: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";
pub const AGENT_ENGINE_POLL_SECS: &str = "AGENT_ENGINE_POLL_SECS";
pub const AGENT_ENGINE_SECRET_PREFIX: &str = "AGENT_ENGINE_SECRET_PREFIX";

/// Every key that must be present and non-empty, in the order they are
/// checked and reported.
pub fn required_keys() -> Vec<&'static str> {
    let mut keys = vec![
        PROJECT_ID,
        LOCATION,
        GEMINI_MODEL,
        DARWINBOX_DOMAIN,
        DARWINBOX_USERNAME,
        DARWINBOX_PASSWORD,
    ];
    keys.extend(ApiKey::ALL.iter().map(|k| k.env_name()));
    keys
}

/// Darwinbox connection details handed to the deployed tools.
#[derive(Debug, Clone)]
pub struct HrApiConfig {
    pub base_url: String,
    pub username: String,
    pub password: Secret,
    keys: Vec<(ApiKey, Secret)>,
}

impl HrApiConfig {
    pub fn api_key(&self, key: ApiKey) -> Option<&Secret> {
        self.keys.iter().find(|(k, _)| *k == key).map(|(_, s)| s)
    }

    pub fn api_keys(&self) -> impl Iterator<Item = (ApiKey, &Secret)> {
        self.keys.iter().map(|(k, s)| (*k, s))
    }
}

/// Validated, read-only deployment configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_id: String,
    pub location: String,
    pub model: String,
    pub hr: HrApiConfig,
    /// Static bearer token for Google APIs. When absent the gcloud CLI is asked.
    pub access_token: Option<Secret>,
    pub poll_interval: Duration,
    /// When set, the hosted runtime reads credentials from Secret Manager
    /// secrets named `{prefix}{ENV_NAME}` instead of plain env values.
    pub secret_prefix: Option<String>,
}

impl Config {
    /// Load `.env` from the working directory (if present) into the process
    /// environment, then read every key from it.
    pub fn load() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => debug!(path = %path.display(), "loaded env file"),
            Err(e) if e.not_found() => debug!("no .env file, using process environment"),
            Err(e) => {
                return Err(ConfigError::Read {
                    path: ".env".into(),
                    message: e.to_string(),
                })
            }
        }
        Self::from_source(&ProcessEnv)
    }

    /// Read a specific env file without touching the process environment.
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let read_err = |e: dotenvy::Error| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        };

        let mut vars = HashMap::new();
        for item in dotenvy::from_path_iter(path).map_err(read_err)? {
            let (key, value) = item.map_err(read_err)?;
            vars.insert(key, value);
        }
        Self::from_source(&vars)
    }

    pub fn from_source(source: &impl ConfigSource) -> Result<Self, ConfigError> {
        let lookup = |key: &str| {
            source
                .get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let missing: Vec<String> = required_keys()
            .into_iter()
            .filter(|key| lookup(key).is_none())
            .map(String::from)
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        // Presence was checked above.
        let plain = |key: &str| {
            let value = lookup(key).unwrap_or_default();
            info!(key, value = %value, "loaded config");
            value
        };
        let secret = |key: &str| {
            let value = Secret::new(lookup(key).unwrap_or_default());
            info!(key, value = %value, "loaded config");
            value
        };

        let project_id = plain(PROJECT_ID);
        let location = plain(LOCATION);
        let model = plain(GEMINI_MODEL);
        let base_url = plain(DARWINBOX_DOMAIN).trim_end_matches('/').to_string();
        let username = plain(DARWINBOX_USERNAME);
        let password = secret(DARWINBOX_PASSWORD);
        let keys = ApiKey::ALL
            .iter()
            .map(|k| (*k, secret(k.env_name())))
            .collect();

        let access_token = lookup(GOOGLE_OAUTH_ACCESS_TOKEN).map(Secret::new);
        let poll_interval = match lookup(AGENT_ENGINE_POLL_SECS) {
            None => Duration::from_secs(DEFAULT_POLL_SECS),
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                Ok(_) => {
                    return Err(ConfigError::Invalid {
                        key: AGENT_ENGINE_POLL_SECS.into(),
                        message: "must be greater than zero".into(),
                    })
                }
                Err(e) => {
                    return Err(ConfigError::Invalid {
                        key: AGENT_ENGINE_POLL_SECS.into(),
                        message: e.to_string(),
                    })
                }
            },
        };

        let secret_prefix = lookup(AGENT_ENGINE_SECRET_PREFIX);
        if let Some(ref prefix) = secret_prefix {
            if !prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                return Err(ConfigError::Invalid {
                    key: AGENT_ENGINE_SECRET_PREFIX.into(),
                    message: "secret ids may only contain letters, digits, '-' and '_'".into(),
                });
            }
        }

        Ok(Self {
            project_id,
            location,
            model,
            hr: HrApiConfig {
                base_url,
                username,
                password,
                keys,
            },
            access_token,
            poll_interval,
            secret_prefix,
        })
    }

    /// Every credential value, for redaction.
    pub fn secrets(&self) -> Vec<&Secret> {
        let mut out = vec![&self.hr.password];
        out.extend(self.hr.api_keys().map(|(_, s)| s));
        if let Some(ref token) = self.access_token {
            out.push(token);
        }
        out
    }
}
