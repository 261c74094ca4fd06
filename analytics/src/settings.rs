// Copyright 2024 Adobe. All rights reserved.
// This file is licensed to you under the Apache License,
// Version 2.0 (http://www.apache.org/licenses/LICENSE-2.0)
// or the MIT license (http://opensource.org/licenses/MIT),
// at your option.

// Unless required by applicable law or agreed to in writing,
// this software is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR REPRESENTATIONS OF ANY KIND, either express or
// implied. See the LICENSE-MIT and LICENSE-APACHE files for the
// specific language governing permissions and limitations under
// each license.

use std::{cell::RefCell, path::Path};

use config::{Config, FileFormat};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

thread_local!(
    static SETTINGS: RefCell<Config> =
        RefCell::new(Config::try_from(&Settings::default()).unwrap_or_default());
);

/// What happens when a caller breaks the handle or pointer contract.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationPolicy {
    /// Log the violation and abort the process.
    #[default]
    Abort,
    /// Log the violation, record it as the last error and return the
    /// failure sentinel. Meant for test harnesses.
    Report,
}

/// Input size limits.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct Limits {
    /// Longest accepted owner name in bytes, excluding the terminator.
    ///
    /// The default value is 65536.
    pub max_name_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_name_len: 65536,
        }
    }
}

/// Contract violation handling.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct Violations {
    pub policy: ViolationPolicy,
    /// Whether a leak report is logged when live handles or allocations
    /// remain at shutdown.
    ///
    /// The default value is true.
    pub report_leaks: bool,
}

impl Default for Violations {
    fn default() -> Self {
        Self {
            policy: ViolationPolicy::default(),
            report_leaks: true,
        }
    }
}

/// Settings for the analytics and FFI layers.
///
/// Settings live per thread. Loading a partial configuration merges it on
/// top of the current values.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct Settings {
    pub limits: Limits,
    pub violations: Violations,
}

impl Settings {
    /// Load thread-local [Settings] from a `.json` or `.toml` file.
    pub fn from_file<P: AsRef<Path>>(settings_path: P) -> Result<Self> {
        let path = settings_path.as_ref();
        let ext = path
            .extension()
            .ok_or_else(|| Error::BadSettings(format!("{} has no extension", path.display())))?
            .to_string_lossy();

        let settings_str = std::fs::read_to_string(path)
            .map_err(|e| Error::BadSettings(format!("{}: {e}", path.display())))?;
        Settings::from_string(&settings_str, &ext)
    }

    /// Load thread-local [Settings] from a string. The format must be
    /// `json` or `toml`.
    pub fn from_string(settings_str: &str, format: &str) -> Result<Self> {
        let format = file_format(format)?;

        let new_config = Config::builder()
            .add_source(config::File::from_str(settings_str, format))
            .build()
            .map_err(|e| Error::BadSettings(format!("could not parse settings: {e}")))?;

        let merged = SETTINGS
            .with_borrow(|current| {
                Config::builder()
                    .add_source(current.clone())
                    .add_source(new_config)
                    .build()
            })
            .map_err(|e| Error::BadSettings(format!("could not merge settings: {e}")))?;

        Self::commit(merged)
    }

    /// Set one value by dotted path, for example `"violations.policy"`.
    pub fn set_thread_local_value<T: Into<config::Value>>(value_path: &str, value: T) -> Result<()> {
        let current = SETTINGS.with_borrow(|c| c.clone());

        let updated = Config::builder()
            .add_source(current)
            .set_override(value_path, value)
            .and_then(|builder| builder.build())
            .map_err(|e| Error::BadSettings(format!("could not set {value_path}: {e}")))?;

        Self::commit(updated).map(|_| ())
    }

    /// Set the thread-local [Settings] back to the default values.
    pub fn reset() -> Result<()> {
        let defaults = Config::try_from(&Settings::default())
            .map_err(|e| Error::BadSettings(format!("could not reset settings: {e}")))?;
        SETTINGS.set(defaults);
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.limits.max_name_len == 0 {
            return Err(Error::BadSettings(
                "limits.max_name_len must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    // sanity check the values before they replace the current settings
    fn commit(config: Config) -> Result<Self> {
        let settings = config
            .clone()
            .try_deserialize::<Settings>()
            .map_err(|e| Error::BadSettings(e.to_string()))?;
        settings.validate()?;

        SETTINGS.set(config);
        Ok(settings)
    }
}

fn file_format(format: &str) -> Result<FileFormat> {
    match format.to_lowercase().as_str() {
        "json" => Ok(FileFormat::Json),
        "toml" => Ok(FileFormat::Toml),
        other => Err(Error::BadSettings(format!("unsupported format: {other}"))),
    }
}

/// Get a snapshot of the thread-local Settings. Falls back to the defaults
/// if the stored configuration cannot be deserialized.
pub fn get_thread_local_settings() -> Settings {
    SETTINGS.with_borrow(|config| {
        config
            .clone()
            .try_deserialize::<Settings>()
            .unwrap_or_default()
    })
}
