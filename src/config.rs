use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path, path::PathBuf, time::Duration};

use crate::{interpolation::InterpolationPattern, Error, InternalResult};

/// Settings for one [`crate::session::InterpreterSession`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// Upper bound for a single ADDRESS dispatch. `None` waits indefinitely.
    #[serde(default = "default_dispatch_timeout", with = "duration_ms")]
    pub dispatch_timeout: Option<Duration>,

    /// Upper bound for one REQUIRE, dependencies included.
    #[serde(default = "default_require_timeout", with = "duration_ms")]
    pub require_timeout: Option<Duration>,

    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,

    /// Initial `NUMERIC DIGITS`.
    #[serde(default = "default_numeric_digits")]
    pub numeric_digits: u64,

    /// Reading an unset variable is an error instead of yielding its name.
    #[serde(default)]
    pub strict_variables: bool,

    /// A failed dispatch with no trap installed ends the script.
    #[serde(default = "default_true")]
    pub halt_on_dispatch_failure: bool,

    /// Environment bare commands go to before any ADDRESS statement.
    #[serde(default)]
    pub default_address: Option<String>,

    /// Extra directories searched for local libraries after the script's own directory.
    #[serde(default)]
    pub library_paths: Vec<PathBuf>,

    #[serde(default)]
    pub interpolation: InterpolationPattern,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dispatch_timeout: default_dispatch_timeout(),
            require_timeout: default_require_timeout(),
            event_buffer_size: default_event_buffer_size(),
            numeric_digits: default_numeric_digits(),
            strict_variables: false,
            halt_on_dispatch_failure: default_true(),
            default_address: None,
            library_paths: Vec::new(),
            interpolation: InterpolationPattern::default(),
        }
    }
}

pub fn from_file<T: for<'de> Deserialize<'de>, P: AsRef<Path>>(path: P) -> InternalResult<T> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        Error::Config(format!("Failed to open config file {}: {}", path.display(), e))
    })?;
    let reader = BufReader::new(file);
    let config = serde_json::from_reader(reader).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })?;
    Ok(config)
}

pub fn from_str<T: for<'de> Deserialize<'de>>(s: &str) -> InternalResult<T> {
    let config = serde_json::from_str(s)
        .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
    Ok(config)
}

fn default_dispatch_timeout() -> Option<Duration> {
    Some(Duration::from_secs(30))
}
fn default_require_timeout() -> Option<Duration> {
    Some(Duration::from_secs(30))
}
fn default_event_buffer_size() -> usize {
    1000
}
fn default_numeric_digits() -> u64 {
    9
}
fn default_true() -> bool {
    true
}

/// `null` disables the timeout.
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(duration) => serializer.serialize_u64(duration.as_millis() as u64),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}
