pub mod timing;

use std::time::Duration;

use serde::{Deserialize, Deserializer};

pub use self::timing::us_since_epoch;

/// Deserialize a whole-second count into a [`Duration`].
pub fn deserialize_u32_to_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let seconds: u32 = Deserialize::deserialize(deserializer)?;
    Ok(Duration::from_secs(seconds.into()))
}
