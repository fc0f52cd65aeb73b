use anyhow::bail;

/// Risk bands for the alert detector. Both bounds are strict: an average
/// equal to `danger_below` is a warning, not a danger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertThresholds {
    pub danger_below: f64,
    pub warning_below: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            danger_below: 10.0,
            warning_below: 12.0,
        }
    }
}

impl AlertThresholds {
    pub fn new(danger_below: f64, warning_below: f64) -> anyhow::Result<Self> {
        if !danger_below.is_finite() || !warning_below.is_finite() {
            bail!("alert thresholds must be numbers");
        }
        if danger_below > warning_below {
            bail!("danger threshold {danger_below} exceeds warning threshold {warning_below}");
        }
        Ok(Self {
            danger_below,
            warning_below,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_url: String,
    pub max_connections: u32,
}

impl DbConfig {
    pub fn new(database_url: Option<String>, max_connections: u32) -> anyhow::Result<Self> {
        let Some(database_url) = database_url.filter(|url| !url.trim().is_empty()) else {
            bail!("DATABASE_URL must be set to a Postgres instance");
        };
        if max_connections == 0 {
            bail!("max connections must be at least 1");
        }
        Ok(Self {
            database_url,
            max_connections,
        })
    }
}
