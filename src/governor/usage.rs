use serde::Serialize;

/// Usage percentage at and above which usage is critical
pub const CRITICAL_PERCENT: f64 = 95.0;

/// Observability level of daily quota usage; never affects admission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageLevel {
    Normal,
    Warning,
    Critical,
}

impl UsageLevel {
    pub fn classify(percent: f64, warning_threshold: u8) -> Self {
        if percent >= CRITICAL_PERCENT {
            Self::Critical
        } else if percent >= f64::from(warning_threshold) {
            Self::Warning
        } else {
            Self::Normal
        }
    }
}

/// Snapshot of today's quota usage
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Usage {
    pub used: u32,
    pub limit: u32,
    pub level: UsageLevel,
}

impl Usage {
    pub fn new(used: u32, limit: u32, warning_threshold: u8) -> Self {
        let usage = Self {
            used,
            limit,
            level: UsageLevel::Normal,
        };
        Self {
            level: UsageLevel::classify(usage.percent(), warning_threshold),
            ..usage
        }
    }

    pub fn percent(&self) -> f64 {
        if self.limit == 0 {
            return 100.0;
        }
        f64::from(self.used) * 100.0 / f64::from(self.limit)
    }

    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.used)
    }
}

impl std::fmt::Display for Usage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} calls ({:.1}%, {} remaining)",
            self.used,
            self.limit,
            self.percent(),
            self.remaining()
        )
    }
}
