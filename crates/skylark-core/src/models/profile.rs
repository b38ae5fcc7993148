use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Usage counters for one billing period (daily or monthly).
///
/// Invariant: `used + remaining == limit`. The backend owns the counters and
/// resets them at period boundaries; the client only re-derives `remaining`
/// whenever a profile crosses a serialization boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodUsage {
    pub limit: u32,
    pub used: u32,
    pub remaining: u32,
}

impl PeriodUsage {
    pub fn new(limit: u32, used: u32) -> Self {
        let used = used.min(limit);
        Self {
            limit,
            used,
            remaining: limit - used,
        }
    }

    /// Clamp `used` to `limit` and re-derive `remaining`.
    pub fn normalize(&mut self) {
        self.used = self.used.min(self.limit);
        self.remaining = self.limit - self.used;
    }

    pub fn exhausted(&self) -> bool {
        self.remaining == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureUsage {
    pub daily: PeriodUsage,
    pub monthly: PeriodUsage,
}

impl FeatureUsage {
    pub fn new(daily_limit: u32, monthly_limit: u32) -> Self {
        Self {
            daily: PeriodUsage::new(daily_limit, 0),
            monthly: PeriodUsage::new(monthly_limit, 0),
        }
    }

    pub fn normalize(&mut self) {
        self.daily.normalize();
        self.monthly.normalize();
    }

    /// A feature is available while both periods have headroom.
    pub fn available(&self) -> bool {
        !self.daily.exhausted() && !self.monthly.exhausted()
    }
}

/// Per-feature usage counters plus the response-size cap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageLimits {
    pub chat: FeatureUsage,
    pub image_generation: FeatureUsage,
    pub video_generation: FeatureUsage,
    pub web_search: FeatureUsage,
    pub max_response_chars: u32,
}

impl UsageLimits {
    /// Free-tier defaults with zero usage.
    pub fn free_tier() -> Self {
        Self {
            chat: FeatureUsage::new(20, 300),
            image_generation: FeatureUsage::new(3, 30),
            video_generation: FeatureUsage::new(1, 5),
            web_search: FeatureUsage::new(5, 50),
            max_response_chars: 2000,
        }
    }

    pub fn normalize(&mut self) {
        self.chat.normalize();
        self.image_generation.normalize();
        self.video_generation.normalize();
        self.web_search.normalize();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Free,
    Pro,
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Free => write!(f, "free"),
            Self::Pro => write!(f, "pro"),
        }
    }
}

/// Plan tier plus the capability map gating feature availability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanInfo {
    pub tier: PlanTier,
    pub display_name: String,
    #[serde(default)]
    pub capabilities: HashMap<String, bool>,
}

impl PlanInfo {
    pub fn free() -> Self {
        Self {
            tier: PlanTier::Free,
            display_name: "Free".to_string(),
            capabilities: HashMap::new(),
        }
    }

    pub fn can(&self, capability: &str) -> bool {
        self.capabilities.get(capability).copied().unwrap_or(false)
    }
}

/// User-editable settings. No cross-field invariants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub theme: String,
    pub language: String,
    pub notifications_enabled: bool,
    pub haptics_enabled: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: "system".to_string(),
            language: "en".to_string(),
            notifications_enabled: true,
            haptics_enabled: true,
        }
    }
}

/// Identity fields. Immutable except through explicit profile updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user: UserIdentity,
    pub usage: UsageLimits,
    pub plan: PlanInfo,
    #[serde(default)]
    pub preferences: Preferences,
}

impl UserProfile {
    /// Minimal free-tier profile, constructed client-side when the remote
    /// service has nothing for this user (fresh sign-up, or a fetch failure
    /// with an empty cache). The UI never blocks on profile data.
    pub fn default_free(user_id: &str, email: &str) -> Self {
        let now = Utc::now();
        Self {
            user: UserIdentity {
                id: user_id.to_string(),
                email: email.to_string(),
                display_name: None,
                verified: false,
                created_at: now,
                last_login_at: now,
            },
            usage: UsageLimits::free_tier(),
            plan: PlanInfo::free(),
            preferences: Preferences::default(),
        }
    }

    /// Re-establish counter invariants after deserialization or a remote
    /// fetch. Backends have been seen returning `remaining` drifted from
    /// `limit - used`.
    pub fn normalize(&mut self) {
        self.usage.normalize();
    }
}

/// Partial profile update sent to the remote service. Absent fields are left
/// untouched server-side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Preferences>,
}
