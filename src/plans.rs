use serde::Serialize;

/// Subscription tiers. The set is closed; every subscription and profile
/// resolves to one of these, with unknown keys falling back to `Free`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Silver,
    Gold,
    Platinum,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PlanPrice {
    pub label: &'static str,
    pub monthly_usd_cents: i64,
    pub monthly_krw: i64,
}

impl Plan {
    pub const ALL: [Plan; 4] = [Plan::Free, Plan::Silver, Plan::Gold, Plan::Platinum];

    /// Generations allowed per UTC day.
    pub fn daily_quota(self) -> i32 {
        match self {
            Plan::Free => 2,
            Plan::Silver => 10,
            Plan::Gold => 30,
            Plan::Platinum => 100,
        }
    }

    pub fn price(self) -> PlanPrice {
        match self {
            Plan::Free => PlanPrice {
                label: "Free",
                monthly_usd_cents: 0,
                monthly_krw: 0,
            },
            Plan::Silver => PlanPrice {
                label: "Silver",
                monthly_usd_cents: 999,
                monthly_krw: 12_900,
            },
            Plan::Gold => PlanPrice {
                label: "Gold",
                monthly_usd_cents: 2999,
                monthly_krw: 39_900,
            },
            Plan::Platinum => PlanPrice {
                label: "Platinum",
                monthly_usd_cents: 7999,
                monthly_krw: 99_000,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Silver => "silver",
            Plan::Gold => "gold",
            Plan::Platinum => "platinum",
        }
    }

    /// Resolve a stored plan key. Unknown keys map to the free tier rather
    /// than failing, so a stale row can never lock a user out entirely.
    pub fn from_key(key: &str) -> Plan {
        match key {
            "silver" => Plan::Silver,
            "gold" => Plan::Gold,
            "platinum" => Plan::Platinum,
            _ => Plan::Free,
        }
    }

    pub fn is_paid(self) -> bool {
        !matches!(self, Plan::Free)
    }
}
