use chrono::{DateTime, Duration, Utc};

use crate::config::{RefreshLocking, Settings};
use crate::errors::{HcjwkError, Result};

/// Lifetimes that drive `refresh`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPolicy {
    validity: Duration,
    renewal_threshold: Duration,
    locking: RefreshLocking,
}

impl RotationPolicy {
    /// Both durations must be positive and `renewal_threshold < validity`,
    /// otherwise every refresh would mint a new key.
    pub fn new(
        validity: Duration,
        renewal_threshold: Duration,
        locking: RefreshLocking,
    ) -> Result<Self> {
        if validity <= Duration::zero() {
            return Err(HcjwkError::config("validity", "must be positive"));
        }
        if renewal_threshold <= Duration::zero() {
            return Err(HcjwkError::config("renewal_threshold", "must be positive"));
        }
        if Utc::now().checked_add_signed(validity).is_none() {
            return Err(HcjwkError::config(
                "validity",
                format!("{}s is too long to express an expiry", validity.num_seconds()),
            ));
        }
        if renewal_threshold >= validity {
            return Err(HcjwkError::config(
                "renewal_threshold",
                format!(
                    "must be shorter than validity ({}s >= {}s)",
                    renewal_threshold.num_seconds(),
                    validity.num_seconds()
                ),
            ));
        }
        Ok(Self {
            validity,
            renewal_threshold,
            locking,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(
            settings.validity()?,
            settings.renewal_threshold()?,
            settings.refresh_locking,
        )
    }

    pub fn validity(&self) -> Duration {
        self.validity
    }

    pub fn renewal_threshold(&self) -> Duration {
        self.renewal_threshold
    }

    pub fn locking(&self) -> RefreshLocking {
        self.locking
    }

    /// Expiry of a key minted at `now`.
    pub fn expires_at(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        now.checked_add_signed(self.validity)
            .ok_or_else(|| HcjwkError::config("validity", format!("expiry overflows from {now}")))
    }

    /// Keys expiring before this instant are due for renewal.
    pub fn renew_after(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        now.checked_add_signed(self.renewal_threshold).ok_or_else(|| {
            HcjwkError::config("renewal_threshold", format!("threshold overflows from {now}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_must_be_shorter_than_validity() {
        let err = RotationPolicy::new(
            Duration::hours(2),
            Duration::hours(3),
            RefreshLocking::Immediate,
        )
        .unwrap_err();
        assert!(matches!(err, HcjwkError::Config { field: "renewal_threshold", .. }));

        assert!(RotationPolicy::new(
            Duration::hours(2),
            Duration::hours(2),
            RefreshLocking::Immediate
        )
        .is_err());
    }

    #[test]
    fn non_positive_durations_are_rejected() {
        assert!(RotationPolicy::new(
            Duration::zero(),
            Duration::minutes(1),
            RefreshLocking::Immediate
        )
        .is_err());
        assert!(RotationPolicy::new(
            Duration::hours(1),
            Duration::seconds(-5),
            RefreshLocking::Deferred
        )
        .is_err());
    }

    #[test]
    fn unrepresentable_validity_is_rejected() {
        let err = RotationPolicy::new(
            Duration::days(100_000_000),
            Duration::days(1),
            RefreshLocking::Immediate,
        )
        .unwrap_err();
        assert!(matches!(err, HcjwkError::Config { field: "validity", .. }));

        let settings = Settings {
            validity: "100000000d".into(),
            renewal_threshold: "1d".into(),
            ..Settings::default()
        };
        assert!(matches!(
            RotationPolicy::from_settings(&settings),
            Err(HcjwkError::Config { field: "validity", .. })
        ));
    }

    #[test]
    fn expiry_near_the_end_of_time_is_an_error() {
        let policy = RotationPolicy::new(
            Duration::hours(2),
            Duration::minutes(30),
            RefreshLocking::Immediate,
        )
        .unwrap();
        let late = DateTime::<Utc>::MAX_UTC - Duration::hours(1);
        assert!(policy.renew_after(late).is_ok());
        assert!(matches!(
            policy.expires_at(late),
            Err(HcjwkError::Config { field: "validity", .. })
        ));
    }

    #[test]
    fn from_settings_uses_configured_values() {
        let settings = Settings {
            validity: "2h".into(),
            renewal_threshold: "30m".into(),
            refresh_locking: RefreshLocking::Deferred,
            ..Settings::default()
        };
        let policy = RotationPolicy::from_settings(&settings).unwrap();
        assert_eq!(policy.validity(), Duration::hours(2));
        assert_eq!(policy.renewal_threshold(), Duration::minutes(30));
        assert_eq!(policy.locking(), RefreshLocking::Deferred);
    }
}
