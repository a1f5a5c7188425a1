use serde::{Deserialize, Serialize};

use crate::models::driver::DriverTier;

/// Wait miles below this threshold are unpaid grace.
const WAIT_GRACE_MILES: i64 = 2;
const WAIT_CENTS_PER_MILE: i64 = 50;
const CASH_HANDLING_BONUS_CENTS: i64 = 750;
const BUSINESS_ACCOUNT_BONUS_CENTS: i64 = 500;

/// Cents paid per service mile, per driver tier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PayRates {
    pub probation: i64,
    pub standard: i64,
    pub elite: i64,
    pub concierge: i64,
}

impl Default for PayRates {
    fn default() -> Self {
        Self {
            probation: 150,
            standard: 175,
            elite: 200,
            concierge: 225,
        }
    }
}

impl PayRates {
    pub fn cents_per_mile(&self, tier: DriverTier) -> i64 {
        let rate = match tier {
            DriverTier::Probation => self.probation,
            DriverTier::Standard => self.standard,
            DriverTier::Elite => self.elite,
            DriverTier::Concierge => self.concierge,
        };
        rate.max(0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PayBasis {
    ServiceMiles {
        miles: i64,
    },
    ActiveTime {
        active_minutes: i64,
        hourly_rate_cents: i64,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PayInput {
    pub basis: PayBasis,
    pub driver_tier: DriverTier,
    #[serde(default)]
    pub tips_cents: i64,
    #[serde(default)]
    pub bonus_eligible: bool,
    #[serde(default)]
    pub bonus_5star_cents: i64,
    #[serde(default)]
    pub wait_miles: i64,
    #[serde(default)]
    pub cash_handling: bool,
    #[serde(default)]
    pub business_account: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PayBreakdown {
    /// Cents per service mile, or cents per hour for time-based pay.
    pub rate_cents: i64,
    pub mile_pay_cents: i64,
    pub wait_bonus_cents: i64,
    pub cash_bonus_cents: i64,
    pub business_bonus_cents: i64,
    pub bonus_pay_cents: i64,
    pub tips_cents: i64,
    pub total_cents: i64,
}

pub fn calculate_driver_pay(input: &PayInput, rates: &PayRates) -> PayBreakdown {
    let (rate_cents, mile_pay_cents) = match input.basis {
        PayBasis::ServiceMiles { miles } => {
            let rate = rates.cents_per_mile(input.driver_tier);
            (rate, miles.max(0).saturating_mul(rate))
        }
        PayBasis::ActiveTime {
            active_minutes,
            hourly_rate_cents,
        } => {
            let rate = hourly_rate_cents.max(0);
            (rate, prorate_hourly(active_minutes.max(0), rate))
        }
    };

    let wait_bonus_cents = (input.wait_miles.max(0) - WAIT_GRACE_MILES)
        .max(0)
        .saturating_mul(WAIT_CENTS_PER_MILE);
    let cash_bonus_cents = if input.cash_handling {
        CASH_HANDLING_BONUS_CENTS
    } else {
        0
    };
    let business_bonus_cents = if input.business_account {
        BUSINESS_ACCOUNT_BONUS_CENTS
    } else {
        0
    };
    let bonus_pay_cents = if input.bonus_eligible {
        input.bonus_5star_cents.max(0)
    } else {
        0
    };
    let tips_cents = input.tips_cents.max(0);

    let total_cents = [
        mile_pay_cents,
        wait_bonus_cents,
        cash_bonus_cents,
        business_bonus_cents,
        bonus_pay_cents,
        tips_cents,
    ]
    .into_iter()
    .fold(0i64, i64::saturating_add);

    PayBreakdown {
        rate_cents,
        mile_pay_cents,
        wait_bonus_cents,
        cash_bonus_cents,
        business_bonus_cents,
        bonus_pay_cents,
        tips_cents,
        total_cents,
    }
}

/// `minutes * hourly / 60`, rounded half up.
fn prorate_hourly(minutes: i64, hourly_rate_cents: i64) -> i64 {
    let product = minutes.saturating_mul(hourly_rate_cents);
    product / 60 + i64::from(product % 60 >= 30)
}

#[cfg(test)]
mod tests {
    use super::{calculate_driver_pay, PayBasis, PayInput, PayRates};
    use crate::models::driver::DriverTier;

    fn miles_input(miles: i64, tier: DriverTier) -> PayInput {
        PayInput {
            basis: PayBasis::ServiceMiles { miles },
            driver_tier: tier,
            tips_cents: 0,
            bonus_eligible: false,
            bonus_5star_cents: 0,
            wait_miles: 0,
            cash_handling: false,
            business_account: false,
        }
    }

    #[test]
    fn standard_tier_trip_with_tip_and_five_star_bonus() {
        let input = PayInput {
            tips_cents: 300,
            bonus_eligible: true,
            bonus_5star_cents: 500,
            ..miles_input(12, DriverTier::Standard)
        };

        let pay = calculate_driver_pay(&input, &PayRates::default());

        assert_eq!(pay.rate_cents, 175);
        assert_eq!(pay.mile_pay_cents, 2100);
        assert_eq!(pay.bonus_pay_cents, 500);
        assert_eq!(pay.tips_cents, 300);
        assert_eq!(pay.total_cents, 2900);
    }

    #[test]
    fn each_tier_uses_its_own_rate() {
        let rates = PayRates::default();
        let expected = [
            (DriverTier::Probation, 1500),
            (DriverTier::Standard, 1750),
            (DriverTier::Elite, 2000),
            (DriverTier::Concierge, 2250),
        ];

        for (tier, mile_pay) in expected {
            let pay = calculate_driver_pay(&miles_input(10, tier), &rates);
            assert_eq!(pay.mile_pay_cents, mile_pay, "{tier:?}");
        }
    }

    #[test]
    fn overridden_rates_are_used() {
        let rates = PayRates {
            elite: 310,
            ..PayRates::default()
        };

        let pay = calculate_driver_pay(&miles_input(3, DriverTier::Elite), &rates);

        assert_eq!(pay.rate_cents, 310);
        assert_eq!(pay.total_cents, 930);
    }

    #[test]
    fn adders_are_itemized() {
        let input = PayInput {
            wait_miles: 5,
            cash_handling: true,
            business_account: true,
            ..miles_input(4, DriverTier::Probation)
        };

        let pay = calculate_driver_pay(&input, &PayRates::default());

        assert_eq!(pay.mile_pay_cents, 600);
        assert_eq!(pay.wait_bonus_cents, 150);
        assert_eq!(pay.cash_bonus_cents, 750);
        assert_eq!(pay.business_bonus_cents, 500);
        assert_eq!(pay.total_cents, 600 + 150 + 750 + 500);
    }

    #[test]
    fn first_two_wait_miles_are_unpaid() {
        for wait_miles in [0, 1, 2] {
            let input = PayInput {
                wait_miles,
                ..miles_input(1, DriverTier::Standard)
            };
            let pay = calculate_driver_pay(&input, &PayRates::default());
            assert_eq!(pay.wait_bonus_cents, 0);
        }
    }

    #[test]
    fn bonus_is_ignored_when_not_eligible() {
        let input = PayInput {
            bonus_eligible: false,
            bonus_5star_cents: 500,
            ..miles_input(2, DriverTier::Standard)
        };

        let pay = calculate_driver_pay(&input, &PayRates::default());

        assert_eq!(pay.bonus_pay_cents, 0);
        assert_eq!(pay.total_cents, 350);
    }

    #[test]
    fn negative_inputs_behave_like_zero() {
        let rates = PayRates::default();
        let negative = PayInput {
            basis: PayBasis::ServiceMiles { miles: -8 },
            driver_tier: DriverTier::Elite,
            tips_cents: -10,
            bonus_eligible: true,
            bonus_5star_cents: -20,
            wait_miles: -4,
            cash_handling: false,
            business_account: false,
        };
        let zeroed = PayInput {
            basis: PayBasis::ServiceMiles { miles: 0 },
            tips_cents: 0,
            bonus_5star_cents: 0,
            wait_miles: 0,
            ..negative
        };

        let pay = calculate_driver_pay(&negative, &rates);

        assert_eq!(pay, calculate_driver_pay(&zeroed, &rates));
        assert_eq!(pay.total_cents, 0);
    }

    #[test]
    fn hourly_basis_prorates_active_minutes() {
        let input = PayInput {
            basis: PayBasis::ActiveTime {
                active_minutes: 90,
                hourly_rate_cents: 2000,
            },
            tips_cents: 300,
            bonus_eligible: true,
            bonus_5star_cents: 500,
            ..miles_input(0, DriverTier::Standard)
        };

        let pay = calculate_driver_pay(&input, &PayRates::default());

        assert_eq!(pay.rate_cents, 2000);
        assert_eq!(pay.mile_pay_cents, 3000);
        assert_eq!(pay.total_cents, 3800);
    }

    #[test]
    fn negative_hourly_inputs_pay_nothing() {
        let input = PayInput {
            basis: PayBasis::ActiveTime {
                active_minutes: -1,
                hourly_rate_cents: -5,
            },
            ..miles_input(0, DriverTier::Standard)
        };

        let pay = calculate_driver_pay(&input, &PayRates::default());

        assert_eq!(pay.mile_pay_cents, 0);
        assert_eq!(pay.total_cents, 0);
    }

    #[test]
    fn total_is_the_sum_of_line_items() {
        let rates = PayRates::default();
        for miles in [0, 1, 7, 40] {
            for wait_miles in [0, 3, 9] {
                let input = PayInput {
                    tips_cents: 125,
                    bonus_eligible: miles % 2 == 0,
                    bonus_5star_cents: 400,
                    wait_miles,
                    cash_handling: wait_miles > 3,
                    ..miles_input(miles, DriverTier::Concierge)
                };
                let pay = calculate_driver_pay(&input, &rates);
                assert_eq!(
                    pay.total_cents,
                    pay.mile_pay_cents
                        + pay.wait_bonus_cents
                        + pay.cash_bonus_cents
                        + pay.business_bonus_cents
                        + pay.bonus_pay_cents
                        + pay.tips_cents
                );
                assert!(pay.total_cents >= 0);
            }
        }
    }

    #[test]
    fn hourly_rounding_is_half_up() {
        let input = PayInput {
            basis: PayBasis::ActiveTime {
                active_minutes: 1,
                hourly_rate_cents: 1530,
            },
            ..miles_input(0, DriverTier::Standard)
        };

        // 1530 / 60 = 25.5
        assert_eq!(calculate_driver_pay(&input, &PayRates::default()).mile_pay_cents, 26);
    }
}
