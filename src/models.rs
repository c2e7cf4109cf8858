//! Core data models for the experiment session

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of rounds in a full session
pub const TOTAL_ROUNDS: u32 = 20;

/// Round after which treatment-group advice becomes due
pub const ADVICE_MIDPOINT: u32 = 10;

/// Upper bound of the choice slider
pub const MAX_CHOICE_X: u32 = 100;

/// Intake age bounds
pub const MIN_AGE: u32 = 18;
pub const MAX_AGE: u32 = 100;

//
// ================= Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
    Other,
}

/// Session arm. Treatment sessions receive AI advice past the midpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Treatment,
    Control,
}

impl Condition {
    pub fn is_treatment(&self) -> bool {
        matches!(self, Condition::Treatment)
    }
}

//
// ================= Participant =================
//

/// Intake data collected once before round 1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub participant_id: String,
    pub age: u32,
    pub sex: Sex,
}

//
// ================= Budget Line =================
//

/// One round's randomly drawn prices and income.
///
/// Invariants (upheld by the generator): `income` in [100, 200],
/// `price_x` and `price_y` each in [income/100, income/50].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BudgetLine {
    pub price_x: f64,
    pub price_y: f64,
    pub income: f64,
}

impl BudgetLine {
    /// Derived allocation on Y that exhausts the budget for a given X choice.
    ///
    /// `price_y >= income/100 > 0` by the generator invariant, so the
    /// division cannot hit a zero divisor. Not clamped: pushing `choice_x`
    /// to 100 can yield a negative Y allocation when `price_x * 100 > income`.
    pub fn choice_y_for(&self, choice_x: u32) -> f64 {
        (self.income - self.price_x * f64::from(choice_x)) / self.price_y
    }
}

//
// ================= Response Record =================
//

/// One row per completed round. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub participant_id: String,
    pub age: u32,
    pub sex: Sex,
    pub round: u32,
    pub choice_x: u32,
    pub choice_y: f64,
    pub price_x: f64,
    pub price_y: f64,
    pub income: f64,
    pub elapsed_seconds: f64,
    pub condition: Condition,
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Sex::Male => "Male",
            Sex::Female => "Female",
            Sex::Other => "Other",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Condition::Treatment => "Treatment",
            Condition::Control => "Control",
        };
        write!(f, "{}", s)
    }
}
