//! Field-level and cross-field checks for provider listing submissions.
//!
//! Every rule runs independently and all failures are collected, so the
//! caller can surface the full list at once. On a partial update a field
//! is checked only when present.

use std::ops::RangeInclusive;

use chrono::Weekday;
use serde::Deserialize;
use serde_json::Value;

use super::ListingKind;
use super::listing::{
    Category, ListingContent, ListingPatch, LocationMode, PricedOption, Pricing, ServiceType,
};
use crate::error::{FieldError, MarketError, ValidationErrors};

/// Allowed trimmed length of a listing name.
pub const NAME_LEN: RangeInclusive<usize> = 2..=100;
/// Allowed trimmed length of a description.
pub const DESCRIPTION_LEN: RangeInclusive<usize> = 5..=2000;
/// Highest accepted price.
pub const MAX_PRICE: f64 = 1_000_000.0;
/// Allowed appointment duration in minutes.
pub const DURATION_MINUTES: RangeInclusive<u32> = 15..=600;
/// Longest accepted policy text.
pub const MAX_POLICY_LEN: usize = 2000;
/// Allowed length of a variation / add-on name.
pub const OPTION_NAME_LEN: RangeInclusive<usize> = 1..=100;
/// Most services a package may bundle.
pub const MAX_INCLUDED_SERVICES: usize = 20;

/// Raw pricing block as submitted.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PricingDraft {
    /// Base price, a JSON number or numeric string.
    pub base_price: Option<Value>,
    /// Variations.
    #[serde(default)]
    pub variations: Vec<PricedOption>,
    /// Add-ons.
    #[serde(default)]
    pub add_ons: Vec<PricedOption>,
}

/// Unchecked listing fields as submitted by a provider.
///
/// Enumerations arrive as strings and numbers as raw JSON values, so a
/// wrongly typed field is reported with the rest instead of failing the
/// whole body at deserialization.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ListingDraft {
    /// Display name.
    pub name: Option<String>,
    /// Treatment type (see [`ServiceType`]).
    pub service_type: Option<String>,
    /// Audience category (see [`Category`]).
    pub category: Option<String>,
    /// Long description.
    pub description: Option<String>,
    /// Pricing block.
    pub pricing: Option<PricingDraft>,
    /// Duration in minutes, a JSON number or numeric string.
    pub duration_minutes: Option<Value>,
    /// Bookable weekdays (`mon`..`sun`).
    pub available_days: Option<Vec<String>>,
    /// Location mode (see [`LocationMode`]).
    pub location_mode: Option<String>,
    /// Policy text.
    pub policy: Option<String>,
    /// Bundled services (packages only).
    pub included_services: Option<Vec<String>>,
}

/// Checks `draft` and returns every failure found. Empty means valid.
#[must_use]
pub fn validate(draft: &ListingDraft, is_partial_update: bool) -> ValidationErrors {
    check(draft, None, is_partial_update).1
}

impl ListingDraft {
    /// Validates the draft as a complete new listing and converts it.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Validation`] with all field failures.
    pub fn to_content(&self, kind: ListingKind) -> Result<ListingContent, MarketError> {
        let (patch, errors) = check(self, Some(kind), false);
        if !errors.is_empty() {
            return Err(MarketError::Validation(errors));
        }
        Ok(ListingContent {
            name: required(patch.name, "name")?,
            service_type: required(patch.service_type, "service_type")?,
            category: required(patch.category, "category")?,
            description: required(patch.description, "description")?,
            pricing: required(patch.pricing, "pricing")?,
            duration_minutes: required(patch.duration_minutes, "duration_minutes")?,
            available_days: patch.available_days.unwrap_or_default(),
            location_mode: patch.location_mode.unwrap_or(LocationMode::InSalon),
            policy: patch.policy,
            included_services: patch.included_services.unwrap_or_default(),
        })
    }

    /// Validates the draft as a partial update and converts it.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Validation`] with all field failures.
    pub fn to_patch(&self, kind: ListingKind) -> Result<ListingPatch, MarketError> {
        let (patch, errors) = check(self, Some(kind), true);
        if errors.is_empty() {
            Ok(patch)
        } else {
            Err(MarketError::Validation(errors))
        }
    }
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, MarketError> {
    value.ok_or_else(|| MarketError::Internal(format!("{field} missing after validation")))
}

struct Checker {
    partial: bool,
    errors: Vec<FieldError>,
}

impl Checker {
    fn fail(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    fn present<'a, T>(&mut self, value: Option<&'a T>, field: &str) -> Option<&'a T> {
        if value.is_none() && !self.partial {
            self.fail(field, "is required");
        }
        value
    }

    fn text(
        &mut self,
        value: Option<&String>,
        field: &str,
        len: &RangeInclusive<usize>,
    ) -> Option<String> {
        let trimmed = self.present(value, field)?.trim();
        if len.contains(&trimmed.chars().count()) {
            Some(trimmed.to_string())
        } else {
            self.fail(
                field,
                format!(
                    "must be between {} and {} characters",
                    len.start(),
                    len.end()
                ),
            );
            None
        }
    }

    fn choice<T: std::str::FromStr + Copy>(
        &mut self,
        value: Option<&String>,
        field: &str,
        all: &[T],
        name: fn(T) -> &'static str,
    ) -> Option<T> {
        let raw = self.present(value, field)?;
        if let Ok(parsed) = raw.trim().parse::<T>() {
            return Some(parsed);
        }
        let allowed: Vec<&str> = all.iter().map(|v| name(*v)).collect();
        self.fail(field, format!("must be one of: {}", allowed.join(", ")));
        None
    }

    fn number(&mut self, value: &Value, field: &str) -> Option<f64> {
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        let number = parsed.filter(|n| n.is_finite());
        if number.is_none() {
            self.fail(field, "must be a number");
        }
        number
    }

    fn price(&mut self, value: f64, field: &str) -> bool {
        if !value.is_finite() {
            self.fail(field, "must be a number");
            false
        } else if value <= 0.0 {
            self.fail(field, "must be greater than 0");
            false
        } else if value > MAX_PRICE {
            self.fail(field, format!("must not exceed {MAX_PRICE}"));
            false
        } else {
            true
        }
    }

    fn options(&mut self, options: &[PricedOption], field: &str) -> Option<Vec<PricedOption>> {
        let mut ok = true;
        let mut cleaned = Vec::with_capacity(options.len());
        for (i, option) in options.iter().enumerate() {
            let name = option.name.trim();
            if !OPTION_NAME_LEN.contains(&name.chars().count()) {
                self.fail(
                    format!("{field}[{i}].name"),
                    format!(
                        "must be between {} and {} characters",
                        OPTION_NAME_LEN.start(),
                        OPTION_NAME_LEN.end()
                    ),
                );
                ok = false;
            }
            ok &= self.price(option.price, &format!("{field}[{i}].price"));
            cleaned.push(PricedOption {
                name: name.to_string(),
                price: option.price,
            });
        }
        ok.then_some(cleaned)
    }

    fn pricing(&mut self, value: Option<&PricingDraft>) -> Option<Pricing> {
        let Some(draft) = value else {
            if !self.partial {
                self.fail("pricing.base_price", "is required");
            }
            return None;
        };
        let base_price = match draft.base_price.as_ref() {
            Some(raw) => self
                .number(raw, "pricing.base_price")
                .filter(|price| self.price(*price, "pricing.base_price")),
            None => {
                self.fail("pricing.base_price", "is required");
                None
            }
        };
        let variations = self.options(&draft.variations, "pricing.variations");
        let add_ons = self.options(&draft.add_ons, "pricing.add_ons");
        Some(Pricing {
            base_price: base_price?,
            variations: variations?,
            add_ons: add_ons?,
        })
    }

    fn duration(&mut self, value: Option<&Value>) -> Option<u32> {
        let raw = self.present(value, "duration_minutes")?;
        let minutes = self.number(raw, "duration_minutes")?;
        let whole = minutes.fract() == 0.0;
        let in_range = minutes >= f64::from(*DURATION_MINUTES.start())
            && minutes <= f64::from(*DURATION_MINUTES.end());
        if whole && in_range {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let minutes = minutes as u32;
            Some(minutes)
        } else {
            self.fail(
                "duration_minutes",
                format!(
                    "must be a whole number of minutes between {} and {}",
                    DURATION_MINUTES.start(),
                    DURATION_MINUTES.end()
                ),
            );
            None
        }
    }

    fn weekdays(&mut self, value: Option<&Vec<String>>) -> Option<Vec<Weekday>> {
        let raw = value?;
        let mut days = Vec::with_capacity(raw.len());
        let mut ok = true;
        for (i, day) in raw.iter().enumerate() {
            match day.trim().parse::<Weekday>() {
                Ok(d) if !days.contains(&d) => days.push(d),
                Ok(_) => {}
                Err(_) => {
                    self.fail(format!("available_days[{i}]"), "must be a weekday (mon..sun)");
                    ok = false;
                }
            }
        }
        ok.then_some(days)
    }

    fn included(&mut self, value: Option<&Vec<String>>, kind: Option<ListingKind>) -> Option<Vec<String>> {
        let raw = value?;
        if kind == Some(ListingKind::Service) && !raw.is_empty() {
            self.fail("included_services", "only packages may include services");
            return None;
        }
        if raw.len() > MAX_INCLUDED_SERVICES {
            self.fail(
                "included_services",
                format!("must list at most {MAX_INCLUDED_SERVICES} services"),
            );
            return None;
        }
        let mut ok = true;
        let mut cleaned = Vec::with_capacity(raw.len());
        for (i, name) in raw.iter().enumerate() {
            let name = name.trim();
            if NAME_LEN.contains(&name.chars().count()) {
                cleaned.push(name.to_string());
            } else {
                self.fail(
                    format!("included_services[{i}]"),
                    format!(
                        "must be between {} and {} characters",
                        NAME_LEN.start(),
                        NAME_LEN.end()
                    ),
                );
                ok = false;
            }
        }
        ok.then_some(cleaned)
    }
}

/// Runs every rule. `kind` enables the kind-specific rules.
fn check(
    draft: &ListingDraft,
    kind: Option<ListingKind>,
    partial: bool,
) -> (ListingPatch, ValidationErrors) {
    let mut c = Checker {
        partial,
        errors: Vec::new(),
    };

    let name = c.text(draft.name.as_ref(), "name", &NAME_LEN);
    let service_type = c.choice(
        draft.service_type.as_ref(),
        "service_type",
        ServiceType::ALL,
        ServiceType::as_str,
    );
    let category = c.choice(
        draft.category.as_ref(),
        "category",
        Category::ALL,
        Category::as_str,
    );
    let description = c.text(draft.description.as_ref(), "description", &DESCRIPTION_LEN);
    let pricing = c.pricing(draft.pricing.as_ref());
    let duration_minutes = c.duration(draft.duration_minutes.as_ref());
    let available_days = c.weekdays(draft.available_days.as_ref());
    let location_mode = match draft.location_mode.as_ref() {
        Some(raw) => c.choice(
            Some(raw),
            "location_mode",
            LocationMode::ALL,
            LocationMode::as_str,
        ),
        None => None,
    };
    let policy = match draft.policy.as_ref().map(|p| p.trim()) {
        Some(p) if p.chars().count() > MAX_POLICY_LEN => {
            c.fail(
                "policy",
                format!("must be at most {MAX_POLICY_LEN} characters"),
            );
            None
        }
        other => other.map(str::to_string),
    };
    let included_services = c.included(draft.included_services.as_ref(), kind);

    let patch = ListingPatch {
        name,
        service_type,
        category,
        description,
        pricing,
        duration_minutes,
        available_days,
        location_mode,
        policy,
        included_services,
    };
    (patch, ValidationErrors(c.errors))
}
