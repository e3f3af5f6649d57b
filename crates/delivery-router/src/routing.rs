//! Click routing as an ordered rule list.

use crate::{Category, PayloadData};
use serde::Serialize;

/// Action name that sends the user straight to diagnosis entry.
pub const DIAGNOSE_ACTION: &str = "diagnose";

/// Screen a notification click lands on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "screen", content = "target", rename_all = "snake_case")]
pub enum Destination {
    DiagnoseEntry,
    DiagnosisDetail(String),
    DiagnosisList,
    Insights,
    Tips,
    Home,
    Custom(String),
}

impl Destination {
    pub fn path(&self) -> String {
        match self {
            Destination::DiagnoseEntry => "/diagnose".to_string(),
            Destination::DiagnosisDetail(id) => {
                format!("/diagnoses/{}", urlencoding::encode(id))
            }
            Destination::DiagnosisList => "/diagnoses".to_string(),
            Destination::Insights => "/insights".to_string(),
            Destination::Tips => "/tips".to_string(),
            Destination::Home => "/".to_string(),
            Destination::Custom(url) => url.clone(),
        }
    }
}

/// One routing rule. Rules are tried in [`CLICK_RULES`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickRule {
    /// `url` overrides everything else.
    ExplicitUrl,
    DiagnoseAction,
    /// Blight alerts always open diagnosis entry, even with a diagnosis id.
    BlightAlert,
    DiagnosisDetail,
    WeatherInsights,
    FarmingTip,
}

pub const CLICK_RULES: &[ClickRule] = &[
    ClickRule::ExplicitUrl,
    ClickRule::DiagnoseAction,
    ClickRule::BlightAlert,
    ClickRule::DiagnosisDetail,
    ClickRule::WeatherInsights,
    ClickRule::FarmingTip,
];

impl ClickRule {
    pub fn apply(&self, data: &PayloadData) -> Option<Destination> {
        let category = Category::from_type(data.kind.as_deref());
        match self {
            ClickRule::ExplicitUrl => data.url.clone().map(Destination::Custom),
            ClickRule::DiagnoseAction => (data.action.as_deref() == Some(DIAGNOSE_ACTION))
                .then_some(Destination::DiagnoseEntry),
            ClickRule::BlightAlert => {
                (category == Category::Blight).then_some(Destination::DiagnoseEntry)
            }
            ClickRule::DiagnosisDetail => (category == Category::Diagnosis).then(|| {
                match data.diagnosis_id.as_deref() {
                    Some(id) if is_usable_id(id) => Destination::DiagnosisDetail(id.to_string()),
                    _ => Destination::DiagnosisList,
                }
            }),
            ClickRule::WeatherInsights => {
                (category == Category::Weather).then_some(Destination::Insights)
            }
            ClickRule::FarmingTip => (category == Category::Tip).then_some(Destination::Tips),
        }
    }
}

/// Dot segments would escape the detail route even once encoded.
fn is_usable_id(id: &str) -> bool {
    !matches!(id.trim(), "" | "." | "..")
}

/// First matching rule, else home.
pub fn resolve_destination(data: &PayloadData) -> Destination {
    CLICK_RULES
        .iter()
        .find_map(|rule| rule.apply(data))
        .unwrap_or(Destination::Home)
}
