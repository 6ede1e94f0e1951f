#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::collections::BTreeMap;

use bon::Builder;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(on(String, into))]
/// A single rubric dimension a submission is scored against.
pub struct GradingCriterion {
    /// * `name`: unique name of the criterion within its schema
    #[builder(getter)]
    pub(crate) name:        String,
    /// * `description`: what the criterion assesses
    #[builder(default)]
    #[builder(getter)]
    #[serde(default)]
    pub(crate) description: String,
    /// * `max_points`: the most points this criterion can award
    #[builder(getter)]
    pub(crate) max_points:  f64,
    /// * `rubric`: point-value labels mapped to their descriptions. Purely
    ///   informational, coverage of the point range is never checked.
    #[builder(default)]
    #[builder(with = |iter: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>| {
        iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect::<BTreeMap<String, String>>()
    })]
    #[serde(default)]
    pub(crate) rubric:      BTreeMap<String, String>,
}

impl GradingCriterion {
    /// Returns the criterion name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the criterion description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the maximum points for this criterion.
    pub fn max_points(&self) -> f64 {
        self.max_points
    }

    /// Returns the rubric levels.
    pub fn rubric(&self) -> &BTreeMap<String, String> {
        &self.rubric
    }

    /// Renders the rubric as `- label: description` lines, highest numeric
    /// label first. Labels that are not numbers sort after the numeric ones.
    pub fn rubric_lines(&self) -> String {
        self.rubric
            .iter()
            .sorted_by(|(a, _), (b, _)| {
                match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
                    (Ok(x), Ok(y)) => y.total_cmp(&x),
                    (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                    (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                    (Err(_), Err(_)) => a.cmp(b),
                }
            })
            .map(|(label, desc)| format!("- {label}: {desc}"))
            .join("\n")
    }
}
