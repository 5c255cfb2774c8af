use k8s_openapi::api::core::v1::{NodeSelectorRequirement, NodeSelectorTerm};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;
use whypending_core::{record_note, Note};

/// Selector operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
    Gt,
    Lt,
    /// Anything else; evaluated as a pass and noted
    Unsupported(String),
}

impl Operator {
    pub fn as_str(&self) -> &str {
        match self {
            Operator::In => "In",
            Operator::NotIn => "NotIn",
            Operator::Exists => "Exists",
            Operator::DoesNotExist => "DoesNotExist",
            Operator::Gt => "Gt",
            Operator::Lt => "Lt",
            Operator::Unsupported(op) => op,
        }
    }
}

impl From<&str> for Operator {
    fn from(s: &str) -> Self {
        match s {
            "In" => Operator::In,
            "NotIn" => Operator::NotIn,
            "Exists" => Operator::Exists,
            "DoesNotExist" => Operator::DoesNotExist,
            "Gt" => Operator::Gt,
            "Lt" => Operator::Lt,
            other => Operator::Unsupported(other.to_string()),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single key/operator/values requirement over a label map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub key: String,
    pub operator: Operator,
    pub values: Vec<String>,
}

impl Requirement {
    pub fn new(key: impl Into<String>, operator: Operator, values: Vec<String>) -> Self {
        Self {
            key: key.into(),
            operator,
            values,
        }
    }

    /// Check the requirement against `labels`, noting constructs it cannot
    /// evaluate
    pub fn matches(&self, labels: &BTreeMap<String, String>, notes: &mut Vec<Note>) -> bool {
        let value = labels.get(&self.key);
        match &self.operator {
            Operator::In => value.is_some_and(|v| self.values.contains(v)),
            Operator::NotIn => value.is_none_or(|v| !self.values.contains(v)),
            Operator::Exists => value.is_some(),
            Operator::DoesNotExist => value.is_none(),
            Operator::Gt => self.compare_integer(value).is_some_and(|(l, r)| l > r),
            Operator::Lt => self.compare_integer(value).is_some_and(|(l, r)| l < r),
            Operator::Unsupported(op) => {
                warn!("Selector operator {} on key {} is not supported", op, self.key);
                record_note(
                    notes,
                    Note::UnsupportedOperator {
                        key: self.key.clone(),
                        operator: op.clone(),
                    },
                );
                true
            }
        }
    }

    /// Label value and the single comparison value, both as integers.
    /// `None` (no match) when the label is missing, there is not exactly
    /// one comparison value, or either side is not an integer.
    fn compare_integer(&self, value: Option<&String>) -> Option<(i64, i64)> {
        let [bound] = self.values.as_slice() else {
            return None;
        };
        let label = value?.parse::<i64>().ok()?;
        let bound = bound.parse::<i64>().ok()?;
        Some((label, bound))
    }
}

impl From<&NodeSelectorRequirement> for Requirement {
    fn from(req: &NodeSelectorRequirement) -> Self {
        Self::new(
            req.key.clone(),
            Operator::from(req.operator.as_str()),
            req.values.clone().unwrap_or_default(),
        )
    }
}

impl fmt::Display for Requirement {
    /// Label selector syntax: `app=web`, `tier in (a,b)`, `!gpu`, `cores>4`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.operator, self.values.as_slice()) {
            (Operator::In, [single]) => write!(f, "{}={}", self.key, single),
            (Operator::NotIn, [single]) => write!(f, "{}!={}", self.key, single),
            (Operator::In, values) => write!(f, "{} in ({})", self.key, values.join(",")),
            (Operator::NotIn, values) => write!(f, "{} notin ({})", self.key, values.join(",")),
            (Operator::Exists, _) => write!(f, "{}", self.key),
            (Operator::DoesNotExist, _) => write!(f, "!{}", self.key),
            (Operator::Gt, values) => write!(f, "{}>{}", self.key, values.join(",")),
            (Operator::Lt, values) => write!(f, "{}<{}", self.key, values.join(",")),
            (Operator::Unsupported(op), values) => {
                write!(f, "{} {} ({})", self.key, op, values.join(","))
            }
        }
    }
}

/// Requirements that must all hold
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Term {
    pub requirements: Vec<Requirement>,
    /// Keys of field selectors, which select on node fields and are not
    /// evaluated
    pub field_keys: Vec<String>,
}

impl Term {
    pub fn new(requirements: Vec<Requirement>) -> Self {
        Self {
            requirements,
            field_keys: Vec::new(),
        }
    }

    /// Term from a plain `nodeSelector` map: every entry becomes `key In (value)`
    pub fn from_node_selector(selector: &BTreeMap<String, String>) -> Self {
        Self::new(
            selector
                .iter()
                .map(|(k, v)| Requirement::new(k.clone(), Operator::In, vec![v.clone()]))
                .collect(),
        )
    }

    pub fn from_node_selector_term(term: &NodeSelectorTerm) -> Self {
        Self {
            requirements: term
                .match_expressions
                .iter()
                .flatten()
                .map(Requirement::from)
                .collect(),
            field_keys: term
                .match_fields
                .iter()
                .flatten()
                .map(|req| req.key.clone())
                .collect(),
        }
    }

    /// Term from a label selector; `matchLabels` entries become `In`
    /// requirements. Requirements are sorted by key.
    ///
    /// `Gt` and `Lt` exist only for node selectors, so in a label selector
    /// they are unsupported like any other unknown operator.
    pub fn from_label_selector(selector: &LabelSelector) -> Self {
        let mut requirements: Vec<Requirement> = selector
            .match_labels
            .iter()
            .flatten()
            .map(|(k, v)| Requirement::new(k.clone(), Operator::In, vec![v.clone()]))
            .collect();
        requirements.extend(selector.match_expressions.iter().flatten().map(|req| {
            let operator = match Operator::from(req.operator.as_str()) {
                Operator::Gt | Operator::Lt => Operator::Unsupported(req.operator.clone()),
                operator => operator,
            };
            Requirement::new(
                req.key.clone(),
                operator,
                req.values.clone().unwrap_or_default(),
            )
        }));
        requirements.sort_by(|a, b| a.key.cmp(&b.key));
        Self::new(requirements)
    }

    /// Whether every requirement holds; an empty term matches anything
    pub fn matches(&self, labels: &BTreeMap<String, String>, notes: &mut Vec<Note>) -> bool {
        if !self.field_keys.is_empty() {
            warn!("matchFields {:?} are not supported", self.field_keys);
            record_note(
                notes,
                Note::UnsupportedMatchFields {
                    keys: self.field_keys.clone(),
                },
            );
        }
        self.requirements.iter().all(|req| req.matches(labels, notes))
    }

    /// Render as the node selector term it stands for
    pub fn to_node_selector_term(&self) -> NodeSelectorTerm {
        NodeSelectorTerm {
            match_expressions: Some(
                self.requirements
                    .iter()
                    .map(|req| NodeSelectorRequirement {
                        key: req.key.clone(),
                        operator: req.operator.to_string(),
                        values: Some(req.values.clone()),
                    })
                    .collect(),
            ),
            match_fields: None,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.requirements.iter().map(|r| r.to_string()).collect();
        f.write_str(&parts.join(","))
    }
}
