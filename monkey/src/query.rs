use crate::errors::MonkeyError;
use crate::node::UiNodeAttributes;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Which nodes of a tree a search should return.
///
/// Class and text queries match when the attribute equals any of the given
/// values exactly. Clickable and scrollable queries look only at the flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeQuery {
    ByClass(BTreeSet<String>),
    ByText(BTreeSet<String>),
    ByClickable,
    ByScrollable,
}

impl AttributeQuery {
    pub fn class(value: impl Into<String>) -> Self {
        Self::ByClass(BTreeSet::from([value.into()]))
    }

    pub fn classes<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::ByClass(values.into_iter().map(Into::into).collect())
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::ByText(BTreeSet::from([value.into()]))
    }

    pub fn texts<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::ByText(values.into_iter().map(Into::into).collect())
    }

    pub fn matches(&self, attributes: &UiNodeAttributes) -> bool {
        match self {
            AttributeQuery::ByClass(values) => values.contains(&attributes.class_name),
            AttributeQuery::ByText(values) => values.contains(&attributes.text),
            AttributeQuery::ByClickable => attributes.clickable,
            AttributeQuery::ByScrollable => attributes.scrollable,
        }
    }
}

impl FromStr for AttributeQuery {
    type Err = MonkeyError;

    /// Parses `class:<a>|<b>`, `text:<a>|<b>`, `clickable` or `scrollable`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "clickable" => return Ok(AttributeQuery::ByClickable),
            "scrollable" => return Ok(AttributeQuery::ByScrollable),
            _ => {}
        }

        let (kind, values) = s
            .split_once(':')
            .ok_or_else(|| MonkeyError::InvalidQuery(format!("unrecognized query '{s}'")))?;
        let values: BTreeSet<String> = values.split('|').map(str::to_string).collect();

        match kind.trim() {
            "class" => Ok(AttributeQuery::ByClass(values)),
            "text" => Ok(AttributeQuery::ByText(values)),
            other => Err(MonkeyError::InvalidQuery(format!(
                "unknown attribute '{other}', expected class, text, clickable or scrollable"
            ))),
        }
    }
}

impl fmt::Display for AttributeQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |values: &BTreeSet<String>| {
            values
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join("|")
        };
        match self {
            AttributeQuery::ByClass(values) => write!(f, "class:{}", join(values)),
            AttributeQuery::ByText(values) => write!(f, "text:{}", join(values)),
            AttributeQuery::ByClickable => write!(f, "clickable"),
            AttributeQuery::ByScrollable => write!(f, "scrollable"),
        }
    }
}
