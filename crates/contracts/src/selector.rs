use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

const MAX_NAME_LEN: usize = 63;
const MAX_PREFIX_LEN: usize = 253;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    DoubleEquals,
    NotEquals,
    In,
    NotIn,
    Exists,
    DoesNotExist,
    GreaterThan,
    LessThan,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Equals => "=",
            Operator::DoubleEquals => "==",
            Operator::NotEquals => "!=",
            Operator::In => "in",
            Operator::NotIn => "notin",
            Operator::Exists => "exists",
            Operator::DoesNotExist => "!",
            Operator::GreaterThan => ">",
            Operator::LessThan => "<",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorParseError {
    message: String,
}

impl SelectorParseError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for SelectorParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SelectorParseError {}

/// A single `key <op> values` term of a label selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    key: String,
    operator: Operator,
    values: Vec<String>,
}

impl Requirement {
    pub fn new(
        key: impl Into<String>,
        operator: Operator,
        values: Vec<String>,
    ) -> Result<Self, SelectorParseError> {
        let key = key.into();
        validate_key(&key)?;

        match operator {
            Operator::Equals | Operator::DoubleEquals | Operator::NotEquals => {
                if values.len() != 1 {
                    return Err(SelectorParseError::new(format!(
                        "operator `{}` on key `{}` requires exactly one value",
                        operator.as_str(),
                        key
                    )));
                }
            }
            Operator::In | Operator::NotIn => {
                if values.is_empty() {
                    return Err(SelectorParseError::new(format!(
                        "operator `{}` on key `{}` requires at least one value",
                        operator.as_str(),
                        key
                    )));
                }
            }
            Operator::Exists | Operator::DoesNotExist => {
                if !values.is_empty() {
                    return Err(SelectorParseError::new(format!(
                        "existence check on key `{}` takes no values",
                        key
                    )));
                }
            }
            Operator::GreaterThan | Operator::LessThan => {
                if values.len() != 1 || values[0].parse::<i64>().is_err() {
                    return Err(SelectorParseError::new(format!(
                        "operator `{}` on key `{}` requires a single integer value",
                        operator.as_str(),
                        key
                    )));
                }
            }
        }

        for value in &values {
            validate_value(value)?;
        }

        Ok(Self {
            key,
            operator,
            values,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let actual = labels.get(&self.key);
        match self.operator {
            Operator::Equals | Operator::DoubleEquals | Operator::In => {
                actual.is_some_and(|v| self.values.contains(v))
            }
            Operator::NotEquals | Operator::NotIn => {
                actual.is_none_or(|v| !self.values.contains(v))
            }
            Operator::Exists => actual.is_some(),
            Operator::DoesNotExist => actual.is_none(),
            Operator::GreaterThan | Operator::LessThan => {
                let Some(actual) = actual.and_then(|v| v.parse::<i64>().ok()) else {
                    return false;
                };
                let Some(expected) = self.values.first().and_then(|v| v.parse::<i64>().ok())
                else {
                    return false;
                };
                if self.operator == Operator::GreaterThan {
                    actual > expected
                } else {
                    actual < expected
                }
            }
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operator {
            Operator::Exists => write!(f, "{}", self.key),
            Operator::DoesNotExist => write!(f, "!{}", self.key),
            Operator::In | Operator::NotIn => write!(
                f,
                "{} {} ({})",
                self.key,
                self.operator.as_str(),
                self.values.join(",")
            ),
            _ => write!(
                f,
                "{}{}{}",
                self.key,
                self.operator.as_str(),
                self.values.first().map(String::as_str).unwrap_or("")
            ),
        }
    }
}

/// Conjunction of label requirements, parsed from the usual
/// `env=prod,tier in (a,b),!legacy` syntax.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    requirements: Vec<Requirement>,
}

impl LabelSelector {
    pub fn new(requirements: Vec<Requirement>) -> Self {
        Self { requirements }
    }

    pub fn parse(raw: &str) -> Result<Self, SelectorParseError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(Self::default());
        }

        let mut requirements = Vec::new();
        for term in split_terms(raw)? {
            requirements.push(parse_requirement(term.trim())?);
        }
        Ok(Self { requirements })
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

impl FromStr for LabelSelector {
    type Err = SelectorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for requirement in &self.requirements {
            if !first {
                f.write_str(",")?;
            }
            first = false;
            write!(f, "{}", requirement)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRequirement {
    field: String,
    operator: Operator,
    value: String,
}

impl FieldRequirement {
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn matches(&self, actual: Option<&str>) -> bool {
        let equal = actual == Some(self.value.as_str());
        match self.operator {
            Operator::NotEquals => !equal,
            _ => equal,
        }
    }
}

/// Conjunction of `field=value` / `field!=value` terms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSelector {
    requirements: Vec<FieldRequirement>,
}

impl FieldSelector {
    pub fn parse(raw: &str) -> Result<Self, SelectorParseError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(Self::default());
        }

        let mut requirements = Vec::new();
        for term in raw.split(',') {
            let term = term.trim();
            let (field, operator, value) = if let Some((f, v)) = term.split_once("!=") {
                (f, Operator::NotEquals, v)
            } else if let Some((f, v)) = term.split_once("==") {
                (f, Operator::DoubleEquals, v)
            } else if let Some((f, v)) = term.split_once('=') {
                (f, Operator::Equals, v)
            } else {
                return Err(SelectorParseError::new(format!(
                    "invalid field selector term `{}` (expected field=value or field!=value)",
                    term
                )));
            };

            let field = field.trim();
            if field.is_empty() {
                return Err(SelectorParseError::new(format!(
                    "invalid field selector term `{}` (empty field)",
                    term
                )));
            }

            requirements.push(FieldRequirement {
                field: field.to_string(),
                operator,
                value: value.trim().to_string(),
            });
        }
        Ok(Self { requirements })
    }

    pub fn requirements(&self) -> &[FieldRequirement] {
        &self.requirements
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn matches<'a, F>(&self, lookup: F) -> bool
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        self.requirements
            .iter()
            .all(|r| r.matches(lookup(r.field.as_str())))
    }
}

impl FromStr for FieldSelector {
    type Err = SelectorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn split_terms(raw: &str) -> Result<Vec<&str>, SelectorParseError> {
    let mut terms = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for (idx, ch) in raw.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    SelectorParseError::new("unbalanced `)` in label selector")
                })?;
            }
            ',' if depth == 0 => {
                terms.push(&raw[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }

    if depth != 0 {
        return Err(SelectorParseError::new("unbalanced `(` in label selector"));
    }
    terms.push(&raw[start..]);
    Ok(terms)
}

fn parse_requirement(term: &str) -> Result<Requirement, SelectorParseError> {
    if term.is_empty() {
        return Err(SelectorParseError::new("empty label selector requirement"));
    }

    if let Some(key) = term.strip_prefix('!') {
        return Requirement::new(key.trim(), Operator::DoesNotExist, Vec::new());
    }

    let key_len = term
        .char_indices()
        .find(|(_, ch)| !is_key_char(*ch))
        .map(|(idx, _)| idx)
        .unwrap_or(term.len());
    let (key, rest) = term.split_at(key_len);
    let rest = rest.trim_start();

    if rest.is_empty() {
        return Requirement::new(key, Operator::Exists, Vec::new());
    }

    for (token, operator) in [
        ("==", Operator::DoubleEquals),
        ("!=", Operator::NotEquals),
        ("=", Operator::Equals),
        (">", Operator::GreaterThan),
        ("<", Operator::LessThan),
    ] {
        if let Some(value) = rest.strip_prefix(token) {
            return Requirement::new(key, operator, vec![value.trim().to_string()]);
        }
    }

    for (token, operator) in [("notin", Operator::NotIn), ("in", Operator::In)] {
        if let Some(set) = rest.strip_prefix(token)
            && (set.starts_with('(') || set.starts_with(char::is_whitespace))
        {
            return Requirement::new(key, operator, parse_value_set(set.trim(), key)?);
        }
    }

    Err(SelectorParseError::new(format!(
        "invalid label selector requirement `{}`",
        term
    )))
}

fn parse_value_set(set: &str, key: &str) -> Result<Vec<String>, SelectorParseError> {
    let inner = set
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| {
            SelectorParseError::new(format!(
                "set requirement on key `{}` must be wrapped in parentheses",
                key
            ))
        })?;

    let mut values = inner
        .split(',')
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
        .collect::<Vec<_>>();
    values.sort();
    values.dedup();
    Ok(values)
}

fn is_key_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '/')
}

fn is_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.')
}

fn validate_name(name: &str) -> bool {
    let starts_ok = name.chars().next().is_some_and(|c| c.is_ascii_alphanumeric());
    let ends_ok = name
        .chars()
        .next_back()
        .is_some_and(|c| c.is_ascii_alphanumeric());
    name.len() <= MAX_NAME_LEN && starts_ok && ends_ok && name.chars().all(is_name_char)
}

fn validate_key(key: &str) -> Result<(), SelectorParseError> {
    let (prefix, name) = match key.split_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };

    if let Some(prefix) = prefix {
        let prefix_ok = !prefix.is_empty()
            && prefix.len() <= MAX_PREFIX_LEN
            && prefix
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '.'));
        if !prefix_ok {
            return Err(SelectorParseError::new(format!(
                "invalid label key `{}`: prefix must be a DNS subdomain",
                key
            )));
        }
    }

    if !validate_name(name) {
        return Err(SelectorParseError::new(format!(
            "invalid label key `{}`: name must be 1-63 alphanumeric characters, `-`, `_` or `.`",
            key
        )));
    }

    Ok(())
}

fn validate_value(value: &str) -> Result<(), SelectorParseError> {
    if value.is_empty() || validate_name(value) {
        return Ok(());
    }
    Err(SelectorParseError::new(format!(
        "invalid label value `{}`: must be at most 63 alphanumeric characters, `-`, `_` or `.`",
        value
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parses_equality_set_and_existence_terms() {
        let selector =
            LabelSelector::parse("env=prod, tier in (web, db),!legacy,team,app!=api").unwrap();
        let summary = selector
            .requirements()
            .iter()
            .map(|r| (r.key(), r.operator(), r.values().to_vec()))
            .collect::<Vec<_>>();

        assert_eq!(
            summary,
            vec![
                ("env", Operator::Equals, vec!["prod".to_string()]),
                (
                    "tier",
                    Operator::In,
                    vec!["db".to_string(), "web".to_string()]
                ),
                ("legacy", Operator::DoesNotExist, vec![]),
                ("team", Operator::Exists, vec![]),
                ("app", Operator::NotEquals, vec!["api".to_string()]),
            ]
        );
    }

    #[test]
    fn prefixed_keys_keep_their_domain() {
        let selector = LabelSelector::parse("workspaces.internal.example/tenant=foo").unwrap();
        assert_eq!(
            selector.requirements()[0].key(),
            "workspaces.internal.example/tenant"
        );
    }

    #[test]
    fn empty_selector_matches_everything() {
        let selector = LabelSelector::parse("  ").unwrap();
        assert!(selector.is_empty());
        assert!(selector.matches(&BTreeMap::new()));
    }

    #[test]
    fn matching_follows_set_semantics() {
        let set = labels(&[("env", "prod"), ("tier", "web"), ("replicas", "3")]);

        assert!(LabelSelector::parse("env=prod").unwrap().matches(&set));
        assert!(LabelSelector::parse("env==prod").unwrap().matches(&set));
        assert!(!LabelSelector::parse("env=dev").unwrap().matches(&set));
        assert!(LabelSelector::parse("missing!=x").unwrap().matches(&set));
        assert!(LabelSelector::parse("tier notin (db)").unwrap().matches(&set));
        assert!(!LabelSelector::parse("tier in (db)").unwrap().matches(&set));
        assert!(LabelSelector::parse("replicas>2").unwrap().matches(&set));
        assert!(!LabelSelector::parse("replicas<2").unwrap().matches(&set));
        assert!(!LabelSelector::parse("env>2").unwrap().matches(&set));
        assert!(!LabelSelector::parse("!env").unwrap().matches(&set));
        assert!(LabelSelector::parse("env,tier").unwrap().matches(&set));
    }

    #[test]
    fn rejects_malformed_selectors() {
        for raw in [
            "env=prod,",
            "tier in (a",
            "tier in a,b",
            "=prod",
            "env prod",
            "replicas>many",
            "Bad_Prefix/key=v",
            "env=-bad-",
        ] {
            assert!(
                LabelSelector::parse(raw).is_err(),
                "expected `{}` to be rejected",
                raw
            );
        }
    }

    #[test]
    fn display_round_trips_through_parse() {
        let raw = "env=prod,tier in (db,web),!legacy";
        let selector = LabelSelector::parse(raw).unwrap();
        assert_eq!(selector.to_string(), raw);
        assert_eq!(LabelSelector::parse(&selector.to_string()).unwrap(), selector);
    }

    #[test]
    fn field_selector_parses_and_matches() {
        let selector = FieldSelector::parse("metadata.name=default,metadata.namespace!=bar").unwrap();
        assert_eq!(selector.requirements().len(), 2);
        assert_eq!(selector.requirements()[1].operator(), Operator::NotEquals);

        let lookup_foo = |field: &str| match field {
            "metadata.name" => Some("default"),
            "metadata.namespace" => Some("foo"),
            _ => None,
        };
        assert!(selector.matches(lookup_foo));

        let lookup_bar = |field: &str| match field {
            "metadata.name" => Some("default"),
            "metadata.namespace" => Some("bar"),
            _ => None,
        };
        assert!(!selector.matches(lookup_bar));

        assert!(FieldSelector::parse("metadata.name").is_err());
    }
}
