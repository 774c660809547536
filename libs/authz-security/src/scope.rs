//! Row-level scope filters.
//!
//! A [`Scope`] is what an authorization decision hands to the query layer:
//! either one [`ScopeFilter`] or a list of them meaning logical OR. Each
//! filter is an AND-map of resource property to constraint value. Mapping
//! properties to columns and values to SQL is the query adapter's job.

use serde::{Deserialize, Serialize};
use serde_json::map::Entry;
use serde_json::{Map, Value, json};

/// Key under which conflicting constraints on one property are conjoined.
///
/// `{"status": {"$and": ["active", "archived"]}}` means both constraints
/// hold at once, which a query adapter renders as `status = 'active' AND
/// status = 'archived'`.
pub const AND_OPERATOR: &str = "$and";

/// A conjunction (AND) of property constraints: one access path.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeFilter(Map<String, Value>);

impl ScopeFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the constraint on `property`.
    #[must_use]
    pub fn with(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(property.into(), value.into());
        self
    }

    /// The constraint on `property`, if any.
    #[must_use]
    pub fn get(&self, property: &str) -> Option<&Value> {
        self.0.get(property)
    }

    /// Constrained property names.
    pub fn properties(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    #[must_use]
    pub fn iter(&self) -> serde_json::map::Iter<'_> {
        self.0.iter()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Shallow-merge two filters into one that requires both.
    ///
    /// Properties present on one side only are copied over. When both sides
    /// constrain the same property with different values, the two values are
    /// kept side by side under [`AND_OPERATOR`]; equal values collapse.
    #[must_use]
    pub fn and(&self, other: &ScopeFilter) -> ScopeFilter {
        let mut merged = self.0.clone();
        for (property, value) in &other.0 {
            match merged.entry(property.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(value.clone());
                }
                Entry::Occupied(mut slot) => {
                    if slot.get() != value {
                        let existing = slot.get_mut().take();
                        slot.insert(conjoin(existing, value.clone()));
                    }
                }
            }
        }
        ScopeFilter(merged)
    }

    /// Returns `true` if `row` satisfies every constraint by equality.
    ///
    /// Intended for in-memory checks of already loaded rows; operators other
    /// than [`AND_OPERATOR`] are compared literally.
    #[must_use]
    pub fn matches(&self, row: &Value) -> bool {
        self.0.iter().all(|(property, expected)| {
            row.get(property)
                .is_some_and(|actual| constraint_holds(expected, actual))
        })
    }
}

impl From<Map<String, Value>> for ScopeFilter {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ScopeFilter {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

fn and_operands(value: Value) -> Vec<Value> {
    if let Value::Object(map) = &value
        && map.len() == 1
        && let Some(Value::Array(items)) = map.get(AND_OPERATOR)
    {
        return items.clone();
    }
    vec![value]
}

fn conjoin(left: Value, right: Value) -> Value {
    let mut operands = and_operands(left);
    for operand in and_operands(right) {
        if !operands.contains(&operand) {
            operands.push(operand);
        }
    }
    if operands.len() == 1 {
        return operands.remove(0);
    }
    json!({ AND_OPERATOR: operands })
}

fn constraint_holds(expected: &Value, actual: &Value) -> bool {
    if let Value::Object(map) = expected
        && map.len() == 1
        && let Some(Value::Array(operands)) = map.get(AND_OPERATOR)
    {
        return operands.iter().all(|operand| operand == actual);
    }
    expected == actual
}

/// A disjunction (OR) of [`ScopeFilter`]s defining which rows are visible.
///
/// Serializes as a bare JSON object for a single filter, or a JSON array for
/// alternatives. An empty `AnyOf` admits no rows.
///
/// # Examples
///
/// ```
/// use authz_security::scope::{Scope, ScopeFilter};
///
/// let tenant = Scope::from(ScopeFilter::new().with("tenant_id", "t1"));
/// let active = Scope::from(ScopeFilter::new().with("status", "active"));
///
/// let scope = tenant.intersect(&active);
/// assert_eq!(
///     scope,
///     Scope::from(ScopeFilter::new().with("tenant_id", "t1").with("status", "active")),
/// );
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scope {
    /// A single access path.
    Filter(ScopeFilter),
    /// Alternative access paths (OR-ed).
    AnyOf(Vec<ScopeFilter>),
}

impl From<ScopeFilter> for Scope {
    fn from(filter: ScopeFilter) -> Self {
        Self::Filter(filter)
    }
}

impl Scope {
    /// Build a scope from OR-branches. A single branch collapses to
    /// [`Scope::Filter`].
    #[must_use]
    pub fn any_of(mut branches: Vec<ScopeFilter>) -> Self {
        if branches.len() == 1 {
            return Self::Filter(branches.remove(0));
        }
        Self::AnyOf(branches)
    }

    /// The OR-branches of this scope.
    #[must_use]
    pub fn branches(&self) -> &[ScopeFilter] {
        match self {
            Self::Filter(filter) => std::slice::from_ref(filter),
            Self::AnyOf(branches) => branches,
        }
    }

    #[must_use]
    pub fn into_branches(self) -> Vec<ScopeFilter> {
        match self {
            Self::Filter(filter) => vec![filter],
            Self::AnyOf(branches) => branches,
        }
    }

    /// Returns `true` if no row can satisfy this scope.
    #[must_use]
    pub fn is_deny_all(&self) -> bool {
        matches!(self, Self::AnyOf(branches) if branches.is_empty())
    }

    /// Intersect two scopes.
    ///
    /// The result has one branch per pair of input branches (Cartesian
    /// product), each the [`ScopeFilter::and`] of the pair, in left-major
    /// order.
    #[must_use]
    pub fn intersect(&self, other: &Scope) -> Scope {
        let branches = self
            .branches()
            .iter()
            .flat_map(|left| other.branches().iter().map(move |right| left.and(right)))
            .collect();
        Self::any_of(branches)
    }

    /// Returns `true` if `row` satisfies at least one branch.
    #[must_use]
    pub fn matches(&self, row: &Value) -> bool {
        self.branches().iter().any(|branch| branch.matches(row))
    }

    /// All property names referenced by any branch (may repeat).
    pub fn properties(&self) -> impl Iterator<Item = &str> {
        self.branches().iter().flat_map(ScopeFilter::properties)
    }

    /// Check if any branch constrains the given property.
    #[must_use]
    pub fn has_property(&self, property: &str) -> bool {
        self.properties().any(|p| p == property)
    }
}

/// Merge two optional scopes.
///
/// If either side is absent the other is returned unchanged; otherwise the
/// result is [`Scope::intersect`]. Merging never drops a constraint.
#[must_use]
pub fn merge_scopes(left: Option<Scope>, right: Option<Scope>) -> Option<Scope> {
    match (left, right) {
        (None, right) => right,
        (left, None) => left,
        (Some(left), Some(right)) => Some(left.intersect(&right)),
    }
}
