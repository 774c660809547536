use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier assigned to a subject whose identity cannot be resolved.
pub const ANONYMOUS_SUBJECT_ID: &str = "anonymous";

/// Principal fields probed for an identifier, in order of preference.
const ID_FIELDS: [&str; 3] = ["id", "uuid", "email"];

const ROLES_FIELD: &str = "roles";
const PERMISSIONS_FIELD: &str = "permissions";

/// `Subject` is the acting principal of a single authorization evaluation.
///
/// Built per request, either explicitly through [`Subject::builder`] or from
/// whatever the authentication layer produced via [`Subject::from_principal`].
/// Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    /// Subject identifier. Never empty; [`ANONYMOUS_SUBJECT_ID`] when unknown.
    id: String,
    /// Role names in the order the principal listed them.
    #[serde(default)]
    roles: Vec<String>,
    /// Permission names in the order the principal listed them.
    #[serde(default)]
    permissions: Vec<String>,
    /// Opaque principal attributes, usually the raw user object.
    #[serde(default)]
    attributes: Map<String, Value>,
}

impl Default for Subject {
    fn default() -> Self {
        Self::anonymous()
    }
}

impl Subject {
    /// Create a new `Subject` builder
    #[must_use]
    pub fn builder() -> SubjectBuilder {
        SubjectBuilder::default()
    }

    /// Create the anonymous subject: no roles, no permissions, no attributes.
    #[must_use]
    pub fn anonymous() -> Self {
        SubjectBuilder::default().build()
    }

    /// Normalize an arbitrary "current user" payload into a `Subject`.
    ///
    /// - the identifier is the first present of `id`, `uuid`, `email`
    ///   (non-empty strings and numbers count as present);
    /// - `roles` / `permissions` accept either a single string or an array,
    ///   non-string array entries are dropped;
    /// - the whole payload is kept as `attributes`.
    ///
    /// Absent or non-object input yields [`Subject::anonymous`].
    #[must_use]
    pub fn from_principal(principal: Option<&Value>) -> Self {
        let Some(Value::Object(fields)) = principal else {
            return Self::anonymous();
        };

        let id = ID_FIELDS
            .iter()
            .find_map(|field| fields.get(*field).and_then(identifier));

        Self {
            id: id.unwrap_or_else(|| ANONYMOUS_SUBJECT_ID.to_owned()),
            roles: string_list(fields.get(ROLES_FIELD)),
            permissions: string_list(fields.get(PERMISSIONS_FIELD)),
            attributes: fields.clone(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    #[must_use]
    pub fn permissions(&self) -> &[String] {
        &self.permissions
    }

    #[must_use]
    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// Look up a single attribute of the underlying principal.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    #[must_use]
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    /// Returns `true` if no identifier could be resolved for this subject.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.id == ANONYMOUS_SUBJECT_ID
    }
}

fn identifier(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(ToOwned::to_owned)
            .collect(),
        _ => Vec::new(),
    }
}

#[derive(Default)]
pub struct SubjectBuilder {
    id: Option<String>,
    roles: Vec<String>,
    permissions: Vec<String>,
    attributes: Map<String, Value>,
}

impl SubjectBuilder {
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    #[must_use]
    pub fn roles(mut self, roles: Vec<String>) -> Self {
        self.roles = roles;
        self
    }

    #[must_use]
    pub fn permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.push(permission.into());
        self
    }

    #[must_use]
    pub fn permissions(mut self, permissions: Vec<String>) -> Self {
        self.permissions = permissions;
        self
    }

    #[must_use]
    pub fn attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn attributes(mut self, attributes: Map<String, Value>) -> Self {
        self.attributes = attributes;
        self
    }

    /// An empty or missing id falls back to [`ANONYMOUS_SUBJECT_ID`].
    #[must_use]
    pub fn build(self) -> Subject {
        Subject {
            id: self
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| ANONYMOUS_SUBJECT_ID.to_owned()),
            roles: self.roles,
            permissions: self.permissions,
            attributes: self.attributes,
        }
    }
}
