use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Profile attributes the directory service recognizes. Anything outside
/// this list is dropped before transmission.
pub const PROFILE_FIELDS: &[&str] = &[
    "title",
    "first_name",
    "last_name",
    "preferred_name",
    "emergency_phone",
    "other_names",
    "email",
    "username",
    "roles",
    "permissions",
    "emergency_contact",
];

/// A user's identity attributes, keyed by field name.
///
/// Profiles are built transiently by callers, sent to the directory, and
/// discarded; nothing here persists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Profile(Map<String, Value>);

impl Profile {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Returns the field as a non-empty string. Empty strings count as
    /// missing.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0
            .get(field)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Projects the profile down to the recognized fields. Unrecognized keys
    /// are dropped, never validated.
    pub fn recognized(&self) -> Profile {
        Self(
            self.0
                .iter()
                .filter(|(field, _)| PROFILE_FIELDS.contains(&field.as_str()))
                .map(|(field, value)| (field.clone(), value.clone()))
                .collect(),
        )
    }
}

impl From<Map<String, Value>> for Profile {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

impl FromIterator<(String, Value)> for Profile {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Envelope returned by the directory's user listing endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewUsersPage {
    pub results: Vec<Profile>,
}

/// Binary photo attachment sent alongside a profile update.
#[derive(Debug, Clone)]
pub struct Photo {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Photo {
    /// Content type is guessed from the file name.
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = mime_guess::from_path(&file_name)
            .first_or_octet_stream()
            .to_string();
        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    pub fn with_content_type(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognized_drops_unknown_fields() {
        let mut profile = Profile::new();
        profile.insert("first_name", "Ada");
        profile.insert("favorite_color", "mauve");
        profile.insert("roles", serde_json::json!(["reviewer"]));

        let projected = profile.recognized();
        assert_eq!(projected.len(), 2);
        assert_eq!(projected.get_str("first_name"), Some("Ada"));
        assert!(projected.get("favorite_color").is_none());
    }

    #[test]
    fn get_str_treats_empty_as_missing() {
        let mut profile = Profile::new();
        profile.insert("first_name", "");
        assert_eq!(profile.get_str("first_name"), None);
    }

    #[test]
    fn photo_guesses_content_type_from_file_name() {
        let photo = Photo::new("portrait.webp", vec![0u8; 4]);
        assert_eq!(photo.content_type, "image/webp");

        let unknown = Photo::new("portrait", vec![0u8; 4]);
        assert_eq!(unknown.content_type, "application/octet-stream");
    }
}
