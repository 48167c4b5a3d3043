use relay_settings::CatalogEntrySettings;

/// A canonical phrase and the question it identifies.
#[derive(Clone, Debug, PartialEq)]
pub struct CatalogEntry {
    pub phrase: String,
    pub question_id: String,
}

/// Ordered reference phrases. Read-only once built; entry order decides
/// ties in [`crate::matcher::best_match`].
#[derive(Clone, Debug, PartialEq)]
pub struct ReferenceCatalog {
    entries: Vec<CatalogEntry>,
}

const BUILTIN: &[(&str, &str)] = &[
    ("First, how did you find your care services today", "q1"),
    ("How easy was it to get an appointment when you needed one", "q2"),
    ("Did the staff treat you with dignity and respect", "q3"),
    ("Were your questions answered in a way you could understand", "q4"),
    ("Did you feel involved in decisions about your care", "q5"),
    ("How would you rate the cleanliness of the places you visited", "q6"),
    ("How likely are you to recommend this service to friends and family", "q7"),
    ("Finally, is there anything else you would like to tell us", "q8"),
];

impl ReferenceCatalog {
    pub fn new<P, Q>(entries: impl IntoIterator<Item = (P, Q)>) -> Self
    where
        P: Into<String>,
        Q: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(phrase, id)| CatalogEntry {
                    phrase: phrase.into(),
                    question_id: id.into(),
                })
                .collect(),
        }
    }

    /// The care-service survey questions the avatar asks by default.
    pub fn builtin() -> Self {
        Self::new(BUILTIN.iter().copied())
    }

    /// Configured catalog, or the built-in one when none is configured.
    pub fn from_settings(entries: Option<&[CatalogEntrySettings]>) -> Self {
        match entries {
            Some(entries) => Self::new(entries.iter().map(|e| (e.phrase.clone(), e.id.clone()))),
            None => Self::builtin(),
        }
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ReferenceCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
