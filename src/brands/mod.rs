use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrandProfile {
    pub name: String,
    pub colors: Vec<String>,
    pub tone: String,
    pub logo: String,
    pub tagline: String,
}

#[derive(Debug, Clone)]
struct BrandEntry {
    key: String,
    aliases: Vec<String>,
    profile: BrandProfile,
}

/// Read-only brand profiles keyed by lowercase brand key.
///
/// Built once at startup; there is no way to add or remove profiles afterwards.
#[derive(Debug, Clone)]
pub struct BrandCatalog {
    entries: Vec<BrandEntry>,
}

fn normalize_key(key: &str) -> String {
    key.to_lowercase()
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

impl BrandCatalog {
    pub fn builtin() -> Self {
        BrandCatalog {
            entries: vec![
                BrandEntry {
                    key: "nike".to_string(),
                    aliases: Vec::new(),
                    profile: BrandProfile {
                        name: "Nike".to_string(),
                        colors: strings(&["black", "white", "orange"]),
                        tone: "Bold, empowering, athletic, motivational".to_string(),
                        logo: "Swoosh symbol".to_string(),
                        tagline: "Just Do It".to_string(),
                    },
                },
                BrandEntry {
                    key: "apple".to_string(),
                    aliases: Vec::new(),
                    profile: BrandProfile {
                        name: "Apple".to_string(),
                        colors: strings(&["white", "black", "silver", "minimalist colors"]),
                        tone: "Clean, minimalist, innovative, premium".to_string(),
                        logo: "Apple symbol".to_string(),
                        tagline: "Think Different".to_string(),
                    },
                },
                BrandEntry {
                    key: "cocacola".to_string(),
                    // The web front end submits the hyphenated form.
                    aliases: strings(&["coca-cola"]),
                    profile: BrandProfile {
                        name: "Coca-Cola".to_string(),
                        colors: strings(&["red", "white"]),
                        tone: "Joyful, nostalgic, refreshing, friendly".to_string(),
                        logo: "Coca-Cola script logo".to_string(),
                        tagline: "Open Happiness".to_string(),
                    },
                },
            ],
        }
    }

    pub fn lookup(&self, key: &str) -> Option<&BrandProfile> {
        let key = normalize_key(key);
        self.entries
            .iter()
            .find(|entry| entry.key == key || entry.aliases.iter().any(|alias| *alias == key))
            .map(|entry| &entry.profile)
    }

    pub fn list_keys(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.key.clone()).collect()
    }

    /// Renders the configured keys the way the not-found message lists them,
    /// e.g. `['nike', 'apple']`.
    pub fn describe_keys(&self) -> String {
        let quoted: Vec<String> = self
            .entries
            .iter()
            .map(|entry| format!("'{}'", entry.key))
            .collect();
        format!("[{}]", quoted.join(", "))
    }
}
