//! Which CSV sources make up a dashboard load, and the borough each one feeds.

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

/// One named source and the borough label stamped on its trips.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceSpec {
    pub name: String,
    pub borough: String,
}

impl SourceSpec {
    pub fn new(name: &str, borough: &str) -> Self {
        Self {
            name: name.to_string(),
            borough: borough.to_string(),
        }
    }
}

/// Ordered list of sources. Trips are concatenated in this order after loading.
///
/// Stored on disk as a JSON array:
/// ```json
/// [
///   { "name": "brooklyn_trips.csv", "borough": "Brooklyn" },
///   { "name": "bronx_trips.csv.gz", "borough": "Bronx" }
/// ]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    sources: Vec<SourceSpec>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            sources: vec![
                SourceSpec::new("brooklyn_trips.csv", "Brooklyn"),
                SourceSpec::new("manhattan_trips.csv", "Manhattan"),
                SourceSpec::new("queens_trips.csv", "Queens"),
            ],
        }
    }
}

impl SourceConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read source config '{path}'"))?;
        Self::from_json(&content).with_context(|| format!("Invalid source config '{path}'"))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let sources: Vec<SourceSpec> = serde_json::from_str(content)?;
        ensure!(!sources.is_empty(), "source config lists no sources");
        Ok(Self { sources })
    }

    /// Loads `path` when given, otherwise the default three boroughs.
    pub fn load_or_default(path: Option<&str>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn sources(&self) -> &[SourceSpec] {
        &self.sources
    }

    /// Borough labels in source order, without duplicates.
    pub fn boroughs(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for s in &self.sources {
            if !out.contains(&s.borough.as_str()) {
                out.push(&s.borough);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_order() {
        let config = SourceConfig::default();
        assert_eq!(config.boroughs(), vec!["Brooklyn", "Manhattan", "Queens"]);
        assert_eq!(config.sources()[0].name, "brooklyn_trips.csv");
    }

    #[test]
    fn test_from_json() {
        let config = SourceConfig::from_json(
            r#"[{"name": "a.csv", "borough": "Bronx"}, {"name": "b.csv", "borough": "Bronx"}]"#,
        )
        .unwrap();
        assert_eq!(config.sources().len(), 2);
        assert_eq!(config.boroughs(), vec!["Bronx"]);
    }

    #[test]
    fn test_rejects_empty_list() {
        assert!(SourceConfig::from_json("[]").is_err());
    }

    #[test]
    fn test_load_missing_file() {
        assert!(SourceConfig::load("/nonexistent/taxi_sources.json").is_err());
    }

    #[test]
    fn test_load_or_default_without_path() {
        let config = SourceConfig::load_or_default(None).unwrap();
        assert_eq!(config, SourceConfig::default());
    }
}
