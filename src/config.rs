//! Model configuration store.
//!
//! Parses the INI-style configuration consumed by the model engine:
//! `[section]` headers, `key = value` lines, and `#` comments (full-line
//! and inline; a `#` only opens a comment at line start or after
//! whitespace). The whole structure is read into an ordered nested mapping
//! so unrecognized keys pass through to the engine verbatim, and targeted
//! partial merges can patch single sections without clearing others.
//!
//! # File Format
//!
//! ```text
//! [globalOptions]
//! # directories are resolved by the engine
//! inputDir = input/
//! outputDir = output/
//! startTime = 2000-01-01
//! landmask = landmask.asc   # inline comment
//!
//! [routingOptions]
//! lddMap = ldd.asc
//! ```
//!
//! Section and key order is preserved, so a parsed configuration can be
//! serialized back before engine start without reshuffling the file.

use std::fmt;
use std::fs;
use std::path::Path;

use thiserror::Error;

/// Error type for configuration parsing and lookup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error with line number
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// A required key is absent
    #[error("Missing configuration key {section}.{key}")]
    MissingKey { section: String, key: String },
}

/// One `[section]` with its entries in declaration order.
#[derive(Debug, Clone)]
struct Section {
    name: String,
    entries: Vec<(String, String)>,
}

impl Section {
    fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn set(&mut self, key: &str, value: &str) {
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| k == key) {
            entry.1 = value.to_string();
        } else {
            self.entries.push((key.to_string(), value.to_string()));
        }
    }
}

/// Ordered section -> key -> value mapping of a model configuration file.
#[derive(Debug, Clone, Default)]
pub struct ModelConfig {
    sections: Vec<Section>,
}

impl ModelConfig {
    /// Read and parse a configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration text.
    ///
    /// Same format as file, useful for testing or embedded data.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut sections: Vec<Section> = Vec::new();

        for (line_num, raw) in content.lines().enumerate() {
            // A `#` only opens a comment at line start or after whitespace,
            // so values may contain the character
            let line = raw
                .match_indices('#')
                .find(|&(pos, _)| pos == 0 || raw[..pos].ends_with(char::is_whitespace))
                .map(|(pos, _)| &raw[..pos])
                .unwrap_or(raw);
            let line = line.trim();

            if line.is_empty() {
                continue;
            }

            if line.starts_with('[') {
                if !line.ends_with(']') {
                    return Err(ConfigError::Parse {
                        line: line_num + 1,
                        message: "Unterminated section header".into(),
                    });
                }
                let name = line[1..line.len() - 1].trim();
                if name.is_empty() {
                    return Err(ConfigError::Parse {
                        line: line_num + 1,
                        message: "Empty section name".into(),
                    });
                }
                sections.push(Section {
                    name: name.to_string(),
                    entries: Vec::new(),
                });
                continue;
            }

            let (key, value) = match line.split_once('=') {
                Some((k, v)) => (k.trim(), v.trim()),
                None => {
                    return Err(ConfigError::Parse {
                        line: line_num + 1,
                        message: "Expected key = value".into(),
                    });
                }
            };
            if key.is_empty() {
                return Err(ConfigError::Parse {
                    line: line_num + 1,
                    message: "Empty key".into(),
                });
            }

            let section = match sections.last_mut() {
                Some(s) => s,
                None => {
                    return Err(ConfigError::Parse {
                        line: line_num + 1,
                        message: "Key outside of any section".into(),
                    });
                }
            };
            section.set(key, value);
        }

        Ok(Self { sections })
    }

    /// Look up a value.
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.name == section)
            .and_then(|s| s.get(key))
    }

    /// Look up a value that must be present.
    pub fn require(&self, section: &str, key: &str) -> Result<&str, ConfigError> {
        self.get(section, key).ok_or_else(|| ConfigError::MissingKey {
            section: section.to_string(),
            key: key.to_string(),
        })
    }

    /// Set a single value, creating the section if needed.
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        if let Some(s) = self.sections.iter_mut().find(|s| s.name == section) {
            s.set(key, value);
            return;
        }
        self.sections.push(Section {
            name: section.to_string(),
            entries: vec![(key.to_string(), value.to_string())],
        });
    }

    /// Merge key/value pairs into one section.
    ///
    /// Existing keys are overwritten in place, new keys appended, and all
    /// other sections left untouched.
    pub fn patch<'a, I>(&mut self, section: &str, pairs: I)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (key, value) in pairs {
            self.set(section, key, value);
        }
    }

    /// Names of all sections in declaration order.
    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.name.as_str())
    }

    /// Serialize the configuration to a file.
    pub fn write(&self, path: &Path) -> Result<(), ConfigError> {
        fs::write(path, self.to_string())?;
        Ok(())
    }
}

impl fmt::Display for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, section) in self.sections.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "[{}]", section.name)?;
            for (key, value) in &section.entries {
                writeln!(f, "{} = {}", key, value)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
# model run configuration
[globalOptions]
inputDir = input/
outputDir = output/   # run artifacts
landmask = landmask.asc

[routingOptions]
lddMap = ldd.asc
"#;

    #[test]
    fn test_parse_sections_and_keys() {
        let cfg = ModelConfig::parse(SAMPLE).unwrap();
        assert_eq!(cfg.get("globalOptions", "inputDir"), Some("input/"));
        assert_eq!(cfg.get("routingOptions", "lddMap"), Some("ldd.asc"));
    }

    #[test]
    fn test_inline_comment_stripped() {
        let cfg = ModelConfig::parse(SAMPLE).unwrap();
        assert_eq!(cfg.get("globalOptions", "outputDir"), Some("output/"));
    }

    #[test]
    fn test_hash_inside_value_kept() {
        let cfg = ModelConfig::parse("[s]\npath = data/run#3/ldd.asc # staging copy").unwrap();
        assert_eq!(cfg.get("s", "path"), Some("data/run#3/ldd.asc"));
    }

    #[test]
    fn test_missing_key() {
        let cfg = ModelConfig::parse(SAMPLE).unwrap();
        assert!(cfg.get("globalOptions", "endTime").is_none());
        assert!(matches!(
            cfg.require("globalOptions", "endTime"),
            Err(ConfigError::MissingKey { .. })
        ));
    }

    #[test]
    fn test_key_outside_section_error() {
        let result = ModelConfig::parse("a = 1\n[s]\nb = 2");
        assert!(matches!(result, Err(ConfigError::Parse { line: 1, .. })));
    }

    #[test]
    fn test_missing_equals_error() {
        let result = ModelConfig::parse("[s]\nno separator here");
        assert!(matches!(result, Err(ConfigError::Parse { line: 2, .. })));
    }

    #[test]
    fn test_patch_merges_without_clearing() {
        let mut cfg = ModelConfig::parse(SAMPLE).unwrap();
        cfg.patch(
            "globalOptions",
            [("startTime", "2000-01-01"), ("inputDir", "forcing/")],
        );
        // overwritten in place
        assert_eq!(cfg.get("globalOptions", "inputDir"), Some("forcing/"));
        // appended
        assert_eq!(cfg.get("globalOptions", "startTime"), Some("2000-01-01"));
        // untouched keys and sections survive
        assert_eq!(cfg.get("globalOptions", "landmask"), Some("landmask.asc"));
        assert_eq!(cfg.get("routingOptions", "lddMap"), Some("ldd.asc"));
    }

    #[test]
    fn test_patch_creates_section() {
        let mut cfg = ModelConfig::default();
        cfg.patch("reportingOptions", [("outDailyTot", "discharge")]);
        assert_eq!(cfg.get("reportingOptions", "outDailyTot"), Some("discharge"));
    }

    #[test]
    fn test_round_trip() {
        let cfg = ModelConfig::parse(SAMPLE).unwrap();
        let again = ModelConfig::parse(&cfg.to_string()).unwrap();
        assert_eq!(again.get("globalOptions", "inputDir"), Some("input/"));
        assert_eq!(again.get("routingOptions", "lddMap"), Some("ldd.asc"));
        // section order preserved
        let names: Vec<_> = again.section_names().collect();
        assert_eq!(names, vec!["globalOptions", "routingOptions"]);
    }
}
