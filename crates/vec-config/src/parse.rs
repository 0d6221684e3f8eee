use crate::ConfigError;

/// One `[section]` or `[section "subsection"]` block with its entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub subsection: Option<String>,
    pub entries: Vec<(String, String)>,
}

/// Parse sectioned config text.
///
/// Section names are lowercased; subsection names keep their case. Keys are
/// lowercased except after a `header.` prefix, where the header name keeps
/// its case. Values keep their case and inner whitespace.
pub fn parse_config(text: &str) -> Result<Vec<Section>, ConfigError> {
    let mut sections: Vec<Section> = Vec::new();

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim();

        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(header) = line.strip_prefix('[') {
            let header = header
                .strip_suffix(']')
                .ok_or_else(|| ConfigError::Parse {
                    line: line_no,
                    reason: "unterminated section header".into(),
                })?
                .trim();

            let (name, subsection) = match header.split_once(' ') {
                Some((name, rest)) => {
                    let rest = rest.trim();
                    let sub = rest
                        .strip_prefix('"')
                        .and_then(|r| r.strip_suffix('"'))
                        .ok_or_else(|| ConfigError::Parse {
                            line: line_no,
                            reason: "subsection must be double-quoted".into(),
                        })?;
                    (name, Some(sub.to_string()))
                }
                None => (header, None),
            };

            if name.is_empty() {
                return Err(ConfigError::Parse {
                    line: line_no,
                    reason: "empty section name".into(),
                });
            }

            sections.push(Section {
                name: name.to_ascii_lowercase(),
                subsection,
                entries: Vec::new(),
            });
            continue;
        }

        let (key, value) = line.split_once('=').ok_or_else(|| ConfigError::Parse {
            line: line_no,
            reason: "expected 'key = value'".into(),
        })?;
        let key = normalize_key(key.trim());
        if key.is_empty() {
            return Err(ConfigError::Parse {
                line: line_no,
                reason: "empty key".into(),
            });
        }

        let section = sections.last_mut().ok_or_else(|| ConfigError::Parse {
            line: line_no,
            reason: "entry before any section header".into(),
        })?;
        section.entries.push((key, value.trim().to_string()));
    }

    Ok(sections)
}

/// Serialize sections back to config text.
pub fn serialize_config(sections: &[Section]) -> String {
    let mut out = String::new();
    for section in sections {
        if !out.is_empty() {
            out.push('\n');
        }
        match &section.subsection {
            Some(sub) => out.push_str(&format!("[{} \"{}\"]\n", section.name, sub)),
            None => out.push_str(&format!("[{}]\n", section.name)),
        }
        for (key, value) in &section.entries {
            out.push_str(&format!("\t{key} = {value}\n"));
        }
    }
    out
}

/// Lowercase the key, preserving case after a `header.` prefix.
fn normalize_key(key: &str) -> String {
    match key.split_once('.') {
        Some((prefix, rest)) if prefix.eq_ignore_ascii_case("header") => {
            format!("header.{rest}")
        }
        _ => key.to_ascii_lowercase(),
    }
}
