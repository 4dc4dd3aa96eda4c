use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use encoding_rs::Encoding;
use log::{debug, info};
use snafu::ResultExt;

use crate::bagit::bag::BagItVersion;
use crate::bagit::consts::*;
use crate::bagit::encoding::{char_encoding, decode_text, encode_text};
use crate::bagit::error::*;
use crate::bagit::io::{is_space_or_tab, LineReader};
use crate::bagit::validate::IssueLog;
use crate::bagit::Error::*;

/// The contents of bagit.txt: the BagIt version the bag declares and the character
/// encoding used by its tag files
#[derive(Debug, Clone)]
pub struct BagDeclaration {
    version: BagItVersion,
    encoding: String,
}

/// An ordered list of bag-info.txt entries with a case-folded label index
#[derive(Debug, Default)]
pub struct BagInfo {
    tags: Vec<Tag>,
    index: HashMap<String, Vec<usize>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    label: String,
    value: String,
}

/// Writes bagit.txt to the bag's base directory. The declaration is always UTF-8
/// regardless of the encoding it declares.
pub fn write_bag_declaration<P: AsRef<Path>>(
    declaration: &BagDeclaration,
    base_dir: P,
) -> Result<()> {
    let destination = base_dir.as_ref().join(BAGIT_TXT);
    info!("Writing tag file {}", destination.display());

    let mut writer = BufWriter::new(
        File::create(&destination).context(IoCreateSnafu { path: &destination })?,
    );

    writeln!(writer, "{}: {}", LABEL_BAGIT_VERSION, declaration.version)
        .context(IoWriteSnafu { path: &destination })?;
    writeln!(writer, "{}: {}", LABEL_FILE_ENCODING, declaration.encoding)
        .context(IoWriteSnafu { path: &destination })?;

    Ok(())
}

/// Reads a bag declaration out of the specified `base_dir`
pub fn read_bag_declaration<P: AsRef<Path>>(base_dir: P) -> Result<BagDeclaration> {
    let path = base_dir.as_ref().join(BAGIT_TXT);
    let file = File::open(&path).context(IoReadSnafu { path: &path })?;

    let mut lines = Vec::new();
    for line in LineReader::new(BufReader::new(file)) {
        let line = String::from_utf8(line?).context(InvalidStringSnafu {})?;
        if !line.trim().is_empty() {
            lines.push(line);
        }
    }

    if lines.len() != 2 {
        return Err(InvalidDeclaration {
            path,
            details: format!("expected exactly 2 lines but found {}", lines.len()),
        });
    }

    let version = declaration_value(&lines[0], LABEL_BAGIT_VERSION, &path)?;
    let version = BagItVersion::try_from(&version)?;
    let encoding = declaration_value(&lines[1], LABEL_FILE_ENCODING, &path)?;

    BagDeclaration::with_values(version, encoding)
}

fn declaration_value(line: &str, label: &str, path: &Path) -> Result<String> {
    match line.split_once(':') {
        Some((found, value)) if found.trim() == label => Ok(value.trim().into()),
        _ => Err(InvalidDeclaration {
            path: path.into(),
            details: format!("expected '{label}: <value>' but found '{line}'"),
        }),
    }
}

/// Writes bag-info.txt to the bag's base directory in the bag's tag file encoding,
/// folding long values at word boundaries
pub fn write_bag_info<P: AsRef<Path>>(
    bag_info: &BagInfo,
    base_dir: P,
    encoding: &'static Encoding,
) -> Result<()> {
    let destination = base_dir.as_ref().join(BAG_INFO_TXT);
    info!("Writing tag file {}", destination.display());

    let mut serialized = String::new();
    for tag in &bag_info.tags {
        for line in fold_tag_line(&tag.label, &tag.value) {
            serialized.push_str(&line);
            serialized.push(LF);
        }
    }

    let bytes = encode_text(&serialized, encoding)?;
    let mut writer = BufWriter::new(
        File::create(&destination).context(IoCreateSnafu { path: &destination })?,
    );
    writer
        .write_all(&bytes)
        .context(IoWriteSnafu { path: &destination })?;

    Ok(())
}

/// Reads bag-info.txt out of the specified `base_dir`. Parse problems and repeatability
/// violations are reported in the issue log rather than failing the read.
pub fn read_bag_info<P: AsRef<Path>>(
    base_dir: P,
    encoding: &'static Encoding,
    version: BagItVersion,
) -> Result<(BagInfo, IssueLog)> {
    let path = base_dir.as_ref().join(BAG_INFO_TXT);
    let file = File::open(&path).context(IoReadSnafu { path: &path })?;
    parse_bag_info(BufReader::new(file), encoding, version)
}

fn parse_bag_info<R: Read>(
    reader: R,
    encoding: &'static Encoding,
    version: BagItVersion,
) -> Result<(BagInfo, IssueLog)> {
    let mut info = BagInfo::new();
    let mut issues = IssueLog::new();
    let mut line_num: u32 = 0;

    for line in LineReader::new(reader) {
        line_num += 1;
        let line = match decode_text(&line?, encoding) {
            Ok(line) => line,
            Err(e) => {
                issues.error(BAG_INFO_TXT, format!("Line {line_num}: {e}"));
                continue;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        if line.starts_with(is_space_or_tab) {
            if !info.append_to_last(line.trim_matches(is_space_or_tab)) {
                issues.error(
                    BAG_INFO_TXT,
                    format!("Line {line_num}: continuation line has no preceding tag"),
                );
            }
            continue;
        }

        let captures = match BAG_INFO_TAG_MATCHER.captures(&line) {
            Some(captures) => captures,
            None => {
                issues.error(
                    BAG_INFO_TXT,
                    format!("Line {line_num}: expected '<label>: <value>'"),
                );
                continue;
            }
        };

        let label = &captures[2];
        let value = captures[4].trim();
        debug!("Tag [`{label}`:`{value}`]");

        if version >= BAGIT_1_0 && (!captures[1].is_empty() || !captures[3].is_empty()) {
            issues.error(
                BAG_INFO_TXT,
                format!("Line {line_num}: whitespace around tag label '{label}'"),
            );
        }

        let lower = label.to_lowercase();
        if info.has(label) {
            if MUST_NOT_REPEAT.contains(&lower.as_str()) {
                issues.error(
                    BAG_INFO_TXT,
                    format!("Line {line_num}: tag {label} cannot be repeated"),
                );
            } else if SHOULD_NOT_REPEAT.contains(&lower.as_str()) {
                issues.warn(
                    BAG_INFO_TXT,
                    format!("Line {line_num}: tag {label} should not be repeated"),
                );
            }
        }

        match Tag::new(label, value) {
            Ok(tag) => info.push_unchecked(tag),
            Err(e) => issues.error(BAG_INFO_TXT, format!("Line {line_num}: {e}")),
        }
    }

    Ok((info, issues))
}

/// Renders `label: value` folded at word boundaries so that no line exceeds the limit.
/// Continuation lines are indented with two spaces. A single token that cannot fit is
/// emitted unbroken.
fn fold_tag_line(label: &str, value: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = format!("{label}: ");
    let mut has_word = false;

    let flattened = value.replace(|c: char| c == CR || c == LF, " ");

    for word in flattened.split(SPACE) {
        if has_word && current.len() + 1 + word.len() > BAG_INFO_LINE_LIMIT {
            lines.push(std::mem::replace(
                &mut current,
                CONTINUATION_INDENT.to_string(),
            ));
            has_word = false;
        }
        if has_word {
            current.push(SPACE);
        }
        current.push_str(word);
        has_word = true;
    }

    lines.push(current);
    lines
}

impl BagDeclaration {
    pub fn new() -> Self {
        Self {
            version: BAGIT_DEFAULT_VERSION,
            encoding: UTF_8.into(),
        }
    }

    pub fn with_values<S: AsRef<str>>(version: BagItVersion, encoding: S) -> Result<Self> {
        let encoding = encoding.as_ref();

        if version != BAGIT_1_0 && version != BAGIT_0_97 {
            return Err(UnsupportedVersion { version });
        }

        // Resolving the label also canonicalizes it, eg `utf8` becomes `UTF-8`
        let resolved = char_encoding(encoding)?;

        Ok(Self {
            version,
            encoding: resolved.name().into(),
        })
    }

    pub fn version(&self) -> BagItVersion {
        self.version
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    /// The resolved tag file encoding. The label was validated on construction.
    pub fn char_encoding(&self) -> &'static Encoding {
        Encoding::for_label(self.encoding.as_bytes()).unwrap_or(encoding_rs::UTF_8)
    }
}

impl Default for BagDeclaration {
    fn default() -> Self {
        Self::new()
    }
}

impl BagInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if any tag matches the label, case insensitively
    pub fn has<L: AsRef<str>>(&self, label: L) -> bool {
        self.index.contains_key(&label.as_ref().to_lowercase())
    }

    /// Returns the values of every tag matching the label, case insensitively, in
    /// insertion order
    pub fn get_all<L: AsRef<str>>(&self, label: L) -> Vec<&str> {
        match self.index.get(&label.as_ref().to_lowercase()) {
            Some(positions) => positions
                .iter()
                .map(|i| self.tags[*i].value.as_str())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Appends a tag. Labels whose values are generated on update cannot be set.
    pub fn add<L: AsRef<str>, V: AsRef<str>>(&mut self, label: L, value: V) -> Result<()> {
        let label = label.as_ref();

        if is_generated_label(label) {
            return Err(GeneratedTag {
                label: label.into(),
            });
        }

        self.push_unchecked(Tag::new(label, value)?);
        Ok(())
    }

    /// Removes every tag matching the label, case insensitively
    pub fn remove_all<L: AsRef<str>>(&mut self, label: L) {
        let label = label.as_ref();
        self.tags
            .retain(|tag| !tag.label.eq_ignore_ascii_case(label));
        self.rebuild_index();
    }

    /// Removes the i-th occurrence of the label, returning false if there is none
    pub fn remove_at<L: AsRef<str>>(&mut self, label: L, index: usize) -> bool {
        let position = match self.index.get(&label.as_ref().to_lowercase()) {
            Some(positions) => match positions.get(index) {
                Some(position) => *position,
                None => return false,
            },
            None => return false,
        };

        self.tags.remove(position);
        self.rebuild_index();
        true
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Replaces the generated tags with freshly computed values. Only called on update.
    pub(crate) fn set_generated(&mut self, payload_oxum: String, bagging_date: String) {
        self.tags
            .retain(|tag| !is_generated_label(&tag.label));
        self.tags.push(Tag {
            label: LABEL_PAYLOAD_OXUM.into(),
            value: payload_oxum,
        });
        self.tags.push(Tag {
            label: LABEL_BAGGING_DATE.into(),
            value: bagging_date,
        });
        self.rebuild_index();
    }

    fn push_unchecked(&mut self, tag: Tag) {
        self.tags.push(tag);
        self.rebuild_index();
    }

    /// Appends continuation text to the most recent tag's value, returning false when
    /// there is no tag to continue
    fn append_to_last(&mut self, text: &str) -> bool {
        match self.tags.last_mut() {
            Some(tag) => {
                tag.value.push(SPACE);
                tag.value.push_str(text);
                true
            }
            None => false,
        }
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        for (i, tag) in self.tags.iter().enumerate() {
            self.index
                .entry(tag.label.to_lowercase())
                .or_default()
                .push(i);
        }
    }
}

fn is_generated_label(label: &str) -> bool {
    let lower = label.to_lowercase();
    GENERATED_LABELS.contains(&lower.as_str())
}

impl Tag {
    /// Creates a tag and validates that its parts are valid
    pub fn new<L: AsRef<str>, V: AsRef<str>>(label: L, value: V) -> Result<Self> {
        let label = label.as_ref();
        let value = value.as_ref();

        Tag::validate_label(label)?;

        Ok(Self {
            label: label.into(),
            value: value.into(),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    fn validate_label(label: &str) -> Result<()> {
        if label.is_empty() {
            return Err(InvalidTag {
                label: label.into(),
                details: "Label must not be empty".into(),
            });
        } else if label.starts_with(is_space_or_tab) || label.ends_with(is_space_or_tab) {
            return Err(InvalidTag {
                label: label.into(),
                details: "Label must not start or end with whitespace".into(),
            });
        } else if label.contains(|c: char| c == CR || c == LF || c == ':') {
            return Err(InvalidTag {
                label: label.into(),
                details: "Label must not contain CR, LF, or colon characters".into(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::bagit::consts::*;
    use crate::bagit::tag::{fold_tag_line, parse_bag_info, BagInfo};

    fn parse(input: &str) -> (BagInfo, crate::bagit::validate::IssueLog) {
        parse_bag_info(input.as_bytes(), encoding_rs::UTF_8, BAGIT_1_0).unwrap()
    }

    #[test]
    fn parse_simple_tags() {
        let (info, issues) = parse("Source-Organization: ACME\nContact-Name: W. Coyote\n");

        assert!(!issues.has_errors());
        assert_eq!(vec!["ACME"], info.get_all("source-organization"));
        assert_eq!(vec!["W. Coyote"], info.get_all("Contact-Name"));
    }

    #[test]
    fn parse_continuation_lines() {
        let (info, issues) = parse("External-Description: a very\n  long description\n\tof things\n");

        assert!(!issues.has_errors());
        assert_eq!(
            vec!["a very long description of things"],
            info.get_all("External-Description")
        );
    }

    #[test]
    fn orphan_continuation_is_an_error() {
        let (_, issues) = parse("  floating continuation\n");

        assert_eq!(1, issues.errors().len());
        assert!(issues.errors()[0].message().contains("Line 1"));
    }

    #[test]
    fn repeated_payload_oxum_is_an_error_with_line_number() {
        let (_, issues) = parse("Payload-Oxum: 3.1\nPayload-Oxum: 4.2\n");

        assert_eq!(1, issues.errors().len());
        assert!(issues.errors()[0].message().contains("Line 2"));
        assert!(issues.errors()[0].message().contains("Payload-Oxum"));
    }

    #[test]
    fn repeated_bagging_date_is_a_warning() {
        let (_, issues) = parse("Bagging-Date: 2026-01-01\nBagging-Date: 2026-01-02\n");

        assert!(!issues.has_errors());
        assert_eq!(1, issues.warnings().len());
    }

    #[test]
    fn whitespace_around_label_is_an_error_in_1_0() {
        let (_, issues) = parse("Bag-Size : 1 GB\n");
        assert_eq!(1, issues.errors().len());

        let (_, issues) = parse_bag_info(
            "Bag-Size : 1 GB\n".as_bytes(),
            encoding_rs::UTF_8,
            BAGIT_0_97,
        )
        .unwrap();
        assert!(!issues.has_errors());
    }

    #[test]
    fn generated_labels_cannot_be_added() {
        let mut info = BagInfo::new();
        assert!(info.add("Payload-Oxum", "1.1").is_err());
        assert!(info.add("bagging-date", "2026-01-01").is_err());
        assert!(info.add("Source-Organization", "ACME").is_ok());
    }

    #[test]
    fn remove_at_removes_a_single_occurrence() {
        let mut info = BagInfo::new();
        info.add("Contact-Name", "first").unwrap();
        info.add("contact-name", "second").unwrap();
        info.add("Contact-Name", "third").unwrap();

        assert!(info.remove_at("CONTACT-NAME", 1));
        assert_eq!(vec!["first", "third"], info.get_all("contact-name"));
        assert!(!info.remove_at("contact-name", 5));
    }

    #[test]
    fn folding_wraps_at_word_boundaries() {
        let value = "word ".repeat(30);
        let lines = fold_tag_line("External-Description", value.trim());

        assert!(lines.len() > 1);
        for line in &lines {
            assert!(line.len() <= BAG_INFO_LINE_LIMIT);
        }
        assert!(lines[0].starts_with("External-Description: "));
        assert!(lines[1].starts_with("  "));
    }

    #[test]
    fn folding_leaves_long_tokens_unbroken() {
        let token = "x".repeat(100);
        let lines = fold_tag_line("External-Identifier", &token);

        assert_eq!(1, lines.len());
        assert_eq!(format!("External-Identifier: {token}"), lines[0]);
    }

    #[test]
    fn folded_output_parses_back_to_the_same_values() {
        let mut info = BagInfo::new();
        let description = "a description that is long enough to be folded across multiple \
             lines when it is serialized out to disk as part of the bag metadata";
        info.add("External-Description", description).unwrap();
        info.add("Contact-Name", "W. Coyote").unwrap();

        let mut serialized = String::new();
        for tag in info.tags() {
            for line in fold_tag_line(tag.label(), tag.value()) {
                serialized.push_str(&line);
                serialized.push('\n');
            }
        }

        let (reparsed, issues) = parse(&serialized);
        assert!(!issues.has_errors());
        assert_eq!(vec![description], reparsed.get_all("External-Description"));
        assert_eq!(vec!["W. Coyote"], reparsed.get_all("Contact-Name"));
    }
}
