//! Text-level edits to an Xcode `project.pbxproj` manifest.
//!
//! No object graph is built. Each edit is anchored on a section marker or on
//! an object identified by its 24-character hex id, and a miss leaves the text
//! untouched. Callers get back which edits landed so a partial patch is never
//! silent.

use std::collections::HashSet;
use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

// ── Constants ────────────────────────────────────────────────────────────────

/// Manifest path relative to the directory holding the `.xcodeproj` bundle.
pub const DEFAULT_PROJECT_FILE: &str = "iOSDevOpsAutomation.xcodeproj/project.pbxproj";

/// Identifier of the app target's `Resources` build phase.
pub const DEFAULT_RESOURCES_PHASE_ID: &str = "02DAD4482E70CC2D00BB3786";

pub const DEFAULT_RESOURCE_NAME: &str = "semgrep";
pub const DEFAULT_GROUP_NAME: &str = "Resources";
pub const DEFAULT_FILE_TYPE: &str = "text.script.python";

const END_GROUP_SECTION: &str = "/* End PBXGroup section */";
const BEGIN_GROUP_SECTION: &str = "/* Begin PBXGroup section */";
const END_FILE_REFERENCE_SECTION: &str = "/* End PBXFileReference section */";
const END_BUILD_FILE_SECTION: &str = "/* End PBXBuildFile section */";

const ENTRY_INDENT: &str = "\t\t\t\t";
const CLOSING_INDENT: &str = "\t\t\t";

// Patterns are compile-time constants.
#[allow(clippy::expect_used)]
static OBJECT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[0-9A-F]{24}\b").expect("valid object id regex"));

#[allow(clippy::expect_used)]
static MAIN_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"mainGroup = ([0-9A-F]{24})").expect("valid mainGroup regex"));

#[allow(clippy::expect_used)]
static OBJECT_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*([0-9A-F]{24})(?: /\*[^\n]*?\*/)? = \{").expect("valid header regex")
});

// ── Types ────────────────────────────────────────────────────────────────────

/// The resource file to register and where it goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSpec {
    /// File name, also used as the on-disk path inside the group folder.
    pub name: String,
    /// Group (and folder) name added under the root group.
    pub group: String,
    /// Value for `lastKnownFileType`.
    pub file_type: String,
    /// Identifier of the resources build phase receiving the file.
    pub phase_id: String,
}

impl Default for ResourceSpec {
    fn default() -> Self {
        Self {
            name: DEFAULT_RESOURCE_NAME.to_string(),
            group: DEFAULT_GROUP_NAME.to_string(),
            file_type: DEFAULT_FILE_TYPE.to_string(),
            phase_id: DEFAULT_RESOURCES_PHASE_ID.to_string(),
        }
    }
}

/// Identifiers for the objects added by one patch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectIds {
    pub group: String,
    pub file: String,
    /// Shared by the build-phase entry and the `PBXBuildFile` record.
    pub build_file: String,
}

/// One of the textual edits performed by [`patch`], in application order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Insertion {
    RootGroupChild,
    GroupDefinition,
    FileReference,
    BuildPhaseEntry,
    BuildFileRecord,
}

impl Insertion {
    pub const ALL: [Self; 5] = [
        Self::RootGroupChild,
        Self::GroupDefinition,
        Self::FileReference,
        Self::BuildPhaseEntry,
        Self::BuildFileRecord,
    ];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::RootGroupChild => "root group child",
            Self::GroupDefinition => "group definition",
            Self::FileReference => "file reference",
            Self::BuildPhaseEntry => "resources build phase entry",
            Self::BuildFileRecord => "build file record",
        }
    }
}

/// Result of applying [`patch`] to a manifest.
#[derive(Debug, Clone, Serialize)]
pub struct PatchOutcome {
    #[serde(skip)]
    pub text: String,
    pub ids: ObjectIds,
    pub applied: Vec<Insertion>,
    pub missed: Vec<Insertion>,
}

impl PatchOutcome {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missed.is_empty()
    }
}

// ── Identifier allocation ────────────────────────────────────────────────────

/// Hands out object identifiers that do not occur in the manifest and have
/// not been handed out before.
pub struct IdAllocator {
    taken: HashSet<String>,
}

impl IdAllocator {
    /// Seed the allocator with every identifier already present in `manifest`.
    #[must_use]
    pub fn from_manifest(manifest: &str) -> Self {
        Self {
            taken: OBJECT_ID
                .find_iter(manifest)
                .map(|m| m.as_str().to_string())
                .collect(),
        }
    }

    /// Whether `id` already exists in the manifest or was allocated.
    #[must_use]
    pub fn is_taken(&self, id: &str) -> bool {
        self.taken.contains(id)
    }

    /// Allocate a fresh random identifier.
    pub fn allocate(&mut self) -> String {
        self.allocate_with(generate_object_id)
    }

    /// Allocate using `next` as the candidate source, skipping taken ids.
    pub fn allocate_with(&mut self, mut next: impl FnMut() -> String) -> String {
        loop {
            let candidate = next();
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    /// Allocate the three identifiers needed by one patch.
    pub fn object_ids(&mut self) -> ObjectIds {
        ObjectIds {
            group: self.allocate(),
            file: self.allocate(),
            build_file: self.allocate(),
        }
    }
}

/// Generate a random 24-character uppercase hex identifier.
///
/// Entropy sources: nanosecond timestamp and two independent `RandomState` hashes.
#[must_use]
pub fn generate_object_id() -> String {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let mut hasher = RandomState::new().build_hasher();
    hasher.write_u128(
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0),
    );
    let high = hasher.finish();
    let mut hasher = RandomState::new().build_hasher();
    hasher.write_u64(high);
    let low = hasher.finish() >> 32;
    format!("{high:016X}{low:08X}")
}

/// `true` if `id` has the shape of an object identifier.
#[must_use]
pub fn is_object_id(id: &str) -> bool {
    id.len() == 24 && id.chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
}

/// `true` if `value` can be written inside a `/* ... */` annotation and as
/// a list entry without breaking the surrounding structure.
#[must_use]
pub fn is_annotation_safe(value: &str) -> bool {
    !value.trim().is_empty()
        && !value.contains("*/")
        && !value.contains("/*")
        && !value.contains(['\n', '\r'])
}

// ── Patch ────────────────────────────────────────────────────────────────────

/// Register `spec` in `manifest` using `ids`.
///
/// Edits are applied in a fixed order: root group child, group definition,
/// file reference, build phase entry, build file record. Each edit that
/// cannot find its anchor is recorded in `missed` and leaves the text as is.
#[must_use]
pub fn patch(manifest: &str, spec: &ResourceSpec, ids: &ObjectIds) -> PatchOutcome {
    let mut text = manifest.to_string();
    let mut applied = Vec::new();
    let mut missed = Vec::new();

    for step in Insertion::ALL {
        let landed = match step {
            Insertion::RootGroupChild => {
                let entry = format!("{} /* {} */,", ids.group, spec.group);
                root_group_id(&text).is_some_and(|root| {
                    insert_list_entry(&mut text, &root, "children", &entry, Placement::AfterLastMember)
                })
            }
            Insertion::GroupDefinition => {
                insert_before_marker(&mut text, END_GROUP_SECTION, &group_block(spec, ids))
            }
            Insertion::FileReference => insert_before_marker(
                &mut text,
                END_FILE_REFERENCE_SECTION,
                &file_reference_block(spec, ids),
            ),
            Insertion::BuildPhaseEntry => {
                let entry = format!("{} /* {} in Resources */,", ids.build_file, spec.name);
                insert_list_entry(&mut text, &spec.phase_id, "files", &entry, Placement::End)
            }
            Insertion::BuildFileRecord => {
                insert_before_marker(&mut text, END_BUILD_FILE_SECTION, &build_file_block(spec, ids))
            }
        };
        if landed {
            applied.push(step);
        } else {
            missed.push(step);
        }
    }

    PatchOutcome {
        text,
        ids: ids.clone(),
        applied,
        missed,
    }
}

/// Whether some object in `manifest` is already annotated with `name`.
#[must_use]
pub fn references_name(manifest: &str, name: &str) -> bool {
    manifest.contains(&format!("/* {name} */"))
}

/// Entries of the `key = ( ... );` list inside object `id`, trimmed and
/// without trailing commas. `None` when the object or list is missing.
#[must_use]
pub fn list_entries(manifest: &str, id: &str, key: &str) -> Option<Vec<String>> {
    let span = list_span(manifest, id, key)?;
    Some(
        manifest[span]
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| line.trim_end_matches(',').to_string())
            .collect(),
    )
}

/// Identifier of the project's root group: the group named by `mainGroup`,
/// or failing that the first object of the `PBXGroup` section.
#[must_use]
pub fn root_group_id(manifest: &str) -> Option<String> {
    if let Some(caps) = MAIN_GROUP.captures(manifest) {
        return Some(caps[1].to_string());
    }
    let section = manifest.find(BEGIN_GROUP_SECTION)?;
    OBJECT_HEADER
        .captures(&manifest[section..])
        .map(|caps| caps[1].to_string())
}

// ── Blocks ───────────────────────────────────────────────────────────────────

fn group_block(spec: &ResourceSpec, ids: &ObjectIds) -> String {
    format!(
        "\t\t{group_id} /* {group} */ = {{\n\
         \t\t\tisa = PBXGroup;\n\
         \t\t\tchildren = (\n\
         \t\t\t\t{file_id} /* {name} */,\n\
         \t\t\t);\n\
         \t\t\tpath = {path};\n\
         \t\t\tsourceTree = \"<group>\";\n\
         \t\t}};\n",
        group_id = ids.group,
        group = spec.group,
        file_id = ids.file,
        name = spec.name,
        path = quote_value(&spec.group),
    )
}

fn file_reference_block(spec: &ResourceSpec, ids: &ObjectIds) -> String {
    format!(
        "\t\t{file_id} /* {name} */ = {{\n\
         \t\t\tisa = PBXFileReference;\n\
         \t\t\tlastKnownFileType = {file_type};\n\
         \t\t\tpath = {path};\n\
         \t\t\tsourceTree = \"<group>\";\n\
         \t\t}};\n",
        file_id = ids.file,
        name = spec.name,
        file_type = quote_value(&spec.file_type),
        path = quote_value(&spec.name),
    )
}

fn build_file_block(spec: &ResourceSpec, ids: &ObjectIds) -> String {
    format!(
        "\t\t{build_id} /* {name} in Resources */ = {{\n\
         \t\t\tisa = PBXBuildFile;\n\
         \t\t\tfileRef = {file_id} /* {name} */;\n\
         \t\t}};\n",
        build_id = ids.build_file,
        name = spec.name,
        file_id = ids.file,
    )
}

/// Values outside `[A-Za-z0-9_./-]` must be quoted in the plist dialect.
fn quote_value(value: &str) -> String {
    let bare = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '/' | '-'));
    if bare {
        value.to_string()
    } else {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

// ── Text anchoring ───────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
enum Placement {
    /// After the last line carrying a `/* ... */` annotation, else at the end.
    AfterLastMember,
    End,
}

/// Insert `block` at the start of the line holding `marker`.
fn insert_before_marker(text: &mut String, marker: &str, block: &str) -> bool {
    let Some(pos) = text.find(marker) else {
        return false;
    };
    let line_start = text[..pos].rfind('\n').map_or(0, |i| i + 1);
    text.insert_str(line_start, block);
    true
}

fn insert_list_entry(
    text: &mut String,
    object_id: &str,
    key: &str,
    entry: &str,
    placement: Placement,
) -> bool {
    let Some(span) = list_span(text, object_id, key) else {
        return false;
    };
    let content = &text[span.clone()];

    let Some(last_newline) = content.rfind('\n') else {
        // Inline list such as `files = ( );` or `files = (A /* a */, );`.
        // Existing entries are kept, one per line, ahead of the new one.
        let mut replacement = String::from("\n");
        for existing in split_inline_entries(content) {
            replacement.push_str(&format!("{ENTRY_INDENT}{existing},\n"));
        }
        replacement.push_str(&format!("{ENTRY_INDENT}{entry}\n{CLOSING_INDENT}"));
        text.replace_range(span, &replacement);
        return true;
    };

    let after_member = match placement {
        Placement::AfterLastMember => last_annotated_line_end(content),
        Placement::End => None,
    };
    let (offset, indent) = match after_member {
        Some((end, indent)) => (end, indent),
        None => (last_newline + 1, ENTRY_INDENT.to_string()),
    };
    text.insert_str(span.start + offset, &format!("{indent}{entry}\n"));
    true
}

/// Entries of a one-line list body, without their separating commas.
/// Commas inside `/* ... */` comments or quoted strings do not split.
fn split_inline_entries(content: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut chars = content.chars().peekable();
    let mut in_comment = false;
    let mut in_quote = false;
    while let Some(c) = chars.next() {
        current.push(c);
        if in_comment {
            if c == '*' && chars.peek() == Some(&'/') {
                current.push('/');
                chars.next();
                in_comment = false;
            }
        } else if in_quote {
            if c == '\\' {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            } else if c == '"' {
                in_quote = false;
            }
        } else if c == '/' && chars.peek() == Some(&'*') {
            current.push('*');
            chars.next();
            in_comment = true;
        } else if c == '"' {
            in_quote = true;
        } else if c == ',' {
            current.pop();
            let entry = current.trim();
            if !entry.is_empty() {
                entries.push(entry.to_string());
            }
            current.clear();
        }
    }
    let tail = current.trim();
    if !tail.is_empty() {
        entries.push(tail.to_string());
    }
    entries
}

/// Offset just past the newline of the last line in `content` that carries a
/// `/* ... */` annotation, with that line's indentation.
fn last_annotated_line_end(content: &str) -> Option<(usize, String)> {
    let mut found = None;
    let mut start = 0;
    for line in content.split_inclusive('\n') {
        let end = start + line.len();
        let annotated = line
            .find("/*")
            .is_some_and(|open| line[open..].contains("*/"));
        if annotated && line.ends_with('\n') {
            let indent: String = line.chars().take_while(|c| c.is_whitespace()).collect();
            found = Some((end, indent));
        }
        start = end;
    }
    found
}

/// Byte range between `key = (` and its closing `);` inside object `id`.
fn list_span(text: &str, id: &str, key: &str) -> Option<Range<usize>> {
    let body = object_body(text, id)?;
    let opener = Regex::new(&format!(r"(?m)^[ \t]*{} = \(", regex::escape(key))).ok()?;
    let open = opener.find(&text[body.clone()])?;
    let start = body.start + open.end();
    let end = start + text[start..body.end].find(");")?;
    Some(start..end)
}

/// Byte range strictly inside the braces of the object named `id`.
fn object_body(text: &str, id: &str) -> Option<Range<usize>> {
    let header = OBJECT_HEADER
        .captures_iter(text)
        .find(|caps| &caps[1] == id)?;
    let open = header.get(0)?.end();
    let close = matching_brace(text, open)?;
    Some(open..close)
}

/// Position of the `}` closing a brace opened just before `from`.
/// Quoted strings are skipped.
fn matching_brace(text: &str, from: usize) -> Option<usize> {
    let mut depth = 1usize;
    let mut in_quote = false;
    let mut escaped = false;
    for (i, c) in text[from..].char_indices() {
        if in_quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_quote = false;
            }
            continue;
        }
        match c {
            '"' => in_quote = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(from + i);
                }
            }
            _ => {}
        }
    }
    None
}
