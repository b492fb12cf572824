//! Plugin Meta - 플러그인 헤더 주석 파싱
//!
//! 플러그인 파일 맨 앞의 `/** ... */` 블록에서 `@tag value` 를 읽습니다.
//!
//! ```text
//! /**
//!  * @name MyPlugin
//!  * @author someone
//!  * @version 1.0.0
//!  * @description Does things.
//!  *   continued on the next line
//!  */
//! ```

use bridge_foundation::{Error, Result, PLUGIN_SUFFIX};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::files::PluginFile;

/// 헤더 형식 식별자
pub const HEADER_FORMAT: &str = "jsdoc";

pub const UNKNOWN_AUTHOR: &str = "Unknown";
pub const UNKNOWN_VERSION: &str = "???";
pub const DEFAULT_DESCRIPTION: &str = "Description not provided.";

lazy_static! {
    /// 주석 줄 경계 - 줄바꿈 + 선택적 공백 + `*`
    static ref LINE_SPLIT: Regex = Regex::new(r"[^\S\r\n]*?\r?(?:\r\n|\n)[^\S\r\n]*?\*[^\S\r\n]?")
        .expect("valid header line pattern");
}

// ============================================================================
// MetaValue
// ============================================================================

/// 태그 값 - 한 번 나오면 문자열, 반복되면 목록
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Single(String),
    Multiple(Vec<String>),
}

impl MetaValue {
    fn push(&mut self, value: String) {
        match self {
            MetaValue::Single(first) => {
                *self = MetaValue::Multiple(vec![std::mem::take(first), value]);
            }
            MetaValue::Multiple(values) => values.push(value),
        }
    }

    /// 목록이면 `, ` 로 합친 문자열
    pub fn joined(&self) -> String {
        match self {
            MetaValue::Single(v) => v.clone(),
            MetaValue::Multiple(values) => values.join(", "),
        }
    }

    pub fn values(&self) -> Vec<&str> {
        match self {
            MetaValue::Single(v) => vec![v.as_str()],
            MetaValue::Multiple(values) => values.iter().map(String::as_str).collect(),
        }
    }
}

/// 파싱된 헤더 (태그 → 값)
pub type HeaderFields = BTreeMap<String, MetaValue>;

// ============================================================================
// Header 파싱
// ============================================================================

/// 첫 줄에 `/**` 가 있는지 확인
pub fn has_header(content: &str) -> bool {
    content.lines().next().is_some_and(|line| line.contains("/**"))
}

/// `/** ... */` 블록의 태그 파싱
///
/// 블록이 없으면 `format` 만 담긴 결과를 반환합니다. 호출 전에
/// [`has_header`] 로 헤더를 확인해야 합니다.
pub fn parse_header(content: &str) -> HeaderFields {
    let mut out = HeaderFields::new();

    let block = content
        .split_once("/**")
        .map(|(_, rest)| rest.split("*/").next().unwrap_or(rest))
        .unwrap_or("");

    let mut field = String::new();
    let mut accum = String::new();

    for raw in LINE_SPLIT.split(block) {
        let line = raw.trim_start_matches([' ', '\t']);
        if line.is_empty() {
            continue;
        }

        let mut chars = line.chars();
        let starts_tag = chars.next() == Some('@') && !matches!(chars.next(), Some(' ') | None);
        if starts_tag {
            flush(&mut out, &field, &accum);
            let body = &line[1..];
            match body.split_once(' ') {
                Some((name, rest)) => {
                    field = name.to_string();
                    accum = rest.to_string();
                }
                None => {
                    field = body.trim_end().to_string();
                    accum.clear();
                }
            }
        } else {
            accum.push(' ');
            accum.push_str(&unescape(line));
        }
    }
    flush(&mut out, &field, &accum);

    out.remove("");
    out.insert("format".to_string(), MetaValue::Single(HEADER_FORMAT.to_string()));
    out
}

fn flush(out: &mut HeaderFields, field: &str, accum: &str) {
    let value = accum.trim().to_string();
    match out.get_mut(field) {
        Some(existing) => existing.push(value),
        None => {
            out.insert(field.to_string(), MetaValue::Single(value));
        }
    }
}

/// `\n` → 줄바꿈, 줄 맨 앞의 `\@` → `@`
fn unescape(line: &str) -> String {
    let line = line.replace("\\n", "\n");
    match line.strip_prefix("\\@") {
        Some(rest) => format!("@{}", rest),
        None => line,
    }
}

// ============================================================================
// PluginMeta
// ============================================================================

/// 파일에서 채우는 JSON 키
const FILE_KEYS: &[&str] = &["id", "slug", "filename", "added", "modified", "size", "fileContent"];

/// 플러그인 메타데이터 (헤더 + 파일 정보)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginMeta {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_link: Option<String>,
    pub description: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invite: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub donate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patreon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub format: String,

    /// 위 필드에 없는 나머지 태그 (JSON 에서는 최상위 키)
    #[serde(flatten)]
    pub extra: HeaderFields,

    pub slug: String,
    pub filename: String,
    pub added: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub size: u64,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub file_content: String,
}

impl PluginMeta {
    /// 파일에서 메타데이터 생성
    ///
    /// 코드는 실행하지 않습니다. 첫 줄에 `/**` 가 없으면 `MissingHeader`.
    pub fn from_file(file: &PluginFile) -> Result<Self> {
        if !has_header(&file.content) {
            return Err(Error::MissingHeader {
                file: file.filename.clone(),
            });
        }

        let mut fields = parse_header(&file.content);
        let mut take = |key: &str| fields.remove(key).map(|v| v.joined());

        let name = take("name").filter(|n| !n.is_empty());
        let author = take("author").filter(|a| !a.is_empty());
        let description = take("description").filter(|d| !d.is_empty());
        let version = take("version").filter(|v| !v.is_empty());
        let author_id = take("authorId");
        let author_link = take("authorLink");
        let invite = take("invite");
        let website = take("website");
        let donate = take("donate");
        let patreon = take("patreon");
        let source = take("source");
        let format = take("format").unwrap_or_else(|| HEADER_FORMAT.to_string());

        // 파일 정보 키는 헤더로 덮어쓸 수 없음
        for key in FILE_KEYS {
            fields.remove(*key);
        }

        Ok(Self {
            id: name.clone().unwrap_or_else(|| file.filename.clone()),
            name,
            author: author.unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
            author_id,
            author_link,
            description: description.unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            version: version.unwrap_or_else(|| UNKNOWN_VERSION.to_string()),
            invite,
            website,
            donate,
            patreon,
            source,
            format,
            extra: fields,
            slug: slug_for(&file.filename),
            filename: file.filename.clone(),
            added: file.added,
            modified: file.modified,
            size: file.size,
            file_content: file.content.clone(),
        })
    }

    /// 표시 이름 (없으면 id)
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// 인스턴스 생성자에 넘기는 메타데이터 (export 필드 없음)
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// 파일 이름 → slug (`.plugin.js` 제거, 공백 → `-`)
pub fn slug_for(filename: &str) -> String {
    filename.replacen(PLUGIN_SUFFIX, "", 1).replace(' ', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, content: &str) -> PluginFile {
        PluginFile::new(name, content)
    }

    fn single(fields: &HeaderFields, key: &str) -> Option<String> {
        match fields.get(key) {
            Some(MetaValue::Single(v)) => Some(v.clone()),
            _ => None,
        }
    }

    #[test]
    fn test_parse_standard_header() {
        let content = "/**\n * @name Foo\n * @author Bar\n * @version 1.2.3\n * @description Multi\n * line text\n */\nclass Foo {}";
        let fields = parse_header(content);

        assert_eq!(single(&fields, "name").as_deref(), Some("Foo"));
        assert_eq!(single(&fields, "author").as_deref(), Some("Bar"));
        assert_eq!(single(&fields, "version").as_deref(), Some("1.2.3"));
        assert_eq!(single(&fields, "description").as_deref(), Some("Multi line text"));
        assert_eq!(single(&fields, "format").as_deref(), Some("jsdoc"));
        assert!(!fields.contains_key(""));
    }

    #[test]
    fn test_repeated_tag_becomes_list() {
        let content = "/**\n * @name X\n * @author A\n * @author B\n */";
        let fields = parse_header(content);

        assert_eq!(
            fields.get("author"),
            Some(&MetaValue::Multiple(vec!["A".into(), "B".into()]))
        );
    }

    #[test]
    fn test_escapes_in_continuation() {
        let content =
            "/**\n * @description first\n * second\\nthird\n * \\@not-a-tag\n * @version 1\n */";
        let fields = parse_header(content);

        assert_eq!(
            single(&fields, "description").as_deref(),
            Some("first second\nthird @not-a-tag")
        );
        assert!(!fields.contains_key("not-a-tag"));
    }

    #[test]
    fn test_at_space_is_not_a_tag() {
        let content = "/**\n * @name X\n * @ not a tag\n */";
        let fields = parse_header(content);
        assert_eq!(single(&fields, "name").as_deref(), Some("X @ not a tag"));
    }

    #[test]
    fn test_header_on_first_line() {
        let content = "/** @name Foo\n * @version 1.0.0\n */\nclass Foo { start(){} stop(){} }";
        let meta = PluginMeta::from_file(&file("Foo.plugin.js", content)).unwrap();

        assert_eq!(meta.id, "Foo");
        assert_eq!(meta.version, "1.0.0");
        assert_eq!(meta.author, "Unknown");
        assert_eq!(meta.description, "Description not provided.");
        assert_eq!(meta.format, "jsdoc");
    }

    #[test]
    fn test_missing_header_rejected() {
        let result = PluginMeta::from_file(&file("bad.plugin.js", "class Bad {}\n/** @name Bad */"));
        assert!(matches!(result, Err(Error::MissingHeader { file }) if file == "bad.plugin.js"));
    }

    #[test]
    fn test_id_and_slug_fallbacks() {
        let meta =
            PluginMeta::from_file(&file("My Cool Plugin.plugin.js", "/**\n * @author me\n */")).unwrap();

        assert_eq!(meta.id, "My Cool Plugin.plugin.js");
        assert_eq!(meta.slug, "My-Cool-Plugin");
        assert_eq!(meta.display_name(), "My Cool Plugin.plugin.js");
    }

    #[test]
    fn test_unknown_tags_preserved() {
        let content = "/**\n * @name X\n * @updateUrl https://example.com/x.plugin.js\n */";
        let meta = PluginMeta::from_file(&file("X.plugin.js", content)).unwrap();

        assert_eq!(
            meta.extra.get("updateUrl"),
            Some(&MetaValue::Single("https://example.com/x.plugin.js".into()))
        );
        let json = meta.to_json();
        assert_eq!(json["updateUrl"], "https://example.com/x.plugin.js");
        assert!(json.get("extra").is_none());
    }

    #[test]
    fn test_repeated_unknown_tag_is_json_array() {
        let content = "/**\n * @name X\n * @tag a\n * @tag b\n * @filename evil.js\n */";
        let meta = PluginMeta::from_file(&file("X.plugin.js", content)).unwrap();

        let json = meta.to_json();
        assert_eq!(json["tag"], serde_json::json!(["a", "b"]));
        assert_eq!(json["filename"], "X.plugin.js");
        assert!(!meta.extra.contains_key("filename"));
    }
}
