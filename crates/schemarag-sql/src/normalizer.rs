//! Dynamic-SQL statement normalization
//!
//! Converts MyBatis-style templated statement fragments to pure SQL ahead of
//! relational parsing. Templating tags are removed, their SQL payload is
//! kept, so joins that only exist inside a conditional branch are still
//! visible to the extractor. Conditions themselves are never evaluated;
//! that would require runtime bind values unavailable offline.

use regex::Regex;
use std::sync::OnceLock;

/// Result of normalizing one raw statement fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedStatement {
    /// Original raw statement text
    pub original: String,

    /// Normalized SQL suitable for relational parsing
    pub sql: String,

    /// Whether any templating markup was detected and stripped
    pub had_markup: bool,
}

/// Error during normalization
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    /// Stripping produced syntactically unbalanced output
    #[error("malformed statement: {reason}")]
    MalformedStatement { reason: String },
}

fn re(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex"))
}

/// Attribute span for tag patterns. A raw `>` is legal inside a quoted
/// attribute value (`test="amount > 0"`), so quoted strings are consumed
/// as units instead of stopping at the first `>`.
const ATTRS: &str = r#"(?:"[^"]*"|'[^']*'|[^>"'])*"#;

static XML_COMMENT: OnceLock<Regex> = OnceLock::new();
static CDATA: OnceLock<Regex> = OnceLock::new();
static INCLUDE: OnceLock<Regex> = OnceLock::new();
static SELF_CLOSING: OnceLock<Regex> = OnceLock::new();
static FOREACH: OnceLock<Regex> = OnceLock::new();
static WHERE_OPEN: OnceLock<Regex> = OnceLock::new();
static SET_OPEN: OnceLock<Regex> = OnceLock::new();
static TRIM_OPEN: OnceLock<Regex> = OnceLock::new();
static CLOSING_TAGS: OnceLock<Regex> = OnceLock::new();
static BRANCH_TAGS: OnceLock<Regex> = OnceLock::new();
static BIND_PARAM: OnceLock<Regex> = OnceLock::new();
static LINE_COMMENT: OnceLock<Regex> = OnceLock::new();
static BLOCK_COMMENT: OnceLock<Regex> = OnceLock::new();
static WHITESPACE: OnceLock<Regex> = OnceLock::new();
static ATTR: OnceLock<Regex> = OnceLock::new();

/// Check whether a fragment contains templating markup at all
pub fn has_markup(sql: &str) -> bool {
    sql.contains('<') || sql.contains("#{") || sql.contains("${")
}

/// Normalize one raw statement fragment.
///
/// Pure function: comments are dropped, CDATA wrappers unwrapped, templating
/// tags removed with their SQL payload kept, bind markers replaced with `?`
/// placeholders. Output is validated for balanced parentheses and quotes.
pub fn normalize(raw: &str) -> Result<NormalizedStatement, NormalizeError> {
    let had_markup = has_markup(raw);
    let mut sql = raw.to_string();

    if had_markup {
        // XML comments vanish entirely, including their payload.
        sql = re(&XML_COMMENT, r"(?s)<!--.*?-->")
            .replace_all(&sql, " ")
            .into_owned();

        // CDATA wrappers are markup; their content is SQL.
        sql = re(&CDATA, r"(?s)<!\[CDATA\[(.*?)\]\]>")
            .replace_all(&sql, " $1 ")
            .into_owned();

        // <include> references a fragment defined elsewhere; nothing inline
        // to keep. <bind> and other self-closing elements carry no SQL.
        sql = re(&INCLUDE, &format!(r"(?is)<include\b{ATTRS}>.*?</include>"))
            .replace_all(&sql, " ")
            .into_owned();
        sql = re(&SELF_CLOSING, &format!(r"(?i)<[a-z]+\b{ATTRS}/>"))
            .replace_all(&sql, " ")
            .into_owned();

        // <foreach> expands to open + payload + close so collection
        // predicates like `id IN (...)` stay parseable.
        sql = re(&FOREACH, &format!(r"(?is)<foreach\b({ATTRS})>(.*?)</foreach>"))
            .replace_all(&sql, |caps: &regex::Captures<'_>| {
                let open = attr_value(&caps[1], "open").unwrap_or_default();
                let close = attr_value(&caps[1], "close").unwrap_or_default();
                format!(" {} {} {} ", open, &caps[2], close)
            })
            .into_owned();

        // <where> injects the keyword and a neutral predicate so payload
        // fragments beginning with AND/OR remain balanced.
        sql = re(&WHERE_OPEN, &format!(r"(?i)<where\b{ATTRS}>"))
            .replace_all(&sql, " WHERE 1 = 1 ")
            .into_owned();
        sql = re(&SET_OPEN, &format!(r"(?i)<set\b{ATTRS}>"))
            .replace_all(&sql, " SET ")
            .into_owned();
        sql = re(&TRIM_OPEN, &format!(r"(?i)<trim\b({ATTRS})>"))
            .replace_all(&sql, |caps: &regex::Captures<'_>| {
                match attr_value(&caps[1], "prefix") {
                    Some(prefix) if prefix.eq_ignore_ascii_case("where") => {
                        " WHERE 1 = 1 ".to_string()
                    }
                    Some(prefix) => format!(" {prefix} "),
                    None => " ".to_string(),
                }
            })
            .into_owned();

        // Conditional and branch tags drop away; their payload stays.
        sql = re(
            &BRANCH_TAGS,
            &format!(r"(?i)<(if|choose|when|otherwise)\b{ATTRS}>"),
        )
            .replace_all(&sql, " ")
            .into_owned();
        sql = re(&CLOSING_TAGS, r"(?i)</[a-z]+\s*>")
            .replace_all(&sql, " ")
            .into_owned();

        // Bind markers become placeholders.
        sql = re(&BIND_PARAM, r"[#$]\{[^}]*\}")
            .replace_all(&sql, "?")
            .into_owned();
    }

    // SQL comments are dropped even when no markup was present.
    sql = re(&BLOCK_COMMENT, r"(?s)/\*.*?\*/")
        .replace_all(&sql, " ")
        .into_owned();
    sql = re(&LINE_COMMENT, r"--[^\r\n]*")
        .replace_all(&sql, " ")
        .into_owned();

    let sql = re(&WHITESPACE, r"\s+")
        .replace_all(&sql, " ")
        .trim()
        .to_string();

    check_balance(&sql)?;

    Ok(NormalizedStatement {
        original: raw.to_string(),
        sql,
        had_markup,
    })
}

/// Pull a quoted attribute value out of a tag's attribute text
fn attr_value(attrs: &str, name: &str) -> Option<String> {
    let pattern = re(&ATTR, r#"(?i)([a-z]+)\s*=\s*"([^"]*)""#);
    for caps in pattern.captures_iter(attrs) {
        if caps[1].eq_ignore_ascii_case(name) {
            return Some(caps[2].to_string());
        }
    }
    None
}

/// Reject output with unbalanced parentheses or quotes.
///
/// Parentheses inside string literals are ignored; a doubled quote inside a
/// literal reads as close-then-open and stays balanced.
fn check_balance(sql: &str) -> Result<(), NormalizeError> {
    let mut depth: i64 = 0;
    let mut in_single = false;
    let mut in_double = false;

    for c in sql.chars() {
        match c {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            '(' if !in_single && !in_double => depth += 1,
            ')' if !in_single && !in_double => {
                depth -= 1;
                if depth < 0 {
                    return Err(NormalizeError::MalformedStatement {
                        reason: "unmatched closing parenthesis".to_string(),
                    });
                }
            }
            _ => {}
        }
    }

    if depth != 0 {
        return Err(NormalizeError::MalformedStatement {
            reason: "unbalanced parentheses".to_string(),
        });
    }
    if in_single || in_double {
        return Err(NormalizeError::MalformedStatement {
            reason: "unterminated string literal".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn plain_sql_passes_through() {
        let result = normalize("SELECT id FROM users").unwrap();
        assert_eq!(result.sql, "SELECT id FROM users");
        assert!(!result.had_markup);
    }

    #[test]
    fn bind_markers_become_placeholders() {
        let result = normalize("SELECT * FROM users WHERE id = #{id} AND org = ${org}").unwrap();
        assert_eq!(result.sql, "SELECT * FROM users WHERE id = ? AND org = ?");
    }

    #[test]
    fn if_tag_keeps_payload() {
        let raw = r#"SELECT o.id FROM orders o
            LEFT JOIN customers c ON o.customer_id = c.id
            WHERE 1 = 1
            <if test="name != null">AND c.name = #{name}</if>"#;
        let result = normalize(raw).unwrap();
        assert!(result.had_markup);
        assert!(result.sql.contains("LEFT JOIN customers c ON o.customer_id = c.id"));
        assert!(result.sql.contains("AND c.name = ?"));
        assert!(!result.sql.contains('<'));
    }

    #[test]
    fn where_tag_injects_neutral_predicate() {
        let raw = r#"SELECT * FROM orders o
            <where>
                <if test="status != null">AND o.status = #{status}</if>
            </where>"#;
        let result = normalize(raw).unwrap();
        assert_eq!(
            result.sql,
            "SELECT * FROM orders o WHERE 1 = 1 AND o.status = ?"
        );
    }

    #[test]
    fn comparison_operators_inside_attribute_values_are_markup() {
        // A raw `>` inside a quoted attribute must not terminate the tag.
        let raw = r#"SELECT o.id FROM orders o
            LEFT JOIN customers c ON o.customer_id = c.id
            WHERE 1 = 1
            <if test="amount > 0">AND o.amount = #{amount}</if>
            <if test="name != null and name == 'x'">AND c.name = #{name}</if>"#;
        let result = normalize(raw).unwrap();
        assert_eq!(
            result.sql,
            "SELECT o.id FROM orders o \
             LEFT JOIN customers c ON o.customer_id = c.id \
             WHERE 1 = 1 AND o.amount = ? AND c.name = ?"
        );
    }

    #[test]
    fn choose_branches_all_survive() {
        let raw = r#"SELECT * FROM t WHERE 1 = 1
            <choose>
                <when test="a != null">AND t.a = #{a}</when>
                <otherwise>AND t.b = #{b}</otherwise>
            </choose>"#;
        let result = normalize(raw).unwrap();
        assert_eq!(result.sql, "SELECT * FROM t WHERE 1 = 1 AND t.a = ? AND t.b = ?");
    }

    #[test]
    fn foreach_uses_open_and_close_attributes() {
        let raw = r#"SELECT * FROM t WHERE t.id IN
            <foreach collection="ids" item="id" open="(" separator="," close=")">#{id}</foreach>"#;
        let result = normalize(raw).unwrap();
        assert_eq!(result.sql, "SELECT * FROM t WHERE t.id IN ( ? )");
    }

    #[test]
    fn cdata_payload_is_kept() {
        let raw = "SELECT * FROM t WHERE <![CDATA[ t.ts <= #{cutoff} ]]>";
        let result = normalize(raw).unwrap();
        assert_eq!(result.sql, "SELECT * FROM t WHERE t.ts <= ?");
    }

    #[test]
    fn comments_are_dropped() {
        let raw = "SELECT id -- trailing note\nFROM t /* block\nnote */ WHERE id = 1";
        let result = normalize(raw).unwrap();
        assert_eq!(result.sql, "SELECT id FROM t WHERE id = 1");
    }

    #[test]
    fn xml_comment_payload_is_dropped() {
        let raw = "SELECT id FROM t <!-- AND secret = #{x} --> WHERE id = 1";
        let result = normalize(raw).unwrap();
        assert_eq!(result.sql, "SELECT id FROM t WHERE id = 1");
    }

    #[test]
    fn include_and_bind_vanish() {
        let raw = r#"SELECT <include refid="columns"/> FROM t
            <bind name="pattern" value="'%' + name + '%'"/> WHERE id = #{id}"#;
        let result = normalize(raw).unwrap();
        assert_eq!(result.sql, "SELECT FROM t WHERE id = ?");
    }

    #[test]
    fn unbalanced_parens_are_malformed() {
        let raw = "SELECT * FROM t WHERE (a = 1";
        assert!(matches!(
            normalize(raw),
            Err(NormalizeError::MalformedStatement { .. })
        ));
    }

    #[test]
    fn unterminated_quote_is_malformed() {
        let raw = "SELECT * FROM t WHERE name = 'abc";
        assert!(matches!(
            normalize(raw),
            Err(NormalizeError::MalformedStatement { .. })
        ));
    }

    #[test]
    fn parens_inside_literals_are_ignored() {
        let raw = "SELECT * FROM t WHERE name = '(open'";
        assert!(normalize(raw).is_ok());
    }
}
