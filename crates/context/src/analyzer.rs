//! Regex-based code analysis: code examples in reference text, quick quality
//! checks, and a structural profile of RPG source.
//!
//! None of this parses RPG or SQL. The results only feed prompts and the
//! `extract_code_examples` tool.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt::Write as _;

static SQL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?is)\bCREATE\s+(?:TABLE|INDEX|VIEW|PROCEDURE|FUNCTION)\b.*?;",
        r"(?ims)\bSELECT\b.*?\bFROM\b.*?(?:;|$)",
        r"(?ims)\bINSERT\s+INTO\b.*?(?:;|$)",
        r"(?ims)\bUPDATE\b.*?\bSET\b.*?(?:;|$)",
        r"(?ims)\bDELETE\s+FROM\b.*?(?:;|$)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static RPG_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?is)\bDCL-.*?;",
        r"(?is)\bEXEC\s+SQL\b.*?;",
        r"(?is)\bIF\s+.*?\bENDIF;",
        r"(?is)\bFOR\s+.*?\bENDFOR;",
        r"(?is)\bMONITOR\b.*?\bON-ERROR\b.*?\bENDMON;",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static WHERE_CLAUSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bWHERE\s+").unwrap());
static SELECT_STAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bSELECT\s+\*").unwrap());
static SELECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bSELECT\b").unwrap());
static ORDER_BY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bORDER\s+BY\b").unwrap());
static MONITOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bMONITOR\b").unwrap());
static GOTO: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bGOTO\b").unwrap());
static EXEC_SQL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bEXEC\s+SQL\b").unwrap());
static BRANCHES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:IF|ELSEIF|WHEN|FOR|DOW|DOU|JOIN|UNION|CASE)\b").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CodeKind {
    #[serde(rename = "SQL/DB2")]
    Sql,
    #[serde(rename = "RPG")]
    Rpg,
}

impl CodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Sql => "SQL/DB2",
            Self::Rpg => "RPG",
        }
    }

    pub fn language(&self) -> &'static str {
        match self {
            Self::Sql => "sql",
            Self::Rpg => "rpg",
        }
    }
}

/// A code example found in reference text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeBlock {
    pub kind: CodeKind,
    pub code: String,
    pub language: &'static str,
}

impl CodeBlock {
    /// Whether this block answers an `extract_code_examples` type filter
    /// (`all`, `sql`, `db2`, `rpg`, `procedure`).
    pub fn matches_code_type(&self, code_type: &str) -> bool {
        match code_type.trim().to_ascii_lowercase().as_str() {
            "" | "all" => true,
            "sql" | "db2" => self.kind == CodeKind::Sql,
            "rpg" => self.kind == CodeKind::Rpg,
            "procedure" => {
                let upper = self.code.to_ascii_uppercase();
                upper.contains("PROCEDURE") || upper.contains("DCL-PROC")
            }
            _ => false,
        }
    }
}

/// Find SQL/DB2 and RPG snippets in free text. SQL blocks come first, then
/// RPG, each in pattern order; exact duplicates are reported once.
pub fn extract_code_blocks(text: &str) -> Vec<CodeBlock> {
    let mut seen = HashSet::new();
    let mut blocks = Vec::new();

    let groups = [(CodeKind::Sql, &*SQL_PATTERNS), (CodeKind::Rpg, &*RPG_PATTERNS)];
    for (kind, patterns) in groups {
        for pattern in patterns {
            for m in pattern.find_iter(text) {
                let code = m.as_str().trim();
                if code.is_empty() || !seen.insert((kind, code.to_string())) {
                    continue;
                }
                blocks.push(CodeBlock {
                    kind,
                    code: code.to_string(),
                    language: kind.language(),
                });
            }
        }
    }
    blocks
}

#[derive(Debug, Clone, Serialize)]
pub struct QualityReport {
    pub code_type: String,
    pub complexity: &'static str,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
}

impl QualityReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty() && self.suggestions.is_empty()
    }

    /// Findings formatted for inclusion in a prompt.
    pub fn to_prompt_notes(&self) -> String {
        let mut notes = format!(
            "Static analysis ({}, complexity: {}):\n",
            self.code_type, self.complexity
        );
        if self.is_clean() {
            notes.push_str("- No issues detected by pattern checks.\n");
            return notes;
        }
        for issue in &self.issues {
            let _ = writeln!(notes, "- Issue: {issue}");
        }
        for suggestion in &self.suggestions {
            let _ = writeln!(notes, "- Suggestion: {suggestion}");
        }
        notes
    }
}

fn complexity(code: &str) -> &'static str {
    match BRANCHES.find_iter(code).count() {
        0..5 => "low",
        5..15 => "medium",
        _ => "high",
    }
}

fn is_rpg_procedure(code: &str) -> bool {
    code.to_ascii_uppercase().contains("DCL-PROC")
}

/// Pattern checks for SQL (`sql`, `db2`) and RPG (`rpg`) code. A
/// `procedure` is checked as RPG when it declares `DCL-PROC`, else as SQL.
pub fn analyze_quality(code: &str, code_type: &str) -> QualityReport {
    let kind = code_type.trim().to_ascii_lowercase();
    let mut report = QualityReport {
        code_type: kind.clone(),
        complexity: complexity(code),
        issues: Vec::new(),
        suggestions: Vec::new(),
    };

    let as_sql = matches!(kind.as_str(), "sql" | "db2")
        || (kind == "procedure" && !is_rpg_procedure(code));
    let as_rpg = kind == "rpg" || (kind == "procedure" && is_rpg_procedure(code));

    if as_sql {
        if !WHERE_CLAUSE.is_match(code) {
            report
                .issues
                .push("Missing WHERE clause - potential full table scan".into());
        }
        if SELECT_STAR.is_match(code) {
            report
                .suggestions
                .push("Avoid SELECT * - specify columns explicitly".into());
        }
        if SELECT.is_match(code) && !ORDER_BY.is_match(code) {
            report
                .suggestions
                .push("Consider adding ORDER BY for consistent results".into());
        }
    }

    if as_rpg {
        if !MONITOR.is_match(code) {
            report
                .suggestions
                .push("Consider adding error handling with MONITOR".into());
        }
        if GOTO.is_match(code) {
            report
                .issues
                .push("GOTO statements found - consider structured programming".into());
        }
    }

    report
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RpgFormat {
    Fixed,
    Free,
    Mixed,
    Unknown,
}

/// Operation codes recognised in either format.
const OPCODES: &[&str] = &[
    "ADD", "BEGSR", "CALL", "CALLP", "CAT", "CHAIN", "CHECK", "CLEAR", "CLOSE", "DELETE", "DIV",
    "DOU", "DOW", "DSPLY", "ELSE", "ELSEIF", "ENDDO", "ENDFOR", "ENDIF", "ENDMON", "ENDSL",
    "ENDSR", "EVAL", "EXFMT", "EXSR", "FOR", "GOTO", "IF", "ITER", "KFLD", "KLIST", "LEAVE",
    "LOOKUP", "MONITOR", "MOVE", "MOVEL", "MULT", "ON-ERROR", "OPEN", "OTHER", "PARM", "PLIST",
    "READ", "READE", "READP", "RESET", "RETURN", "SCAN", "SELECT", "SETGT", "SETLL", "SORTA",
    "SUB", "SUBST", "TAG", "UPDATE", "WHEN", "WRITE", "XLATE", "Z-ADD", "Z-SUB",
];

/// Fixed-form opcodes with no direct free-form equivalent.
const LEGACY_OPCODES: &[&str] = &[
    "ADD", "CAT", "DIV", "GOTO", "KFLD", "KLIST", "LOOKUP", "MOVE", "MOVEL", "MULT", "PARM",
    "PLIST", "SUB", "TAG", "XLATE", "Z-ADD", "Z-SUB",
];

/// Structural facts about a piece of RPG source.
#[derive(Debug, Clone, Serialize)]
pub struct RpgProfile {
    pub format: RpgFormat,
    /// `**FREE` on the first line.
    pub fully_free: bool,
    /// Fixed-form specification counts keyed by spec letter (H, F, D, C, ...).
    pub spec_counts: BTreeMap<char, usize>,
    pub opcodes: BTreeSet<String>,
    pub embedded_sql: usize,
    pub goto_count: usize,
    pub has_monitor: bool,
    pub line_count: usize,
}

impl RpgProfile {
    /// Opcodes seen that must be rewritten rather than re-indented.
    pub fn legacy_opcodes(&self) -> Vec<&str> {
        self.opcodes
            .iter()
            .map(String::as_str)
            .filter(|op| LEGACY_OPCODES.contains(op))
            .collect()
    }

    pub fn to_prompt_notes(&self) -> String {
        let mut notes = String::from("Source profile:\n");
        let _ = writeln!(
            notes,
            "- Format: {:?}{}",
            self.format,
            if self.fully_free { " (**FREE)" } else { "" }
        );
        let _ = writeln!(notes, "- Lines: {}", self.line_count);
        if !self.spec_counts.is_empty() {
            let specs: Vec<String> = self
                .spec_counts
                .iter()
                .map(|(spec, n)| format!("{spec}={n}"))
                .collect();
            let _ = writeln!(notes, "- Fixed-form specs: {}", specs.join(", "));
        }
        if !self.opcodes.is_empty() {
            let ops: Vec<&str> = self.opcodes.iter().map(String::as_str).collect();
            let _ = writeln!(notes, "- Opcodes: {}", ops.join(", "));
        }
        let legacy = self.legacy_opcodes();
        if !legacy.is_empty() {
            let _ = writeln!(notes, "- Legacy opcodes to rewrite: {}", legacy.join(", "));
        }
        let _ = writeln!(notes, "- Embedded SQL statements: {}", self.embedded_sql);
        let _ = writeln!(notes, "- GOTO statements: {}", self.goto_count);
        let _ = writeln!(
            notes,
            "- MONITOR error handling: {}",
            if self.has_monitor { "present" } else { "absent" }
        );
        notes
    }
}

const SPEC_LETTERS: &[char] = &['H', 'F', 'D', 'I', 'C', 'O', 'P'];

/// Fixed-form: spec letter in column 6, not a comment (`*` in column 7).
fn fixed_spec(line: &str) -> Option<char> {
    let chars: Vec<char> = line.chars().take(7).collect();
    let spec = chars.get(5)?.to_ascii_uppercase();
    if !SPEC_LETTERS.contains(&spec) || chars.get(6) == Some(&'*') {
        return None;
    }
    // Free-form text that happens to have a letter in column 6 starts in column 1.
    if chars[..5].iter().any(|c| !c.is_whitespace() && !c.is_ascii_digit()) {
        return None;
    }
    Some(spec)
}

/// Opcode of a fixed-form C spec: columns 26-35.
fn fixed_opcode(line: &str) -> Option<String> {
    let field: String = line.chars().skip(25).take(10).collect();
    let op = field.trim().to_ascii_uppercase();
    // Extenders like CHAIN(N) or EVAL(H)
    let op = op.split('(').next().unwrap_or_default().to_string();
    OPCODES.contains(&op.as_str()).then_some(op)
}

fn free_opcode(line: &str) -> Option<String> {
    let first = line
        .trim()
        .split(|c: char| c.is_whitespace() || c == ';' || c == '(')
        .next()?
        .to_ascii_uppercase();
    OPCODES.contains(&first.as_str()).then_some(first)
}

fn is_free_statement(line: &str) -> bool {
    let trimmed = line.trim().to_ascii_uppercase();
    !trimmed.is_empty()
        && !trimmed.starts_with("//")
        && (trimmed.ends_with(';')
            || trimmed.starts_with("DCL-")
            || trimmed.starts_with("CTL-OPT")
            || trimmed.starts_with("END-"))
}

pub fn analyze_rpg(source: &str) -> RpgProfile {
    let fully_free = source
        .lines()
        .next()
        .is_some_and(|l| l.trim().eq_ignore_ascii_case("**FREE"));

    let mut spec_counts = BTreeMap::new();
    let mut opcodes = BTreeSet::new();
    let mut fixed_lines = 0;
    let mut free_lines = 0;
    let mut line_count = 0;

    for line in source.lines() {
        line_count += 1;
        if line.trim().is_empty() {
            continue;
        }

        if !fully_free {
            if let Some(spec) = fixed_spec(line) {
                fixed_lines += 1;
                *spec_counts.entry(spec).or_insert(0) += 1;
                if spec == 'C' {
                    if let Some(op) = fixed_opcode(line) {
                        opcodes.insert(op);
                    }
                }
                continue;
            }
        }

        if is_free_statement(line) {
            free_lines += 1;
        }
        if let Some(op) = free_opcode(line) {
            opcodes.insert(op);
        }
    }

    let format = match (fully_free, fixed_lines, free_lines) {
        (true, _, _) => RpgFormat::Free,
        (false, f, r) if f > 0 && r > 0 => RpgFormat::Mixed,
        (false, f, _) if f > 0 => RpgFormat::Fixed,
        (false, _, r) if r > 0 => RpgFormat::Free,
        _ => RpgFormat::Unknown,
    };

    RpgProfile {
        format,
        fully_free,
        spec_counts,
        opcodes,
        embedded_sql: EXEC_SQL.find_iter(source).count(),
        goto_count: GOTO.find_iter(source).count(),
        has_monitor: MONITOR.is_match(source),
        line_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_sql_and_rpg_examples() {
        let text = "Example:\nSELECT name, city FROM customers WHERE id = 1;\n\
                    Declare like this: DCL-S total PACKED(9:2);\n\
                    CREATE TABLE orders (id INT);";
        let blocks = extract_code_blocks(text);

        let sql: Vec<&str> = blocks
            .iter()
            .filter(|b| b.kind == CodeKind::Sql)
            .map(|b| b.code.as_str())
            .collect();
        assert_eq!(sql[0], "CREATE TABLE orders (id INT);");
        assert!(sql.contains(&"SELECT name, city FROM customers WHERE id = 1;"));

        let rpg: Vec<&CodeBlock> = blocks.iter().filter(|b| b.kind == CodeKind::Rpg).collect();
        assert_eq!(rpg.len(), 1);
        assert_eq!(rpg[0].code, "DCL-S total PACKED(9:2);");
        assert_eq!(rpg[0].language, "rpg");
    }

    #[test]
    fn monitor_blocks_span_lines() {
        let text = "monitor;\n  x = y / z;\non-error;\n  x = 0;\nendmon;";
        let blocks = extract_code_blocks(text);
        assert!(blocks.iter().any(|b| b.code.starts_with("monitor") && b.code.ends_with("endmon;")));
    }

    #[test]
    fn no_code_in_prose() {
        assert!(extract_code_blocks("Plain guidance about naming things.").is_empty());
    }

    #[test]
    fn code_type_filter() {
        let sql = CodeBlock {
            kind: CodeKind::Sql,
            code: "CREATE PROCEDURE p1 BEGIN END;".into(),
            language: "sql",
        };
        assert!(sql.matches_code_type("all"));
        assert!(sql.matches_code_type("DB2"));
        assert!(sql.matches_code_type("procedure"));
        assert!(!sql.matches_code_type("rpg"));
    }

    #[test]
    fn sql_quality_checks() {
        let report = analyze_quality("SELECT * FROM orders", "sql");
        assert!(report.issues.iter().any(|i| i.contains("WHERE")));
        assert!(report.suggestions.iter().any(|s| s.contains("SELECT *")));
        assert!(report.suggestions.iter().any(|s| s.contains("ORDER BY")));

        let clean = analyze_quality("SELECT id FROM orders WHERE id = 1 ORDER BY id", "db2");
        assert!(clean.is_clean());
        assert!(clean.to_prompt_notes().contains("No issues"));
    }

    #[test]
    fn rpg_quality_checks() {
        let report = analyze_quality("C                   GOTO      END", "rpg");
        assert!(report.issues.iter().any(|i| i.contains("GOTO")));
        assert!(report.suggestions.iter().any(|s| s.contains("MONITOR")));
        assert!(report.to_prompt_notes().contains("Issue: GOTO"));
    }

    #[test]
    fn procedure_checks_follow_the_language() {
        let rpg = analyze_quality("DCL-PROC calc;\nEND-PROC;", "procedure");
        assert!(rpg.suggestions.iter().any(|s| s.contains("MONITOR")));
        let sql = analyze_quality("CREATE PROCEDURE p1 BEGIN DELETE FROM t; END", "procedure");
        assert!(sql.issues.iter().any(|i| i.contains("WHERE")));
    }

    #[test]
    fn profiles_fixed_form_source() {
        let source = [
            "     H DFTACTGRP(*NO)",
            "     FCUSTMAST  IF   E           K DISK",
            "     D total           S              9  2",
            "     C     custno        CHAIN     CUSTMAST",
            "     C                   MOVEL     'A'           flag              1",
            "     C                   GOTO      done",
            "     C*  a comment line",
            "     C     done          TAG",
        ]
        .join("\n");
        let source = source.as_str();
        let profile = analyze_rpg(source);
        assert_eq!(profile.format, RpgFormat::Fixed);
        assert_eq!(profile.spec_counts.get(&'C'), Some(&4));
        assert_eq!(profile.spec_counts.get(&'F'), Some(&1));
        assert!(profile.opcodes.contains("CHAIN"));
        assert!(profile.opcodes.contains("MOVEL"));
        assert_eq!(profile.legacy_opcodes(), vec!["GOTO", "MOVEL", "TAG"]);
        assert_eq!(profile.goto_count, 1);
        assert!(!profile.has_monitor);
    }

    #[test]
    fn profiles_free_form_source() {
        let source = "**FREE\nctl-opt dftactgrp(*no);\ndcl-s total packed(9:2);\nmonitor;\n  exec sql select count(*) into :total from orders;\non-error;\nendmon;\n*inlr = *on;\n";
        let profile = analyze_rpg(source);
        assert_eq!(profile.format, RpgFormat::Free);
        assert!(profile.fully_free);
        assert!(profile.spec_counts.is_empty());
        assert_eq!(profile.embedded_sql, 1);
        assert!(profile.has_monitor);
        assert!(profile.opcodes.contains("MONITOR"));
        assert!(profile.to_prompt_notes().contains("**FREE"));
    }

    #[test]
    fn mixed_source_is_detected() {
        let source = "     C                   EVAL      x = 1\n       dcl-s y int(10);\n";
        assert_eq!(analyze_rpg(source).format, RpgFormat::Mixed);
    }

    #[test]
    fn empty_source_is_unknown() {
        let profile = analyze_rpg("");
        assert_eq!(profile.format, RpgFormat::Unknown);
        assert_eq!(profile.line_count, 0);
    }
}
