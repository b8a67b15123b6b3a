use std::sync::LazyLock;

use regex::Regex;

use crate::models::CredentialField;

/// Ordered candidate patterns for one field. Group 1 holds the value.
pub struct FieldRules {
    pub field: CredentialField,
    pub patterns: Vec<Regex>,
}

/// Case-insensitive, multi-line pattern built from pieces.
fn ci(parts: &[&str]) -> Regex {
    Regex::new(&format!("(?im){}", parts.concat())).unwrap()
}

// ── Shared fragments ──

/// A personal name: up to six words of letters, dots and apostrophes.
/// Lazy, so the shortest run that reaches a terminator wins.
const NAME: &str = r"([a-z][a-z.']*(?:[ \t]+[a-z][a-z.']*){0,5}?)";

/// What may follow a name: end of line, punctuation, a digit, or a word that
/// starts the rest of the sentence.
const NAME_END: &str = r"(?:[ \t\r]*(?:$|[,;:(\d])|[ \t]+(?:has|have|had|is|was|s/o|d/o|son|daughter|wife|bearing|roll|reg|registration|enrol(?:l?ment)?|father|mother|with|of|from|for|in|who|on|at|date|dob|student|candidate)\b)";

/// Words of a degree or subject name.
const SUBJECT: &str = r"[a-z&()]+(?:[ \t]+[a-z&()]+)*?";

/// What may follow a degree.
const DEGREE_END: &str = r"(?:[ \t\r]*(?:$|[,;:.\d])|[ \t]+(?:in[ \t]+the[ \t]+year|from|with|during|held|at|awarded|securing|obtaining|by|on|under|session|batch|year|has|is|was|dated)\b)";

/// An institution name: up to six leading words, a kind keyword, and an
/// optional "of ..." tail.
const INSTITUTION: &str = r"(?:[a-z][a-z&().'\-]*[ \t]+){0,6}?(?:university|college|institute|school|academy|board)\b(?:[ \t]+of[ \t]+[a-z&()\-]+(?:[ \t]+[a-z&()\-]+)*?)?";

/// What may follow an institution name: end of line, punctuation, a digit,
/// a connecting word, or the label that opens the next part of a certificate
/// once OCR has joined its lines.
const INSTITUTION_END: &str = r"(?:[ \t\r]*(?:$|[,;:.\d])|[ \t]+(?:in|on|with|during|for|has|is|was|date|dated|under|securing|obtaining|the[ \t]+year|this|certificate|certify|name|roll|reg|registration|enrol(?:l?ment)?|serial|grade|cgpa|marks)\b)";

/// Identifier made of letters, digits, slashes and hyphens that contains at
/// least one digit.
const NUMBERED_ID: &str = r"((?:[a-z/\-]*\d)[a-z0-9/\-]*)";

// ── Field tables ──

/// Per-field pattern lists in priority order. Fields are parsed in this
/// order too; specialization is only ever derived from the degree.
pub static FIELD_RULES: LazyLock<Vec<FieldRules>> = LazyLock::new(|| {
    vec![
        FieldRules {
            field: CredentialField::Name,
            patterns: vec![
                // "Name: ...", "Name of the Candidate - ..."
                ci(&[
                    r"\b(?:name(?:[ \t]+of[ \t]+(?:the[ \t]+)?(?:candidate|student|holder))?|(?:candidate|student)(?:'s)?[ \t]+name|candidate|student)[ \t]*[:\-][ \t]*",
                    NAME,
                    NAME_END,
                ]),
                ci(&[r"\bcertif(?:y|ied)\s+that\s+", NAME, NAME_END]),
                ci(&[r"this\s+is\s+to\s+certify\s+that\s+([a-z\s.]+)"]),
                ci(&[r"\b(?:mrs|mr|ms|miss|dr|prof)\.?[ \t]+", NAME, NAME_END]),
            ],
        },
        FieldRules {
            field: CredentialField::RollNumber,
            patterns: vec![
                ci(&[r"\b(?:roll|registration|reg|enrol(?:l?ment)?|student|id)\.?[ \t]*(?:no\b|number\b|num\b|#)\.?[\s:#\-]*([a-z0-9/\-]+)"]),
                ci(&[r"\broll\b[\s:#\-]*", NUMBERED_ID]),
                ci(&[r"\b(?:enrol(?:l?ment)?|admission|seat|hall[ \t]+ticket)\b[\s:#\-]*", NUMBERED_ID]),
            ],
        },
        FieldRules {
            field: CredentialField::Degree,
            patterns: vec![
                ci(&[
                    r"\b((?:bachelor|master|doctor)(?:'?s)?(?:[ \t]+degree)?[ \t]+(?:of|in)[ \t]+",
                    SUBJECT,
                    ")",
                    DEGREE_END,
                ]),
                ci(&[
                    r"\b((?:(?:b|m)\.[ \t]?(?:tech|sc|com|a|e|ed|arch|pharm|phil|ba|ca|s)\.?|(?:btech|bsc|bcom|bba|bca|barch|bpharm|mtech|msc|mcom|mba|mca|mphil|mpharm|llb|llm)\b\.?|ph\.?[ \t]?d\b\.?)(?:[ \t]+(?:in|of)[ \t]+",
                    SUBJECT,
                    ")?)",
                    DEGREE_END,
                ]),
                ci(&[
                    r"\b((?:post[ \t\-]?graduate[ \t]+)?diploma[ \t]+(?:in|of)[ \t]+",
                    SUBJECT,
                    ")",
                    DEGREE_END,
                ]),
                ci(&[r"\b(?:degree|course|programme|program)\b[ \t]*(?:of|in|:|-)[ \t:]*([a-z][a-z &()]*)"]),
            ],
        },
        FieldRules {
            field: CredentialField::IssueYear,
            patterns: vec![
                ci(&[r"\b(?:year|session|batch)\b(?:[ \t]+of[ \t]+(?:passing|completion|award|graduation))?[\s:\-]*(\d{4})"]),
                ci(&[r"\b(?:passed|completed|graduated|awarded|conferred)\b[ \t\w]*?(\d{4})"]),
                ci(&[r"(\d{4})[ \t]*(?:batch|session|examination|exam)\b"]),
                ci(&[r"\b(?:dated|date)\b[\s:\-]*.{0,20}(\d{4})"]),
            ],
        },
        FieldRules {
            field: CredentialField::Institution,
            patterns: vec![
                ci(&[
                    r"\b(?:awarded|issued|conferred|granted)[ \t]+by[\s:]*((?:the[ \t]+)?",
                    INSTITUTION,
                    ")",
                    INSTITUTION_END,
                ]),
                ci(&[r"\bfrom[\s:]+((?:the[ \t]+)?", INSTITUTION, ")", INSTITUTION_END]),
                ci(&[
                    r"\b((?:university|college|institute|school|academy)[ \t]+of[ \t]+[a-z&()\-]+(?:[ \t]+[a-z&()\-]+){0,5}?)",
                    INSTITUTION_END,
                ]),
                // Letterhead: at most six words before the keyword.
                ci(&[
                    r"^[ \t]*((?:[a-z][a-z&().'\-]*[ \t]+){0,6}?(?:university|college|institute|school|academy)\b(?:[ \t]+of[ \t]+[a-z&\-]+(?:[ \t]+[a-z&\-]+)*?)?)",
                    INSTITUTION_END,
                ]),
                ci(&[r"(?:awarded\s+by|issued\s+by|from)[\s:]*([a-z\s,&()]+)"]),
            ],
        },
        FieldRules {
            field: CredentialField::Grade,
            patterns: vec![
                ci(&[r"\b(?:cgpa|sgpa|gpa|cpi|grade[ \t]+point[ \t]+average)\b[\s:\-]*(?:of[ \t]+)?(\d{1,2}(?:\.\d{1,3})?(?:[ \t]*(?:/|out[ \t]+of)[ \t]*\d{1,2}(?:\.\d{1,2})?)?)"]),
                ci(&[r"\b(?:percentage|marks|aggregate)\b[\s:\-]*(?:of[ \t]+)?(?:obtained[\s:\-]*)?(\d{1,3}(?:\.\d{1,2})?[ \t]*%?)"]),
                ci(&[r"\b((?:first|second|third|pass)[ \t]+(?:class|division)(?:[ \t]+with[ \t]+(?:distinction|honou?rs))?)"]),
                ci(&[r"\bgrade\b[\s:\-]*([a-f][+\-]?|o)(?:[^a-z]|$)"]),
                ci(&[r"\b(?:secured|obtained|scored)\b[ \t]+([a-z0-9.+ ]+?)[ \t]*(?:grade|cgpa|gpa|marks|%)"]),
            ],
        },
        FieldRules {
            field: CredentialField::CertificateNumber,
            patterns: vec![
                ci(&[r"\b(?:certificate|cert|diploma|serial)\.?[ \t]*(?:no\b|number\b|num\b|#)\.?[\s:#\-]*([a-z0-9/\-]+)"]),
                ci(&[r"\b(?:serial|certificate|cert)\b[\s:#\-]*", NUMBERED_ID]),
                ci(&[r"\b(?:s|sr|sl)\.?[ \t]?no\b\.?[\s:#\-]*", NUMBERED_ID]),
            ],
        },
    ]
});

/// Broader institution scan over the raw text, used only when no
/// institution pattern matched.
pub static INSTITUTION_FALLBACK: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        ci(&[r"([^,\n]*university[^,\n]*)"]),
        ci(&[r"([^,\n]*college[^,\n]*)"]),
        ci(&[r"([^,\n]*institute[^,\n]*)"]),
    ]
});

/// Start of an "in X" / "of X" clause inside a degree.
pub static SUBJECT_CLAUSE: LazyLock<Regex> = LazyLock::new(|| ci(&[r"\b(?:in|of)\s+"]));
