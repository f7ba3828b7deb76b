//! Language detection and grammar registry
//!
//! Detection order: configured override, file extension, shebang line.
//! Shebang wins over extension so executable scripts without an
//! extension (or with a misleading one) still parse.

use crate::shared::models::LanguageId;
use once_cell::sync::Lazy;
use regex::Regex;
use tree_sitter::Language as TsLanguage;

static SHEBANG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#!\s*\S*/(?:env\s+)?([A-Za-z0-9_.-]+)").unwrap());

/// Grammar for a language
pub fn grammar(language: LanguageId) -> TsLanguage {
    match language {
        LanguageId::Python => tree_sitter_python::language(),
        // The TypeScript grammar is a strict superset of JavaScript
        LanguageId::TypeScript | LanguageId::JavaScript => {
            tree_sitter_typescript::language_typescript()
        }
        LanguageId::Java => tree_sitter_java::language(),
        LanguageId::Kotlin => tree_sitter_kotlin::language(),
        LanguageId::Rust => tree_sitter_rust::language(),
        LanguageId::Go => tree_sitter_go::language(),
    }
}

/// Language from a shebang interpreter name
fn from_interpreter(interpreter: &str) -> Option<LanguageId> {
    let base = interpreter.trim();
    if base.starts_with("python") {
        Some(LanguageId::Python)
    } else if base.starts_with("node") || base.starts_with("deno") || base.starts_with("bun") {
        Some(LanguageId::JavaScript)
    } else {
        None
    }
}

/// Language from the first line when it is a shebang
pub fn from_shebang(content: &str) -> Option<LanguageId> {
    let first_line = content.lines().next()?;
    let caps = SHEBANG_RE.captures(first_line)?;
    from_interpreter(caps.get(1)?.as_str())
}

/// Detect language for (path, content).
///
/// `override_language` is the per-path config escape hatch.
pub fn detect_language(
    path: &str,
    content: &str,
    override_language: Option<LanguageId>,
) -> Option<LanguageId> {
    if let Some(lang) = override_language {
        return Some(lang);
    }

    if let Some(lang) = from_shebang(content) {
        return Some(lang);
    }

    let ext = std::path::Path::new(path).extension()?.to_str()?;
    LanguageId::from_extension(ext)
}

/// Strip a UTF-8 BOM if present
pub fn strip_bom(content: &str) -> &str {
    content.strip_prefix('\u{feff}').unwrap_or(content)
}

/// Decode raw file bytes, handling UTF-8/UTF-16 BOMs.
///
/// Returns None for content that is not text in any supported encoding.
pub fn decode_bytes(bytes: &[u8]) -> Option<String> {
    // UTF-16 LE BOM
    if bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] == 0xFE {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16(&units).ok();
    }
    // UTF-16 BE BOM
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16(&units).ok();
    }

    match std::str::from_utf8(bytes) {
        Ok(s) => Some(strip_bom(s).to_string()),
        Err(_) => None,
    }
}
