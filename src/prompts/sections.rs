use std::sync::LazyLock;

use regex::Regex;
use crate::utils::truncation::estimate_tokens;

static FILE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*//[ \t]*File:[ \t]*(\S.*?)[ \t]*$").unwrap());

static DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:abstract[ \t]+)?(contract|library|interface)[ \t]+([A-Za-z_][A-Za-z0-9_]*)").unwrap()
});

static EXTERNAL_SURFACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bconstructor\s*\(|\bfunction\s+[A-Za-z_][A-Za-z0-9_]*\s*\([^)]*\)[^{;]*\b(external|public)\b").unwrap()
});

/// Substrings that mark vendored third-party code.
const THIRD_PARTY_MARKERS: &[&str] = &[
    "@openzeppelin",
    "openzeppelin contracts",
    "solmate",
    "solady",
    "node_modules",
    "@chainlink",
    "forge-std",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SectionKind {
    /// Deployable contract with a constructor or externally visible functions.
    Primary,
    Interface,
    Library,
    /// Contract without an external surface, e.g. an abstract base.
    Support,
    /// Header text before the first declaration (pragmas, imports).
    Preamble,
    ThirdParty,
}

impl SectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "contract",
            Self::Interface => "interface",
            Self::Library => "library",
            Self::Support => "base contract",
            Self::Preamble => "preamble",
            Self::ThirdParty => "third-party",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceSection {
    /// Path from a `// File:` marker, if the source carried one.
    pub path: Option<String>,
    /// Declared contract/library/interface names, in order.
    pub declarations: Vec<String>,
    pub kind: SectionKind,
    pub text: String,
    /// Position in the original source.
    pub index: usize,
}

impl SourceSection {
    pub fn label(&self) -> String {
        match (&self.path, self.declarations.first()) {
            (Some(path), _) => path.clone(),
            (None, Some(name)) => name.clone(),
            (None, None) => self.kind.as_str().to_string(),
        }
    }

    pub fn tokens(&self) -> usize {
        estimate_tokens(&self.text)
    }

    fn matches_contract(&self, contract_name: &str) -> bool {
        let wanted = contract_name.trim().to_lowercase();
        if self.declarations.iter().any(|d| d.to_lowercase() == wanted) {
            return true;
        }
        self.path.as_deref().is_some_and(|p| {
            let file = p.rsplit('/').next().unwrap_or(p);
            let stem = file.split('.').next().unwrap_or(file);
            stem.to_lowercase() == wanted
        })
    }

    /// Lower ranks are kept first when the source exceeds the prompt budget.
    pub fn priority(&self, contract_name: &str) -> u8 {
        if self.kind != SectionKind::ThirdParty && self.matches_contract(contract_name) {
            return 0;
        }
        match self.kind {
            SectionKind::Primary => 1,
            SectionKind::Interface | SectionKind::Library => 2,
            SectionKind::Support => 3,
            SectionKind::Preamble => 4,
            SectionKind::ThirdParty => 5,
        }
    }
}

/// Split source text into sections: by `// File:` markers when present,
/// otherwise by top-level contract/library/interface declarations.
pub fn split_sections(source: &str) -> Vec<SourceSection> {
    let markers: Vec<(usize, String)> = FILE_MARKER
        .captures_iter(source)
        .filter_map(|cap| Some((cap.get(0)?.start(), cap.get(1)?.as_str().trim().to_string())))
        .collect();

    let mut sections = Vec::new();
    if markers.is_empty() {
        split_by_declarations(source, &mut sections);
    } else {
        let head = &source[..markers[0].0];
        if !head.trim().is_empty() {
            push_section(&mut sections, None, head);
        }
        for (i, (start, path)) in markers.iter().enumerate() {
            let end = markers.get(i + 1).map(|(s, _)| *s).unwrap_or(source.len());
            push_section(&mut sections, Some(path.clone()), &source[*start..end]);
        }
    }

    if sections.is_empty() {
        sections.push(SourceSection {
            path: None,
            declarations: Vec::new(),
            kind: SectionKind::Primary,
            text: source.to_string(),
            index: 0,
        });
    }
    sections
}

fn split_by_declarations(source: &str, sections: &mut Vec<SourceSection>) {
    let starts: Vec<usize> = DECLARATION.find_iter(source).map(|m| m.start()).collect();
    let Some(&first) = starts.first() else {
        return;
    };
    if !source[..first].trim().is_empty() {
        push_section(sections, None, &source[..first]);
    }
    for (i, start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(source.len());
        push_section(sections, None, &source[*start..end]);
    }
}

fn push_section(sections: &mut Vec<SourceSection>, path: Option<String>, text: &str) {
    let mut declarations = Vec::new();
    let mut keywords = Vec::new();
    for cap in DECLARATION.captures_iter(text) {
        keywords.push(cap[1].to_string());
        declarations.push(cap[2].to_string());
    }
    let kind = classify(path.as_deref(), text, &keywords);
    sections.push(SourceSection {
        path,
        declarations,
        kind,
        text: text.to_string(),
        index: sections.len(),
    });
}

fn classify(path: Option<&str>, text: &str, keywords: &[String]) -> SectionKind {
    if is_third_party(path, text) {
        return SectionKind::ThirdParty;
    }
    if keywords.is_empty() {
        return SectionKind::Preamble;
    }
    let declares_contract = keywords.iter().any(|k| k == "contract");
    if declares_contract && EXTERNAL_SURFACE.is_match(text) {
        SectionKind::Primary
    } else if declares_contract {
        SectionKind::Support
    } else if keywords.iter().any(|k| k == "library") {
        SectionKind::Library
    } else {
        SectionKind::Interface
    }
}

/// Imports of vendored code do not make a section third-party; the vendored
/// file's own path or header does.
fn is_third_party(path: Option<&str>, text: &str) -> bool {
    if let Some(path) = path {
        let lower = path.to_lowercase();
        if lower.starts_with("lib/") || THIRD_PARTY_MARKERS.iter().any(|m| lower.contains(m)) {
            return true;
        }
    }
    text.lines()
        .map(str::trim)
        .filter(|line| line.starts_with("//") || line.starts_with('*') || line.starts_with("/*"))
        .any(|line| {
            let lower = line.to_lowercase();
            THIRD_PARTY_MARKERS.iter().any(|m| lower.contains(m))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLATTENED: &str = "\
// File: lib/openzeppelin-contracts/contracts/access/Ownable.sol
// OpenZeppelin Contracts (last updated v5.0.0)
abstract contract Ownable {
    function owner() public view returns (address) { return address(0); }
}
// File: src/interfaces/IVault.sol
interface IVault {
    function deposit() external payable;
}
// File: src/Vault.sol
import \"@openzeppelin/contracts/access/Ownable.sol\";
contract Vault is IVault, Ownable {
    constructor() {}
    function deposit() external payable {}
}
";

    #[test]
    fn test_split_by_file_markers() {
        let sections = split_sections(FLATTENED);
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0].kind, SectionKind::ThirdParty);
        assert_eq!(sections[1].kind, SectionKind::Interface);
        assert_eq!(sections[2].kind, SectionKind::Primary);
        assert_eq!(sections[2].declarations, vec!["Vault".to_string()]);
    }

    #[test]
    fn test_import_does_not_mark_third_party() {
        let sections = split_sections(FLATTENED);
        assert_ne!(sections[2].kind, SectionKind::ThirdParty);
    }

    #[test]
    fn test_split_by_declarations() {
        let src = "pragma solidity ^0.8.0;\n\nlibrary SafeMath {\n}\n\ncontract Token {\n    function transfer(address to, uint256 v) public returns (bool) {}\n}\n";
        let sections = split_sections(src);
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0].kind, SectionKind::Preamble);
        assert_eq!(sections[1].kind, SectionKind::Library);
        assert_eq!(sections[2].kind, SectionKind::Primary);
    }

    #[test]
    fn test_named_contract_has_top_priority() {
        let sections = split_sections(FLATTENED);
        assert_eq!(sections[2].priority("Vault"), 0);
        assert_eq!(sections[1].priority("Vault"), 2);
        assert_eq!(sections[0].priority("Vault"), 5);
        assert_eq!(sections[0].priority("Ownable"), 5);
    }

    #[test]
    fn test_plain_text_is_one_section() {
        let sections = split_sections("selfdestruct(owner);");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].kind, SectionKind::Primary);
    }
}
