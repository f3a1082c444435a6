use std::collections::BTreeMap;

use fxhash::FxHashMap;

/// Compact chromosome identifier shared by the annotation and the alignment stream.
pub type ChromosomeCode = u32;

pub const CHROMOSOME_X: ChromosomeCode = 10_001;
pub const CHROMOSOME_Y: ChromosomeCode = 10_002;
pub const CHROMOSOME_M: ChromosomeCode = 10_003;

/// Numbered chromosomes at or above this value are treated as unnamed contigs.
const MAX_NUMBERED: u32 = 10_000;
const FIRST_UNNAMED: ChromosomeCode = 20_000;

///
/// Normalises chromosome names into [`ChromosomeCode`]s.
///
/// `chr1`, `Chr1`, `CHR1` and `1` all yield the same code. Sex and mitochondrial
/// aliases get fixed codes. Any other contig name is registered on first sight
/// and keeps its code for the lifetime of the map, so one map must be shared by
/// everything that has to agree on chromosome identity.
///
#[derive(Debug, Default, Clone)]
pub struct ChromosomeMap {
    unnamed: FxHashMap<String, ChromosomeCode>,
    names: BTreeMap<ChromosomeCode, String>,
}

fn strip_prefix(name: &str) -> &str {
    match name.get(..3) {
        Some(prefix) if prefix.eq_ignore_ascii_case("chr") && name.len() > 3 => &name[3..],
        _ => name,
    }
}

fn fixed_code(stripped: &str) -> Option<ChromosomeCode> {
    match stripped.to_ascii_uppercase().as_str() {
        "X" => Some(CHROMOSOME_X),
        "Y" => Some(CHROMOSOME_Y),
        "M" | "MT" => Some(CHROMOSOME_M),
        other => match other.parse::<u32>() {
            Ok(n) if n < MAX_NUMBERED => Some(n),
            _ => None,
        },
    }
}

impl ChromosomeMap {
    pub fn new() -> Self {
        Self::default()
    }

    ///
    /// Get the code for a chromosome name, registering it if it was never seen.
    ///
    pub fn normalize(&mut self, name: &str) -> ChromosomeCode {
        let stripped = strip_prefix(name);
        let code = match fixed_code(stripped) {
            Some(code) => code,
            None => {
                let next = FIRST_UNNAMED + self.unnamed.len() as ChromosomeCode;
                *self.unnamed.entry(stripped.to_string()).or_insert(next)
            }
        };
        self.names.entry(code).or_insert_with(|| name.to_string());
        code
    }

    ///
    /// Get the code for a chromosome name without registering new contigs.
    ///
    pub fn lookup(&self, name: &str) -> Option<ChromosomeCode> {
        let stripped = strip_prefix(name);
        fixed_code(stripped).or_else(|| self.unnamed.get(stripped).copied())
    }

    /// First spelling seen for a code, for diagnostics.
    pub fn name(&self, code: ChromosomeCode) -> Option<&str> {
        self.names.get(&code).map(String::as_str)
    }
}
