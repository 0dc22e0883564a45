use crate::errors::{Result, TemplateError};
use crate::{is_identifier, is_identifier_char};

/// Contract names emitted by the proving system's verifier exporter, newest first
pub const GENERATED_CONTRACT_NAMES: [&str; 2] = ["Groth16Verifier", "Verifier"];

/// Renames the generated verifier and pins its compiler pragma
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierTemplate {
    contract_name: String,
    pragma: String,
}

impl VerifierTemplate {
    /// Create a template, validating the contract name and pragma constraint
    pub fn new(contract_name: impl Into<String>, pragma: impl Into<String>) -> Result<Self> {
        let contract_name = contract_name.into();
        let pragma = pragma.into();
        if !is_identifier(&contract_name) {
            return Err(TemplateError::InvalidIdentifier(contract_name));
        }
        let pragma_ok = !pragma.trim().is_empty()
            && pragma
                .chars()
                .all(|c| c.is_ascii_digit() || " .^~<>=".contains(c));
        if !pragma_ok {
            return Err(TemplateError::InvalidPragma(pragma));
        }
        Ok(Self {
            contract_name,
            pragma: pragma.trim().to_string(),
        })
    }

    pub fn contract_name(&self) -> &str {
        &self.contract_name
    }

    pub fn pragma(&self) -> &str {
        &self.pragma
    }

    /// Apply the template to verifier text produced by the proving system.
    ///
    /// Every declaration of a known generated contract name is renamed, and the
    /// first `pragma solidity` line is replaced. The text is not parsed.
    pub fn apply(&self, generated: &str) -> Result<String> {
        let mut text = generated.to_string();
        let mut renamed = 0;
        for token in GENERATED_CONTRACT_NAMES {
            let (next, count) = rename_declarations(&text, token, &self.contract_name);
            text = next;
            renamed += count;
        }
        if renamed == 0 {
            return Err(TemplateError::MissingContractToken);
        }
        replace_pragma(&text, &self.pragma)
    }
}

/// Replace `contract <from>` with `contract <to>` where `<from>` is a whole word
fn rename_declarations(source: &str, from: &str, to: &str) -> (String, usize) {
    let needle = format!("contract {from}");
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    let mut count = 0;

    while let Some(pos) = rest.find(&needle) {
        let end = pos + needle.len();
        let starts_word = rest[..pos]
            .chars()
            .next_back()
            .map_or(true, |c| !is_identifier_char(c));
        let ends_word = rest[end..]
            .chars()
            .next()
            .map_or(true, |c| !is_identifier_char(c));

        out.push_str(&rest[..pos]);
        if starts_word && ends_word {
            out.push_str("contract ");
            out.push_str(to);
            count += 1;
        } else {
            out.push_str(&rest[pos..end]);
        }
        rest = &rest[end..];
    }
    out.push_str(rest);
    (out, count)
}

fn replace_pragma(source: &str, pragma: &str) -> Result<String> {
    let mut replaced = false;
    let mut out = String::with_capacity(source.len() + 16);

    for line in source.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if !replaced && trimmed.starts_with("pragma solidity") {
            let indent = &line[..line.len() - trimmed.len()];
            out.push_str(indent);
            out.push_str("pragma solidity ");
            out.push_str(pragma);
            out.push(';');
            if line.ends_with('\n') {
                out.push('\n');
            }
            replaced = true;
        } else {
            out.push_str(line);
        }
    }

    if replaced {
        Ok(out)
    } else {
        Err(TemplateError::MissingPragma)
    }
}
