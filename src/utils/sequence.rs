//! Cleaning and validation of user-supplied nucleotide sequences.

use crate::errors::PipelineError;

/// The characters accepted in a reference sequence (`N` is the wildcard).
pub const NUCLEOTIDES: &[u8] = b"ACGTN";

/// Strips all whitespace (including embedded newlines from pasted text) and
/// upper-cases the sequence.
pub fn clean(seq: &str) -> String {
    seq.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Ensures that every character of an already cleaned sequence is within
/// [`NUCLEOTIDES`].
pub fn validate(name: &'static str, seq: &str) -> Result<(), PipelineError> {
    match seq
        .char_indices()
        .find(|(_, c)| !c.is_ascii() || !NUCLEOTIDES.contains(&(*c as u8)))
    {
        Some((position, found)) => Err(PipelineError::InvalidSequence {
            name,
            found,
            position,
        }),
        None => Ok(()),
    }
}

/// Cleans and validates a sequence that must be present.
pub fn required(name: &'static str, raw: &str) -> Result<String, PipelineError> {
    let seq = clean(raw);
    if seq.is_empty() {
        return Err(PipelineError::MissingSequence(name));
    }

    validate(name, &seq)?;
    Ok(seq)
}

/// Cleans and validates a sequence that may be omitted. A value that is empty
/// after cleaning is treated as absent.
pub fn optional(name: &'static str, raw: Option<&str>) -> Result<Option<String>, PipelineError> {
    let seq = match raw.map(clean) {
        Some(s) if !s.is_empty() => s,
        _ => return Ok(None),
    };

    validate(name, &seq)?;
    Ok(Some(seq))
}
