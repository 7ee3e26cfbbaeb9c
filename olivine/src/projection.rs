//! Optional field projection.
//!
//! Declared optional fields are stripped from every read result unless a
//! find explicitly keeps them. Stripping only happens on the way out of
//! the store, so the stored document always stays complete and fields can
//! be injected back into a projected copy at any time.

use crate::document::Document;
use crate::errors::OlivineResult;

/// Removes the optional fields of a collection from a read result,
/// keeping those explicitly asked for. Undeclared keeps are ignored.
pub(crate) fn strip_optional_fields(
    document: &mut Document,
    optional_fields: &[String],
    keep: &[String],
) -> OlivineResult<()> {
    for field in optional_fields {
        if keep.iter().any(|kept| kept == field) {
            continue;
        }
        document.remove(field)?;
    }
    Ok(())
}

/// Copies the given fields from a stored document into a projected copy.
///
/// Fields absent from the source are left untouched in the target, so
/// injecting twice yields the same document as injecting once.
pub(crate) fn inject_fields(
    target: &mut Document,
    source: &Document,
    fields: &[String],
) -> OlivineResult<()> {
    for field in fields {
        let value = source.get(field)?;
        if !value.is_null() {
            target.put(field, value)?;
        }
    }
    Ok(())
}
