//! Reversible mapping between external field names and MySQL column names.
//!
//! MySQL treats `.` in an unquoted reference as a qualifier separator, so dotted field
//! names (`address.city`) are stored as `address_dot_city` and mapped back on read.
//!
//! Known limitation: a field whose name already contains [`DOT_MARKER`] cannot round-trip.
//! [`checked_storage_name`] rejects such names instead of letting them silently turn into
//! dotted names on the way back.

use std::borrow::Cow;

use crate::error::MysqlMiddlewareError;

/// Token substituted for `.` in storage names.
pub const DOT_MARKER: &str = "_dot_";

/// Map an external field name to its storage form.
#[must_use]
pub fn to_storage_name(name: &str) -> Cow<'_, str> {
    if name.contains('.') {
        Cow::Owned(name.replace('.', DOT_MARKER))
    } else {
        Cow::Borrowed(name)
    }
}

/// Map a storage column name back to the external field name.
#[must_use]
pub fn from_storage_name(name: &str) -> Cow<'_, str> {
    if name.contains(DOT_MARKER) {
        Cow::Owned(name.replace(DOT_MARKER, "."))
    } else {
        Cow::Borrowed(name)
    }
}

/// Like [`to_storage_name`], but refuses names that would not survive the round trip.
///
/// # Errors
/// Returns `ValidationError` for an empty name or a name containing [`DOT_MARKER`].
pub fn checked_storage_name(name: &str) -> Result<Cow<'_, str>, MysqlMiddlewareError> {
    if name.is_empty() {
        return Err(MysqlMiddlewareError::validation("field name must not be empty"));
    }
    if name.contains(DOT_MARKER) {
        return Err(MysqlMiddlewareError::validation(format!(
            "field name {name:?} contains the reserved sequence {DOT_MARKER:?}"
        )));
    }
    Ok(to_storage_name(name))
}
