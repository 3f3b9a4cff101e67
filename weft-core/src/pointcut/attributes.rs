//! Expansion of attribute selectors into reader and writer methods
//!
//! An attribute `name` stands for the reader `name` and the writer `name=`.
//! Names may be written `@name`, `:name` or `name=`; the decoration is
//! stripped first. A pattern `/^na/` becomes the reader pattern
//! `/^na.*\b$/` and the writer pattern `/^na.*\b=$/`.

use super::spec::AttributeOption;
use crate::error::{Result, WeftError};
use crate::finders::{MethodSelector, Pattern};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use weft_types::MethodName;

static TRAILING_EQUALS_OR_DOLLAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"=?\$?$").expect("static pattern compiles"));
static LEADING_AT_OR_COLON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\^?[@:]").expect("static pattern compiles"));

/// Method selectors for `attributes`, restricted by `options`
pub fn expand(
    attributes: &BTreeSet<MethodSelector>,
    options: &BTreeSet<AttributeOption>,
) -> Result<BTreeSet<MethodSelector>> {
    let readers = readers(attributes)?;
    let wants_readers = options.contains(&AttributeOption::Readers);
    let wants_writers = options.contains(&AttributeOption::Writers);

    if wants_readers && !wants_writers {
        return Ok(readers);
    }
    let writers = writers(&readers)?;
    if wants_writers && !wants_readers {
        return Ok(writers);
    }
    Ok(readers.into_iter().chain(writers).collect())
}

fn readers(attributes: &BTreeSet<MethodSelector>) -> Result<BTreeSet<MethodSelector>> {
    attributes
        .iter()
        .map(|attribute| match attribute {
            MethodSelector::All => Err(WeftError::invalid("\"all\" is not supported for attributes")),
            MethodSelector::Name(name) => {
                let bare = strip_trailing(name.as_str());
                Ok(MethodSelector::Name(MethodName::new(strip_leading(&bare))))
            }
            MethodSelector::Pattern(pattern) => {
                let source = format!(r"{}.*\b$", strip_trailing(pattern.as_str()));
                Pattern::new(&strip_leading(&source)).map(MethodSelector::Pattern)
            }
        })
        .collect()
}

fn writers(readers: &BTreeSet<MethodSelector>) -> Result<BTreeSet<MethodSelector>> {
    readers
        .iter()
        .map(|reader| match reader {
            MethodSelector::All => Err(WeftError::invalid("\"all\" is not supported for attributes")),
            MethodSelector::Name(name) => Ok(MethodSelector::Name(MethodName::new(format!("{}=", name)))),
            MethodSelector::Pattern(pattern) => {
                let source = format!("{}=$", strip_trailing(pattern.as_str()));
                Pattern::new(&source).map(MethodSelector::Pattern)
            }
        })
        .collect()
}

fn strip_trailing(text: &str) -> String {
    TRAILING_EQUALS_OR_DOLLAR.replace(text, "").into_owned()
}

fn strip_leading(text: &str) -> String {
    LEADING_AT_OR_COLON.replace(text, "").into_owned()
}
