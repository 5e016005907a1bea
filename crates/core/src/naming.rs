//! Naming convention used to derive table and column names.
//!
//! Entity keys and property names are written in `camelCase` / `PascalCase`;
//! tables and columns are `snake_case`. Only a lowercase-to-uppercase
//! transition starts a new word, so acronyms collapse (`HTTPServer` ->
//! `httpserver`) instead of being split letter by letter.

/// Character class tracked while scanning an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Digit,
    Lower,
    Upper,
    Other,
}

impl CharClass {
    fn of(c: char) -> Self {
        if c.is_numeric() {
            CharClass::Digit
        } else if c.is_lowercase() {
            CharClass::Lower
        } else if c.is_uppercase() {
            CharClass::Upper
        } else {
            CharClass::Other
        }
    }
}

/// Convert a word-capitalized identifier to `snake_case`.
///
/// An underscore is inserted exactly where a lowercase character is followed
/// by an uppercase one; every character is lowercased. Dots and any other
/// characters pass through unchanged.
///
/// # Examples
///
/// ```
/// use histable_core::naming::to_snake_case;
///
/// assert_eq!(to_snake_case("orderLineItem"), "order_line_item");
/// assert_eq!(to_snake_case("HTTPServer"), "httpserver");
/// assert_eq!(to_snake_case("line.itemCount"), "line.item_count");
/// ```
pub fn to_snake_case(identifier: &str) -> String {
    let mut out = String::with_capacity(identifier.len() + 4);
    let mut previous: Option<CharClass> = None;

    for c in identifier.chars() {
        let class = CharClass::of(c);
        if previous == Some(CharClass::Lower) && class == CharClass::Upper {
            out.push('_');
        }
        out.extend(c.to_lowercase());
        previous = Some(class);
    }

    out
}

/// The last dot-separated segment of a qualified name.
///
/// `com.example.Invoice` -> `Invoice`; a name without dots is returned as is.
pub fn simple_name(qualified: &str) -> &str {
    qualified
        .rsplit_once('.')
        .map_or(qualified, |(_, simple)| simple)
}

/// Default column name for a (possibly nested) property path.
///
/// Dots are flattened to underscores before the case conversion, so
/// `lineItem.unitPrice` maps to `line_item_unit_price`.
pub fn property_column(property: &str) -> String {
    to_snake_case(&property.replace('.', "_"))
}
