//! # Operation signatures
//!
//! Computes a stable signature for an operation, so that operations which only differ in their
//! string representation are reported together. The signature is built as follows:
//!
//! - Every operation except the requested one is dropped, together with the fragments it does
//!   not use.
//! - Hard-coded values are hidden: strings become `""`, numbers `0`, lists `[]` and objects `{}`.
//!   Variables, enums, booleans and nulls are kept.
//! - Aliases and comments are removed.
//! - Definitions, selections, arguments, variables and directives are sorted.
//! - The document is printed on a single line with the minimal amount of whitespace.

#![deny(missing_docs)]

mod directives;
mod operation;
mod selection_set;
mod value;
mod whitespace;

#[cfg(test)]
mod tests;

use std::{cmp::Ordering, collections::HashSet};

use graphql_parser::query::Definition;

/// Returns the signature of the operation `operation_name` in `source_text`.
///
/// - If the operation is named, the source must contain an operation with the given name.
/// - Without a name, the source must contain a single operation.
/// - The source must parse as an executable document.
pub fn signature(source_text: &str, operation_name: Option<&str>) -> anyhow::Result<String> {
    let normalized = normalize(source_text, operation_name)?;
    Ok(whitespace::reduce(&normalized))
}

/// Same as [`signature`], but the document keeps the multi-line printing of the parser.
pub fn normalize(source_text: &str, operation_name: Option<&str>) -> anyhow::Result<String> {
    let mut document = graphql_parser::parse_query::<&str>(source_text)?;

    document.definitions.retain(|definition| match definition {
        Definition::Operation(operation) => match operation_name {
            Some(name) => operation::name(operation) == Some(name),
            None => true,
        },
        Definition::Fragment(_) => true,
    });

    let operation_count = document
        .definitions
        .iter()
        .filter(|definition| matches!(definition, Definition::Operation(_)))
        .count();

    match (operation_count, operation_name) {
        (0, Some(name)) => anyhow::bail!("no operation named \"{name}\" in the document"),
        (0, None) => anyhow::bail!("the document does not contain any operation"),
        (1, _) => (),
        (_, _) => anyhow::bail!("the document contains multiple operations, an operation name is required"),
    }

    let mut used_fragments = HashSet::new();

    for definition in &mut document.definitions {
        if let Definition::Operation(operation) = definition {
            operation::normalize(operation, &mut used_fragments);
        }
    }

    // Fragments can spread other fragments, keep going until no new fragment is discovered.
    let mut visited = HashSet::new();

    loop {
        let mut discovered = HashSet::new();

        for definition in &mut document.definitions {
            if let Definition::Fragment(fragment) = definition {
                if !used_fragments.contains(fragment.name) || visited.contains(fragment.name) {
                    continue;
                }

                visited.insert(fragment.name);
                directives::normalize(&mut fragment.directives);
                selection_set::normalize(&mut fragment.selection_set, &mut discovered);
            }
        }

        let before = used_fragments.len();
        used_fragments.extend(discovered);

        if used_fragments.len() == before {
            break;
        }
    }

    document.definitions.retain(|definition| match definition {
        Definition::Fragment(fragment) => used_fragments.contains(fragment.name),
        Definition::Operation(_) => true,
    });

    document.definitions.sort_by(|a, b| match (a, b) {
        (Definition::Operation(_), Definition::Fragment(_)) => Ordering::Greater,
        (Definition::Fragment(_), Definition::Operation(_)) => Ordering::Less,
        (Definition::Fragment(a), Definition::Fragment(b)) => a.name.cmp(b.name),
        // a single operation is left at this point
        (Definition::Operation(_), Definition::Operation(_)) => Ordering::Equal,
    });

    Ok(document.to_string())
}
